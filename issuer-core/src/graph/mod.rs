//! Issue graph loading from CSV rows
//!
//! [`load`] turns CSV rows into an [`IssueGraph`]: the issues to create in
//! row order, the meta issues, and the validated parent/child links between
//! them.

mod loader;
mod rows;
mod sample;
mod validate;

use std::collections::HashMap;

use crate::issue::{Issue, MetaIssue};

pub use loader::{load, Schema};
pub use rows::{read_rows, rows_from_reader, Row};
pub use sample::{META_SAMPLE, PARENT_SAMPLE};

/// Position of an issue in an [`IssueGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Index into [`IssueGraph::issues`]
    Issue(usize),
    /// Index into [`IssueGraph::meta_issues`]
    Meta(usize),
}

/// A validated batch of issues and their relationships
#[derive(Debug, Clone, Default)]
pub struct IssueGraph {
    /// Plain and sub issues, in CSV row order
    pub issues: Vec<Issue>,
    /// Meta issues, in order of first appearance
    pub meta_issues: Vec<MetaIssue>,
    /// Child id to parent id
    pub parents: HashMap<String, String>,
    /// Parent id to child ids, in row order
    pub children: HashMap<String, Vec<String>>,
    index: HashMap<String, NodeRef>,
}

impl IssueGraph {
    /// Total number of issues, meta issues included
    pub fn len(&self) -> usize {
        self.issues.len() + self.meta_issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find an issue by its `project_issue_id`
    pub fn find(&self, id: &str) -> Option<NodeRef> {
        self.index.get(id).copied()
    }

    pub fn get(&self, node: NodeRef) -> &Issue {
        match node {
            NodeRef::Issue(i) => &self.issues[i],
            NodeRef::Meta(i) => &self.meta_issues[i].issue,
        }
    }

    pub fn get_mut(&mut self, node: NodeRef) -> &mut Issue {
        match node {
            NodeRef::Issue(i) => &mut self.issues[i],
            NodeRef::Meta(i) => &mut self.meta_issues[i].issue,
        }
    }

    /// Child/parent pairs, children in row order
    pub fn links(&self) -> Vec<(NodeRef, NodeRef)> {
        let mut links: Vec<(NodeRef, NodeRef)> = self
            .parents
            .iter()
            .filter_map(|(child, parent)| Some((self.find(child)?, self.find(parent)?)))
            .collect();
        links.sort_by_key(|(child, _)| self.get(*child).row);
        links
    }

    /// URLs of the created sub issues of meta issue `meta`, in row order
    pub fn sub_issue_urls(&self, meta: usize) -> Vec<String> {
        self.meta_issues[meta]
            .sub_issues
            .iter()
            .map(|&i| &self.issues[i])
            .filter(|issue| issue.is_created())
            .map(Issue::url)
            .collect()
    }
}
