//! Relationship validation shared by all loader front-ends

use std::collections::{HashMap, HashSet};

use super::{IssueGraph, NodeRef};
use crate::issue::{Issue, MetaIssue};
use crate::{Error, Result};

/// A child to parent link between two `project_issue_id`s
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edge {
    pub child: String,
    pub parent: String,
}

/// Validate ids and edges, then assemble the graph
pub(crate) fn build_graph(
    issues: Vec<Issue>,
    mut meta_issues: Vec<MetaIssue>,
    edges: Vec<Edge>,
) -> Result<IssueGraph> {
    let index = index_ids(&issues, &meta_issues)?;
    let title_of = |node: &NodeRef| match *node {
        NodeRef::Issue(i) => issues[i].title.clone(),
        NodeRef::Meta(i) => meta_issues[i].issue.title.clone(),
    };

    let mut parents: HashMap<String, String> = HashMap::new();
    let mut children: HashMap<String, Vec<String>> = HashMap::new();

    for edge in &edges {
        if edge.child == edge.parent {
            let title = index.get(&edge.child).map(title_of).unwrap_or_default();
            return Err(Error::SelfParent {
                id: edge.child.clone(),
                title,
            });
        }

        if let Some(existing) = parents.get(&edge.child) {
            if *existing == edge.parent {
                return Err(Error::DuplicateChild {
                    parent: edge.parent.clone(),
                    child: edge.child.clone(),
                });
            }
            return Err(Error::DuplicateParent {
                child: edge.child.clone(),
                existing: existing.clone(),
                new: edge.parent.clone(),
            });
        }

        parents.insert(edge.child.clone(), edge.parent.clone());
        children
            .entry(edge.parent.clone())
            .or_default()
            .push(edge.child.clone());
    }

    // Every parent must be loaded once all rows are read
    for edge in &edges {
        if !index.contains_key(&edge.parent) {
            return Err(Error::OrphanedParent {
                child: edge.child.clone(),
                parent: edge.parent.clone(),
            });
        }
    }

    if let Some(cycle) = find_cycle(&edges, &parents) {
        return Err(Error::ParentCycle(cycle));
    }

    for edge in &edges {
        if let (Some(NodeRef::Issue(child)), Some(NodeRef::Meta(meta))) =
            (index.get(&edge.child), index.get(&edge.parent))
        {
            meta_issues[*meta].sub_issues.push(*child);
        }
    }

    Ok(IssueGraph {
        issues,
        meta_issues,
        parents,
        children,
        index,
    })
}

/// Map every `project_issue_id` to its issue, rejecting duplicates
fn index_ids(issues: &[Issue], meta_issues: &[MetaIssue]) -> Result<HashMap<String, NodeRef>> {
    let mut entries: Vec<(&Issue, NodeRef)> = issues
        .iter()
        .enumerate()
        .map(|(i, issue)| (issue, NodeRef::Issue(i)))
        .chain(
            meta_issues
                .iter()
                .enumerate()
                .map(|(i, meta)| (&meta.issue, NodeRef::Meta(i))),
        )
        .collect();
    // Report duplicates in row order
    entries.sort_by_key(|(issue, _)| issue.row);

    let mut index: HashMap<String, NodeRef> = HashMap::new();
    let mut titles: HashMap<&str, &str> = HashMap::new();

    for (issue, node) in entries {
        let Some(id) = issue.project_issue_id.as_deref() else {
            continue;
        };
        if let Some(existing) = titles.get(id) {
            return Err(Error::DuplicateIssueId {
                id: id.to_string(),
                existing: existing.to_string(),
                new: issue.title.clone(),
            });
        }
        titles.insert(id, &issue.title);
        index.insert(id.to_string(), node);
    }

    Ok(index)
}

/// Follow parent links from each child, returning the first loop found
fn find_cycle(edges: &[Edge], parents: &HashMap<String, String>) -> Option<Vec<String>> {
    let mut cleared: HashSet<&str> = HashSet::new();

    for edge in edges {
        let mut path: Vec<&str> = vec![edge.child.as_str()];
        let mut on_path: HashSet<&str> = HashSet::from([edge.child.as_str()]);
        let mut current = edge.child.as_str();

        while let Some(parent) = parents.get(current) {
            let parent = parent.as_str();
            if cleared.contains(parent) {
                break;
            }
            if on_path.contains(parent) {
                let start = path.iter().position(|&id| id == parent).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(parent.to_string());
                return Some(cycle);
            }
            path.push(parent);
            on_path.insert(parent);
            current = parent;
        }

        cleared.extend(path);
    }

    None
}
