//! Row parsing front-ends
//!
//! Two CSV conventions describe issue relationships:
//!
//! - meta schema: `meta_issue_id` / `sub_issue_id` columns. A row with only a
//!   `meta_issue_id` is a meta issue, a row with both is a sub issue of that
//!   meta issue, a row with neither is a plain issue.
//! - parent schema: `project_issue_id` / `project_parent_issue_id` columns
//!   relating any issue to any other issue of the batch.
//!
//! Both produce a list of issues, meta issues and parent edges that are
//! checked by the same validator.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::rows::{field, optional_field, Row};
use super::validate::{build_graph, Edge};
use super::IssueGraph;
use crate::issue::{Account, AccountType, Issue, MetaIssue};
use crate::{Error, Result};

/// Column names relating issues in the parent schema
const PARENT_SCHEMA_COLUMNS: [&str; 2] = ["project_issue_id", "project_parent_issue_id"];

/// CSV convention used to relate issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schema {
    /// Pick [`Schema::Parent`] when parent columns are present, else [`Schema::Meta`]
    #[default]
    Auto,
    /// `meta_issue_id` / `sub_issue_id` columns
    ///
    /// A sub issue's id is `{meta_issue_id}-{sub_issue_id}`, so it must not
    /// equal the id of another meta issue in the same file.
    Meta,
    /// `project_issue_id` / `project_parent_issue_id` columns
    Parent,
}

impl Schema {
    /// Resolve [`Schema::Auto`] by looking at the columns present in `rows`
    pub fn detect(self, rows: &[Row]) -> Schema {
        match self {
            Schema::Auto => {
                let has_parent_columns = rows.iter().any(|row| {
                    PARENT_SCHEMA_COLUMNS
                        .iter()
                        .any(|column| row.contains_key(*column))
                });
                if has_parent_columns {
                    Schema::Parent
                } else {
                    Schema::Meta
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Schema::Auto => "auto",
            Schema::Meta => "meta",
            Schema::Parent => "parent",
        };
        f.write_str(s)
    }
}

impl FromStr for Schema {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Schema::Auto),
            "meta" => Ok(Schema::Meta),
            "parent" => Ok(Schema::Parent),
            other => Err(format!("unknown schema {:?}", other)),
        }
    }
}

/// Load and validate an issue graph from CSV `rows`
///
/// Reads at most `max_rows` rows, or all rows when `max_rows` is zero.
/// Any validation error aborts the load, so a bad batch never reaches the
/// network.
pub fn load(rows: &[Row], max_rows: usize, schema: Schema) -> Result<IssueGraph> {
    let rows = if max_rows > 0 && rows.len() > max_rows {
        &rows[..max_rows]
    } else {
        rows
    };

    let schema = schema.detect(rows);
    debug!(rows = rows.len(), %schema, "Loading issues");

    let (issues, meta_issues, edges) = match schema {
        Schema::Parent => parse_parent_schema(rows)?,
        Schema::Meta | Schema::Auto => parse_meta_schema(rows)?,
    };

    build_graph(issues, meta_issues, edges)
}

fn parse_meta_schema(rows: &[Row]) -> Result<(Vec<Issue>, Vec<MetaIssue>, Vec<Edge>)> {
    let mut issues = Vec::new();
    let mut meta_issues: Vec<MetaIssue> = Vec::new();
    let mut meta_index: HashMap<String, usize> = HashMap::new();
    let mut edges = Vec::new();

    for (i, data) in rows.iter().enumerate() {
        let row = i + 1;
        let mut issue = parse_issue(data, row)?;

        let meta_issue_id = optional_field(data, "meta_issue_id");
        let sub_issue_id = optional_field(data, "sub_issue_id");

        match (meta_issue_id, sub_issue_id) {
            (Some(meta_id), None) => {
                if let Some(&existing) = meta_index.get(&meta_id) {
                    return Err(Error::DuplicateMetaIssue {
                        id: meta_id,
                        existing: meta_issues[existing].issue.title.clone(),
                        new: issue.title,
                    });
                }
                issue.project_issue_id = Some(meta_id.clone());
                meta_index.insert(meta_id, meta_issues.len());
                meta_issues.push(MetaIssue::new(issue));
            }
            (Some(meta_id), Some(sub_id)) => {
                let id = format!("{}-{}", meta_id, sub_id);
                issue.project_issue_id = Some(id.clone());
                issue.project_parent_issue_id = Some(meta_id.clone());
                edges.push(Edge {
                    child: id,
                    parent: meta_id,
                });
                issues.push(issue);
            }
            (None, Some(sub_id)) => {
                return Err(Error::InvalidField {
                    row,
                    field: "sub_issue_id",
                    value: sub_id,
                    reason: "a sub issue requires a meta_issue_id".to_string(),
                });
            }
            (None, None) => issues.push(issue),
        }
    }

    // Sub ids share the IssueID namespace with meta ids
    for issue in &issues {
        let Some(id) = issue.project_issue_id.as_deref() else {
            continue;
        };
        if let Some(&meta) = meta_index.get(id) {
            return Err(Error::InvalidField {
                row: issue.row,
                field: "sub_issue_id",
                value: id.to_string(),
                reason: format!(
                    "sub issue id is also the id of meta issue {:?}",
                    meta_issues[meta].issue.title
                ),
            });
        }
    }

    Ok((issues, meta_issues, edges))
}

fn parse_parent_schema(rows: &[Row]) -> Result<(Vec<Issue>, Vec<MetaIssue>, Vec<Edge>)> {
    let mut issues = Vec::new();
    let mut edges = Vec::new();

    for (i, data) in rows.iter().enumerate() {
        let row = i + 1;
        let mut issue = parse_issue(data, row)?;

        issue.project_issue_id = optional_field(data, "project_issue_id");
        issue.project_parent_issue_id = optional_field(data, "project_parent_issue_id");

        let sets_ids = issue.project_issue_id.is_some() || issue.project_parent_issue_id.is_some();
        if sets_ids && !issue.has_project() {
            return Err(Error::ProjectRequired {
                row,
                title: issue.title,
            });
        }

        if let Some(parent) = &issue.project_parent_issue_id {
            let child = issue.project_issue_id.clone().ok_or_else(|| Error::InvalidField {
                row,
                field: "project_parent_issue_id",
                value: parent.clone(),
                reason: "an issue with a parent requires a project_issue_id".to_string(),
            })?;
            edges.push(Edge {
                child,
                parent: parent.clone(),
            });
        }

        issues.push(issue);
    }

    Ok((issues, Vec::new(), edges))
}

/// Build an issue from the columns shared by both schemas
fn parse_issue(data: &Row, row: usize) -> Result<Issue> {
    let title = required(data, row, "title")?;
    let body = required(data, row, "body")?;
    let account_type = required(data, row, "account_type")?;
    let account_name = required(data, row, "account_name")?;
    let repo_name = required(data, row, "repo_name")?;

    let kind: AccountType = account_type.parse().map_err(|reason| Error::InvalidField {
        row,
        field: "account_type",
        value: account_type.clone(),
        reason,
    })?;

    let mut issue = Issue::new(title, body, Account::new(kind, account_name), repo_name);
    issue.row = row;
    issue.project_number = parse_number(data, row, "project_number")?;
    issue.project_estimate = parse_number(data, row, "project_estimate")?;
    issue.status = optional_field(data, "status");
    issue.iteration = optional_field(data, "iteration");
    issue.labels = parse_labels(field(data, "labels"));

    let sets_fields =
        issue.project_estimate != 0.0 || issue.status.is_some() || issue.iteration.is_some();
    if sets_fields && !issue.has_project() {
        return Err(Error::ProjectRequired {
            row,
            title: issue.title,
        });
    }

    Ok(issue)
}

fn required(data: &Row, row: usize, column: &'static str) -> Result<String> {
    optional_field(data, column).ok_or(Error::MissingField { row, field: column })
}

/// Parse a numeric column; absent and blank values are zero
fn parse_number<T>(data: &Row, row: usize, column: &'static str) -> Result<T>
where
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    let value = field(data, column);
    if value.is_empty() {
        return Ok(T::default());
    }
    value.parse().map_err(|e: T::Err| Error::InvalidField {
        row,
        field: column,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Split a comma separated label list, dropping blank entries
fn parse_labels(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::rows_from_reader;

    const HEADER: &str = "title,body,account_type,account_name,repo_name";

    fn rows(csv: &str) -> Vec<Row> {
        rows_from_reader(csv.as_bytes()).unwrap()
    }

    fn meta_rows() -> Vec<Row> {
        rows("meta_issue_id,sub_issue_id,title,body,account_type,account_name,repo_name,project_number\n\
              gizmo,,Gizmo,Meta body,organization,acme,r,1\n\
              gizmo,a,Design,Design body,organization,acme,r,1\n\
              gizmo,b,Build,Build body,organization,acme,r,1\n")
    }

    #[test]
    fn test_plain_issue_without_project() {
        let rows = rows(&format!("{}\nT,B,organization,acme,r\n", HEADER));
        let graph = load(&rows, 0, Schema::Auto).unwrap();

        assert_eq!(graph.issues.len(), 1);
        assert!(graph.meta_issues.is_empty());
        let issue = &graph.issues[0];
        assert_eq!(issue.title, "T");
        assert_eq!(issue.body, "B");
        assert_eq!(issue.account, Account::organization("acme"));
        assert_eq!(issue.repo_name, "r");
        assert_eq!(issue.project_number, 0);
        assert_eq!(issue.project_estimate, 0.0);
        assert_eq!(issue.row, 1);
    }

    #[test]
    fn test_scalars_are_trimmed_and_coerced() {
        let rows = rows(
            "title,body,account_type,account_name,repo_name,project_number,project_estimate,labels,status\n\
             \" T \", B , user , bob , r , 3 , 2.5 ,\"bug, ,  ui,\", Todo \n",
        );
        let graph = load(&rows, 0, Schema::Meta).unwrap();
        let issue = &graph.issues[0];
        assert_eq!(issue.title, "T");
        assert_eq!(issue.account, Account::user("bob"));
        assert_eq!(issue.project_number, 3);
        assert_eq!(issue.project_estimate, 2.5);
        assert_eq!(issue.labels, vec!["bug", "ui"]);
        assert_eq!(issue.status.as_deref(), Some("Todo"));
        assert_eq!(issue.iteration, None);
    }

    #[test]
    fn test_meta_issue_owns_sub_issues_in_row_order() {
        let graph = load(&meta_rows(), 0, Schema::Auto).unwrap();

        assert_eq!(graph.issues.len(), 2);
        assert_eq!(graph.meta_issues.len(), 1);

        let meta = &graph.meta_issues[0];
        assert_eq!(meta.id(), "gizmo");
        assert_eq!(meta.issue.title, "Gizmo");
        let owned: Vec<&str> = meta
            .sub_issues
            .iter()
            .map(|&i| graph.issues[i].project_issue_id.as_deref().unwrap())
            .collect();
        assert_eq!(owned, vec!["gizmo-a", "gizmo-b"]);
        assert_eq!(
            graph.children["gizmo"],
            vec!["gizmo-a".to_string(), "gizmo-b".to_string()]
        );
        assert_eq!(graph.parents["gizmo-b"], "gizmo");
    }

    #[test]
    fn test_sub_issue_before_its_meta_issue() {
        let rows = rows(
            "meta_issue_id,sub_issue_id,title,body,account_type,account_name,repo_name\n\
             m,1,Sub,S,organization,acme,r\n\
             m,,Meta,M,organization,acme,r\n",
        );
        let graph = load(&rows, 0, Schema::Meta).unwrap();
        assert_eq!(graph.meta_issues[0].sub_issues, vec![0]);
    }

    #[test]
    fn test_duplicate_meta_issue_names_both_titles() {
        let rows = rows(
            "meta_issue_id,sub_issue_id,title,body,account_type,account_name,repo_name\n\
             m,,First,B,organization,acme,r\n\
             m,,Second,B,organization,acme,r\n",
        );
        let err = load(&rows, 0, Schema::Meta).unwrap_err();
        match err {
            Error::DuplicateMetaIssue { id, existing, new } => {
                assert_eq!(id, "m");
                assert_eq!(existing, "First");
                assert_eq!(new, "Second");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sub_issue_of_unknown_meta_is_orphaned() {
        let rows = rows(
            "meta_issue_id,sub_issue_id,title,body,account_type,account_name,repo_name\n\
             nope,a,Sub,B,organization,acme,r\n",
        );
        let err = load(&rows, 0, Schema::Meta).unwrap_err();
        assert!(matches!(err, Error::OrphanedParent { ref parent, .. } if parent == "nope"));
    }

    #[test]
    fn test_sub_issue_id_without_meta_id() {
        let rows = rows(
            "meta_issue_id,sub_issue_id,title,body,account_type,account_name,repo_name\n\
             ,a,Sub,B,organization,acme,r\n",
        );
        let err = load(&rows, 0, Schema::Meta).unwrap_err();
        assert!(matches!(err, Error::InvalidField { field: "sub_issue_id", .. }));
    }

    #[test]
    fn test_sub_issue_id_clashing_with_meta_id() {
        let rows = rows(
            "meta_issue_id,sub_issue_id,title,body,account_type,account_name,repo_name\n\
             x-a,,XA,B,organization,acme,r\n\
             x,,X,B,organization,acme,r\n\
             x,a,Sub,B,organization,acme,r\n",
        );
        let err = load(&rows, 0, Schema::Meta).unwrap_err();
        match err {
            Error::InvalidField {
                row,
                field,
                value,
                reason,
            } => {
                assert_eq!(row, 3);
                assert_eq!(field, "sub_issue_id");
                assert_eq!(value, "x-a");
                assert!(reason.contains("\"XA\""));
            }
            other => panic!("expected InvalidField, got {:?}", other),
        }
    }

    #[test]
    fn test_parent_schema_detected_and_linked() {
        let rows = rows(
            "project_issue_id,project_parent_issue_id,title,body,account_type,account_name,repo_name,project_number\n\
             epic,,Epic,E,organization,acme,r,1\n\
             t1,epic,Task 1,T,organization,acme,r,1\n\
             t2,t1,Task 2,T,organization,acme,r,1\n",
        );
        assert_eq!(Schema::Auto.detect(&rows), Schema::Parent);

        let graph = load(&rows, 0, Schema::Auto).unwrap();
        assert_eq!(graph.issues.len(), 3);
        assert!(graph.meta_issues.is_empty());
        assert_eq!(graph.parents["t1"], "epic");
        assert_eq!(graph.parents["t2"], "t1");
        assert_eq!(graph.children["epic"], vec!["t1".to_string()]);
    }

    #[test]
    fn test_duplicate_project_issue_id_names_both() {
        let rows = rows(
            "project_issue_id,title,body,account_type,account_name,repo_name,project_number\n\
             x,One,B,organization,acme,r,1\n\
             x,Two,B,organization,acme,r,1\n",
        );
        let err = load(&rows, 0, Schema::Parent).unwrap_err();
        match err {
            Error::DuplicateIssueId { id, existing, new } => {
                assert_eq!(id, "x");
                assert_eq!(existing, "One");
                assert_eq!(new, "Two");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_parent_rejected() {
        let rows = rows(
            "project_issue_id,project_parent_issue_id,title,body,account_type,account_name,repo_name,project_number\n\
             x,x,Loop,B,organization,acme,r,1\n",
        );
        let err = load(&rows, 0, Schema::Parent).unwrap_err();
        assert!(matches!(err, Error::SelfParent { ref id, .. } if id == "x"));
    }

    #[test]
    fn test_orphaned_parent_rejected() {
        let rows = rows(
            "project_issue_id,project_parent_issue_id,title,body,account_type,account_name,repo_name,project_number\n\
             x,ghost,Child,B,organization,acme,r,1\n",
        );
        let err = load(&rows, 0, Schema::Parent).unwrap_err();
        match err {
            Error::OrphanedParent { child, parent } => {
                assert_eq!(child, "x");
                assert_eq!(parent, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parent_cycle_rejected() {
        let rows = rows(
            "project_issue_id,project_parent_issue_id,title,body,account_type,account_name,repo_name,project_number\n\
             a,b,A,B,organization,acme,r,1\n\
             b,a,B,B,organization,acme,r,1\n",
        );
        let err = load(&rows, 0, Schema::Parent).unwrap_err();
        assert!(matches!(err, Error::ParentCycle(_)));
    }

    #[test]
    fn test_parent_without_own_id() {
        let rows = rows(
            "project_issue_id,project_parent_issue_id,title,body,account_type,account_name,repo_name,project_number\n\
             a,,A,B,organization,acme,r,1\n\
             ,a,Child,B,organization,acme,r,1\n",
        );
        let err = load(&rows, 0, Schema::Parent).unwrap_err();
        assert!(matches!(err, Error::InvalidField { row: 2, .. }));
    }

    #[test]
    fn test_project_fields_require_project_number() {
        let rows = rows(&format!(
            "{},project_estimate\nT,B,organization,acme,r,3\n",
            HEADER
        ));
        let err = load(&rows, 0, Schema::Meta).unwrap_err();
        assert!(matches!(err, Error::ProjectRequired { row: 1, .. }));

        let rows = self::rows(
            "project_issue_id,title,body,account_type,account_name,repo_name\n\
             x,T,B,organization,acme,r\n",
        );
        let err = load(&rows, 0, Schema::Parent).unwrap_err();
        assert!(matches!(err, Error::ProjectRequired { .. }));
    }

    #[test]
    fn test_missing_required_field() {
        let rows = rows(&format!("{}\nT,,organization,acme,r\n", HEADER));
        let err = load(&rows, 0, Schema::Meta).unwrap_err();
        assert!(matches!(err, Error::MissingField { row: 1, field: "body" }));
    }

    #[test]
    fn test_invalid_values() {
        let rows = rows(&format!("{}\nT,B,team,acme,r\n", HEADER));
        let err = load(&rows, 0, Schema::Meta).unwrap_err();
        assert!(matches!(err, Error::InvalidField { field: "account_type", .. }));

        let rows = self::rows(&format!("{},project_number\nT,B,user,acme,r,one\n", HEADER));
        let err = load(&rows, 0, Schema::Meta).unwrap_err();
        assert!(matches!(err, Error::InvalidField { field: "project_number", .. }));
    }

    #[test]
    fn test_max_rows_stops_early() {
        let rows = rows(&format!(
            "{}\nA,B,organization,acme,r\nB,B,organization,acme,r\nC,B,organization,acme,r\n",
            HEADER
        ));
        let graph = load(&rows, 2, Schema::Meta).unwrap();
        let titles: Vec<&str> = graph.issues.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);

        let graph = load(&rows, 0, Schema::Meta).unwrap();
        assert_eq!(graph.issues.len(), 3);
    }

    #[test]
    fn test_schema_parse() {
        assert_eq!("meta".parse::<Schema>(), Ok(Schema::Meta));
        assert_eq!("parent".parse::<Schema>(), Ok(Schema::Parent));
        assert!("flat".parse::<Schema>().is_err());
        assert_eq!(Schema::Auto.detect(&meta_rows()), Schema::Meta);
        assert_eq!(Schema::Meta.detect(&[]), Schema::Meta);
    }
}
