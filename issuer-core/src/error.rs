//! Error types for issuer

use thiserror::Error;

/// Result type alias for issuer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for issuer operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required column is empty or missing in a CSV row
    #[error("Row {row}: missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },

    /// A column holds a value that cannot be used
    #[error("Row {row}: invalid value {value:?} for field '{field}': {reason}")]
    InvalidField {
        row: usize,
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Project field values were given without a project number
    #[error("Row {row}: issue {title:?} sets project fields but has no project_number")]
    ProjectRequired { row: usize, title: String },

    /// Two meta issue rows share the same meta_issue_id
    #[error("Duplicated meta issue identifier: {id}: existing: {existing:?} new: {new:?}")]
    DuplicateMetaIssue {
        id: String,
        existing: String,
        new: String,
    },

    /// Two issues share the same project_issue_id
    #[error("Duplicated project issue identifier: {id}: existing: {existing:?} new: {new:?}")]
    DuplicateIssueId {
        id: String,
        existing: String,
        new: String,
    },

    /// An issue names itself as its parent
    #[error("Issue {title:?} with id {id} cannot be its own parent")]
    SelfParent { id: String, title: String },

    /// A child issue is linked to more than one parent
    #[error("Issue {child} already has parent {existing}, cannot also link to {new}")]
    DuplicateParent {
        child: String,
        existing: String,
        new: String,
    },

    /// A child issue is registered twice under the same parent
    #[error("Issue {child} is registered twice under parent {parent}")]
    DuplicateChild { parent: String, child: String },

    /// A parent reference does not resolve to any loaded issue
    #[error("Orphaned parent: issue {child} references unknown parent id {parent}")]
    OrphanedParent { child: String, parent: String },

    /// Following parent links leads back to the starting issue
    #[error("Parent cycle detected: {}", .0.join(" -> "))]
    ParentCycle(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_meta_names_both_titles() {
        let err = Error::DuplicateMetaIssue {
            id: "gizmo".to_string(),
            existing: "First".to_string(),
            new: "Second".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("gizmo"));
        assert!(msg.contains("\"First\""));
        assert!(msg.contains("\"Second\""));
    }

    #[test]
    fn test_cycle_message() {
        let err = Error::ParentCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Parent cycle detected: a -> b -> a");
    }
}
