//! issuer core - issue model, configuration and CSV loading
//!
//! This crate has no network code. It turns CSV rows into a validated
//! [`IssueGraph`] and holds the configuration shared by the GitHub client
//! and the command line front-end.

mod config;
pub mod error;
pub mod graph;
pub mod issue;
mod secrets;

pub use config::{
    ApiConfig, Config, FailurePolicy, FieldNames, LoggingConfig, Overrides, RateLimitConfig,
    UploadConfig,
};
pub use error::{Error, Result};
pub use graph::{load, read_rows, IssueGraph, NodeRef, Row, Schema};
pub use issue::{checklist_body, Account, AccountType, Issue, IssueState, MetaIssue};
pub use secrets::{GitHubSecrets, Secrets};
