//! issuer GitHub - rate limited GitHub client and Projects (v2) uploader
//!
//! This crate talks to the GitHub REST and GraphQL APIs: creating issues,
//! resolving project fields, adding items and linking sub-issues. All calls
//! go through one [`GitHubClient`] that paces requests and retries throttled
//! ones.

mod client;
pub mod clock;
mod error;
mod graphql;
pub mod http;
mod issues;
mod items;
mod project;
mod rate_limit;
mod upload;

pub use client::{parse_repo, GitHubClient, RateLimitStatus};
pub use error::{Error, Result};
pub use graphql::{build_update_mutation, FieldUpdate, FieldValue};
pub use issues::{RemoteIssue, Repository};
pub use items::{
    close_all_issues, copy_items, purge_items, ItemContent, ItemFieldValue, ItemReport,
    ProjectItem,
};
pub use project::{FieldMap, Project, ProjectRegistry};
pub use rate_limit::RateLimiter;
pub use upload::{UploadFailure, UploadOptions, UploadReport, Uploader};
