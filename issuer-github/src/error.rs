//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the core crate (config, CSV, validation)
    #[error(transparent)]
    Core(#[from] issuer_core::Error),

    /// Non-success HTTP status other than throttling
    #[error("{method} {url} failed with HTTP {status}: {body}")]
    Http {
        status: u16,
        method: String,
        url: String,
        body: String,
    },

    /// GraphQL response carried an `errors` array
    #[error("GraphQL error: {}", messages.join("; "))]
    GraphQl {
        messages: Vec<String>,
        query: String,
        variables: serde_json::Value,
    },

    /// Still throttled after all retries
    #[error("GitHub rate limit exceeded after {attempts} attempts, resets at {reset}")]
    RateLimited { attempts: u32, reset: String },

    /// Network level failure
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// A project has no field with this name
    #[error("Project {project} has no field named {field:?}")]
    FieldNotFound { project: String, field: String },

    /// Expected data missing from a successful response
    #[error("Missing data in GitHub response: {0}")]
    MissingData(String),

    /// Shutdown was requested before the call started
    #[error("Interrupted")]
    Interrupted,

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Whether retrying the same operation later could succeed
    ///
    /// Configuration and validation errors, and interruption, never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } | Error::Transport(_) => true,
            Error::Http { status, .. } => *status >= 500,
            Error::GraphQl { .. } | Error::MissingData(_) => true,
            Error::Core(_)
            | Error::FieldNotFound { .. }
            | Error::Interrupted
            | Error::Parse(_) => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
