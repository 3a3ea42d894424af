//! Configuration management for issuer
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (ISSUER_*)
//! 3. Config file (~/.config/issuer/config.toml)
//! 4. Default values

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

/// GitHub API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API root; GraphQL calls go to `{base_url}/graphql`
    pub base_url: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Timeout for a single HTTP request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            user_agent: "issuer".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Client side pacing and throttling retry settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum number of requests in any `time_frame` window
    pub max_requests: usize,

    #[serde(with = "humantime_serde")]
    pub time_frame: Duration,

    /// Minimum wait after a 403/429 response
    #[serde(with = "humantime_serde")]
    pub throttle_floor: Duration,

    /// Retries of a throttled call before giving up
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            time_frame: Duration::from_secs(60),
            throttle_floor: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

/// What the uploader does when creating one issue fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure and continue with the next issue
    #[default]
    Skip,
    /// Stop the whole batch
    Abort,
    /// Wait `failure_delay`, try the failed issue once more, then skip
    RetryOnce,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailurePolicy::Skip => "skip",
            FailurePolicy::Abort => "abort",
            FailurePolicy::RetryOnce => "retry-once",
        };
        f.write_str(s)
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "skip" => Ok(FailurePolicy::Skip),
            "abort" => Ok(FailurePolicy::Abort),
            "retry-once" => Ok(FailurePolicy::RetryOnce),
            other => Err(format!(
                "unknown failure policy {:?}, expected skip, abort or retry-once",
                other
            )),
        }
    }
}

/// Upload behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    pub on_failure: FailurePolicy,

    /// Wait before retrying a failed issue with [`FailurePolicy::RetryOnce`]
    #[serde(with = "humantime_serde")]
    pub failure_delay: Duration,

    /// Skip rows whose title already exists in the target repository
    pub skip_existing: bool,

    /// Link children to parents with GitHub sub-issues after creation
    pub link_sub_issues: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::Skip,
            failure_delay: Duration::from_secs(60),
            skip_existing: false,
            link_sub_issues: true,
        }
    }
}

/// Names of the project custom fields filled from CSV columns
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldNames {
    /// Number field for `project_estimate`
    pub estimate: String,
    /// Text field for `project_issue_id`
    pub issue_id: String,
    /// Single-select field for `status`
    pub status: String,
    /// Iteration field for `iteration`
    pub iteration: String,
    /// Date field copied between projects
    pub target_date: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            estimate: "Estimate".to_string(),
            issue_id: "IssueID".to_string(),
            status: "Status".to_string(),
            iteration: "Iteration".to_string(),
            target_date: "Target date".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory receiving one log file per run
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    pub upload: UploadConfig,
    pub fields: FieldNames,
    pub logging: LoggingConfig,
}

/// Values given on the command line, applied last
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub on_failure: Option<FailurePolicy>,
    pub skip_existing: Option<bool>,
    pub link_sub_issues: Option<bool>,
    pub max_requests: Option<usize>,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/issuer/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("issuer").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - ISSUER_API_URL: REST API root
    /// - ISSUER_MAX_REQUESTS: requests allowed per rate limit window
    /// - ISSUER_ON_FAILURE: skip, abort or retry-once
    /// - ISSUER_LOG_DIR: directory for per-run log files
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("ISSUER_API_URL") {
            self.api.base_url = url;
        }

        if let Ok(value) = std::env::var("ISSUER_MAX_REQUESTS") {
            match value.trim().parse() {
                Ok(max) => self.rate_limit.max_requests = max,
                Err(_) => warn!(value = %value, "Ignoring invalid ISSUER_MAX_REQUESTS"),
            }
        }

        if let Ok(value) = std::env::var("ISSUER_ON_FAILURE") {
            match value.parse() {
                Ok(policy) => self.upload.on_failure = policy,
                Err(e) => warn!(error = %e, "Ignoring invalid ISSUER_ON_FAILURE"),
            }
        }

        if let Ok(dir) = std::env::var("ISSUER_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(policy) = overrides.on_failure {
            self.upload.on_failure = policy;
        }
        if let Some(skip) = overrides.skip_existing {
            self.upload.skip_existing = skip;
        }
        if let Some(link) = overrides.link_sub_issues {
            self.upload.link_sub_issues = link;
        }
        if let Some(max) = overrides.max_requests {
            self.rate_limit.max_requests = max;
        }
        if let Some(dir) = overrides.log_dir {
            self.logging.log_dir = dir;
        }
        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults. `path` replaces the
    /// default config file location when given.
    pub fn load_with_overrides(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };
        let config = config.with_env_overrides().with_cli_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make every API call fail
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url).map_err(|e| {
            Error::Config(format!("Invalid API base URL {:?}: {}", self.api.base_url, e))
        })?;

        if self.rate_limit.max_requests == 0 {
            return Err(Error::Config(
                "rate_limit.max_requests must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
