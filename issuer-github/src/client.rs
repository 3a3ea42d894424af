//! Rate limited GitHub API client
//!
//! Every call goes through [`GitHubClient::send`]: check the shutdown flag,
//! wait on the [`RateLimiter`], send, then classify the response. Throttled
//! calls (HTTP 403/429) sleep until the advertised reset and are retried a
//! bounded number of times.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use issuer_core::Config;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::rate_limit::RateLimiter;
use crate::{Error, Result};

/// Rate limit headers GitHub attaches to every response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub used: Option<u64>,
    /// Window reset, seconds since the Unix epoch
    pub reset: Option<u64>,
    pub resource: Option<String>,
}

impl RateLimitStatus {
    pub fn from_response(response: &HttpResponse) -> Self {
        let number = |name: &str| response.header(name).and_then(|v| v.trim().parse().ok());
        Self {
            limit: number("x-ratelimit-limit"),
            remaining: number("x-ratelimit-remaining"),
            used: number("x-ratelimit-used"),
            reset: number("x-ratelimit-reset"),
            resource: response.header("x-ratelimit-resource").map(str::to_string),
        }
    }
}

/// Format an epoch timestamp for logs
fn format_reset(reset: u64) -> String {
    i64::try_from(reset)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| reset.to_string())
}

/// GitHub REST and GraphQL client
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    token: String,
    base_url: String,
    user_agent: String,
    throttle_floor: Duration,
    max_retries: u32,
    shutdown: Arc<AtomicBool>,
}

impl GitHubClient {
    /// Create a client talking to GitHub over reqwest
    pub fn new(token: impl Into<String>, config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(config.api.timeout)?;
        let client = Self::with_transport(
            token,
            config,
            Arc::new(transport),
            Arc::new(SystemClock),
        );

        info!(
            base_url = %client.base_url,
            max_requests = config.rate_limit.max_requests,
            time_frame = ?config.rate_limit.time_frame,
            "Created GitHub client"
        );
        Ok(client)
    }

    /// Create a client with an explicit transport and clock
    pub fn with_transport(
        token: impl Into<String>,
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.time_frame,
            clock.clone(),
        );
        Self {
            transport,
            clock,
            limiter,
            token: token.into(),
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            user_agent: config.api.user_agent.clone(),
            throttle_floor: config.rate_limit.throttle_floor,
            max_retries: config.rate_limit.max_retries,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a shutdown flag; once set, no new call is started
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Absolute URL for an API path; absolute URLs pass through
    pub fn api_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Perform one REST call and decode the JSON response
    ///
    /// An empty response body decodes as JSON `null`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = self.api_url(path);
        let body = match body {
            Some(value) => serde_json::to_vec(value)?,
            None => Vec::new(),
        };

        let response = self.send(method, &url, body).await?;
        if response.body.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        serde_json::from_slice(&response.body).map_err(|e| {
            Error::Parse(format!("Failed to parse response of {} {}: {}", method, url, e))
        })
    }

    /// Send with pacing and throttling retries
    pub(crate) async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Vec<u8>,
    ) -> Result<HttpResponse> {
        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", self.token)),
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ];
        if !body.is_empty() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        };

        let mut attempts: u32 = 0;
        loop {
            if self.is_shutdown_requested() {
                return Err(Error::Interrupted);
            }

            self.limiter.wait().await;
            attempts += 1;
            debug!(%method, url, attempt = attempts, "Sending request");
            let response = self.transport.send(request.clone()).await?;

            match response.status {
                403 | 429 => {
                    let reset = RateLimitStatus::from_response(&response)
                        .reset
                        .unwrap_or(0);
                    let delay = self.throttle_delay(reset);
                    warn!(
                        status = response.status,
                        %method,
                        url,
                        reset = %format_reset(reset),
                        delay_secs = delay.as_secs(),
                        "Throttled by GitHub, waiting"
                    );
                    self.clock.sleep(delay).await;

                    if attempts > self.max_retries {
                        return Err(Error::RateLimited {
                            attempts,
                            reset: format_reset(reset),
                        });
                    }
                }
                status @ 400..=599 => {
                    return Err(Error::Http {
                        status,
                        method: method.to_string(),
                        url: url.to_string(),
                        body: response.text(),
                    });
                }
                _ => {
                    let status = RateLimitStatus::from_response(&response);
                    debug!(
                        limit = ?status.limit,
                        remaining = ?status.remaining,
                        used = ?status.used,
                        reset = %status.reset.map(format_reset).unwrap_or_default(),
                        resource = ?status.resource,
                        "Rate limit status"
                    );
                    return Ok(response);
                }
            }
        }
    }

    /// Sleep on the client's clock
    pub(crate) async fn pause(&self, duration: Duration) {
        self.clock.sleep(duration).await;
    }

    /// Wait until `reset`, but never less than the throttle floor
    fn throttle_delay(&self, reset: u64) -> Duration {
        let until_reset = Duration::from_secs(reset).saturating_sub(self.clock.now());
        until_reset.max(self.throttle_floor)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("limiter", &self.limiter)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Parse a repository reference into owner and name
///
/// Supports formats:
/// - owner/repo
/// - https://github.com/owner/repo
/// - git@github.com:owner/repo.git
pub fn parse_repo(reference: &str) -> Result<(String, String)> {
    let reference = reference.trim();
    let invalid = || {
        Error::Parse(format!(
            "Invalid repository {:?}. Expected owner/repo",
            reference
        ))
    };

    let path = if reference.starts_with("https://") || reference.starts_with("http://") {
        let url = url::Url::parse(reference).map_err(|e| Error::Parse(e.to_string()))?;
        url.path().trim_matches('/').to_string()
    } else if let Some(rest) = reference.strip_prefix("git@") {
        rest.split_once(':').map(|(_, p)| p.to_string()).ok_or_else(invalid)?
    } else {
        reference.to_string()
    };

    let path = path.trim_end_matches(".git");
    let mut parts = path.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::ManualClock;
    use crate::http::MockTransport;

    pub(crate) const BASE: &str = "https://api.test";
    pub(crate) const GRAPHQL: &str = "https://api.test/graphql";
    /// Manual clock start, seconds since the epoch
    pub(crate) const NOW: u64 = 1_700_000_000;

    pub(crate) fn client(transport: &MockTransport, clock: &Arc<ManualClock>) -> GitHubClient {
        let mut config = Config::default();
        config.api.base_url = BASE.to_string();
        config.rate_limit.max_requests = 1_000;
        GitHubClient::with_transport("t0ken", &config, Arc::new(transport.clone()), clock.clone())
    }

    pub(crate) fn setup() -> (MockTransport, Arc<ManualClock>, GitHubClient) {
        let transport = MockTransport::new();
        let clock = Arc::new(ManualClock::at(NOW));
        let client = client(&transport, &clock);
        (transport, clock, client)
    }
}
