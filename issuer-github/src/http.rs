//! HTTP transport boundary
//!
//! [`GitHubClient`](crate::GitHubClient) never talks to reqwest directly: it
//! builds an [`HttpRequest`] and hands it to an [`HttpTransport`], so tests can
//! swap in an in-memory transport.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header name/value pairs; lookups ignore case
pub type HttpHeaders = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request and returns whatever status the server answered
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Production transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) use mock::MockTransport;

#[cfg(test)]
mod mock {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// In-memory transport replaying queued responses
    ///
    /// Responses for the same method and URL are returned in FIFO order.
    #[derive(Clone, Default)]
    pub(crate) struct MockTransport {
        inner: Arc<Mutex<Inner>>,
    }

    #[derive(Default)]
    struct Inner {
        routes: HashMap<(HttpMethod, String), VecDeque<HttpResponse>>,
        requests: Vec<HttpRequest>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn push(&self, method: HttpMethod, url: &str, response: HttpResponse) {
            self.inner
                .lock()
                .unwrap()
                .routes
                .entry((method, url.to_string()))
                .or_default()
                .push_back(response);
        }

        /// Queue a JSON response with status `status`
        pub(crate) fn push_json(
            &self,
            method: HttpMethod,
            url: &str,
            status: u16,
            body: serde_json::Value,
        ) {
            self.push(
                method,
                url,
                HttpResponse {
                    status,
                    headers: vec![],
                    body: body.to_string().into_bytes(),
                },
            );
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.inner.lock().unwrap().requests.clone()
        }

        /// Request bodies sent to `url`, parsed as JSON
        pub(crate) fn bodies(&self, url: &str) -> Vec<serde_json::Value> {
            self.requests()
                .into_iter()
                .filter(|r| r.url == url)
                .map(|r| serde_json::from_slice(&r.body).unwrap_or(serde_json::Value::Null))
                .collect()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            let mut inner = self.inner.lock().unwrap();
            let key = (request.method, request.url.clone());
            inner.requests.push(request);

            inner
                .routes
                .get_mut(&key)
                .and_then(|q| q.pop_front())
                .ok_or_else(|| {
                    Error::Transport(format!("no mock response for {} {}", key.0, key.1))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_ignores_case() {
        let resp = HttpResponse {
            status: 200,
            headers: vec![("X-RateLimit-Remaining".to_string(), "42".to_string())],
            body: b"ok".to_vec(),
        };
        assert_eq!(resp.header("x-ratelimit-remaining"), Some("42"));
        assert_eq!(resp.header("x-ratelimit-reset"), None);
        assert_eq!(resp.text(), "ok");
    }

    #[tokio::test]
    async fn test_mock_transport_fifo() {
        let transport = MockTransport::new();
        let url = "https://api.test/graphql";
        transport.push_json(HttpMethod::Post, url, 200, serde_json::json!({"n": 1}));
        transport.push_json(HttpMethod::Post, url, 200, serde_json::json!({"n": 2}));

        let req = HttpRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            headers: vec![],
            body: b"{}".to_vec(),
        };
        let first = transport.send(req.clone()).await.unwrap();
        let second = transport.send(req.clone()).await.unwrap();
        assert_eq!(first.text(), r#"{"n":1}"#);
        assert_eq!(second.text(), r#"{"n":2}"#);
        assert!(transport.send(req).await.is_err());
        assert_eq!(transport.requests().len(), 3);
    }
}
