//! HTTP transport seam for rate endpoints.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

/// One upstream endpoint: a URL plus the headers to send with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Endpoint {
    /// Endpoint with the default JSON headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// URL without its query string, safe to log when the query carries a key.
    pub fn redacted_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not reach the host.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Transport's own timeout fired.
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Issues GET requests to rate endpoints.
///
/// Dropping the returned future must abort the request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, endpoint: &Endpoint) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, endpoint: &Endpoint) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(&endpoint.url);
        for (name, value) in &endpoint.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.to_vec(),
        })
    }
}

/// Scripted transport for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use dashmap::DashMap;
    use parking_lot::Mutex;

    use super::{Endpoint, HttpResponse, HttpTransport, TransportError};

    /// What the mock does for a URL.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        /// Respond with a status and body.
        Respond { status: u16, body: String },
        /// Respond after a delay.
        Delayed {
            delay: Duration,
            status: u16,
            body: String,
        },
        /// Never respond.
        Hang,
        /// Fail to connect.
        Unreachable,
    }

    impl MockReply {
        pub fn ok(body: impl Into<String>) -> Self {
            MockReply::Respond {
                status: 200,
                body: body.into(),
            }
        }

        pub fn status(status: u16) -> Self {
            MockReply::Respond {
                status,
                body: String::new(),
            }
        }
    }

    /// Transport answering from a URL → reply script and recording calls.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        replies: DashMap<String, MockReply>,
        calls: Mutex<Vec<String>>,
        headers_seen: Mutex<Vec<Vec<(String, String)>>>,
        abandoned: Arc<AtomicUsize>,
    }

    /// Counts requests dropped before they completed.
    struct AbandonGuard {
        counter: Arc<AtomicUsize>,
        completed: bool,
    }

    impl Drop for AbandonGuard {
        fn drop(&mut self) {
            if !self.completed {
                self.counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, url: impl Into<String>, reply: MockReply) -> Self {
            self.replies.insert(url.into(), reply);
            self
        }

        pub fn set(&self, url: impl Into<String>, reply: MockReply) {
            self.replies.insert(url.into(), reply);
        }

        /// URLs requested so far, in order.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        /// Headers sent with each request, in order.
        pub fn headers_seen(&self) -> Vec<Vec<(String, String)>> {
            self.headers_seen.lock().clone()
        }

        /// Requests whose futures were dropped before completing.
        pub fn abandoned(&self) -> usize {
            self.abandoned.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn get(&self, endpoint: &Endpoint) -> Result<HttpResponse, TransportError> {
            self.calls.lock().push(endpoint.url.clone());
            self.headers_seen.lock().push(endpoint.headers.clone());

            let reply = self
                .replies
                .get(&endpoint.url)
                .map(|r| r.value().clone())
                .unwrap_or(MockReply::Unreachable);

            let mut guard = AbandonGuard {
                counter: self.abandoned.clone(),
                completed: false,
            };

            let result = match reply {
                MockReply::Respond { status, body } => Ok(response(status, body)),
                MockReply::Delayed {
                    delay,
                    status,
                    body,
                } => {
                    tokio::time::sleep(delay).await;
                    Ok(response(status, body))
                }
                MockReply::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!("pending future resolved")
                }
                MockReply::Unreachable => Err(TransportError::Connect(format!(
                    "error sending request for url ({})",
                    endpoint.url
                ))),
            };

            guard.completed = true;
            result
        }
    }

    fn response(status: u16, body: String) -> HttpResponse {
        HttpResponse {
            status,
            reason: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            body: body.into_bytes(),
        }
    }
}
