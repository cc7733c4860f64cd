//! Transport trait and the Gemini HTTP implementation
//!
//! A transport performs exactly one request/response exchange. It never
//! retries and never interprets the body beyond returning it; classification
//! and retry live in [`RemoteCaller`](super::RemoteCaller).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{GenerateContentRequest, LlmError};
use crate::config::LlmConfig;

/// Status code and raw body of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One-shot request sender
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the payload once and return whatever came back
    async fn send(&self, payload: &GenerateContentRequest) -> Result<RawResponse, LlmError>;
}

/// Gemini `generateContent` over HTTPS
pub struct GeminiTransport {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl GeminiTransport {
    /// Create a transport from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = config.get_api_key()?;
        Self::new(config, api_key)
    }

    /// Create a transport with an explicit API key
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    /// Full endpoint URL without the key parameter
    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn send(&self, payload: &GenerateContentRequest) -> Result<RawResponse, LlmError> {
        let url = self.endpoint();
        debug!(%url, "send: called");

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    debug!("send: request timed out");
                    LlmError::Timeout(self.timeout)
                } else {
                    // The request URL carries the API key
                    let e = e.without_url();
                    debug!(error = %e, "send: network error");
                    LlmError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| LlmError::Network(e.without_url()))?;
        debug!(status, body_len = body.len(), "send: response received");
        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What the mock does for one call
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Respond(RawResponse),
        Timeout,
        /// Never completes; only the caller's timeout or cancellation ends it
        Hang,
    }

    impl MockReply {
        pub fn text(text: &str) -> Self {
            let body = serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
            });
            MockReply::Respond(RawResponse::new(200, body.to_string()))
        }

        pub fn empty() -> Self {
            MockReply::Respond(RawResponse::new(200, r#"{"candidates":[]}"#))
        }

        pub fn unavailable() -> Self {
            MockReply::Respond(RawResponse::new(
                503,
                r#"{"error":{"code":503,"message":"The model is overloaded. Please try again later.","status":"UNAVAILABLE"}}"#,
            ))
        }

        pub fn status(status: u16, body: &str) -> Self {
            MockReply::Respond(RawResponse::new(status, body))
        }
    }

    /// Scripted transport for unit tests
    pub struct MockTransport {
        replies: Mutex<VecDeque<MockReply>>,
        payloads: Mutex<Vec<GenerateContentRequest>>,
        call_count: AtomicUsize,
    }

    impl MockTransport {
        pub fn new(replies: Vec<MockReply>) -> Self {
            debug!(reply_count = %replies.len(), "MockTransport::new: called");
            Self {
                replies: Mutex::new(replies.into()),
                payloads: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Payloads in the order they were sent
        pub fn payloads(&self) -> Vec<GenerateContentRequest> {
            self.payloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, payload: &GenerateContentRequest) -> Result<RawResponse, LlmError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.payloads.lock().unwrap().push(payload.clone());

            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(MockReply::Respond(raw)) => Ok(raw),
                Some(MockReply::Timeout) => Err(LlmError::Timeout(Duration::from_secs(60))),
                Some(MockReply::Hang) => std::future::pending().await,
                None => Ok(RawResponse::new(500, "MockTransport: no more replies")),
            }
        }
    }
}
