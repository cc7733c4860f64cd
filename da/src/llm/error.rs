//! LLM error types

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a transport before a response can be classified
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API key not found. Set the {0} environment variable.")]
    MissingApiKey(String),
}

impl LlmError {
    /// Check if this error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Timeout(_) => true,
            LlmError::Json(_) => false,
            LlmError::MissingApiKey(_) => false,
        }
    }

    /// Convert into a structured failure reason
    pub fn to_reason(&self) -> FailureReason {
        match self {
            LlmError::Timeout(after) => FailureReason::timeout(*after),
            LlmError::Network(e) if e.is_timeout() => FailureReason::new(FailureKind::Timeout, None, e.to_string()),
            LlmError::Network(e) if self.is_retryable() => FailureReason::network(e.to_string()),
            other => FailureReason::new(FailureKind::Client, None, other.to_string()),
        }
    }
}

/// Machine-readable category of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 503 or an overloaded/unavailable error body
    Unavailable,
    /// Success status without any generated text
    EmptyResponse,
    /// The attempt hit the per-attempt timeout
    Timeout,
    /// Connection could not be established
    Network,
    /// Any other non-success status
    Api,
    /// Local failure building or decoding the exchange
    Client,
}

impl FailureKind {
    /// Whether an attempt failing this way should be retried after a backoff
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::Unavailable | FailureKind::EmptyResponse | FailureKind::Timeout | FailureKind::Network
        )
    }
}

/// Why an attempt failed: category, HTTP status when there was one, and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn unavailable(status: u16, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unavailable, Some(status), message)
    }

    pub fn empty_response() -> Self {
        Self::new(FailureKind::EmptyResponse, Some(200), "no response")
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(FailureKind::Timeout, None, format!("timed out after {:?}", after))
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, None, message)
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Api, Some(status), message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Terminal error of a [`RemoteCaller`](super::RemoteCaller) call
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("Failed after {attempts} attempts: {last}")]
    RetriesExhausted { last: FailureReason, attempts: u32 },

    #[error("Remote error: {0}")]
    Permanent(FailureReason),

    #[error("Call cancelled")]
    Cancelled,
}

impl CallError {
    /// True when retrying later is likely to succeed (overload, timeouts)
    pub fn is_transient(&self) -> bool {
        match self {
            CallError::RetriesExhausted { last, .. } => last.is_transient(),
            CallError::Permanent(_) => false,
            CallError::Cancelled => false,
        }
    }

    /// The underlying failure reason, if any
    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            CallError::RetriesExhausted { last, .. } => Some(last),
            CallError::Permanent(reason) => Some(reason),
            CallError::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_transient() {
        assert!(FailureKind::Unavailable.is_transient());
        assert!(FailureKind::EmptyResponse.is_transient());
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::Network.is_transient());

        assert!(!FailureKind::Api.is_transient());
        assert!(!FailureKind::Client.is_transient());
    }

    #[test]
    fn test_failure_reason_display() {
        let reason = FailureReason::unavailable(503, "The model is overloaded.");
        assert_eq!(reason.to_string(), "The model is overloaded. (HTTP 503)");

        let reason = FailureReason::network("connection refused");
        assert_eq!(reason.to_string(), "connection refused");
    }

    #[test]
    fn test_retries_exhausted_names_attempts() {
        let err = CallError::RetriesExhausted {
            last: FailureReason::unavailable(503, "overloaded"),
            attempts: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("overloaded"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_permanent_is_not_transient() {
        let err = CallError::Permanent(FailureReason::api(400, "API key not valid"));
        assert!(!err.is_transient());
        assert_eq!(err.reason().map(|r| r.status), Some(Some(400)));
        assert!(!CallError::Cancelled.is_transient());
        assert!(CallError::Cancelled.reason().is_none());
    }

    #[test]
    fn test_llm_error_to_reason() {
        let reason = LlmError::Timeout(Duration::from_secs(5)).to_reason();
        assert_eq!(reason.kind, FailureKind::Timeout);
        assert!(reason.is_transient());

        let reason = LlmError::MissingApiKey("GEMINI_API_KEY".to_string()).to_reason();
        assert_eq!(reason.kind, FailureKind::Client);
        assert!(reason.message.contains("GEMINI_API_KEY"));
    }
}
