//! Resilient remote call wrapper
//!
//! Sends a [`GenerateRequest`] through a [`Transport`], classifies every
//! response, and retries transient failures with linear backoff. Each attempt
//! is recorded in the caller-supplied [`LatencyLog`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    ApiErrorBody, CallError, FailureKind, FailureReason, GenerateContentResponse, GenerateRequest, LlmError,
    RawResponse, Transport,
};
use crate::config::RetryConfig;
use crate::metrics::LatencyLog;

/// Markers that identify an overloaded backend in an error message
const OVERLOAD_MARKERS: &[&str] = &["overloaded", "unavailable"];

/// Retry and timeout settings for one logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub max_retries: u32,

    /// Sleep after attempt `n` (0-based) is `backoff_base * (n + 1)`
    pub backoff_base: Duration,

    /// Upper bound for a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(retry: &RetryConfig, timeout_ms: u64) -> Self {
        Self {
            max_retries: retry.max_retries,
            backoff_base: Duration::from_millis(retry.backoff_base_ms),
            attempt_timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Linear backoff for the given 0-based attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base * (attempt + 1)
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Classification of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    Transient(FailureReason),
    Permanent(FailureReason),
}

/// Classify a raw response by status code and structured error body
pub fn classify_response(raw: &RawResponse) -> AttemptOutcome {
    debug!(status = raw.status, "classify_response: called");
    if raw.is_success() {
        return match serde_json::from_str::<GenerateContentResponse>(&raw.body) {
            Ok(parsed) => match parsed.first_text() {
                Some(text) => AttemptOutcome::Success(text.to_string()),
                None => {
                    debug!("classify_response: success without generated text");
                    AttemptOutcome::Transient(FailureReason::empty_response())
                }
            },
            Err(e) => {
                debug!(error = %e, "classify_response: unparseable success body");
                AttemptOutcome::Permanent(FailureReason::new(
                    FailureKind::Client,
                    Some(raw.status),
                    format!("Invalid response body: {}", e),
                ))
            }
        };
    }

    let error_body = ApiErrorBody::parse(&raw.body);
    let message = match &error_body {
        Some(body) if !body.message.is_empty() => body.message.clone(),
        _ => raw.body.trim().to_string(),
    };

    let unavailable_status = error_body.as_ref().and_then(|b| b.status.as_deref()) == Some("UNAVAILABLE");
    if raw.status == 503 || unavailable_status || has_overload_marker(&message) {
        debug!(status = raw.status, "classify_response: backend unavailable");
        AttemptOutcome::Transient(FailureReason::unavailable(raw.status, message))
    } else {
        debug!(status = raw.status, "classify_response: permanent API error");
        AttemptOutcome::Permanent(FailureReason::api(raw.status, message))
    }
}

/// Classify a transport error
pub fn classify_error(err: &LlmError) -> AttemptOutcome {
    let reason = err.to_reason();
    if reason.is_transient() {
        AttemptOutcome::Transient(reason)
    } else {
        AttemptOutcome::Permanent(reason)
    }
}

/// Overload markers apply to the parsed error message or, failing that, the raw body
fn has_overload_marker(message: &str) -> bool {
    let message = message.to_lowercase();
    OVERLOAD_MARKERS.iter().any(|m| message.contains(m))
}

/// Retrying wrapper around a [`Transport`]
#[derive(Clone)]
pub struct RemoteCaller {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RemoteCaller {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Perform one logical "generate text" operation
    ///
    /// Returns the generated text, or the terminal error after retries are
    /// exhausted, a permanent failure, or cancellation. Every attempt appends
    /// one sample to `latency`, whatever its outcome.
    pub async fn call(
        &self,
        request: &GenerateRequest,
        latency: &mut LatencyLog,
        cancel: &CancellationToken,
    ) -> Result<String, CallError> {
        let attempts = self.policy.attempts();
        debug!(attempts, backoff_base = ?self.policy.backoff_base, "call: called");

        let payload = request
            .to_payload()
            .map_err(|e| CallError::Permanent(FailureReason::new(FailureKind::Client, None, e.to_string())))?;

        let mut last_error = None;
        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                info!(attempt, "call: cancelled before sending");
                return Err(CallError::Cancelled);
            }

            let start = Instant::now();
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = tokio::time::timeout(self.policy.attempt_timeout, self.transport.send(&payload)) => Some(r),
            };
            latency.record(start.elapsed());

            let Some(sent) = sent else {
                info!(attempt, "call: cancelled during request");
                return Err(CallError::Cancelled);
            };

            let outcome = match sent {
                Ok(Ok(raw)) => classify_response(&raw),
                Ok(Err(e)) => classify_error(&e),
                Err(_) => AttemptOutcome::Transient(FailureReason::timeout(self.policy.attempt_timeout)),
            };

            match outcome {
                AttemptOutcome::Success(text) => {
                    debug!(attempt, text_len = text.len(), "call: success");
                    return Ok(text);
                }
                AttemptOutcome::Permanent(reason) => {
                    warn!(attempt, %reason, "call: permanent failure, not retrying");
                    return Err(CallError::Permanent(reason));
                }
                AttemptOutcome::Transient(reason) => {
                    let backoff = self.policy.backoff_for(attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        %reason,
                        "call: transient failure, backing off"
                    );
                    last_error = Some(reason);

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!(attempt, "call: cancelled during backoff");
                            return Err(CallError::Cancelled);
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        let last = last_error.unwrap_or_else(|| FailureReason::new(FailureKind::Client, None, "no attempts made"));
        warn!(attempts, %last, "call: retries exhausted");
        Err(CallError::RetriesExhausted { last, attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::transport::mock::{MockReply, MockTransport};

    fn caller(replies: Vec<MockReply>, max_retries: u32) -> (RemoteCaller, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new(replies));
        let policy = RetryPolicy {
            max_retries,
            backoff_base: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(30),
        };
        (RemoteCaller::new(mock.clone(), policy), mock)
    }

    fn request() -> GenerateRequest {
        GenerateRequest::new("system", "question")
    }

    #[test]
    fn test_backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(6));
    }

    #[test]
    fn test_classify_success() {
        let MockReply::Respond(raw) = MockReply::text("hello") else {
            panic!("Expected Respond")
        };
        assert_eq!(classify_response(&raw), AttemptOutcome::Success("hello".to_string()));
    }

    #[test]
    fn test_classify_empty_is_transient() {
        let raw = RawResponse::new(200, r#"{"candidates":[]}"#);
        match classify_response(&raw) {
            AttemptOutcome::Transient(reason) => {
                assert_eq!(reason.kind, FailureKind::EmptyResponse);
                assert_eq!(reason.message, "no response");
            }
            other => panic!("Expected Transient, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_503_is_transient() {
        let raw = RawResponse::new(503, "Service Unavailable");
        assert!(matches!(
            classify_response(&raw),
            AttemptOutcome::Transient(FailureReason {
                kind: FailureKind::Unavailable,
                status: Some(503),
                ..
            })
        ));
    }

    #[test]
    fn test_classify_overloaded_body_is_transient() {
        let raw = RawResponse::new(
            500,
            r#"{"error":{"code":500,"message":"The model is overloaded.","status":"INTERNAL"}}"#,
        );
        assert!(matches!(classify_response(&raw), AttemptOutcome::Transient(_)));

        let raw = RawResponse::new(429, r#"{"error":{"code":429,"message":"slow down","status":"UNAVAILABLE"}}"#);
        assert!(matches!(classify_response(&raw), AttemptOutcome::Transient(_)));
    }

    #[test]
    fn test_classify_bad_request_is_permanent() {
        let raw = RawResponse::new(
            400,
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        );
        match classify_response(&raw) {
            AttemptOutcome::Permanent(reason) => {
                assert_eq!(reason.kind, FailureKind::Api);
                assert_eq!(reason.status, Some(400));
                assert!(reason.message.starts_with("API key not valid"));
            }
            other => panic!("Expected Permanent, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_plain_text_overload_is_transient() {
        let raw = RawResponse::new(500, "upstream overloaded, retry later");
        match classify_response(&raw) {
            AttemptOutcome::Transient(reason) => {
                assert_eq!(reason.kind, FailureKind::Unavailable);
                assert_eq!(reason.status, Some(500));
                assert_eq!(reason.message, "upstream overloaded, retry later");
            }
            other => panic!("Expected Transient, got {:?}", other),
        }

        let raw = RawResponse::new(502, "Service Unavailable");
        assert!(matches!(classify_response(&raw), AttemptOutcome::Transient(_)));
    }

    #[test]
    fn test_classify_unstructured_error_keeps_body() {
        let raw = RawResponse::new(404, "  Not Found \n");
        match classify_response(&raw) {
            AttemptOutcome::Permanent(reason) => assert_eq!(reason.message, "Not Found"),
            other => panic!("Expected Permanent, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let (caller, mock) = caller(vec![MockReply::text("done")], 3);
        let mut latency = LatencyLog::new();

        let result = caller.call(&request(), &mut latency, &CancellationToken::new()).await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(latency.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures() {
        let (caller, mock) = caller(vec![MockReply::unavailable(), MockReply::empty(), MockReply::text("ok")], 5);
        let mut latency = LatencyLog::new();
        let start = Instant::now();

        let result = caller.call(&request(), &mut latency, &CancellationToken::new()).await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(latency.call_count(), 3);
        // 2s after the first attempt, 4s after the second
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_unavailable_exhausts_retries() {
        let (caller, mock) = caller(
            vec![MockReply::unavailable(), MockReply::unavailable(), MockReply::unavailable()],
            3,
        );
        let mut latency = LatencyLog::new();
        let start = Instant::now();

        let result = caller.call(&request(), &mut latency, &CancellationToken::new()).await;

        match result {
            Err(CallError::RetriesExhausted { last, attempts }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last.kind, FailureKind::Unavailable);
            }
            other => panic!("Expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(mock.call_count(), 3);
        assert_eq!(latency.call_count(), 3);
        assert!(start.elapsed() >= Duration::from_secs(2 * (1 + 2 + 3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_request_fails_immediately() {
        let (caller, mock) = caller(
            vec![MockReply::status(400, r#"{"error":{"code":400,"message":"bad","status":"INVALID_ARGUMENT"}}"#)],
            3,
        );
        let mut latency = LatencyLog::new();
        let start = Instant::now();

        let result = caller.call(&request(), &mut latency, &CancellationToken::new()).await;

        assert!(matches!(result, Err(CallError::Permanent(_))));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(latency.call_count(), 1);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_max_attempts() {
        let replies = (0..10).map(|_| MockReply::empty()).collect();
        let (caller, mock) = caller(replies, 4);
        let mut latency = LatencyLog::new();

        let result = caller.call(&request(), &mut latency, &CancellationToken::new()).await;

        assert!(matches!(result, Err(CallError::RetriesExhausted { attempts: 4, .. })));
        assert_eq!(mock.call_count(), 4);
        assert_eq!(latency.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out_and_retries() {
        let (caller, mock) = caller(vec![MockReply::Hang, MockReply::text("recovered")], 2);
        let mut latency = LatencyLog::new();

        let result = caller.call(&request(), &mut latency, &CancellationToken::new()).await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(mock.call_count(), 2);
        assert!(latency.samples()[0] >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_timeout_is_transient() {
        let (caller, _mock) = caller(vec![MockReply::Timeout, MockReply::Timeout], 2);
        let mut latency = LatencyLog::new();

        let result = caller.call(&request(), &mut latency, &CancellationToken::new()).await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.reason().map(|r| r.kind), Some(FailureKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_call() {
        let (caller, mock) = caller(vec![MockReply::text("never")], 3);
        let mut latency = LatencyLog::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = caller.call(&request(), &mut latency, &cancel).await;

        assert!(matches!(result, Err(CallError::Cancelled)));
        assert_eq!(mock.call_count(), 0);
        assert!(latency.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight() {
        let (caller, _mock) = caller(vec![MockReply::Hang], 3);
        let mut latency = LatencyLog::new();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = caller.call(&request(), &mut latency, &cancel).await;

        assert!(matches!(result, Err(CallError::Cancelled)));
        assert_eq!(latency.call_count(), 1);
        assert!(latency.samples()[0] >= Duration::from_secs(1));
        assert!(latency.samples()[0] < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let (caller, mock) = caller(vec![MockReply::unavailable(), MockReply::text("late")], 3);
        let mut latency = LatencyLog::new();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let result = caller.call(&request(), &mut latency, &cancel).await;

        assert!(matches!(result, Err(CallError::Cancelled)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_still_makes_one_attempt() {
        let (caller, mock) = caller(vec![MockReply::text("one")], 0);
        let mut latency = LatencyLog::new();

        let result = caller.call(&request(), &mut latency, &CancellationToken::new()).await;

        assert_eq!(result.unwrap(), "one");
        assert_eq!(mock.call_count(), 1);
    }
}
