//! LLM client module
//!
//! Provides the transport to the generative-language endpoint and the
//! retrying [`RemoteCaller`] built on top of it.

use std::sync::Arc;

use tracing::debug;

mod caller;
mod error;
pub mod transport;
mod types;

pub use caller::{AttemptOutcome, RemoteCaller, RetryPolicy, classify_error, classify_response};
pub use error::{CallError, FailureKind, FailureReason, LlmError};
pub use transport::{GeminiTransport, RawResponse, Transport};
pub use types::{
    ApiErrorBody, Candidate, CandidateContent, Content, ErrorEnvelope, GenerateContentRequest,
    GenerateContentResponse, GenerateRequest, Message, Part, ResponsePart, Role,
};

use crate::config::Config;

/// Create a [`RemoteCaller`] backed by the Gemini transport
pub fn create_caller(config: &Config) -> Result<RemoteCaller, LlmError> {
    debug!(model = %config.llm.model, "create_caller: called");
    let transport: Arc<dyn Transport> = Arc::new(GeminiTransport::from_config(&config.llm)?);
    let policy = RetryPolicy::from_config(&config.retry, config.llm.timeout_ms);
    Ok(RemoteCaller::new(transport, policy))
}
