//! Single-subtask execution through the sub-agent prompt

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::llm::{CallError, GenerateRequest, RemoteCaller};
use crate::metrics::LatencyLog;
use crate::prompts;

/// Runs one planned subtask at a time
#[derive(Clone)]
pub struct SubtaskExecutor {
    caller: RemoteCaller,
    system_prompt: String,
}

impl SubtaskExecutor {
    pub fn new(caller: RemoteCaller) -> Self {
        Self {
            caller,
            system_prompt: prompts::SUBTASK.to_string(),
        }
    }

    /// Execute `subtask`, passing `prior_context` through as an assistant turn
    pub async fn execute(
        &self,
        subtask: &str,
        prior_context: Option<&str>,
        latency: &mut LatencyLog,
        cancel: &CancellationToken,
    ) -> Result<String, CallError> {
        debug!(%subtask, has_context = prior_context.is_some(), "execute: called");
        let request =
            GenerateRequest::new(&self.system_prompt, prompts::subtask_query(subtask)).with_prior_context(prior_context);
        self.caller.call(&request, latency, cancel).await
    }
}
