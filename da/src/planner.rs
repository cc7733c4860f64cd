//! Task decomposition
//!
//! The planner asks the model for a to-do list and turns the answer into an
//! ordered [`Plan`] of subtask descriptions.

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::llm::{CallError, GenerateRequest, RemoteCaller};
use crate::metrics::LatencyLog;
use crate::prompts;

/// Ordered, non-empty subtask descriptions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    steps: Vec<String>,
}

impl Plan {
    /// Build a plan from raw lines, dropping blank ones
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let steps = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self { steps }
    }

    /// Split model output on line boundaries
    pub fn parse(text: &str) -> Self {
        let plan = Self::new(text.lines());
        debug!(steps = plan.len(), "Plan::parse: parsed");
        plan
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(String::as_str)
    }
}

/// Why planning produced no plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Task description is empty")]
    EmptyTask,

    #[error(transparent)]
    Remote(#[from] CallError),
}

impl PlanError {
    /// True when trying again later is likely to help
    pub fn is_transient(&self) -> bool {
        match self {
            PlanError::EmptyTask => false,
            PlanError::Remote(e) => e.is_transient(),
        }
    }
}

/// Produces plans through a [`RemoteCaller`]
#[derive(Clone)]
pub struct Planner {
    caller: RemoteCaller,
    system_prompt: String,
}

impl Planner {
    pub fn new(caller: RemoteCaller) -> Self {
        Self {
            caller,
            system_prompt: prompts::PLAN.to_string(),
        }
    }

    /// Decompose `task` into subtasks
    pub async fn plan(
        &self,
        task: &str,
        latency: &mut LatencyLog,
        cancel: &CancellationToken,
    ) -> Result<Plan, PlanError> {
        debug!(task_len = task.len(), "plan: called");
        if task.trim().is_empty() {
            return Err(PlanError::EmptyTask);
        }

        let request = GenerateRequest::new(&self.system_prompt, prompts::plan_query(task));
        let text = self.caller.call(&request, latency, cancel).await?;

        let plan = Plan::parse(&text);
        info!(steps = plan.len(), "plan: produced plan");
        Ok(plan)
    }
}
