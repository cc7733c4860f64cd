//! SessionState - plan, results, busy flag and latency for one session
//!
//! Transitions:
//! - `submit_plan`: Idle/Planned -> Planned, replaces the plan and clears results
//! - `execute_one`: Planned -> Planned, appends a result on success
//! - `reset`: any -> Idle, latency history is kept

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ResultRecord;
use crate::config::SessionConfig;
use crate::executor::SubtaskExecutor;
use crate::llm::CallError;
use crate::metrics::LatencyLog;
use crate::planner::{Plan, PlanError, Planner};

/// Coarse session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No plan yet
    Idle,
    /// A plan is present, with zero or more results
    Planned,
}

/// What happened to an `execute_one` request
#[derive(Debug, Clone)]
pub enum ExecuteOutcome {
    /// The subtask ran and its result was recorded
    Completed(ResultRecord),
    /// Transient failure; worth retrying later, nothing recorded
    Warning(CallError),
    /// Permanent failure or cancellation, nothing recorded
    Failed(CallError),
    /// Another execution is in flight; nothing changed
    Busy,
    /// No subtask at that index
    UnknownSubtask(usize),
    /// That subtask already has a recorded result
    AlreadyDone(usize),
    /// The plan was replaced while this execution was in flight
    Discarded,
}

impl ExecuteOutcome {
    /// True if the request was turned away without touching the remote endpoint
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            ExecuteOutcome::Busy | ExecuteOutcome::UnknownSubtask(_) | ExecuteOutcome::AlreadyDone(_)
        )
    }
}

/// Claim on one in-flight execution, handed out by `begin_execution`
#[derive(Debug)]
pub struct ExecutionTicket {
    pub index: usize,
    pub subtask: String,
    pub prior_context: Option<String>,
    generation: u64,
}

/// State owned by one interactive session
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    task: Option<String>,
    plan: Plan,
    results: Vec<ResultRecord>,
    latency: LatencyLog,
    busy: bool,
    share_context: bool,
    generation: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SessionState {
    /// Create an empty session
    pub fn new(share_context: bool) -> Self {
        let id = Uuid::now_v7();
        debug!(%id, share_context, "SessionState::new: called");
        Self {
            id,
            task: None,
            plan: Plan::default(),
            results: Vec::new(),
            latency: LatencyLog::new(),
            busy: false,
            share_context,
            generation: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.share_context)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        if self.plan.is_empty() { Phase::Idle } else { Phase::Planned }
    }

    /// Task description behind the current plan
    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    pub fn latency(&self) -> &LatencyLog {
        &self.latency
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether the subtask at `index` already has a result
    pub fn is_done(&self, index: usize) -> bool {
        self.results.iter().any(|r| r.index == index)
    }

    /// Plan indices that have no recorded result yet, in plan order
    pub fn pending(&self) -> Vec<usize> {
        (0..self.plan.len()).filter(|i| !self.is_done(*i)).collect()
    }

    /// Accumulated results rendered for the next subtask, if sharing is on
    pub fn prior_context(&self) -> Option<String> {
        if !self.share_context || self.results.is_empty() {
            return None;
        }
        let context = self
            .results
            .iter()
            .map(ResultRecord::as_context)
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(context)
    }

    /// Plan `task` and, on success, replace the plan and clear all results
    ///
    /// On failure the current plan and results are left untouched.
    pub async fn submit_plan(
        &mut self,
        planner: &Planner,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<&Plan, PlanError> {
        debug!(session = %self.id, "submit_plan: called");
        let plan = planner.plan(task, &mut self.latency, cancel).await?;

        info!(
            session = %self.id,
            steps = plan.len(),
            dropped_results = self.results.len(),
            "submit_plan: plan replaced"
        );
        self.plan = plan;
        self.task = Some(task.trim().to_string());
        self.results.clear();
        self.busy = false;
        self.generation += 1;
        Ok(&self.plan)
    }

    /// Claim the subtask at `index` and set the busy flag
    ///
    /// Rejected while busy, for unknown indices, and for subtasks that
    /// already have a result; rejection changes nothing.
    pub fn begin_execution(&mut self, index: usize) -> Result<ExecutionTicket, ExecuteOutcome> {
        debug!(session = %self.id, index, busy = self.busy, "begin_execution: called");
        if self.busy {
            return Err(ExecuteOutcome::Busy);
        }
        let Some(subtask) = self.plan.get(index) else {
            return Err(ExecuteOutcome::UnknownSubtask(index));
        };
        if self.is_done(index) {
            return Err(ExecuteOutcome::AlreadyDone(index));
        }

        let ticket = ExecutionTicket {
            index,
            subtask: subtask.to_string(),
            prior_context: self.prior_context(),
            generation: self.generation,
        };
        self.busy = true;
        Ok(ticket)
    }

    /// Record the outcome of a claimed execution and clear the busy flag
    pub fn finish_execution(&mut self, ticket: ExecutionTicket, result: Result<String, CallError>) -> ExecuteOutcome {
        debug!(session = %self.id, index = ticket.index, ok = result.is_ok(), "finish_execution: called");
        if ticket.generation != self.generation {
            info!(session = %self.id, index = ticket.index, "finish_execution: plan replaced, discarding");
            return ExecuteOutcome::Discarded;
        }
        self.busy = false;

        match result {
            Ok(text) => {
                let record = ResultRecord::new(ticket.index, ticket.subtask, text);
                info!(session = %self.id, index = ticket.index, "finish_execution: result recorded");
                self.results.push(record.clone());
                ExecuteOutcome::Completed(record)
            }
            Err(e) if e.is_transient() => {
                warn!(session = %self.id, index = ticket.index, error = %e, "finish_execution: transient failure");
                ExecuteOutcome::Warning(e)
            }
            Err(e) => {
                warn!(session = %self.id, index = ticket.index, error = %e, "finish_execution: failed");
                ExecuteOutcome::Failed(e)
            }
        }
    }

    /// Execute the subtask at `index` and record its result
    pub async fn execute_one(
        &mut self,
        executor: &SubtaskExecutor,
        index: usize,
        cancel: &CancellationToken,
    ) -> ExecuteOutcome {
        let ticket = match self.begin_execution(index) {
            Ok(ticket) => ticket,
            Err(rejected) => {
                debug!(session = %self.id, index, ?rejected, "execute_one: rejected");
                return rejected;
            }
        };

        let result = executor
            .execute(&ticket.subtask, ticket.prior_context.as_deref(), &mut self.latency, cancel)
            .await;
        self.finish_execution(ticket, result)
    }

    /// Drop the plan and results; latency history is kept
    pub fn reset(&mut self) {
        info!(session = %self.id, "reset: called");
        self.task = None;
        self.plan = Plan::default();
        self.results.clear();
        self.busy = false;
        self.generation += 1;
    }
}
