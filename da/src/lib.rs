//! deepagent - plan a task, then execute it one subtask at a time
//!
//! A task description is decomposed by a planning prompt into an ordered
//! list of subtasks. Each subtask is then sent to a sub-agent prompt, with
//! earlier results passed along as context. All remote calls go through a
//! retrying caller with linear backoff and per-attempt timeouts.
//!
//! # Modules
//!
//! - [`llm`] - Transport, wire types and the retrying [`RemoteCaller`]
//! - [`planner`] - Task decomposition into a [`Plan`]
//! - [`executor`] - Single-subtask execution
//! - [`session`] - Plan, results and busy flag for one session
//! - [`metrics`] - Per-attempt latency log
//! - [`repl`] - Interactive front end
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod executor;
pub mod llm;
pub mod metrics;
pub mod planner;
pub mod prompts;
pub mod repl;
pub mod session;

// Re-export commonly used types
pub use config::{Config, LlmConfig, RetryConfig, SessionConfig};
pub use executor::SubtaskExecutor;
pub use llm::{CallError, FailureKind, FailureReason, LlmError, RemoteCaller, RetryPolicy, Transport};
pub use metrics::{LatencyLog, LatencySummary};
pub use planner::{Plan, PlanError, Planner};
pub use session::{ExecuteOutcome, Phase, ResultRecord, SessionState};
