//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

/// System prompt for task decomposition
pub const PLAN: &str = include_str!("../prompts/plan.pmt");

/// System prompt for single-subtask execution
pub const SUBTASK: &str = include_str!("../prompts/subtask.pmt");

/// User query sent to the planner
pub fn plan_query(task: &str) -> String {
    format!("Task to plan: {}", task.trim())
}

/// User query sent to the sub-agent
pub fn subtask_query(subtask: &str) -> String {
    format!("Subtask: {}", subtask.trim())
}
