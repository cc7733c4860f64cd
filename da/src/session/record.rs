//! Completed subtask records

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of one successfully executed subtask
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    /// Position of the subtask in the plan it belongs to
    pub index: usize,
    pub subtask: String,
    pub result: String,
    pub completed_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn new(index: usize, subtask: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            index,
            subtask: subtask.into(),
            result: result.into(),
            completed_at: Utc::now(),
        }
    }

    /// Rendering used when the record is handed to a later subtask as context
    pub fn as_context(&self) -> String {
        format!("{}: {}", self.subtask, self.result.trim())
    }
}
