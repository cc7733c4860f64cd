//! Session state for one planning/execution conversation

mod record;
mod state;

pub use record::ResultRecord;
pub use state::{ExecuteOutcome, ExecutionTicket, Phase, SessionState};
