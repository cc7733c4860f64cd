//! Interactive REPL for deepagent
//!
//! Plain input plans a task; slash commands execute subtasks one at a time
//! and inspect the session.

mod command;
mod interrupt;
pub mod render;
mod session;

pub use command::ReplCommand;
pub use interrupt::InterruptGuard;
pub use session::{ReplSession, SlashResult};

use eyre::Result;
use tracing::debug;

use crate::config::Config;
use crate::executor::SubtaskExecutor;
use crate::llm::create_caller;
use crate::planner::Planner;
use crate::session::SessionState;

/// Run the interactive REPL
///
/// This is the main entry point for `da repl`.
pub async fn run_interactive(config: &Config, initial_task: Option<String>) -> Result<()> {
    debug!(has_task = initial_task.is_some(), "run_interactive: called");
    let caller = create_caller(config)?;

    let mut session = ReplSession::new(
        Planner::new(caller.clone()),
        SubtaskExecutor::new(caller),
        SessionState::from_config(&config.session),
    );
    session.run(initial_task).await
}
