//! REPL session management

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ReplCommand;
use super::interrupt::InterruptGuard;
use super::render;
use crate::executor::SubtaskExecutor;
use crate::planner::Planner;
use crate::session::{ExecuteOutcome, SessionState};

/// Interactive REPL session
pub struct ReplSession {
    planner: Planner,
    executor: SubtaskExecutor,
    state: SessionState,
}

impl ReplSession {
    /// Create a new REPL session
    pub fn new(planner: Planner, executor: SubtaskExecutor, state: SessionState) -> Self {
        Self {
            planner,
            executor,
            state,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, initial_task: Option<String>) -> Result<()> {
        info!(session = %self.state.id(), "ReplSession::run: starting");
        self.print_welcome();

        // If initial task provided, plan it first
        if let Some(task) = initial_task {
            println!("{} {}", ">".bright_green(), task);
            self.dispatch_interruptible(ReplCommand::Plan(task)).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match self.dispatch_interruptible(ReplCommand::parse(input)).await {
                        SlashResult::Continue => continue,
                        SlashResult::Quit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C at the prompt - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        render::print_metrics(self.state.latency());
        println!("Goodbye!");
        Ok(())
    }

    async fn dispatch_interruptible(&mut self, command: ReplCommand) -> SlashResult {
        let guard = InterruptGuard::install();
        self.dispatch(command, guard.token()).await
    }

    /// Carry out one parsed command
    pub async fn dispatch(&mut self, command: ReplCommand, cancel: &CancellationToken) -> SlashResult {
        debug!(?command, "dispatch: called");
        match command {
            ReplCommand::Plan(task) => {
                println!("{}", "Planning...".dimmed());
                match self.state.submit_plan(&self.planner, &task, cancel).await {
                    Ok(_) => render::print_session_plan(&self.state),
                    Err(e) => render::print_plan_error(&e),
                }
            }
            ReplCommand::Exec(index) => {
                self.execute(index, cancel).await;
            }
            ReplCommand::Next => match self.state.pending().first().copied() {
                Some(index) => {
                    self.execute(index, cancel).await;
                }
                None => self.print_nothing_pending(),
            },
            ReplCommand::All => self.execute_all(cancel).await,
            ReplCommand::ShowPlan => render::print_session_plan(&self.state),
            ReplCommand::Results => render::print_results(self.state.results()),
            ReplCommand::Metrics => render::print_metrics(self.state.latency()),
            ReplCommand::Reset => {
                self.state.reset();
                println!("{}", "Session reset.".dimmed());
            }
            ReplCommand::Help => self.print_help(),
            ReplCommand::Quit => return SlashResult::Quit,
            ReplCommand::Usage(usage) => println!("{} {}", "Usage:".yellow(), usage),
            ReplCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    async fn execute(&mut self, index: usize, cancel: &CancellationToken) -> ExecuteOutcome {
        if let Some(subtask) = self.state.plan().get(index) {
            println!("{} {}", "Executing:".dimmed(), subtask);
        }
        let outcome = self.state.execute_one(&self.executor, index, cancel).await;
        render::print_outcome(&outcome);
        outcome
    }

    /// Execute remaining subtasks in order, stopping at the first one that fails
    async fn execute_all(&mut self, cancel: &CancellationToken) {
        if self.state.pending().is_empty() {
            self.print_nothing_pending();
            return;
        }
        while let Some(index) = self.state.pending().first().copied() {
            let outcome = self.execute(index, cancel).await;
            if !matches!(outcome, ExecuteOutcome::Completed(_)) {
                break;
            }
        }
    }

    fn print_nothing_pending(&self) {
        if self.state.plan().is_empty() {
            println!("{}", "No plan yet. Type a task to plan it.".dimmed());
        } else {
            println!("{}", "All subtasks are done.".dimmed());
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Deep Agent".bright_cyan().bold());
        println!("Type a task to plan it. {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:16} Plan a task (plain input does the same)", "/plan <task>".yellow());
        println!("  {:16} Execute subtask n", "/exec <n>".yellow());
        println!("  {:16} Execute the next pending subtask", "/next".yellow());
        println!("  {:16} Execute all pending subtasks", "/all".yellow());
        println!("  {:16} Show the current plan", "/plan-show".yellow());
        println!("  {:16} Show subtask results", "/results".yellow());
        println!("  {:16} Show call latency", "/metrics".yellow());
        println!("  {:16} Drop the plan and results", "/reset".yellow());
        println!("  {:16} Show this help", "/help".yellow());
        println!("  {:16} Exit the REPL", "/quit".yellow());
        println!();
        println!("{}", "Ctrl+C cancels a running request.".dimmed());
        println!();
    }
}

/// Result of handling a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashResult {
    Continue,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::transport::mock::{MockReply, MockTransport};
    use crate::llm::{RemoteCaller, RetryPolicy};
    use std::sync::Arc;

    fn session(replies: Vec<MockReply>) -> (ReplSession, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new(replies));
        let caller = RemoteCaller::new(mock.clone(), RetryPolicy::default());
        let session = ReplSession::new(
            Planner::new(caller.clone()),
            SubtaskExecutor::new(caller),
            SessionState::default(),
        );
        (session, mock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_then_next() {
        let (mut repl, _mock) = session(vec![MockReply::text("a\nb"), MockReply::text("did a")]);
        let cancel = CancellationToken::new();

        repl.dispatch(ReplCommand::parse("Build a website"), &cancel).await;
        repl.dispatch(ReplCommand::parse("/next"), &cancel).await;

        assert_eq!(repl.state().plan().len(), 2);
        assert_eq!(repl.state().results().len(), 1);
        assert_eq!(repl.state().pending(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_executes_every_pending_subtask() {
        let (mut repl, mock) = session(vec![
            MockReply::text("a\nb\nc"),
            MockReply::text("ra"),
            MockReply::text("rb"),
            MockReply::text("rc"),
        ]);
        let cancel = CancellationToken::new();

        repl.dispatch(ReplCommand::parse("/plan task"), &cancel).await;
        repl.dispatch(ReplCommand::All, &cancel).await;

        assert_eq!(repl.state().results().len(), 3);
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_stops_at_failure() {
        let (mut repl, mock) = session(vec![
            MockReply::text("a\nb\nc"),
            MockReply::text("ra"),
            MockReply::status(400, "bad request"),
        ]);
        let cancel = CancellationToken::new();

        repl.dispatch(ReplCommand::parse("/plan task"), &cancel).await;
        repl.dispatch(ReplCommand::All, &cancel).await;

        assert_eq!(repl.state().results().len(), 1);
        assert_eq!(repl.state().pending(), vec![1, 2]);
        assert_eq!(mock.call_count(), 3);
        assert!(!repl.state().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exec_without_plan_makes_no_call() {
        let (mut repl, mock) = session(vec![]);
        let cancel = CancellationToken::new();

        let result = repl.dispatch(ReplCommand::parse("/exec 1"), &cancel).await;

        assert_eq!(result, SlashResult::Continue);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_and_quit() {
        let (mut repl, _mock) = session(vec![MockReply::text("a")]);
        let cancel = CancellationToken::new();

        repl.dispatch(ReplCommand::parse("task"), &cancel).await;
        repl.dispatch(ReplCommand::Reset, &cancel).await;
        assert!(repl.state().plan().is_empty());
        assert_eq!(repl.state().latency().call_count(), 1);

        assert_eq!(repl.dispatch(ReplCommand::Quit, &cancel).await, SlashResult::Quit);
    }
}
