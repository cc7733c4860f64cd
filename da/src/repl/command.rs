//! Input parsing for the REPL

use tracing::debug;

/// One line of REPL input, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Plan a task (plain input or `/plan <task>`)
    Plan(String),
    /// Execute the subtask at this zero-based index
    Exec(usize),
    /// Execute the first subtask without a result
    Next,
    /// Execute every remaining subtask in order
    All,
    ShowPlan,
    Results,
    Metrics,
    Reset,
    Help,
    Quit,
    /// Known command with bad arguments; carries the usage line
    Usage(&'static str),
    Unknown(String),
}

impl ReplCommand {
    /// Parse one trimmed, non-empty input line
    ///
    /// Subtask numbers are 1-based on input and zero-based in the result.
    pub fn parse(input: &str) -> Self {
        debug!(%input, "ReplCommand::parse: called");
        let input = input.trim();
        if !input.starts_with('/') {
            return ReplCommand::Plan(input.to_string());
        }

        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };

        match cmd {
            "/plan" | "/p" => {
                if rest.is_empty() {
                    ReplCommand::Usage("/plan <task>")
                } else {
                    ReplCommand::Plan(rest.to_string())
                }
            }
            "/exec" | "/e" => match rest.parse::<usize>() {
                Ok(n) if n >= 1 => ReplCommand::Exec(n - 1),
                _ => ReplCommand::Usage("/exec <n>"),
            },
            "/next" | "/n" => ReplCommand::Next,
            "/all" | "/a" => ReplCommand::All,
            "/plan-show" | "/show" => ReplCommand::ShowPlan,
            "/results" | "/r" => ReplCommand::Results,
            "/metrics" | "/m" => ReplCommand::Metrics,
            "/reset" => ReplCommand::Reset,
            "/help" | "/h" => ReplCommand::Help,
            "/quit" | "/q" | "/exit" => ReplCommand::Quit,
            other => ReplCommand::Unknown(other.to_string()),
        }
    }
}
