//! Terminal rendering shared by the REPL and the one-shot commands

use colored::Colorize;

use crate::llm::CallError;
use crate::metrics::LatencyLog;
use crate::planner::{Plan, PlanError};
use crate::session::{ExecuteOutcome, ResultRecord, SessionState};

/// Print a numbered plan; subtasks with a result get a check mark
pub fn print_plan(plan: &Plan, is_done: impl Fn(usize) -> bool) {
    if plan.is_empty() {
        println!("{}", "No plan yet. Type a task to plan it.".dimmed());
        return;
    }

    println!();
    println!("{}", "Plan:".bright_cyan());
    for (i, step) in plan.iter().enumerate() {
        let marker = if is_done(i) { "✓".green() } else { " ".normal() };
        println!("  {} {:>2}. {}", marker, i + 1, step);
    }
    println!();
}

/// Print the plan held by a session
pub fn print_session_plan(state: &SessionState) {
    print_plan(state.plan(), |i| state.is_done(i));
}

pub fn print_record(record: &ResultRecord) {
    println!();
    println!("{} {}", format!("[{}]", record.index + 1).bright_blue(), record.subtask.bold());
    println!("{}", record.result.trim());
    println!();
}

pub fn print_results(results: &[ResultRecord]) {
    if results.is_empty() {
        println!("{}", "No results yet.".dimmed());
        return;
    }
    for record in results {
        print_record(record);
    }
}

pub fn print_metrics(latency: &LatencyLog) {
    let summary = latency.summary();
    println!(
        "{} {} calls, average {:.2}s, total {:.2}s",
        "Metrics:".bright_cyan(),
        summary.calls,
        summary.average_secs,
        summary.total_secs
    );
}

/// Transient failures are warnings, everything else is an error
pub fn print_call_error(context: &str, err: &CallError) {
    match err {
        CallError::Cancelled => println!("{} {}", "Cancelled:".yellow(), context),
        e if e.is_transient() => println!("{} {}: {}", "Warning:".yellow(), context, e),
        e => println!("{} {}: {}", "Error:".red(), context, e),
    }
}

pub fn print_plan_error(err: &PlanError) {
    match err {
        PlanError::Remote(e) => print_call_error("planning failed", e),
        e => println!("{} {}", "Error:".red(), e),
    }
}

/// Print what an execution request produced
pub fn print_outcome(outcome: &ExecuteOutcome) {
    match outcome {
        ExecuteOutcome::Completed(record) => print_record(record),
        ExecuteOutcome::Warning(e) | ExecuteOutcome::Failed(e) => print_call_error("subtask failed", e),
        ExecuteOutcome::Busy => println!("{}", "A subtask is already running.".yellow()),
        ExecuteOutcome::UnknownSubtask(i) => println!("{} No subtask {}", "?".yellow(), i + 1),
        ExecuteOutcome::AlreadyDone(i) => println!("{}", format!("Subtask {} is already done.", i + 1).dimmed()),
        ExecuteOutcome::Discarded => println!("{}", "Plan changed; result discarded.".dimmed()),
    }
}
