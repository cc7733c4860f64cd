//! deepagent - task planning and step-by-step execution
//!
//! CLI entry point.

use std::fs;
use std::io::{BufRead, BufReader};

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use deepagent::cli::{Cli, Command, OutputFormat, get_log_path};
use deepagent::config::Config;
use deepagent::executor::SubtaskExecutor;
use deepagent::llm::create_caller;
use deepagent::metrics::{LatencyLog, LatencySummary};
use deepagent::planner::{Plan, Planner};
use deepagent::repl::{self, InterruptGuard, render};
use deepagent::session::{ExecuteOutcome, ResultRecord, SessionState};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // Append so `da logs` can show earlier sessions
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(model = %config.llm.model, "deepagent loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Repl { task }) => cmd_repl(&config, task).await,
        Some(Command::Plan { task, format }) => cmd_plan(&config, &task, format).await,
        Some(Command::Run { task, format }) => cmd_run(&config, &task, format).await,
        Some(Command::Logs { lines }) => cmd_logs(lines),
        None => {
            debug!("main: no command specified, launching REPL");
            cmd_repl(&config, None).await
        }
    }
}

/// Start the interactive REPL
async fn cmd_repl(config: &Config, task: Option<String>) -> Result<()> {
    debug!(?task, "cmd_repl: called");
    config.validate()?;
    repl::run_interactive(config, task).await
}

#[derive(Serialize)]
struct PlanReport<'a> {
    task: &'a str,
    plan: &'a Plan,
    metrics: LatencySummary,
}

/// Plan a task once and print the subtasks
async fn cmd_plan(config: &Config, task: &str, format: OutputFormat) -> Result<()> {
    debug!(%task, %format, "cmd_plan: called");
    config.validate()?;
    let planner = Planner::new(create_caller(config)?);

    let guard = InterruptGuard::install();
    let mut latency = LatencyLog::new();
    let plan = planner
        .plan(task, &mut latency, guard.token())
        .await
        .context("Planning failed")?;

    match format {
        OutputFormat::Text => {
            render::print_plan(&plan, |_| false);
            render::print_metrics(&latency);
        }
        OutputFormat::Json => {
            let report = PlanReport {
                task,
                plan: &plan,
                metrics: latency.summary(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct RunReport<'a> {
    session: String,
    task: &'a str,
    plan: &'a Plan,
    results: &'a [ResultRecord],
    warnings: usize,
    failed_at: Option<usize>,
    metrics: LatencySummary,
}

/// Plan a task, then execute every subtask in order
///
/// Transient failures skip the subtask; the first permanent failure stops the run.
async fn cmd_run(config: &Config, task: &str, format: OutputFormat) -> Result<()> {
    debug!(%task, %format, "cmd_run: called");
    config.validate()?;
    let caller = create_caller(config)?;
    let planner = Planner::new(caller.clone());
    let executor = SubtaskExecutor::new(caller);
    let text = format == OutputFormat::Text;

    let guard = InterruptGuard::install();
    let mut state = SessionState::from_config(&config.session);
    state
        .submit_plan(&planner, task, guard.token())
        .await
        .context("Planning failed")?;

    if text {
        render::print_session_plan(&state);
    }

    let mut warnings = 0;
    let mut failure = None;
    for index in 0..state.plan().len() {
        if text {
            println!("{} {}", "Executing:".dimmed(), state.plan().get(index).unwrap_or_default());
        }
        let outcome = state.execute_one(&executor, index, guard.token()).await;
        if text {
            render::print_outcome(&outcome);
        }
        match outcome {
            ExecuteOutcome::Warning(_) => warnings += 1,
            ExecuteOutcome::Failed(e) => {
                failure = Some((index, e));
                break;
            }
            _ => {}
        }
    }

    match format {
        OutputFormat::Text => {
            println!("{} of {} subtasks completed", state.results().len(), state.plan().len());
            render::print_metrics(state.latency());
        }
        OutputFormat::Json => {
            let report = RunReport {
                session: state.id().to_string(),
                task,
                plan: state.plan(),
                results: state.results(),
                warnings,
                failed_at: failure.as_ref().map(|(i, _)| i + 1),
                metrics: state.latency().summary(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    match failure {
        Some((index, e)) => Err(eyre::eyre!("Subtask {} failed: {}", index + 1, e)),
        None => Ok(()),
    }
}

/// Show the last lines of the log file
fn cmd_logs(lines: usize) -> Result<()> {
    debug!(lines, "cmd_logs: called");
    let log_path = get_log_path();

    if !log_path.exists() {
        debug!(?log_path, "cmd_logs: log file does not exist");
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }

    Ok(())
}
