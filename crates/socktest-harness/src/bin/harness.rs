//! CLI entrypoint for the socktest scenario harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use socktest_harness::Scenario;
use socktest_harness::config;
use socktest_harness::scenario;
use socktest_harness::structured_log::{LogEmitter, validate_log_file};

/// Fault-injection tooling for socktest.
#[derive(Debug, Parser)]
#[command(name = "socktest-harness")]
#[command(about = "Run socket fault-injection scenarios against the socktest switch")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List built-in scenarios.
    List,
    /// Run one scenario on a fresh switch.
    Run {
        /// Scenario name (see `list`).
        #[arg(long)]
        scenario: String,
        /// Syscall backend (`sim` or `host`); defaults to $SOCKTEST_BACKEND.
        #[arg(long)]
        backend: Option<String>,
        /// JSONL log path (`-` for stdout). If omitted, the log is kept in
        /// memory only and discarded when the run ends.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Output JSON report path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Run identifier used in trace ids.
        #[arg(long, default_value = "local")]
        run_id: String,
    },
    /// Validate a structured JSONL log.
    ValidateLog {
        /// JSONL log path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::List => {
            for s in Scenario::ALL {
                println!("{:<22}{}", s.name(), s.description());
            }
        }
        Command::Run {
            scenario,
            backend,
            log,
            output,
            run_id,
        } => {
            let scenario = Scenario::from_name(&scenario)?;
            let backend = config::resolve(backend.as_deref());
            let mut emitter = match &log {
                Some(path) if path.as_os_str() == "-" => {
                    LogEmitter::to_stdout(&run_id, scenario.name())
                }
                Some(path) => LogEmitter::to_file(path, &run_id, scenario.name())?,
                None => LogEmitter::to_buffer(&run_id, scenario.name()),
            };

            let report = scenario::run(scenario, backend, &mut emitter)?;
            let json = report.to_json()?;
            match &output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    eprintln!("Wrote report to {}", path.display());
                }
                None => println!("{json}"),
            }

            let failed: Vec<_> = report.failures().map(|c| c.name.as_str()).collect();
            if !failed.is_empty() {
                return Err(format!(
                    "scenario {} failed on {}: {}",
                    scenario.name(),
                    backend.as_str(),
                    failed.join(", ")
                )
                .into());
            }
            eprintln!(
                "scenario {} passed on {} ({} checks)",
                scenario.name(),
                backend.as_str(),
                report.checks.len()
            );
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(format!("{} invalid entries in {lines} lines", errors.len()).into());
            }
            eprintln!("{}: {lines} valid entries", log.display());
        }
    }

    Ok(())
}
