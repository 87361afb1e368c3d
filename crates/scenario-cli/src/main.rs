// crates/scenario-cli/src/main.rs
// ============================================================================
// Module: Scenario CLI Entry Point
// Description: Command dispatcher for running, listing, and validating
//              scenario files.
// Purpose: Provide a small, synchronous CLI over the scenario engine; no
//          async runtime is used since the reactor/dispatcher loop is a
//          single-threaded cooperative loop.
// Dependencies: clap, scenario_core, scenario_engine, scenario_loader
// ============================================================================

#![allow(clippy::print_stdout, clippy::print_stderr, reason = "this binary's output is its product")]

mod commands;
mod config;
mod reporting;
mod sim_pipeline;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;

use commands::CliError;

/// Default ceiling on how long a `run` is allowed to take before it is
/// treated as a stalled scenario rather than a slow one.
const DEFAULT_MAX_WALL_CLOCK: Duration = Duration::from_secs(120);

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "scenario", disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario against the simulated pipeline.
    Run(RunArgs),
    /// List scenario files and their parsed description fields.
    ListScenarios(ListScenariosArgs),
    /// Load a scenario without running it, checking it is well-formed.
    Validate(ValidateArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
struct RunArgs {
    /// Colon-separated scenario reference list.
    references: String,
    /// Optional TOML config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Wall-clock ceiling on the run, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_MAX_WALL_CLOCK.as_secs())]
    timeout: u64,
}

/// Arguments for the `list-scenarios` subcommand.
#[derive(Args, Debug)]
struct ListScenariosArgs {
    /// Scenario files or directories to search non-recursively.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Optional file to also write the listing to.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Print the listing as pretty-printed JSON instead of `key=value` blocks.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
struct ValidateArgs {
    /// Colon-separated scenario reference list.
    references: String,
    /// Treat a non-fatal validation (e.g. an optional action type that
    /// resolved to a no-op) as a failure anyway.
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.0),
    }
}

/// Dispatches the parsed CLI command and maps its result to an exit code.
fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_command(&args),
        Commands::ListScenarios(args) => list_scenarios_command(&args),
        Commands::Validate(args) => validate_command(&args),
    }
}

fn run_command(args: &RunArgs) -> Result<ExitCode, CliError> {
    let options = commands::run::RunOptions {
        references: args.references.clone(),
        config: args.config.clone(),
        max_wall_clock: Duration::from_secs(args.timeout),
    };
    let succeeded = commands::run::execute(&options)?;
    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn list_scenarios_command(args: &ListScenariosArgs) -> Result<ExitCode, CliError> {
    let listings = commands::list_scenarios::execute(&args.paths)?;
    if args.json {
        println!("{}", commands::list_scenarios::ScenarioListing::to_json(&listings)?);
    } else {
        for listing in &listings {
            println!("{}\n", listing.to_key_value_block());
        }
    }
    if let Some(output) = &args.output {
        commands::list_scenarios::write_output_file(&listings, output)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn validate_command(args: &ValidateArgs) -> Result<ExitCode, CliError> {
    let report = commands::validate::execute(&args.references)?;
    println!("ok: {} action(s) queued", report.action_count);
    if args.strict && report.action_count == 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Prints `message` to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    eprintln!("{message}");
    ExitCode::FAILURE
}
