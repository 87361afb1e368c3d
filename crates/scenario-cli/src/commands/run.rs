// crates/scenario-cli/src/commands/run.rs
// ============================================================================
// Module: `run` Command
// Description: Loads and executes a scenario against the simulated
//              pipeline.
// Purpose: Drive `Dispatcher::tick`/`BusReactor::drain` on a fixed interval
//          until the scenario ends, a report demands abort, or a wall-clock
//          timeout elapses.
// Dependencies: scenario_core, scenario_loader, scenario_engine
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use scenario_core::ActionTypeRegistry;
use scenario_core::Scenario;
use scenario_engine::register_builtins;
use scenario_engine::BusReactor;
use scenario_engine::DispatchOutcome;
use scenario_engine::Dispatcher;
use scenario_engine::runtime::lock;
use scenario_engine::Runtime;
use scenario_engine::SharedRuntime;
use scenario_loader::load_references;
use scenario_loader::split_references;

use crate::commands::CliError;
use crate::config::Env;
use crate::config::ScenarioConfig;
use crate::reporting::build_reporter;
use crate::sim_pipeline::SimulatedMedia;
use crate::sim_pipeline::SimulatedPipeline;

/// Arguments the `run` command needs beyond what `clap` parses directly,
/// kept as a plain struct so this module stays test-friendly without
/// depending on `clap::Args` derive plumbing.
pub struct RunOptions {
    /// Colon-separated scenario reference list.
    pub references: String,
    /// Optional config file.
    pub config: Option<PathBuf>,
    /// Wall-clock ceiling on the whole run, after which it is treated as a
    /// stall rather than looping forever.
    pub max_wall_clock: Duration,
}

/// Executes the `run` command: load, then tick the dispatcher and bus
/// reactor until the scenario ends or a fatal report is observed.
///
/// # Errors
///
/// Returns [`CliError`] if the config file or scenario references fail to
/// load, or a reporting sink cannot be opened.
pub fn execute(options: &RunOptions) -> Result<bool, CliError> {
    let env = Env::from_process();
    let config = options.config.as_deref().map(ScenarioConfig::load).transpose()?;
    let overrides = config.as_ref().map(ScenarioConfig::resolve_overrides).unwrap_or_default();
    let (reporter, rx) = build_reporter(&env, overrides.clone())?;

    let media = SimulatedMedia::default();
    let pipeline = Box::new(SimulatedPipeline::new(media));
    let runtime = Runtime::new(Scenario::new("pending"), pipeline).with_reporter(reporter.clone());
    let shared: SharedRuntime = Arc::new(Mutex::new(runtime));

    let mut registry = ActionTypeRegistry::new();
    register_builtins(&mut registry, &shared);

    let mut config_tmp = None;
    let mut references: Vec<String> = Vec::new();
    if let Some(config) = &config {
        let text = config.render_config_scenario_text();
        if !text.is_empty() {
            let file = tempfile::Builder::new().suffix(".scenario").tempfile().map_err(|e| CliError(e.to_string()))?;
            std::fs::write(file.path(), text).map_err(|e| CliError(e.to_string()))?;
            references.push(file.path().to_string_lossy().into_owned());
            config_tmp = Some(file);
        }
    }
    references.extend(split_references(&options.references).into_iter().map(str::to_string));
    let reference_strs: Vec<&str> = references.iter().map(String::as_str).collect();

    let loaded = load_references(&reference_strs, &registry, reporter.as_ref())?;
    drop(config_tmp);

    {
        let mut rt = lock(&shared);
        rt.scenario = loaded.scenario;
        if let Some(config) = &config {
            if let Some(ms) = config.scenario_action_execution_interval_ms {
                rt.scenario.action_execution_interval = ms as f64 / 1000.0;
            }
            if let Some(max_latency) = config.max_latency {
                rt.scenario.max_latency = Some(max_latency);
            }
            if let Some(max_dropped) = config.max_dropped {
                rt.scenario.max_dropped = Some(max_dropped);
            }
        }
        rt.scenario.overrides = overrides;
        rt.wait_multiplier = env.wait_multiplier;
        rt.dump_dot_dir = env.dump_dot_dir.clone();
    }

    let dispatcher = Dispatcher::new();
    let reactor = BusReactor::new();
    dispatcher.run_on_addition(&shared, &registry);

    let start = Instant::now();
    let tick_interval = Duration::from_secs_f64(lock(&shared).scenario.action_execution_interval.max(0.001));
    loop {
        reactor.drain(&shared, &registry);
        match dispatcher.tick(&shared, &registry) {
            DispatchOutcome::ScenarioDone => break,
            DispatchOutcome::Advanced | DispatchOutcome::Idle => {}
        }
        if start.elapsed() > options.max_wall_clock {
            return Err(CliError(format!("scenario did not finish within {:?}", options.max_wall_clock)));
        }
        thread::sleep(tick_interval);
    }

    let mut fatal = false;
    while let Ok(report) = rx.try_recv() {
        if env.flags.is_fatal(report.level) {
            fatal = true;
        }
    }
    Ok(!fatal)
}
