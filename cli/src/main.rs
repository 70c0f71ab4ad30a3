//! `slicer` CLI: scenario runs, replay, seed sweeps, config export.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{Scenario, ScenarioKind};
use slicer_core::metrics::SessionMetrics;
use slicer_core::pipeline::{Pipeline, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "slicer", about = "Swipe-to-slice decision core CLI")]
struct Cli {
    /// Pipeline config JSON; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named scenario in batch mode and output metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the full replay log
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Load and replay a previously recorded scenario log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Evaluate one scenario over many seeds in parallel.
    Sweep {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Number of seeds, starting at 0
        #[arg(long, default_value_t = 32)]
        seeds: u64,
        /// Output merged metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the default pipeline config as JSON.
    DumpConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            output,
            save_replay: save_path,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_scenario(scenario, seed, config, output.as_deref(), save_path.as_deref())?;
        }
        Commands::Replay { input, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_replay(&input, config, output.as_deref())?;
        }
        Commands::Sweep {
            scenario,
            seeds,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_sweep(scenario, seeds, config, output.as_deref())?;
        }
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
        }
    }

    Ok(())
}

/// Read a config file (or take the defaults) and reject invalid values up front.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("reading config {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", p.display()))?
        }
        None => PipelineConfig::default(),
    };
    config.validate().context("invalid pipeline config")?;
    Ok(config)
}

fn run_log(log: &ReplayLog, config: PipelineConfig) -> SessionMetrics {
    let mut pipeline = Pipeline::new(config);
    sim::evaluate(log, &mut pipeline)
}

fn report(name: &str, seed: u64, metrics: &SessionMetrics, elapsed_s: f64) -> serde_json::Value {
    serde_json::json!({
        "scenario": name,
        "seed": seed,
        "elapsed_s": elapsed_s,
        "precision": metrics.precision(),
        "hazard_rate": metrics.hazard_rate(),
        "mean_frame_time_us": metrics.mean_frame_time_us(),
        "metrics": metrics,
    })
}

fn print_summary(metrics: &SessionMetrics) {
    println!(
        "Swipes: {} ({} group, {} rapid), {} cooldown frames",
        metrics.swipes, metrics.group_swipes, metrics.rapid_swipes, metrics.cooldown_frames
    );
    println!(
        "Hits: {} targets over {} productive swipes, precision={:.3}, hazard_rate={:.3}",
        metrics.targets_hit,
        metrics.productive_swipes,
        metrics.precision(),
        metrics.hazard_rate()
    );
    println!(
        "Tracks: {} born, {} expired, mean frame time={:.1}us",
        metrics.tracks_born,
        metrics.tracks_expired,
        metrics.mean_frame_time_us()
    );
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    println!("Metrics saved to {}", path.display());
    Ok(())
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    config: PipelineConfig,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!(
        "Running scenario '{}' (seed={}, duration={:.1}s)...",
        scenario.name, seed, scenario.duration
    );

    let start = std::time::Instant::now();
    let log = scenario.record();
    let metrics = run_log(&log, config);
    let elapsed = start.elapsed();

    println!(
        "Done: {} frames, {} objects, elapsed={:.2}s",
        log.frames.len(),
        scenario.objects.len(),
        elapsed.as_secs_f64(),
    );
    print_summary(&metrics);

    // Save replay if requested
    if let Some(rpath) = replay_path {
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }

    if let Some(opath) = output_path {
        write_json(opath, &report(&scenario.name, seed, &metrics, elapsed.as_secs_f64()))?;
    }

    Ok(())
}

fn run_replay(input: &Path, config: PipelineConfig, output_path: Option<&Path>) -> Result<()> {
    let log = load_replay(input).with_context(|| format!("loading replay {}", input.display()))?;
    println!(
        "Replaying '{}' ({} frames)...",
        log.scenario_name,
        log.frames.len()
    );

    let start = std::time::Instant::now();
    let metrics = run_log(&log, config);
    let elapsed = start.elapsed();

    println!("Replay done: elapsed={:.2}s", elapsed.as_secs_f64());
    print_summary(&metrics);

    if let Some(opath) = output_path {
        write_json(opath, &report(&log.scenario_name, log.seed, &metrics, elapsed.as_secs_f64()))?;
    }

    Ok(())
}

fn run_sweep(
    kind: ScenarioKind,
    seeds: u64,
    config: PipelineConfig,
    output_path: Option<&Path>,
) -> Result<()> {
    let start = std::time::Instant::now();

    // Every seed gets its own pipeline; runs share nothing
    let per_seed: Vec<SessionMetrics> = (0..seeds)
        .into_par_iter()
        .map(|seed| {
            let log = Scenario::build(kind, seed).record();
            run_log(&log, config.clone())
        })
        .collect();

    let mut total = SessionMetrics::default();
    for m in &per_seed {
        total.merge(m);
    }
    let elapsed = start.elapsed();
    info!(seeds, elapsed_s = elapsed.as_secs_f64(), "sweep finished");

    let worst = per_seed
        .iter()
        .map(SessionMetrics::precision)
        .fold(f64::INFINITY, f64::min);
    println!(
        "Sweep over {seeds} seeds: elapsed={:.2}s, worst precision={:.3}",
        elapsed.as_secs_f64(),
        worst
    );
    print_summary(&total);

    if let Some(opath) = output_path {
        let mut json = report(&format!("{kind:?}"), 0, &total, elapsed.as_secs_f64());
        json["seeds"] = serde_json::json!(seeds);
        json["per_seed_precision"] =
            serde_json::json!(per_seed.iter().map(SessionMetrics::precision).collect::<Vec<_>>());
        write_json(opath, &json)?;
    }

    Ok(())
}
