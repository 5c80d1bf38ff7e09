#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line experiment driver for the ambulance dispatch simulation.

mod config;
mod experiment;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{ExperimentConfig, Layout, MapMode, Mode};

/// Runs seeded dispatch trials and prints one summary line per trial.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with experiment settings; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dispatch strategy.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Static weights or random congestion.
    #[arg(long, value_enum)]
    map: Option<MapMode>,

    /// Road network to simulate on.
    #[arg(long, value_enum)]
    layout: Option<Layout>,

    /// Ticks per trial.
    #[arg(long)]
    steps: Option<u64>,

    /// Number of trials; trial `n` uses seed `seed_base + n`.
    #[arg(long)]
    trials: Option<u32>,

    /// Seed of the first trial.
    #[arg(long)]
    seed_base: Option<u64>,

    /// Probability of a congestion event per tick on dynamic maps.
    #[arg(long)]
    traffic_probability: Option<f64>,

    /// Run the online route refiner after each tick.
    #[arg(long)]
    refine: bool,

    /// Stage idle ambulances near predicted hotspots.
    #[arg(long)]
    redeploy: bool,

    /// Spawn emergencies in proportion to predicted risk.
    #[arg(long)]
    risk_spawn: bool,
}

impl Cli {
    fn overlay(&self, config: &mut ExperimentConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(map) = self.map {
            config.map = map;
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(trials) = self.trials {
            config.trials = trials;
        }
        if let Some(seed_base) = self.seed_base {
            config.seed_base = seed_base;
        }
        if let Some(probability) = self.traffic_probability {
            config.traffic_probability = probability;
        }
        config.refine |= self.refine;
        config.redeploy |= self.redeploy;
        config.risk_spawn |= self.risk_spawn;
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    cli.overlay(&mut config);
    config.validate()?;
    tracing::info!(?config, "starting experiment");

    let mut total_score = 0.0;
    for trial in 0..config.trials {
        let seed = config.seed_base + u64::from(trial);
        let report = experiment::run_trial(&config, seed)
            .with_context(|| format!("trial {trial} (seed {seed}) failed"))?;
        let metrics = &report.metrics;
        println!(
            "trial {trial} seed {}: completed {} expired {} active {} satisfaction {:.3} \
             response {} distance {:.1} utilization {:.2} congestion {} score {:.4}",
            report.seed,
            metrics.completed,
            metrics.expired,
            metrics.active,
            metrics.satisfaction_rate,
            metrics
                .mean_response_ticks
                .map_or_else(|| "n/a".to_owned(), |mean| format!("{mean:.2}")),
            metrics.total_distance,
            metrics.utilization,
            report.congestion_events,
            report.score,
        );
        tracing::debug!(trial, tally = ?report.tally, "trial events");
        total_score += report.score;
    }

    tracing::info!(
        trials = config.trials,
        mean_score = total_score / f64::from(config.trials),
        "experiment finished"
    );
    Ok(())
}
