use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;

/// Dispatch strategy driving the fleet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Mode {
    /// Most severe report first, nearest free ambulance.
    Baseline,
    /// Genetic search scored by the crisp priority blend.
    Ga,
    /// Genetic search scored by fuzzy inference.
    GaFuzzy,
}

/// Whether road weights change during a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum MapMode {
    /// Weights stay fixed.
    Static,
    /// Random roads congest while the run progresses.
    Dynamic,
}

/// Road network the run takes place on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Layout {
    /// Seven-location reference district.
    District,
    /// Seeded grid city.
    Grid,
}

/// Dimensions of the grid layout.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GridConfig {
    pub(crate) rows: u32,
    pub(crate) columns: u32,
    pub(crate) bases: usize,
    pub(crate) hospitals: usize,
    pub(crate) incident_sites: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            columns: 10,
            bases: 3,
            hospitals: 2,
            incident_sites: 6,
        }
    }
}

/// Everything a batch of trials needs, loadable from TOML.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ExperimentConfig {
    pub(crate) mode: Mode,
    pub(crate) map: MapMode,
    pub(crate) layout: Layout,
    pub(crate) steps: u64,
    pub(crate) trials: u32,
    pub(crate) seed_base: u64,
    pub(crate) max_spawns_per_tick: u32,
    pub(crate) traffic_probability: f64,
    pub(crate) ambulances_per_base: u32,
    pub(crate) max_lifespan: u64,
    pub(crate) report_noise: f64,
    pub(crate) population_size: usize,
    pub(crate) generations: usize,
    pub(crate) refine: bool,
    pub(crate) redeploy: bool,
    pub(crate) risk_spawn: bool,
    pub(crate) day_length_ticks: u64,
    pub(crate) grid: GridConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Baseline,
            map: MapMode::Static,
            layout: Layout::District,
            steps: 100,
            trials: 1,
            seed_base: 1000,
            max_spawns_per_tick: 3,
            traffic_probability: 0.1,
            ambulances_per_base: 1,
            max_lifespan: 25,
            report_noise: 0.3,
            population_size: 50,
            generations: 25,
            refine: false,
            redeploy: false,
            risk_spawn: false,
            day_length_ticks: 100,
            grid: GridConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Reads a TOML file; absent keys keep their defaults.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read experiment config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid experiment config at {}", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse experiment config toml contents")
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(self.trials > 0, "at least one trial is required");
        ensure!(
            (0.0..=1.0).contains(&self.traffic_probability),
            "traffic_probability must lie in [0, 1], got {}",
            self.traffic_probability
        );
        ensure!(
            (0.0..=1.0).contains(&self.report_noise),
            "report_noise must lie in [0, 1], got {}",
            self.report_noise
        );
        ensure!(self.ambulances_per_base > 0, "ambulances_per_base must be positive");
        ensure!(self.population_size > 0, "population_size must be positive");
        Ok(())
    }
}
