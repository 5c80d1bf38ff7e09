use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ambulance_dispatch_system_analytics::{Analytics, EventTally, RunMetrics, ScoreWeights};
use ambulance_dispatch_system_assignment::{GeneticDispatch, OptimizerConfig};
use ambulance_dispatch_system_priority::{CrispPriority, FuzzyPriority};
use ambulance_dispatch_system_refinement::{RefinerConfig, RouteRefiner};
use ambulance_dispatch_system_risk::{
    HotspotRisk, Redeployment, RedeploymentConfig, RiskWeightedSpawn,
};
use ambulance_dispatch_world::{
    self as world,
    layouts::{self, GridSpec},
    AssignmentPolicy, GreedyDispatch, RoadNetwork, SpawnPolicy, UniformSpawn, World, WorldConfig,
};

use crate::config::{ExperimentConfig, Layout, MapMode, Mode};

const REFINER_STREAM: u64 = 0x5eed_0001;
const OPTIMIZER_STREAM: u64 = 0x5eed_0002;

/// Outcome of one seeded trial.
#[derive(Clone, Debug)]
pub(crate) struct TrialReport {
    pub(crate) seed: u64,
    pub(crate) metrics: RunMetrics,
    pub(crate) tally: EventTally,
    pub(crate) congestion_events: u32,
    pub(crate) score: f64,
}

/// Runs `config.steps` ticks from `seed` and summarises the result.
pub(crate) fn run_trial(config: &ExperimentConfig, seed: u64) -> Result<TrialReport> {
    let network = build_network(config, seed)?;
    let mut world = World::with_config(
        network,
        WorldConfig {
            ambulances_per_base: config.ambulances_per_base,
            seed,
            max_lifespan: config.max_lifespan,
            report_noise: config.report_noise,
            auto_dispatch: false,
            ..WorldConfig::default()
        },
    )
    .context("failed to construct the dispatch world")?;

    let mut policy = dispatch_policy(config, seed);
    let mut spawner: Box<dyn SpawnPolicy> = if config.risk_spawn {
        Box::new(RiskWeightedSpawn::new(
            HotspotRisk::default(),
            config.day_length_ticks,
        ))
    } else {
        Box::new(UniformSpawn)
    };
    let mut refiner = config
        .refine
        .then(|| RouteRefiner::new(RefinerConfig::default(), seed ^ REFINER_STREAM));
    let redeployment = config.redeploy.then(|| {
        Redeployment::new(RedeploymentConfig {
            day_length_ticks: config.day_length_ticks,
            ..RedeploymentConfig::default()
        })
    });
    let risk = HotspotRisk::default();

    let mut driver = ChaCha8Rng::seed_from_u64(seed);
    let mut analytics = Analytics::new();
    let mut congestion_events = 0;
    let mut events = Vec::new();
    let mut commands = Vec::new();

    for _ in 0..config.steps {
        events.clear();

        let arrivals = driver.gen_range(0..=config.max_spawns_per_tick);
        for _ in 0..arrivals {
            let _ = world.spawn_emergency_with(spawner.as_mut(), &mut events);
        }

        if config.map == MapMode::Dynamic && driver.gen::<f64>() < config.traffic_probability {
            if let Some(jam) = world.network_mut().perturb(&mut driver) {
                congestion_events += 1;
                tracing::debug!(
                    from = jam.from.get(),
                    to = jam.to.get(),
                    previous = jam.previous,
                    weight = jam.weight,
                    "road congested"
                );
            }
        }

        if let Some(planner) = &redeployment {
            planner.plan(&world, &risk, &mut commands);
            for command in commands.drain(..) {
                world::apply(&mut world, command, &mut events);
            }
        }

        world.step_with(policy.as_mut(), &mut events);

        if let Some(refiner) = refiner.as_mut() {
            refiner.handle(&mut world, &mut events);
        }

        analytics.handle(&events);
    }

    let metrics = RunMetrics::capture(&world);
    let score = metrics.composite_score(&ScoreWeights::default());
    Ok(TrialReport {
        seed,
        metrics,
        tally: *analytics.tally(),
        congestion_events,
        score,
    })
}

fn build_network(config: &ExperimentConfig, seed: u64) -> Result<RoadNetwork> {
    match config.layout {
        Layout::District => {
            layouts::reference_district().context("failed to build the reference district")
        }
        Layout::Grid => {
            let grid = &config.grid;
            layouts::grid_city(&GridSpec {
                rows: grid.rows,
                columns: grid.columns,
                bases: grid.bases,
                hospitals: grid.hospitals,
                incident_sites: grid.incident_sites,
                seed,
            })
            .context("failed to build the grid city")
        }
    }
}

fn dispatch_policy(config: &ExperimentConfig, seed: u64) -> Box<dyn AssignmentPolicy> {
    let optimizer = OptimizerConfig {
        population_size: config.population_size,
        generations: config.generations,
        ..OptimizerConfig::default()
    };
    let seed = seed ^ OPTIMIZER_STREAM;
    match config.mode {
        Mode::Baseline => Box::new(GreedyDispatch),
        Mode::Ga => Box::new(GeneticDispatch::new(CrispPriority, optimizer, seed)),
        Mode::GaFuzzy => Box::new(GeneticDispatch::new(FuzzyPriority, optimizer, seed)),
    }
}
