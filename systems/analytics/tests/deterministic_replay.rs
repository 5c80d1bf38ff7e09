use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use ambulance_dispatch_system_analytics::{Analytics, EventTally, RunMetrics};
use ambulance_dispatch_world::{
    layouts::{self, GridSpec},
    World, WorldConfig,
};

#[test]
fn analytics_are_deterministic_for_a_seed() {
    let first = replay(11);
    let second = replay(11);

    assert_eq!(first.tally, second.tally, "event tally diverged");
    assert_eq!(first.metrics, second.metrics, "run metrics diverged");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!(first.tally.spawned > 0);
}

struct ReplayOutcome {
    tally: EventTally,
    metrics: RunMetrics,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tally.hash(&mut hasher);
        self.metrics.total_distance.to_bits().hash(&mut hasher);
        self.metrics.satisfaction_rate.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}

fn replay(seed: u64) -> ReplayOutcome {
    let network = layouts::grid_city(&GridSpec {
        seed,
        ..GridSpec::default()
    })
    .expect("grid builds");
    let mut world = World::with_config(
        network,
        WorldConfig {
            seed,
            ..WorldConfig::default()
        },
    )
    .expect("world builds");
    let mut analytics = Analytics::new();

    for tick in 0..60 {
        let mut events = Vec::new();
        if tick % 2 == 0 {
            let _ = world.spawn_emergency(&mut events);
        }
        world.step(&mut events);
        analytics.handle(&events);
    }

    ReplayOutcome {
        tally: *analytics.tally(),
        metrics: RunMetrics::capture(&world),
    }
}
