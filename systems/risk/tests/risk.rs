use ambulance_dispatch_core::{AmbulanceId, AmbulanceStatus, Command, Event, LocationId, RiskOracle};
use ambulance_dispatch_system_risk::{
    HotspotRisk, Redeployment, RedeploymentConfig, RiskWeightedSpawn,
};
use ambulance_dispatch_world::{self as world, layouts, query, SpawnPolicy, World, WorldConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const DOWNTOWN: LocationId = LocationId::new(3);
const HIGHWAY: LocationId = LocationId::new(6);

struct Silent;

impl RiskOracle for Silent {
    fn predict(&self, _x: f32, _y: f32, _normalized_time: f64) -> f64 {
        0.0
    }
}

fn district(per_base: u32) -> World {
    let network = layouts::reference_district().expect("district builds");
    World::with_config(
        network,
        WorldConfig {
            ambulances_per_base: per_base,
            auto_dispatch: false,
            ..WorldConfig::default()
        },
    )
    .expect("world builds")
}

#[test]
fn spawns_cluster_on_the_morning_hotspot() {
    let mut world = district(1);
    let mut policy = RiskWeightedSpawn::new(HotspotRisk::default(), 100);
    let mut events = Vec::new();

    let mut downtown = 0;
    for _ in 0..200 {
        let id = world
            .spawn_emergency_with(&mut policy, &mut events)
            .expect("a candidate is always chosen");
        if query::emergency(&world, id).map(|call| call.location()) == Some(DOWNTOWN) {
            downtown += 1;
        }
    }

    assert!(downtown > 100, "only {downtown} of 200 spawns hit downtown");
}

#[test]
fn afternoon_hotspot_moves_to_the_highway() {
    let network = layouts::reference_district().expect("district builds");
    let candidates = [DOWNTOWN, LocationId::new(4), LocationId::new(5), HIGHWAY];
    let mut policy = RiskWeightedSpawn::new(HotspotRisk::default(), 100);
    let mut rng = ChaCha8Rng::seed_from_u64(9);

    let highway = (0..200)
        .filter(|_| policy.select(&network, &candidates, 50, &mut rng) == Some(HIGHWAY))
        .count();

    assert!(highway > 100, "only {highway} of 200 spawns hit the highway");
}

#[test]
fn zero_risk_falls_back_to_uniform_choice() {
    let network = layouts::reference_district().expect("district builds");
    let candidates = [DOWNTOWN, HIGHWAY];
    let mut policy = RiskWeightedSpawn::new(Silent, 100);
    let mut rng = ChaCha8Rng::seed_from_u64(4);

    for tick in 0..20 {
        let chosen = policy
            .select(&network, &candidates, tick, &mut rng)
            .expect("fallback still chooses");
        assert!(candidates.contains(&chosen));
    }
    assert_eq!(policy.select(&network, &[], 0, &mut rng), None);
}

#[test]
fn idle_unit_is_staged_at_the_hotspot() {
    let mut world = district(1);
    let planner = Redeployment::default();
    let oracle = HotspotRisk::default();

    let mut commands = Vec::new();
    planner.plan(&world, &oracle, &mut commands);
    assert_eq!(
        commands,
        vec![Command::Redeploy {
            ambulance: AmbulanceId::new(0),
            destination: DOWNTOWN,
        }]
    );

    let mut events = Vec::new();
    for command in commands {
        world::apply(&mut world, command, &mut events);
    }
    assert!(events.contains(&Event::AmbulanceRedeploying {
        ambulance: AmbulanceId::new(0),
        destination: DOWNTOWN,
    }));

    let mut again = Vec::new();
    planner.plan(&world, &oracle, &mut again);
    assert!(again.is_empty(), "a covered hotspot draws no second unit");

    for _ in 0..3 {
        world.step(&mut events);
    }
    let unit = query::ambulance(&world, AmbulanceId::new(0)).expect("unit exists");
    assert_eq!(unit.status(), AmbulanceStatus::Available);
    assert_eq!(unit.location(), DOWNTOWN);
}

#[test]
fn planner_respects_the_per_tick_cap() {
    let world = district(3);
    let mut commands = Vec::new();

    Redeployment::new(RedeploymentConfig {
        threshold: 0.05,
        max_units_per_tick: 2,
        ..RedeploymentConfig::default()
    })
    .plan(&world, &HotspotRisk::default(), &mut commands);

    assert_eq!(commands.len(), 2);
    assert!(matches!(
        commands[0],
        Command::Redeploy { destination, .. } if destination == DOWNTOWN
    ));
}
