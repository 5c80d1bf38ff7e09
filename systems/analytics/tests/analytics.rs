use ambulance_dispatch_core::{EmergencyStatus, Event};
use ambulance_dispatch_system_analytics::{Analytics, RunMetrics, ScoreWeights};
use ambulance_dispatch_world::{layouts, query, World, WorldConfig};

fn district() -> World {
    let network = layouts::reference_district().expect("district builds");
    World::with_config(
        network,
        WorldConfig {
            report_noise: 0.0,
            delay_bound: 0.0,
            ..WorldConfig::default()
        },
    )
    .expect("world builds")
}

#[test]
fn fresh_world_scores_as_fully_satisfied() {
    let world = district();
    let metrics = RunMetrics::capture(&world);

    assert_eq!(metrics.completed + metrics.expired + metrics.active, 0);
    assert_eq!(metrics.satisfaction_rate, 1.0);
    assert_eq!(metrics.mean_response_ticks, None);
    assert_eq!(metrics.total_distance, 0.0);
    assert_eq!(metrics.utilization, 0.0);
    let score = metrics.composite_score(&ScoreWeights::default());
    assert!((score - 0.65).abs() < 1e-12);
}

#[test]
fn served_emergency_is_reflected_in_metrics_and_tally() {
    let mut world = district();
    let mut analytics = Analytics::new();
    let mut events = Vec::new();

    let emergency = world
        .spawn_emergency(&mut events)
        .expect("district accepts emergencies");
    for _ in 0..40 {
        world.step(&mut events);
        if query::completed_emergencies(&world)
            .iter()
            .any(|call| call.id() == emergency)
        {
            break;
        }
    }
    analytics.handle(&events);

    let finished = query::completed_emergencies(&world)
        .iter()
        .find(|call| call.id() == emergency)
        .expect("single emergency is served well within its lifespan");
    assert_eq!(finished.status(), EmergencyStatus::Completed);

    let metrics = RunMetrics::capture(&world);
    assert_eq!(metrics.completed, 1);
    assert_eq!(metrics.satisfaction_rate, 1.0);
    let response = finished
        .arrival_tick()
        .map(|arrival| (arrival - finished.spawn_tick()) as f64);
    assert_eq!(metrics.mean_response_ticks, response);
    assert!(metrics.total_distance > 0.0);

    let tally = analytics.tally();
    assert_eq!(tally.spawned, 1);
    assert_eq!(tally.dispatched, 1);
    assert_eq!(tally.picked_up, 1);
    assert_eq!(tally.delivered, 1);
    assert_eq!(tally.expired, 0);
    assert_eq!(
        analytics.last_tick(),
        events
            .iter()
            .filter(|event| matches!(event, Event::TimeAdvanced { .. }))
            .count() as u64
    );
}

#[test]
fn unattended_emergencies_lower_satisfaction() {
    let network = layouts::reference_district().expect("district builds");
    let mut world = World::with_config(
        network,
        WorldConfig {
            auto_dispatch: false,
            max_lifespan: 2,
            ..WorldConfig::default()
        },
    )
    .expect("world builds");
    let mut events = Vec::new();

    let _ = world.spawn_emergency(&mut events);
    let _ = world.spawn_emergency(&mut events);
    for _ in 0..4 {
        world.step(&mut events);
    }

    let metrics = RunMetrics::capture(&world);
    assert_eq!(metrics.expired, 2);
    assert_eq!(metrics.satisfaction_rate, 0.0);
    assert_eq!(metrics.normalized_response(), 1.0);
}
