use std::collections::BTreeSet;

use ambulance_dispatch_core::{
    AmbulanceId, EmergencyId, Location, LocationCategory, LocationId, OracleError, Position,
    PriorityDomain, PriorityOracle, Severity,
};
use ambulance_dispatch_system_assignment::{
    AssignmentOptimizer, Candidate, GeneticDispatch, Incident, OptimizerConfig, TravelJitter,
};
use ambulance_dispatch_world::{
    layouts::{self, GridSpec},
    query, RoadNetwork, World, WorldConfig,
};

struct Urgency;

impl PriorityOracle for Urgency {
    fn domain(&self) -> PriorityDomain {
        PriorityDomain {
            severity_min: 0.0,
            severity_max: 6.0,
            travel_time_max: 60.0,
        }
    }

    fn score(&self, severity: f64, travel_time: f64) -> Result<f64, OracleError> {
        Ok((severity / 5.0) * 80.0 + (1.0 - travel_time / 60.0) * 20.0)
    }
}

fn fork() -> RoadNetwork {
    let locations = vec![
        Location::new(
            LocationId::new(0),
            LocationCategory::Base,
            Position::new(0.0, 0.0),
            "Base",
        ),
        Location::new(
            LocationId::new(1),
            LocationCategory::IncidentSite,
            Position::new(5.0, 0.0),
            "Near",
        ),
        Location::new(
            LocationId::new(2),
            LocationCategory::IncidentSite,
            Position::new(50.0, 0.0),
            "Far",
        ),
    ];
    RoadNetwork::from_roads(locations, &[(0, 1, 5.0), (0, 2, 50.0)]).expect("valid fork")
}

fn severity(value: u8) -> Severity {
    Severity::new(value).expect("valid severity")
}

#[test]
fn single_ambulance_prefers_the_nearer_incident() {
    let network = fork();
    let config = OptimizerConfig {
        population_size: 20,
        generations: 10,
        ..OptimizerConfig::default()
    };

    let mut near_picks = 0;
    for seed in 0..20 {
        let mut optimizer = AssignmentOptimizer::new(
            vec![Candidate {
                id: AmbulanceId::new(0),
                location: LocationId::new(0),
            }],
            vec![
                Incident {
                    id: EmergencyId::new(0),
                    location: LocationId::new(1),
                    severity: severity(3),
                },
                Incident {
                    id: EmergencyId::new(1),
                    location: LocationId::new(2),
                    severity: severity(3),
                },
            ],
            &network,
            &Urgency,
            seed,
            config.clone(),
        )
        .expect("valid config");
        let assignments = optimizer.solve().expect("search succeeds");
        assert_eq!(assignments.len(), 1);
        if assignments[0].emergency == EmergencyId::new(0) {
            near_picks += 1;
        }
    }
    assert!(near_picks >= 15, "near incident chosen {near_picks} times");
}

fn grid_problem(seed: u64) -> (RoadNetwork, Vec<Candidate>, Vec<Incident>) {
    let network = layouts::grid_city(&GridSpec {
        seed,
        ..GridSpec::default()
    })
    .expect("grid builds");
    let candidates = (0..6)
        .map(|index| Candidate {
            id: AmbulanceId::new(index),
            location: LocationId::new(index * 11 % network.len() as u32),
        })
        .collect();
    let incidents = (0..9)
        .map(|index| Incident {
            id: EmergencyId::new(index),
            location: LocationId::new((index * 7 + 3) % network.len() as u32),
            severity: severity((index % 5 + 1) as u8),
        })
        .collect();
    (network, candidates, incidents)
}

#[test]
fn solutions_never_repeat_an_ambulance() {
    for seed in 0..8 {
        let (network, candidates, incidents) = grid_problem(seed);
        let mut optimizer = AssignmentOptimizer::new(
            candidates,
            incidents,
            &network,
            &Urgency,
            seed,
            OptimizerConfig {
                travel_jitter: Some(TravelJitter::default()),
                ..OptimizerConfig::default()
            },
        )
        .expect("valid config");
        let assignments = optimizer.solve().expect("search succeeds");
        let ambulances: BTreeSet<AmbulanceId> = assignments.iter().map(|a| a.ambulance).collect();
        let emergencies: BTreeSet<EmergencyId> =
            assignments.iter().map(|a| a.emergency).collect();
        assert_eq!(ambulances.len(), assignments.len());
        assert_eq!(emergencies.len(), assignments.len());
        assert!(assignments.len() <= 6);
    }
}

#[test]
fn same_seed_yields_the_same_assignment() {
    let solve = |seed: u64| {
        let (network, candidates, incidents) = grid_problem(3);
        AssignmentOptimizer::new(
            candidates,
            incidents,
            &network,
            &Urgency,
            seed,
            OptimizerConfig {
                travel_jitter: Some(TravelJitter::default()),
                ..OptimizerConfig::default()
            },
        )
        .expect("valid config")
        .solve()
        .expect("search succeeds")
    };
    assert_eq!(solve(41), solve(41));
}

#[test]
fn empty_inputs_produce_no_assignments() {
    let network = fork();
    let mut optimizer = AssignmentOptimizer::new(
        Vec::new(),
        vec![Incident {
            id: EmergencyId::new(0),
            location: LocationId::new(1),
            severity: severity(2),
        }],
        &network,
        &Urgency,
        0,
        OptimizerConfig::default(),
    )
    .expect("valid config");
    assert_eq!(optimizer.solve(), Ok(Vec::new()));
}

#[test]
fn genetic_policy_drives_the_world() {
    let network = layouts::reference_district().expect("district builds");
    let mut world = World::with_config(
        network,
        WorldConfig {
            seed: 8,
            ambulances_per_base: 2,
            auto_dispatch: false,
            ..WorldConfig::default()
        },
    )
    .expect("world builds");
    let mut policy = GeneticDispatch::new(
        Urgency,
        OptimizerConfig {
            population_size: 16,
            generations: 6,
            ..OptimizerConfig::default()
        },
        8,
    );

    let mut events = Vec::new();
    for tick in 0..120 {
        if tick % 4 == 0 {
            let _ = world.spawn_emergency(&mut events);
        }
        world.step_with(&mut policy, &mut events);
    }
    assert!(!query::completed_emergencies(&world).is_empty());
}
