//! Decision seams consulted by the world while it advances.

use ambulance_dispatch_core::{AmbulanceStatus, Assignment, LocationId};
use rand::{Rng, RngCore};

use crate::{network::RoadNetwork, query, Ambulance, Emergency, World};

/// Chooses where the next emergency occurs.
pub trait SpawnPolicy {
    /// Picks one of `candidates`, or `None` to skip spawning.
    ///
    /// The world discards selections outside `candidates`.
    fn select(
        &mut self,
        network: &RoadNetwork,
        candidates: &[LocationId],
        tick: u64,
        rng: &mut dyn RngCore,
    ) -> Option<LocationId>;
}

/// Spawns emergencies uniformly across every eligible location.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformSpawn;

impl SpawnPolicy for UniformSpawn {
    fn select(
        &mut self,
        _network: &RoadNetwork,
        candidates: &[LocationId],
        _tick: u64,
        rng: &mut dyn RngCore,
    ) -> Option<LocationId> {
        if candidates.is_empty() {
            None
        } else {
            Some(candidates[rng.gen_range(0..candidates.len())])
        }
    }
}

/// Produces the ambulance/emergency pairs the world should dispatch this tick.
pub trait AssignmentPolicy {
    /// Inspects the world and returns the assignments to apply.
    ///
    /// Each ambulance and each emergency should appear at most once.
    fn decide(&mut self, world: &World) -> Vec<Assignment>;
}

/// Serves the most severe reports first with the nearest free ambulance.
///
/// Free ambulances are those that are available or returning to base.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyDispatch;

impl AssignmentPolicy for GreedyDispatch {
    fn decide(&mut self, world: &World) -> Vec<Assignment> {
        let network = query::network(world);
        let mut emergencies: Vec<&Emergency> = query::pending_emergencies(world).collect();
        emergencies.sort_by(|a, b| {
            b.reported()
                .cmp(&a.reported())
                .then_with(|| a.id().cmp(&b.id()))
        });

        let mut free: Vec<&Ambulance> = query::ambulances(world)
            .iter()
            .filter(|ambulance| {
                matches!(
                    ambulance.status(),
                    AmbulanceStatus::Available | AmbulanceStatus::Returning
                )
            })
            .collect();

        let mut assignments = Vec::new();
        for emergency in emergencies {
            let nearest = free
                .iter()
                .enumerate()
                .map(|(slot, ambulance)| {
                    let cost = network
                        .shortest_path(ambulance.location(), emergency.location())
                        .cost();
                    (slot, cost)
                })
                .filter(|(_, cost)| cost.is_finite())
                .min_by(|a, b| a.1.total_cmp(&b.1));

            if let Some((slot, _)) = nearest {
                let ambulance = free.remove(slot);
                assignments.push(Assignment::new(ambulance.id(), emergency.id()));
            }
        }
        assignments
    }
}
