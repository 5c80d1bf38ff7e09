#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Online local search over routes and assignments already in flight.

use ambulance_dispatch_core::{AmbulanceId, AmbulanceStatus, Command, Event, LocationId};
use ambulance_dispatch_world::{self as world, query, Ambulance, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Tuning of the route refiner.
#[derive(Clone, Debug)]
pub struct RefinerConfig {
    /// Per-tick probability that an ambulance's route is reconsidered.
    pub mutation_rate: f64,
    /// Per-tick probability that a pair of ambulances is compared.
    pub crossbreed_rate: f64,
    /// Random waypoints tried before giving up on a reroute.
    pub waypoint_attempts: usize,
    /// Largest accepted ratio between a detour and the direct route.
    pub detour_tolerance: f64,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            mutation_rate: 0.05,
            crossbreed_rate: 0.05,
            waypoint_attempts: 3,
            detour_tolerance: 1.2,
        }
    }
}

/// Perturbs routes through random waypoints and trades assignments between neighbours.
#[derive(Debug)]
pub struct RouteRefiner {
    config: RefinerConfig,
    rng: ChaCha8Rng,
}

impl RouteRefiner {
    /// Creates a refiner with its own random stream.
    #[must_use]
    pub fn new(config: RefinerConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Active tuning.
    #[must_use]
    pub fn config(&self) -> &RefinerConfig {
        &self.config
    }

    /// Proposes a detour through a random waypoint for a moving ambulance.
    ///
    /// Returns [`Command::Reroute`] for the first detour within the tolerance
    /// whose path differs from the direct route. When no detour qualifies, or
    /// the destination became unreachable, the ambulance is released instead;
    /// transports are never released and keep their route.
    pub fn reroute(&mut self, world: &World, ambulance: AmbulanceId) -> Option<Command> {
        let unit = query::ambulance(world, ambulance)?;
        if !matches!(
            unit.status(),
            AmbulanceStatus::Responding | AmbulanceStatus::Transporting | AmbulanceStatus::Returning
        ) {
            return None;
        }
        let destination = *unit.path().back()?;
        let current = unit.location();
        let network = query::network(world);

        let baseline = network.shortest_path(current, destination);
        if let Some(direct) = baseline.path() {
            let budget = baseline.cost() * self.config.detour_tolerance;
            for _ in 0..self.config.waypoint_attempts {
                let locations = network.locations();
                let waypoint = locations[self.rng.gen_range(0..locations.len())].id();
                if waypoint == current || waypoint == destination {
                    continue;
                }

                let first = network.shortest_path(current, waypoint);
                let second = network.shortest_path(waypoint, destination);
                let (Some(head), Some(tail)) = (first.path(), second.path()) else {
                    continue;
                };
                let cost = first.cost() + second.cost();
                let mut path = head.to_vec();
                path.extend_from_slice(&tail[1..]);
                if cost <= budget && path != direct {
                    tracing::debug!(
                        ambulance = ambulance.get(),
                        waypoint = waypoint.get(),
                        cost,
                        "detour accepted"
                    );
                    return Some(Command::Reroute {
                        ambulance,
                        path,
                        cost,
                    });
                }
            }
        }

        if unit.status() == AmbulanceStatus::Transporting {
            return None;
        }
        tracing::debug!(ambulance = ambulance.get(), "no detour found; releasing");
        Some(Command::Release { ambulance })
    }

    /// Proposes a swap or transfer between two neighbouring ambulances.
    ///
    /// Only responding ambulances carry tradable assignments. A swap needs both
    /// to be responding; a transfer needs the other to be available. Either is
    /// proposed only when it strictly lowers the combined time to deliver the
    /// patients to their nearest hospitals.
    #[must_use]
    pub fn swap_or_transfer(
        &self,
        world: &World,
        first: AmbulanceId,
        second: AmbulanceId,
    ) -> Option<Command> {
        if first == second {
            return None;
        }
        let a = query::ambulance(world, first)?;
        let b = query::ambulance(world, second)?;
        let network = query::network(world);
        if a.location() != b.location() && !network.are_adjacent(a.location(), b.location()) {
            return None;
        }

        match (call_site(world, a), call_site(world, b)) {
            (Some(site_a), Some(site_b)) => {
                let current = eta(world, a.location(), site_a) + eta(world, b.location(), site_b);
                let swapped = eta(world, a.location(), site_b) + eta(world, b.location(), site_a);
                (swapped < current).then_some(Command::SwapAssignments { first, second })
            }
            (Some(site), None) if b.status() == AmbulanceStatus::Available => {
                (eta(world, b.location(), site) < eta(world, a.location(), site)).then_some(
                    Command::TransferAssignment {
                        from: first,
                        to: second,
                    },
                )
            }
            (None, Some(site)) if a.status() == AmbulanceStatus::Available => {
                (eta(world, a.location(), site) < eta(world, b.location(), site)).then_some(
                    Command::TransferAssignment {
                        from: second,
                        to: first,
                    },
                )
            }
            _ => None,
        }
    }

    /// Runs one refinement pass, applying every proposal immediately.
    pub fn handle(&mut self, world: &mut World, out_events: &mut Vec<Event>) {
        let fleet: Vec<AmbulanceId> = query::ambulances(world)
            .iter()
            .map(Ambulance::id)
            .collect();

        for &ambulance in &fleet {
            if self.rng.gen::<f64>() < self.config.mutation_rate {
                if let Some(command) = self.reroute(world, ambulance) {
                    world::apply(world, command, out_events);
                }
            }
        }

        for (index, &first) in fleet.iter().enumerate() {
            for &second in &fleet[index + 1..] {
                if self.rng.gen::<f64>() < self.config.crossbreed_rate {
                    if let Some(command) = self.swap_or_transfer(world, first, second) {
                        world::apply(world, command, out_events);
                    }
                }
            }
        }
    }
}

fn call_site(world: &World, ambulance: &Ambulance) -> Option<LocationId> {
    if ambulance.status() != AmbulanceStatus::Responding {
        return None;
    }
    let emergency = query::assignment_of(world, ambulance.id())?;
    query::emergency(world, emergency).map(|emergency| emergency.location())
}

/// Time to reach `site` from `from` and then the hospital nearest to `site`.
fn eta(world: &World, from: LocationId, site: LocationId) -> f64 {
    let approach = query::network(world).shortest_path(from, site).cost();
    let delivery = query::nearest_hospital(world, site).map_or(f64::INFINITY, |(_, route)| route.cost());
    approach + delivery
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambulance_dispatch_world::{layouts, WorldConfig};

    #[test]
    fn eta_includes_the_hospital_leg() {
        let network = layouts::reference_district().expect("district builds");
        let world = World::with_config(
            network,
            WorldConfig {
                auto_dispatch: false,
                ..WorldConfig::default()
            },
        )
        .expect("world builds");
        assert_eq!(eta(&world, LocationId::new(0), LocationId::new(3)), 7.0);
        assert_eq!(eta(&world, LocationId::new(0), LocationId::new(6)), 17.0);
    }

    #[test]
    fn idle_ambulances_are_left_alone() {
        let network = layouts::reference_district().expect("district builds");
        let world = World::new(network, 2, 0).expect("world builds");
        let mut refiner = RouteRefiner::new(RefinerConfig::default(), 0);
        assert_eq!(refiner.reroute(&world, AmbulanceId::new(0)), None);
        assert_eq!(
            refiner.swap_or_transfer(&world, AmbulanceId::new(0), AmbulanceId::new(1)),
            None
        );
    }
}
