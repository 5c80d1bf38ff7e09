use std::collections::BTreeSet;

use ambulance_dispatch_core::{AmbulanceStatus, Command, LocationId, RiskOracle};
use ambulance_dispatch_world::{query, World};

use crate::normalized_time;

/// Tuning of the redeployment planner.
#[derive(Clone, Debug)]
pub struct RedeploymentConfig {
    /// Locations must predict strictly more risk than this to attract units.
    pub threshold: f64,
    /// Ticks per simulated day.
    pub day_length_ticks: u64,
    /// Upper bound on redeploy commands emitted per call.
    pub max_units_per_tick: usize,
}

impl Default for RedeploymentConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            day_length_ticks: 100,
            max_units_per_tick: 1,
        }
    }
}

/// Moves idle ambulances toward locations the risk oracle flags.
///
/// Only ambulances parked at their home base are moved, so units already
/// staged near a hotspot stay put until dispatched.
#[derive(Clone, Debug, Default)]
pub struct Redeployment {
    config: RedeploymentConfig,
}

impl Redeployment {
    /// Creates a planner with the supplied tuning.
    #[must_use]
    pub fn new(config: RedeploymentConfig) -> Self {
        Self { config }
    }

    /// Active tuning.
    #[must_use]
    pub fn config(&self) -> &RedeploymentConfig {
        &self.config
    }

    /// Emits [`Command::Redeploy`] for uncovered high-risk locations.
    ///
    /// Targets are visited from riskiest to least risky (lower ids first on
    /// ties). A target counts as covered while any ambulance stands on it or
    /// is redeploying toward it. Each uncovered target draws the nearest idle
    /// ambulance sitting at its base.
    pub fn plan<R>(&self, world: &World, oracle: &R, out: &mut Vec<Command>)
    where
        R: RiskOracle + ?Sized,
    {
        if self.config.max_units_per_tick == 0 {
            return;
        }
        let network = query::network(world);
        let time = normalized_time(query::tick(world), self.config.day_length_ticks);

        let mut targets: Vec<(LocationId, f64)> = query::spawn_candidates(world)
            .iter()
            .filter_map(|&candidate| {
                let position = network.location(candidate)?.position();
                let risk = oracle.predict(position.x(), position.y(), time);
                (risk > self.config.threshold).then_some((candidate, risk))
            })
            .collect();
        targets.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut covered: BTreeSet<LocationId> = query::ambulances(world)
            .iter()
            .flat_map(|ambulance| match ambulance.status() {
                AmbulanceStatus::Redeploying => ambulance.destination(),
                AmbulanceStatus::Available => Some(ambulance.location()),
                _ => None,
            })
            .collect();
        let mut idle: Vec<_> = query::available_ambulances(world)
            .filter(|ambulance| ambulance.location() == ambulance.home())
            .collect();

        let mut issued = 0;
        for (target, risk) in targets {
            if issued == self.config.max_units_per_tick || idle.is_empty() {
                break;
            }
            if !covered.insert(target) {
                continue;
            }
            let nearest = idle
                .iter()
                .enumerate()
                .map(|(slot, ambulance)| {
                    (slot, network.shortest_path(ambulance.location(), target).cost())
                })
                .filter(|(_, cost)| cost.is_finite())
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((slot, cost)) = nearest else {
                continue;
            };

            let ambulance = idle.remove(slot);
            tracing::debug!(
                ambulance = ambulance.id().get(),
                target = target.get(),
                risk,
                cost,
                "redeploying toward predicted hotspot"
            );
            out.push(Command::Redeploy {
                ambulance: ambulance.id(),
                destination: target,
            });
            issued += 1;
        }
    }
}
