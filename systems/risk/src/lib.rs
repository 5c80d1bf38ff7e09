#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-of-day incident risk: a hotspot oracle, risk-weighted spawning and
//! proactive redeployment of idle ambulances.

mod redeployment;

pub use redeployment::{Redeployment, RedeploymentConfig};

use ambulance_dispatch_core::{LocationId, Position, RiskOracle};
use ambulance_dispatch_world::{RoadNetwork, SpawnPolicy};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng, RngCore,
};

/// Risk reported inside an active hotspot.
pub const HOTSPOT_RISK: f64 = 0.9;
/// Risk reported everywhere else.
pub const BACKGROUND_RISK: f64 = 0.1;

/// Maps a tick onto the `[0, 1)` time of day.
///
/// A zero-length day pins every tick to midnight.
#[must_use]
pub fn normalized_time(tick: u64, day_length_ticks: u64) -> f64 {
    if day_length_ticks == 0 {
        return 0.0;
    }
    (tick % day_length_ticks) as f64 / day_length_ticks as f64
}

/// A location that concentrates incidents during one window of the day.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hotspot {
    /// Inclusive start of the window.
    pub start: f64,
    /// Exclusive end of the window.
    pub end: f64,
    /// Centre of the hotspot.
    pub centre: Position,
}

impl Hotspot {
    /// Creates a hotspot active over `[start, end)`.
    #[must_use]
    pub const fn new(start: f64, end: f64, centre: Position) -> Self {
        Self { start, end, centre }
    }

    fn is_active(&self, normalized_time: f64) -> bool {
        self.start <= normalized_time && normalized_time < self.end
    }
}

/// Risk oracle driven by a fixed table of time-sliced hotspots.
#[derive(Clone, Debug)]
pub struct HotspotRisk {
    hotspots: Vec<Hotspot>,
    radius: f32,
}

impl HotspotRisk {
    /// Creates an oracle from explicit hotspots; points within `radius` of the
    /// active centre are high risk.
    #[must_use]
    pub fn new(hotspots: Vec<Hotspot>, radius: f32) -> Self {
        Self { hotspots, radius }
    }

    /// First hotspot whose window contains `normalized_time`.
    #[must_use]
    pub fn active(&self, normalized_time: f64) -> Option<&Hotspot> {
        self.hotspots
            .iter()
            .find(|hotspot| hotspot.is_active(normalized_time))
    }

    /// Configured hotspots in table order.
    #[must_use]
    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }
}

impl Default for HotspotRisk {
    /// Morning downtown, afternoon highway, evening near the first intersection.
    fn default() -> Self {
        Self::new(
            vec![
                Hotspot::new(0.0, 0.33, Position::new(3.0, 4.0)),
                Hotspot::new(0.33, 0.66, Position::new(10.0, 3.0)),
                Hotspot::new(0.66, 1.01, Position::new(2.0, 2.0)),
            ],
            0.5,
        )
    }
}

impl RiskOracle for HotspotRisk {
    fn predict(&self, x: f32, y: f32, normalized_time: f64) -> f64 {
        match self.active(normalized_time) {
            Some(hotspot) if hotspot.centre.distance(Position::new(x, y)) <= self.radius => {
                HOTSPOT_RISK
            }
            _ => BACKGROUND_RISK,
        }
    }
}

/// Spawn policy that samples locations in proportion to predicted risk.
#[derive(Clone, Debug)]
pub struct RiskWeightedSpawn<R> {
    oracle: R,
    day_length_ticks: u64,
}

impl<R: RiskOracle> RiskWeightedSpawn<R> {
    /// Wraps `oracle`, folding ticks into days of `day_length_ticks`.
    #[must_use]
    pub fn new(oracle: R, day_length_ticks: u64) -> Self {
        Self {
            oracle,
            day_length_ticks,
        }
    }

    /// Oracle consulted for weights.
    #[must_use]
    pub fn oracle(&self) -> &R {
        &self.oracle
    }
}

impl<R: RiskOracle> SpawnPolicy for RiskWeightedSpawn<R> {
    fn select(
        &mut self,
        network: &RoadNetwork,
        candidates: &[LocationId],
        tick: u64,
        rng: &mut dyn RngCore,
    ) -> Option<LocationId> {
        if candidates.is_empty() {
            return None;
        }
        let time = normalized_time(tick, self.day_length_ticks);
        let weights = candidates.iter().map(|&candidate| {
            let risk = network.location(candidate).map_or(0.0, |location| {
                let position = location.position();
                self.oracle.predict(position.x(), position.y(), time)
            });
            if risk.is_finite() && risk > 0.0 {
                risk
            } else {
                0.0
            }
        });

        match WeightedIndex::new(weights) {
            Ok(table) => Some(candidates[table.sample(rng)]),
            Err(error) => {
                tracing::warn!(%error, tick, "risk weights unusable; spawning uniformly");
                Some(candidates[rng.gen_range(0..candidates.len())])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_time_wraps_each_day() {
        assert_eq!(normalized_time(0, 100), 0.0);
        assert_eq!(normalized_time(150, 100), 0.5);
        assert_eq!(normalized_time(42, 0), 0.0);
    }

    #[test]
    fn hotspot_moves_through_the_day() {
        let risk = HotspotRisk::default();
        assert_eq!(risk.predict(3.0, 4.0, 0.1), HOTSPOT_RISK);
        assert_eq!(risk.predict(3.0, 4.0, 0.5), BACKGROUND_RISK);
        assert_eq!(risk.predict(10.0, 3.0, 0.5), HOTSPOT_RISK);
        assert_eq!(risk.predict(2.0, 2.0, 0.99), HOTSPOT_RISK);
        assert_eq!(risk.predict(2.3, 2.3, 0.7), HOTSPOT_RISK);
        assert_eq!(risk.predict(5.0, 5.0, 0.7), BACKGROUND_RISK);
    }

    #[test]
    fn window_boundaries_are_half_open() {
        let risk = HotspotRisk::default();
        assert_eq!(
            risk.active(0.33).map(|hotspot| hotspot.centre),
            Some(Position::new(10.0, 3.0))
        );
        assert_eq!(risk.active(1.5), None);
        assert_eq!(risk.predict(3.0, 4.0, 1.5), BACKGROUND_RISK);
    }
}
