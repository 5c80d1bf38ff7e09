use ambulance_dispatch_core::AmbulanceStatus;
use ambulance_dispatch_world::{query, Emergency, World};

const RESPONSE_SCALE: f64 = 10.0;
const DISTANCE_SCALE: f64 = 100.0;

/// Relative importance of each term of [`RunMetrics::composite_score`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    /// Weight of the satisfaction rate.
    pub satisfaction: f64,
    /// Weight of the (inverted) normalised response time.
    pub response: f64,
    /// Weight of the (inverted) normalised distance.
    pub distance: f64,
    /// Weight of fleet utilisation.
    pub utilization: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            satisfaction: 0.5,
            response: 0.25,
            distance: 0.15,
            utilization: 0.10,
        }
    }
}

/// Summary of a run taken from the world at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct RunMetrics {
    /// Emergencies delivered to a hospital.
    pub completed: usize,
    /// Emergencies that expired unserved.
    pub expired: usize,
    /// Emergencies still open.
    pub active: usize,
    /// Completed share of every emergency seen; 1 when none appeared.
    pub satisfaction_rate: f64,
    /// Mean ticks between spawn and ambulance arrival, when any arrived.
    pub mean_response_ticks: Option<f64>,
    /// Nominal distance driven by the whole fleet.
    pub total_distance: f64,
    /// Share of ambulances responding or transporting.
    pub utilization: f64,
}

impl RunMetrics {
    /// Captures the metrics of `world` as it stands.
    #[must_use]
    pub fn capture(world: &World) -> Self {
        let completed = query::completed_emergencies(world);
        let expired = query::expired_emergencies(world);
        let active = query::active_emergencies(world);

        let total = completed.len() + expired.len() + active.len();
        let satisfaction_rate = if total == 0 {
            1.0
        } else {
            completed.len() as f64 / total as f64
        };

        let responses: Vec<u64> = completed
            .iter()
            .chain(active)
            .filter_map(response_ticks)
            .collect();
        let mean_response_ticks = (!responses.is_empty())
            .then(|| responses.iter().sum::<u64>() as f64 / responses.len() as f64);

        let fleet = query::ambulances(world);
        let total_distance: f64 = fleet.iter().map(|ambulance| ambulance.distance()).sum();
        let busy = fleet
            .iter()
            .filter(|ambulance| {
                matches!(
                    ambulance.status(),
                    AmbulanceStatus::Responding | AmbulanceStatus::Transporting
                )
            })
            .count();
        let utilization = busy as f64 / fleet.len().max(1) as f64;

        Self {
            completed: completed.len(),
            expired: expired.len(),
            active: active.len(),
            satisfaction_rate,
            mean_response_ticks,
            total_distance,
            utilization,
        }
    }

    /// Mean response scaled into `[0, 1]`; runs without arrivals count as 1.
    #[must_use]
    pub fn normalized_response(&self) -> f64 {
        self.mean_response_ticks
            .map_or(1.0, |mean| (mean / RESPONSE_SCALE).min(1.0))
    }

    /// Fleet distance scaled into `[0, 1]`.
    #[must_use]
    pub fn normalized_distance(&self) -> f64 {
        (self.total_distance / DISTANCE_SCALE).clamp(0.0, 1.0)
    }

    /// Weighted fitness of the run; higher is better.
    #[must_use]
    pub fn composite_score(&self, weights: &ScoreWeights) -> f64 {
        weights.satisfaction * self.satisfaction_rate
            + weights.response * (1.0 - self.normalized_response())
            + weights.distance * (1.0 - self.normalized_distance())
            + weights.utilization * self.utilization
    }
}

fn response_ticks(emergency: &Emergency) -> Option<u64> {
    emergency
        .arrival_tick()
        .map(|arrival| arrival.saturating_sub(emergency.spawn_tick()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> RunMetrics {
        RunMetrics {
            completed: 3,
            expired: 1,
            active: 0,
            satisfaction_rate: 0.75,
            mean_response_ticks: Some(4.0),
            total_distance: 50.0,
            utilization: 0.5,
        }
    }

    #[test]
    fn composite_blends_every_term() {
        let score = metrics().composite_score(&ScoreWeights::default());
        let expected = 0.5 * 0.75 + 0.25 * 0.6 + 0.15 * 0.5 + 0.10 * 0.5;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_responses_count_as_slowest() {
        let quiet = RunMetrics {
            mean_response_ticks: None,
            ..metrics()
        };
        assert_eq!(quiet.normalized_response(), 1.0);
    }

    #[test]
    fn long_runs_saturate_normalisation() {
        let busy = RunMetrics {
            mean_response_ticks: Some(40.0),
            total_distance: 400.0,
            ..metrics()
        };
        assert_eq!(busy.normalized_response(), 1.0);
        assert_eq!(busy.normalized_distance(), 1.0);
    }
}
