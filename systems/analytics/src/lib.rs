#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Run analytics: event tallies gathered while a simulation runs and a metrics
//! summary captured from the finished world.

mod metrics;

pub use metrics::{RunMetrics, ScoreWeights};

use ambulance_dispatch_core::Event;

/// Counts of notable events observed during a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventTally {
    /// Emergencies that appeared.
    pub spawned: u64,
    /// Successful dispatches, including reassignments.
    pub dispatched: u64,
    /// Dispatches the world refused.
    pub dispatch_rejections: u64,
    /// Patients collected at the incident site.
    pub picked_up: u64,
    /// Patients handed over at a hospital.
    pub delivered: u64,
    /// Emergencies that waited too long.
    pub expired: u64,
    /// Accepted route changes.
    pub reroutes: u64,
    /// Assignments dropped back to pending.
    pub releases: u64,
    /// Accepted assignment swaps.
    pub swaps: u64,
    /// Accepted assignment transfers.
    pub transfers: u64,
    /// Proactive relocations started.
    pub redeployments: u64,
    /// Non-dispatch commands the world refused.
    pub command_rejections: u64,
}

/// Pure analytics system folding world events into an [`EventTally`].
#[derive(Debug, Default)]
pub struct Analytics {
    tally: EventTally,
    last_tick: u64,
}

impl Analytics {
    /// Creates an analytics system with empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn tally(&self) -> &EventTally {
        &self.tally
    }

    /// Most recent tick announced through [`Event::TimeAdvanced`].
    #[must_use]
    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    /// Consumes world events emitted since the previous call.
    pub fn handle(&mut self, events: &[Event]) {
        let tally = &mut self.tally;
        for event in events {
            match event {
                Event::TimeAdvanced { tick } => self.last_tick = *tick,
                Event::EmergencySpawned { .. } => tally.spawned += 1,
                Event::EmergencyExpired { .. } => tally.expired += 1,
                Event::AmbulanceDispatched { .. } => tally.dispatched += 1,
                Event::DispatchRejected { .. } => tally.dispatch_rejections += 1,
                Event::PatientPickedUp { .. } => tally.picked_up += 1,
                Event::PatientDelivered { .. } => tally.delivered += 1,
                Event::AmbulanceRerouted { .. } => tally.reroutes += 1,
                Event::AssignmentReleased { .. } => tally.releases += 1,
                Event::AssignmentsSwapped { .. } => tally.swaps += 1,
                Event::AssignmentTransferred { .. } => tally.transfers += 1,
                Event::AmbulanceRedeploying { .. } => tally.redeployments += 1,
                Event::CommandRejected { .. } => tally.command_rejections += 1,
                Event::AmbulanceAdvanced { .. } | Event::AmbulanceAvailable { .. } => {}
            }
        }
    }
}
