#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the ambulance dispatch engine.
//!
//! This crate defines the vocabulary that connects the authoritative world,
//! the pure decision systems, and the adapters that drive experiments.
//! Systems observe the world through read-only queries and respond with
//! [`Command`] values; the world applies those commands and broadcasts
//! [`Event`] values describing every state transition it performed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier assigned to a location in the road network.
///
/// Location identifiers are dense: the identifier doubles as the row and
/// column index of the location inside the network's weight matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(u32);

impl LocationId {
    /// Creates a new location identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Index of the location inside dense per-location tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier assigned to an ambulance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AmbulanceId(u32);

impl AmbulanceId {
    /// Creates a new ambulance identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an emergency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmergencyId(u32);

impl EmergencyId {
    /// Creates a new emergency identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Role a location plays on the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationCategory {
    /// Ambulance base where units are stationed and return after a call.
    Base,
    /// Hospital that accepts patients.
    Hospital,
    /// Known incident hotspot where emergencies may spawn.
    IncidentSite,
    /// Plain road intersection; emergencies may also spawn here.
    Intersection,
}

impl LocationCategory {
    /// Parses the single-letter category codes used by map files.
    ///
    /// `A` marks an ambulance base, `H` a hospital, `E` an incident site and
    /// `I` an intersection.
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            'A' => Some(Self::Base),
            'H' => Some(Self::Hospital),
            'E' => Some(Self::IncidentSite),
            'I' => Some(Self::Intersection),
            _ => None,
        }
    }

    /// Reports whether emergencies may be spawned at locations of this category.
    #[must_use]
    pub const fn accepts_emergencies(self) -> bool {
        matches!(self, Self::IncidentSite | Self::Intersection)
    }
}

/// Planar coordinates attached to a location for oracle lookups.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    x: f32,
    y: f32,
}

impl Position {
    /// Creates a new position from planar coordinates.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical coordinate.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(self, other: Position) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Immutable description of a single map location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    category: LocationCategory,
    position: Position,
    name: String,
}

impl Location {
    /// Creates a new location description.
    #[must_use]
    pub fn new(
        id: LocationId,
        category: LocationCategory,
        position: Position,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            category,
            position,
            name: name.into(),
        }
    }

    /// Identifier of the location.
    #[must_use]
    pub const fn id(&self) -> LocationId {
        self.id
    }

    /// Role the location plays on the map.
    #[must_use]
    pub const fn category(&self) -> LocationCategory {
        self.category
    }

    /// Coordinates handed to external oracles.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Human readable name of the location.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Severity of an emergency on the 1–5 triage scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Severity(u8);

impl Severity {
    /// Least severe grade.
    pub const MIN: Severity = Severity(1);
    /// Most severe grade.
    pub const MAX: Severity = Severity(5);

    /// Creates a severity, returning `None` outside the 1–5 scale.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value >= Self::MIN.0 && value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Numeric grade of the severity.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Severity expressed as a floating point oracle input.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        f64::from(self.0)
    }
}

/// Lifecycle states of an ambulance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmbulanceStatus {
    /// Idle and free to accept a dispatch.
    Available,
    /// Driving toward an assigned incident.
    Responding,
    /// Carrying a patient to a hospital.
    Transporting,
    /// Driving back to the home base after a drop-off.
    Returning,
    /// Relocating toward a predicted hotspot while idle.
    Redeploying,
}

impl AmbulanceStatus {
    /// Reports whether a new dispatch may interrupt the current activity.
    ///
    /// Only an in-progress transport is protected from preemption.
    #[must_use]
    pub const fn is_preemptable(self) -> bool {
        !matches!(self, Self::Transporting)
    }
}

/// Lifecycle states of an emergency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmergencyStatus {
    /// Waiting for an ambulance.
    Pending,
    /// An ambulance is on its way.
    Dispatched,
    /// The ambulance reached the incident and picked up the patient.
    Arrived,
    /// The patient was delivered to a hospital.
    Completed,
    /// The emergency aged out before any ambulance was dispatched.
    Expired,
}

/// Pairing of an ambulance with the emergency it should serve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Assignment {
    /// Ambulance that receives the dispatch.
    pub ambulance: AmbulanceId,
    /// Emergency the ambulance should serve.
    pub emergency: EmergencyId,
}

impl Assignment {
    /// Creates a new assignment pair.
    #[must_use]
    pub const fn new(ambulance: AmbulanceId, emergency: EmergencyId) -> Self {
        Self {
            ambulance,
            emergency,
        }
    }
}

/// Commands that express all permissible mutations requested by systems.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Dispatches an ambulance toward an emergency.
    Dispatch {
        /// Ambulance that receives the dispatch.
        ambulance: AmbulanceId,
        /// Emergency the ambulance should serve.
        emergency: EmergencyId,
    },
    /// Replaces the remaining route of an ambulance without changing its destination.
    Reroute {
        /// Ambulance whose route should change.
        ambulance: AmbulanceId,
        /// Replacement path starting at the ambulance's current location.
        path: Vec<LocationId>,
        /// Nominal travel time of the replacement path.
        cost: f64,
    },
    /// Drops the ambulance's assignment and destination, leaving it available.
    Release {
        /// Ambulance that should be released.
        ambulance: AmbulanceId,
    },
    /// Exchanges the assignments of two responding ambulances.
    SwapAssignments {
        /// First ambulance participating in the swap.
        first: AmbulanceId,
        /// Second ambulance participating in the swap.
        second: AmbulanceId,
    },
    /// Hands the assignment of a responding ambulance to an available one.
    TransferAssignment {
        /// Ambulance currently holding the assignment.
        from: AmbulanceId,
        /// Available ambulance that takes over.
        to: AmbulanceId,
    },
    /// Moves an idle ambulance toward a location without an assignment.
    Redeploy {
        /// Ambulance that should relocate.
        ambulance: AmbulanceId,
        /// Location the ambulance should wait at.
        destination: LocationId,
    },
}

/// Events broadcast by the world after processing ticks and commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Indicates that the logical clock advanced.
    TimeAdvanced {
        /// Tick reached after advancing.
        tick: u64,
    },
    /// Confirms that a new emergency entered the active set.
    EmergencySpawned {
        /// Identifier allocated to the emergency.
        emergency: EmergencyId,
        /// Location where the emergency occurred.
        location: LocationId,
        /// Severity reported by the caller, possibly noisy.
        reported: Severity,
    },
    /// Reports that a pending emergency aged out without a dispatch.
    EmergencyExpired {
        /// Emergency that expired.
        emergency: EmergencyId,
    },
    /// Confirms that an ambulance was dispatched toward an emergency.
    AmbulanceDispatched {
        /// Ambulance that was dispatched.
        ambulance: AmbulanceId,
        /// Emergency the ambulance serves.
        emergency: EmergencyId,
    },
    /// Reports that a dispatch request was rejected.
    DispatchRejected {
        /// Ambulance named in the request.
        ambulance: AmbulanceId,
        /// Emergency named in the request.
        emergency: EmergencyId,
        /// Specific reason the dispatch failed.
        reason: DispatchError,
    },
    /// Confirms that an ambulance traversed a single road.
    AmbulanceAdvanced {
        /// Ambulance that moved.
        ambulance: AmbulanceId,
        /// Location the ambulance left.
        from: LocationId,
        /// Location the ambulance reached.
        to: LocationId,
    },
    /// Announces that an ambulance reached its incident and loaded the patient.
    PatientPickedUp {
        /// Ambulance that reached the incident.
        ambulance: AmbulanceId,
        /// Emergency whose patient was loaded.
        emergency: EmergencyId,
    },
    /// Announces that a patient was handed over to a hospital.
    PatientDelivered {
        /// Ambulance that delivered the patient.
        ambulance: AmbulanceId,
        /// Emergency that was completed.
        emergency: EmergencyId,
        /// Hospital that received the patient.
        hospital: LocationId,
    },
    /// Announces that an ambulance became available.
    AmbulanceAvailable {
        /// Ambulance that became available.
        ambulance: AmbulanceId,
        /// Location where the ambulance waits.
        location: LocationId,
    },
    /// Confirms that an ambulance received a replacement route.
    AmbulanceRerouted {
        /// Ambulance whose route changed.
        ambulance: AmbulanceId,
    },
    /// Confirms that an ambulance dropped its assignment.
    AssignmentReleased {
        /// Ambulance that was released.
        ambulance: AmbulanceId,
        /// Emergency that returned to the pending pool, if any.
        emergency: Option<EmergencyId>,
    },
    /// Confirms that two ambulances exchanged assignments.
    AssignmentsSwapped {
        /// First ambulance participating in the swap.
        first: AmbulanceId,
        /// Second ambulance participating in the swap.
        second: AmbulanceId,
    },
    /// Confirms that an assignment moved to another ambulance.
    AssignmentTransferred {
        /// Ambulance that gave up the assignment.
        from: AmbulanceId,
        /// Ambulance that took over.
        to: AmbulanceId,
        /// Emergency whose responder changed.
        emergency: EmergencyId,
    },
    /// Confirms that an idle ambulance started relocating.
    AmbulanceRedeploying {
        /// Ambulance that relocates.
        ambulance: AmbulanceId,
        /// Location the ambulance heads to.
        destination: LocationId,
    },
    /// Reports that a non-dispatch command was rejected.
    CommandRejected {
        /// Ambulance named by the command.
        ambulance: AmbulanceId,
        /// Specific reason the command failed.
        reason: DispatchError,
    },
}

/// Reasons a dispatch-level request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum DispatchError {
    /// A location identifier lies outside the road network.
    #[error("location lies outside the road network")]
    InvalidLocation,
    /// No road connects the requested endpoints.
    #[error("destination is unreachable")]
    Unreachable,
    /// The same ambulance was assigned to more than one emergency.
    #[error("ambulance assigned more than once")]
    DuplicateAssignment,
    /// The ambulance's current state does not allow the transition.
    #[error("transition not allowed from the current ambulance state")]
    IllegalTransition,
    /// No ambulance with the provided identifier exists.
    #[error("unknown ambulance")]
    UnknownAmbulance,
    /// No active emergency with the provided identifier exists.
    #[error("unknown emergency")]
    UnknownEmergency,
    /// The emergency already resolved or its patient is already aboard.
    #[error("emergency no longer accepts a responder")]
    EmergencyClosed,
    /// The ambulances are neither co-located nor connected by a road.
    #[error("ambulances are not adjacent")]
    NotAdjacent,
    /// A replacement route does not connect the ambulance with its destination.
    #[error("route does not follow the road network")]
    InvalidRoute,
}

/// Reasons a priority oracle may fail to produce a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum OracleError {
    /// None of the oracle's rules applied to the provided inputs.
    #[error("no inference rule fired")]
    NoRuleFired,
    /// The oracle produced a NaN or infinite score.
    #[error("oracle produced a non-finite score")]
    NonFinite,
}

/// Lower bound of every priority score.
pub const PRIORITY_FLOOR: f64 = 0.0;
/// Upper bound of every priority score.
pub const PRIORITY_CEILING: f64 = 100.0;

/// Input domain a priority oracle declares support for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriorityDomain {
    /// Smallest accepted severity.
    pub severity_min: f64,
    /// Largest accepted severity.
    pub severity_max: f64,
    /// Largest accepted travel time; longer estimates are saturated.
    pub travel_time_max: f64,
}

impl PriorityDomain {
    /// Clamps raw inputs into the declared domain.
    ///
    /// Infinite travel times saturate at `travel_time_max`; NaN inputs map to
    /// the least favourable end of each range.
    #[must_use]
    pub fn clamp(&self, severity: f64, travel_time: f64) -> (f64, f64) {
        let severity = if severity.is_nan() {
            self.severity_min
        } else {
            severity.clamp(self.severity_min, self.severity_max)
        };
        let travel_time = if travel_time.is_nan() {
            self.travel_time_max
        } else {
            travel_time.clamp(0.0, self.travel_time_max)
        };
        (severity, travel_time)
    }
}

/// Maps an emergency's severity and travel time to a dispatch priority.
///
/// Implementations must behave as pure functions: identical inputs yield
/// identical outputs. Scores are expected in
/// [`PRIORITY_FLOOR`]..=[`PRIORITY_CEILING`].
pub trait PriorityOracle: Send + Sync {
    /// Input domain the oracle supports.
    fn domain(&self) -> PriorityDomain;

    /// Scores a (severity, travel time) pair already clamped into [`Self::domain`].
    fn score(&self, severity: f64, travel_time: f64) -> Result<f64, OracleError>;
}

/// Scores a pair through `oracle`, folding failures into `fallback`.
///
/// Inputs are clamped to the oracle's declared domain before the call and the
/// returned score is clamped to the priority range.
pub fn evaluate_priority<O>(oracle: &O, severity: f64, travel_time: f64, fallback: f64) -> f64
where
    O: PriorityOracle + ?Sized,
{
    let (severity, travel_time) = oracle.domain().clamp(severity, travel_time);
    match oracle.score(severity, travel_time) {
        Ok(score) if score.is_finite() => score.clamp(PRIORITY_FLOOR, PRIORITY_CEILING),
        Ok(_) | Err(_) => fallback,
    }
}

/// Predicts the likelihood of an incident near a point at a time of day.
pub trait RiskOracle: Send + Sync {
    /// Risk in `[0, 1]` for coordinates `(x, y)` at `normalized_time` in `[0, 1)`.
    fn predict(&self, x: f32, y: f32, normalized_time: f64) -> f64;
}
