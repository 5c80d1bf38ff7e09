#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative dispatch world: ambulances, emergencies, and the tick loop.
//!
//! The [`World`] owns the road network, every ambulance and emergency, and
//! the assignment relation between them. Systems inspect it through the
//! [`query`] module and mutate it exclusively through [`apply`], the
//! assignment entry point [`World::assign`], and the tick drivers.

use std::collections::VecDeque;

use ambulance_dispatch_core::{
    AmbulanceId, AmbulanceStatus, Assignment, Command, DispatchError, EmergencyId,
    EmergencyStatus, Event, LocationCategory, LocationId, Severity,
};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng, SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

pub mod layouts;
mod ledger;
pub mod network;
mod policy;

pub use network::{
    Congestion, NetworkError, RoadNetwork, RoadNetworkConfig, Route, TravelMode,
};
pub use policy::{AssignmentPolicy, GreedyDispatch, SpawnPolicy, UniformSpawn};

use ledger::AssignmentLedger;

const SPAWN_STREAM: u64 = 1;
const MOVEMENT_STREAM: u64 = 2;

/// Tunable parameters of the dispatch world.
#[derive(Clone, Debug)]
pub struct WorldConfig {
    /// Ambulances stationed at every base.
    pub ambulances_per_base: u32,
    /// Seed for spawning and movement randomness.
    pub seed: u64,
    /// Ticks a pending emergency may wait before it expires.
    pub max_lifespan: u64,
    /// Probability that the reported severity differs from the true one.
    pub report_noise: f64,
    /// Relative frequency of severities 1 through 5.
    pub severity_weights: [u32; 5],
    /// Upper bound of the extra delay fraction applied to each traversed road.
    pub delay_bound: f64,
    /// Whether [`World::step`] runs the greedy dispatcher.
    pub auto_dispatch: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ambulances_per_base: 1,
            seed: 0,
            max_lifespan: 25,
            report_noise: 0.3,
            severity_weights: [10, 20, 30, 25, 15],
            delay_bound: 0.5,
            auto_dispatch: true,
        }
    }
}

/// Reasons a world cannot be constructed.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// No ambulances would be stationed.
    #[error("at least one ambulance per base is required")]
    NoAmbulances,
    /// The network has no ambulance base.
    #[error("road network has no ambulance base")]
    NoBases,
    /// The network has no hospital.
    #[error("road network has no hospital")]
    NoHospitals,
    /// The network has no incident site or intersection.
    #[error("road network has no location where emergencies may occur")]
    NoSpawnLocations,
    /// A numeric parameter lies outside its valid range.
    #[error("parameter `{name}` is out of range")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
    },
    /// The severity weights are all zero.
    #[error("severity weights must contain a positive entry")]
    InvalidSeverityWeights,
    /// A location where emergencies occur cannot reach any hospital.
    #[error("location {location:?} cannot reach any hospital")]
    UnreachableHospital {
        /// Spawn location without a hospital route.
        location: LocationId,
    },
}

/// Responder unit moving across the road network.
#[derive(Clone, Debug)]
pub struct Ambulance {
    id: AmbulanceId,
    home: LocationId,
    location: LocationId,
    status: AmbulanceStatus,
    destination: Option<LocationId>,
    path: VecDeque<LocationId>,
    remaining: f64,
    distance: f64,
}

impl Ambulance {
    fn stationed(id: AmbulanceId, home: LocationId) -> Self {
        Self {
            id,
            home,
            location: home,
            status: AmbulanceStatus::Available,
            destination: None,
            path: VecDeque::new(),
            remaining: 0.0,
            distance: 0.0,
        }
    }

    /// Identifier of the ambulance.
    #[must_use]
    pub const fn id(&self) -> AmbulanceId {
        self.id
    }

    /// Base the ambulance returns to after a call.
    #[must_use]
    pub const fn home(&self) -> LocationId {
        self.home
    }

    /// Location the ambulance currently occupies.
    #[must_use]
    pub const fn location(&self) -> LocationId {
        self.location
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> AmbulanceStatus {
        self.status
    }

    /// Location the ambulance is heading to, if any.
    #[must_use]
    pub const fn destination(&self) -> Option<LocationId> {
        self.destination
    }

    /// Remaining route; the first entry is the current location.
    #[must_use]
    pub fn path(&self) -> &VecDeque<LocationId> {
        &self.path
    }

    /// Estimated travel time left until the destination.
    #[must_use]
    pub const fn remaining(&self) -> f64 {
        self.remaining
    }

    /// Nominal distance covered since the run started.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    fn travel(&mut self, status: AmbulanceStatus, path: Vec<LocationId>, cost: f64) {
        self.status = status;
        self.destination = path.last().copied();
        self.path = path.into();
        self.remaining = cost;
    }

    fn park(&mut self) {
        self.status = AmbulanceStatus::Available;
        self.destination = None;
        self.path.clear();
        self.remaining = 0.0;
    }
}

/// Incident awaiting or receiving service.
#[derive(Clone, Debug)]
pub struct Emergency {
    id: EmergencyId,
    location: LocationId,
    severity: Severity,
    reported: Severity,
    spawn_tick: u64,
    dispatch_tick: Option<u64>,
    arrival_tick: Option<u64>,
    completion_tick: Option<u64>,
    status: EmergencyStatus,
}

impl Emergency {
    /// Identifier of the emergency.
    #[must_use]
    pub const fn id(&self) -> EmergencyId {
        self.id
    }

    /// Location where the emergency occurred.
    #[must_use]
    pub const fn location(&self) -> LocationId {
        self.location
    }

    /// True severity of the incident.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Severity reported by the caller; dispatch decisions rely on this value.
    #[must_use]
    pub const fn reported(&self) -> Severity {
        self.reported
    }

    /// Tick at which the emergency occurred.
    #[must_use]
    pub const fn spawn_tick(&self) -> u64 {
        self.spawn_tick
    }

    /// Tick of the first dispatch that is still in effect.
    #[must_use]
    pub const fn dispatch_tick(&self) -> Option<u64> {
        self.dispatch_tick
    }

    /// Tick at which an ambulance reached the incident.
    #[must_use]
    pub const fn arrival_tick(&self) -> Option<u64> {
        self.arrival_tick
    }

    /// Tick at which the patient reached a hospital.
    #[must_use]
    pub const fn completion_tick(&self) -> Option<u64> {
        self.completion_tick
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> EmergencyStatus {
        self.status
    }

    fn reopen(&mut self) {
        self.status = EmergencyStatus::Pending;
        self.dispatch_tick = None;
        self.arrival_tick = None;
    }
}

/// Authoritative state of the dispatch simulation.
#[derive(Clone, Debug)]
pub struct World {
    network: RoadNetwork,
    config: WorldConfig,
    ambulances: Vec<Ambulance>,
    active: Vec<Emergency>,
    completed: Vec<Emergency>,
    expired: Vec<Emergency>,
    ledger: AssignmentLedger,
    spawn_candidates: Vec<LocationId>,
    severity_table: WeightedIndex<u32>,
    spawn_rng: ChaCha8Rng,
    movement_rng: ChaCha8Rng,
    next_emergency: u32,
    tick: u64,
}

impl World {
    /// Creates a world with default tuning and the given fleet size and seed.
    pub fn new(
        network: RoadNetwork,
        ambulances_per_base: u32,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        Self::with_config(
            network,
            WorldConfig {
                ambulances_per_base,
                seed,
                ..WorldConfig::default()
            },
        )
    }

    /// Creates a world with explicit tuning.
    pub fn with_config(network: RoadNetwork, config: WorldConfig) -> Result<Self, ConfigError> {
        if config.ambulances_per_base == 0 {
            return Err(ConfigError::NoAmbulances);
        }
        if !(0.0..=1.0).contains(&config.report_noise) {
            return Err(ConfigError::InvalidParameter {
                name: "report_noise",
            });
        }
        if !config.delay_bound.is_finite() || config.delay_bound < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "delay_bound",
            });
        }
        let severity_table = WeightedIndex::new(config.severity_weights)
            .map_err(|_| ConfigError::InvalidSeverityWeights)?;

        let bases: Vec<LocationId> = network
            .locations_of(LocationCategory::Base)
            .map(|location| location.id())
            .collect();
        if bases.is_empty() {
            return Err(ConfigError::NoBases);
        }
        let hospitals: Vec<LocationId> = network
            .locations_of(LocationCategory::Hospital)
            .map(|location| location.id())
            .collect();
        if hospitals.is_empty() {
            return Err(ConfigError::NoHospitals);
        }
        let spawn_candidates: Vec<LocationId> = network
            .locations()
            .iter()
            .filter(|location| location.category().accepts_emergencies())
            .map(|location| location.id())
            .collect();
        if spawn_candidates.is_empty() {
            return Err(ConfigError::NoSpawnLocations);
        }
        for &location in &spawn_candidates {
            let reachable = hospitals
                .iter()
                .any(|&hospital| network.shortest_path(location, hospital).is_reachable());
            if !reachable {
                return Err(ConfigError::UnreachableHospital { location });
            }
        }

        let ambulances = bases
            .iter()
            .flat_map(|&base| std::iter::repeat(base).take(config.ambulances_per_base as usize))
            .enumerate()
            .map(|(index, base)| Ambulance::stationed(AmbulanceId::new(index as u32), base))
            .collect();

        let mut spawn_rng = ChaCha8Rng::seed_from_u64(config.seed);
        spawn_rng.set_stream(SPAWN_STREAM);
        let mut movement_rng = ChaCha8Rng::seed_from_u64(config.seed);
        movement_rng.set_stream(MOVEMENT_STREAM);

        Ok(Self {
            network,
            config,
            ambulances,
            active: Vec::new(),
            completed: Vec::new(),
            expired: Vec::new(),
            ledger: AssignmentLedger::default(),
            spawn_candidates,
            severity_table,
            spawn_rng,
            movement_rng,
            next_emergency: 0,
            tick: 0,
        })
    }

    /// Mutable access to the road network for congestion between ticks.
    pub fn network_mut(&mut self) -> &mut RoadNetwork {
        &mut self.network
    }

    /// Spawns an emergency at a uniformly chosen eligible location.
    pub fn spawn_emergency(&mut self, out_events: &mut Vec<Event>) -> Option<EmergencyId> {
        self.spawn_emergency_with(&mut UniformSpawn, out_events)
    }

    /// Spawns an emergency at a location chosen by `policy`.
    pub fn spawn_emergency_with<P>(
        &mut self,
        policy: &mut P,
        out_events: &mut Vec<Event>,
    ) -> Option<EmergencyId>
    where
        P: SpawnPolicy + ?Sized,
    {
        let location = policy.select(
            &self.network,
            &self.spawn_candidates,
            self.tick,
            &mut self.spawn_rng,
        )?;
        if !self.spawn_candidates.contains(&location) {
            tracing::warn!(
                location = location.get(),
                "spawn policy chose an ineligible location"
            );
            return None;
        }

        let grade = self.severity_table.sample(&mut self.spawn_rng) + 1;
        let severity = Severity::new(grade as u8).unwrap_or(Severity::MIN);
        let reported = self.observe(severity);

        let id = EmergencyId::new(self.next_emergency);
        self.next_emergency += 1;
        self.active.push(Emergency {
            id,
            location,
            severity,
            reported,
            spawn_tick: self.tick,
            dispatch_tick: None,
            arrival_tick: None,
            completion_tick: None,
            status: EmergencyStatus::Pending,
        });
        tracing::debug!(
            emergency = id.get(),
            location = location.get(),
            severity = severity.get(),
            reported = reported.get(),
            "emergency spawned"
        );
        out_events.push(Event::EmergencySpawned {
            emergency: id,
            location,
            reported,
        });
        Some(id)
    }

    /// Dispatches each listed ambulance toward its paired emergency.
    ///
    /// Pairs are processed in order. Callers must list each ambulance and
    /// each emergency at most once; rejected pairs are reported through
    /// [`Event::DispatchRejected`] and leave the world untouched.
    pub fn assign(&mut self, pairs: &[Assignment], out_events: &mut Vec<Event>) {
        for pair in pairs {
            if let Err(reason) = self.dispatch(pair.ambulance, pair.emergency, out_events) {
                tracing::warn!(
                    ambulance = pair.ambulance.get(),
                    emergency = pair.emergency.get(),
                    %reason,
                    "dispatch rejected"
                );
                out_events.push(Event::DispatchRejected {
                    ambulance: pair.ambulance,
                    emergency: pair.emergency,
                    reason,
                });
            }
        }
    }

    /// Advances the clock one tick, dispatching greedily when enabled.
    pub fn step(&mut self, out_events: &mut Vec<Event>) {
        self.begin_tick(out_events);
        if self.config.auto_dispatch {
            let pairs = GreedyDispatch.decide(self);
            self.assign(&pairs, out_events);
        }
        self.advance_ambulances(out_events);
    }

    /// Advances the clock one tick, dispatching whatever `policy` decides.
    pub fn step_with<P>(&mut self, policy: &mut P, out_events: &mut Vec<Event>)
    where
        P: AssignmentPolicy + ?Sized,
    {
        self.begin_tick(out_events);
        let pairs = policy.decide(self);
        self.assign(&pairs, out_events);
        self.advance_ambulances(out_events);
    }

    fn observe(&mut self, severity: Severity) -> Severity {
        if !self.spawn_rng.gen_bool(self.config.report_noise) {
            return severity;
        }
        let grade = severity.get();
        let upward = self.spawn_rng.gen_bool(0.5);
        let shifted = match (upward, grade) {
            (true, grade) if grade < Severity::MAX.get() => grade + 1,
            (false, grade) if grade > Severity::MIN.get() => grade - 1,
            (true, grade) => grade - 1,
            (false, grade) => grade + 1,
        };
        Severity::new(shifted).unwrap_or(severity)
    }

    fn begin_tick(&mut self, out_events: &mut Vec<Event>) {
        self.tick = self.tick.saturating_add(1);
        out_events.push(Event::TimeAdvanced { tick: self.tick });

        let tick = self.tick;
        let lifespan = self.config.max_lifespan;
        let (stale, active): (Vec<Emergency>, Vec<Emergency>) =
            self.active.drain(..).partition(|emergency| {
                emergency.status == EmergencyStatus::Pending
                    && tick.saturating_sub(emergency.spawn_tick) > lifespan
            });
        self.active = active;

        for mut emergency in stale {
            emergency.status = EmergencyStatus::Expired;
            tracing::debug!(emergency = emergency.id.get(), tick, "emergency expired");
            out_events.push(Event::EmergencyExpired {
                emergency: emergency.id,
            });
            self.expired.push(emergency);
        }
    }

    fn dispatch(
        &mut self,
        ambulance: AmbulanceId,
        emergency: EmergencyId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), DispatchError> {
        let unit = self.ambulance_index(ambulance)?;
        let call = self.open_emergency_index(emergency)?;
        if !self.ambulances[unit].status.is_preemptable() {
            return Err(DispatchError::IllegalTransition);
        }
        if self.ledger.emergency_of(ambulance) == Some(emergency) {
            return Ok(());
        }

        let route = self
            .network
            .shortest_path(self.ambulances[unit].location, self.active[call].location);
        let (Some(path), cost) = route.into_parts() else {
            return Err(DispatchError::Unreachable);
        };

        let (previous_emergency, previous_ambulance) = self.ledger.bind(ambulance, emergency);
        if let Some(previous) = previous_emergency {
            if let Some(index) = self.emergency_position(previous) {
                self.active[index].reopen();
            }
        }
        if let Some(previous) = previous_ambulance {
            let index = previous.get() as usize;
            self.ambulances[index].park();
            out_events.push(Event::AmbulanceAvailable {
                ambulance: previous,
                location: self.ambulances[index].location,
            });
        }

        self.ambulances[unit].travel(AmbulanceStatus::Responding, path, cost);
        let tick = self.tick;
        let call_state = &mut self.active[call];
        call_state.status = EmergencyStatus::Dispatched;
        let _ = call_state.dispatch_tick.get_or_insert(tick);

        tracing::debug!(
            ambulance = ambulance.get(),
            emergency = emergency.get(),
            eta = cost,
            "ambulance dispatched"
        );
        out_events.push(Event::AmbulanceDispatched {
            ambulance,
            emergency,
        });
        Ok(())
    }

    fn advance_ambulances(&mut self, out_events: &mut Vec<Event>) {
        for index in 0..self.ambulances.len() {
            self.advance_ambulance(index, out_events);
        }
        debug_assert!(self.ledger.is_consistent());
    }

    fn advance_ambulance(&mut self, index: usize, out_events: &mut Vec<Event>) {
        let ambulance = &mut self.ambulances[index];
        if ambulance.path.is_empty() {
            return;
        }

        if ambulance.path.len() >= 2 {
            let from = ambulance.path[0];
            let to = ambulance.path[1];
            let weight = self.network.weight(from, to);
            let nominal = if weight > 0.0 { weight } else { 1.0 };
            let delay = self
                .movement_rng
                .gen_range(1.0..=1.0 + self.config.delay_bound);

            let _ = ambulance.path.pop_front();
            ambulance.location = to;
            ambulance.remaining -= nominal * delay;
            ambulance.distance += nominal;
            out_events.push(Event::AmbulanceAdvanced {
                ambulance: ambulance.id,
                from,
                to,
            });
        }

        if ambulance.remaining > 0.0 && ambulance.path.len() > 1 {
            return;
        }

        let skipped: f64 = ambulance
            .path
            .iter()
            .zip(ambulance.path.iter().skip(1))
            .map(|(&from, &to)| self.network.weight(from, to))
            .sum();
        ambulance.distance += skipped;
        if let Some(&last) = ambulance.path.back() {
            ambulance.location = last;
        }
        ambulance.path.clear();
        ambulance.remaining = 0.0;
        self.arrive(index, out_events);
    }

    fn arrive(&mut self, index: usize, out_events: &mut Vec<Event>) {
        let ambulance = self.ambulances[index].id;
        let location = self.ambulances[index].location;

        match self.ambulances[index].status {
            AmbulanceStatus::Responding => {
                let Some(emergency) = self.ledger.emergency_of(ambulance) else {
                    self.make_available(index, out_events);
                    return;
                };
                let tick = self.tick;
                if let Some(call) = self.emergency_position(emergency) {
                    self.active[call].status = EmergencyStatus::Arrived;
                    self.active[call].arrival_tick = Some(tick);
                }
                tracing::debug!(
                    ambulance = ambulance.get(),
                    emergency = emergency.get(),
                    tick,
                    "patient picked up"
                );
                out_events.push(Event::PatientPickedUp {
                    ambulance,
                    emergency,
                });

                match query::nearest_hospital(self, location) {
                    Some((_, route)) => {
                        let (path, cost) = route.into_parts();
                        let path = path.unwrap_or_else(|| vec![location]);
                        self.ambulances[index].travel(AmbulanceStatus::Transporting, path, cost);
                    }
                    None => {
                        tracing::warn!(
                            ambulance = ambulance.get(),
                            location = location.get(),
                            "no hospital reachable; releasing patient"
                        );
                        let _ = self.ledger.unbind_ambulance(ambulance);
                        if let Some(call) = self.emergency_position(emergency) {
                            self.active[call].reopen();
                        }
                        out_events.push(Event::AssignmentReleased {
                            ambulance,
                            emergency: Some(emergency),
                        });
                        self.make_available(index, out_events);
                    }
                }
            }
            AmbulanceStatus::Transporting => {
                if let Some(emergency) = self.ledger.unbind_ambulance(ambulance) {
                    if let Some(call) = self.emergency_position(emergency) {
                        let mut finished = self.active.remove(call);
                        finished.status = EmergencyStatus::Completed;
                        finished.completion_tick = Some(self.tick);
                        self.completed.push(finished);
                    }
                    tracing::debug!(
                        ambulance = ambulance.get(),
                        emergency = emergency.get(),
                        hospital = location.get(),
                        "patient delivered"
                    );
                    out_events.push(Event::PatientDelivered {
                        ambulance,
                        emergency,
                        hospital: location,
                    });
                }
                self.head_home(index, out_events);
            }
            AmbulanceStatus::Returning | AmbulanceStatus::Redeploying => {
                self.make_available(index, out_events);
            }
            AmbulanceStatus::Available => {}
        }
    }

    fn head_home(&mut self, index: usize, out_events: &mut Vec<Event>) {
        let Ambulance {
            id, location, home, ..
        } = self.ambulances[index];
        if location == home {
            self.make_available(index, out_events);
            return;
        }

        match self.network.shortest_path(location, home).into_parts() {
            (Some(path), cost) => {
                self.ambulances[index].travel(AmbulanceStatus::Returning, path, cost);
            }
            (None, _) => {
                tracing::warn!(ambulance = id.get(), "home base unreachable");
                self.make_available(index, out_events);
            }
        }
    }

    fn make_available(&mut self, index: usize, out_events: &mut Vec<Event>) {
        let ambulance = &mut self.ambulances[index];
        ambulance.park();
        out_events.push(Event::AmbulanceAvailable {
            ambulance: ambulance.id,
            location: ambulance.location,
        });
    }

    fn ambulance_index(&self, ambulance: AmbulanceId) -> Result<usize, DispatchError> {
        let index = ambulance.get() as usize;
        if index < self.ambulances.len() {
            Ok(index)
        } else {
            Err(DispatchError::UnknownAmbulance)
        }
    }

    fn emergency_position(&self, emergency: EmergencyId) -> Option<usize> {
        self.active
            .iter()
            .position(|candidate| candidate.id == emergency)
    }

    fn open_emergency_index(&self, emergency: EmergencyId) -> Result<usize, DispatchError> {
        match self.emergency_position(emergency) {
            Some(index) => match self.active[index].status {
                EmergencyStatus::Pending | EmergencyStatus::Dispatched => Ok(index),
                _ => Err(DispatchError::EmergencyClosed),
            },
            None if emergency.get() < self.next_emergency => Err(DispatchError::EmergencyClosed),
            None => Err(DispatchError::UnknownEmergency),
        }
    }

    fn responding_emergency(&self, ambulance: AmbulanceId) -> Result<EmergencyId, DispatchError> {
        let index = self.ambulance_index(ambulance)?;
        if self.ambulances[index].status != AmbulanceStatus::Responding {
            return Err(DispatchError::IllegalTransition);
        }
        self.ledger
            .emergency_of(ambulance)
            .ok_or(DispatchError::IllegalTransition)
    }

    fn neighbours(&self, first: usize, second: usize) -> bool {
        let (a, b) = (self.ambulances[first].location, self.ambulances[second].location);
        a == b || self.network.are_adjacent(a, b)
    }

    fn reroute(
        &mut self,
        ambulance: AmbulanceId,
        path: Vec<LocationId>,
        cost: f64,
    ) -> Result<(), DispatchError> {
        let index = self.ambulance_index(ambulance)?;
        let unit = &self.ambulances[index];
        if unit.status == AmbulanceStatus::Available || unit.path.is_empty() {
            return Err(DispatchError::IllegalTransition);
        }
        if path.iter().any(|location| self.network.location(*location).is_none()) {
            return Err(DispatchError::InvalidLocation);
        }

        let follows_roads = path
            .windows(2)
            .all(|pair| self.network.are_adjacent(pair[0], pair[1]));
        let anchored = path.first() == Some(&unit.location) && path.last() == unit.path.back();
        if !follows_roads || !anchored || !cost.is_finite() || cost < 0.0 {
            return Err(DispatchError::InvalidRoute);
        }

        let unit = &mut self.ambulances[index];
        unit.path = path.into();
        unit.remaining = cost;
        Ok(())
    }

    fn release(
        &mut self,
        ambulance: AmbulanceId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), DispatchError> {
        let index = self.ambulance_index(ambulance)?;
        match self.ambulances[index].status {
            AmbulanceStatus::Transporting | AmbulanceStatus::Available => {
                return Err(DispatchError::IllegalTransition);
            }
            AmbulanceStatus::Responding
            | AmbulanceStatus::Returning
            | AmbulanceStatus::Redeploying => {}
        }

        let emergency = self.ledger.unbind_ambulance(ambulance);
        if let Some(call) = emergency.and_then(|id| self.emergency_position(id)) {
            self.active[call].reopen();
        }
        tracing::debug!(ambulance = ambulance.get(), "assignment released");
        out_events.push(Event::AssignmentReleased {
            ambulance,
            emergency,
        });
        self.make_available(index, out_events);
        Ok(())
    }

    fn swap(&mut self, first: AmbulanceId, second: AmbulanceId) -> Result<(), DispatchError> {
        let _ = self.responding_emergency(first)?;
        let _ = self.responding_emergency(second)?;
        let (a, b) = (first.get() as usize, second.get() as usize);
        if a == b {
            return Err(DispatchError::IllegalTransition);
        }
        if !self.neighbours(a, b) {
            return Err(DispatchError::NotAdjacent);
        }

        let (loc_a, loc_b) = (self.ambulances[a].location, self.ambulances[b].location);
        let mut path_a = self.ambulances[b].path.clone();
        let mut path_b = self.ambulances[a].path.clone();
        let mut remaining_a = self.ambulances[b].remaining;
        let mut remaining_b = self.ambulances[a].remaining;
        if loc_a != loc_b {
            let link = self.network.weight(loc_a, loc_b);
            path_a.push_front(loc_a);
            path_b.push_front(loc_b);
            remaining_a += link;
            remaining_b += link;
        }

        for (index, path, remaining) in [(a, path_a, remaining_a), (b, path_b, remaining_b)] {
            let unit = &mut self.ambulances[index];
            unit.destination = path.back().copied();
            unit.path = path;
            unit.remaining = remaining;
        }
        let _ = self.ledger.swap(first, second);
        Ok(())
    }

    fn transfer(
        &mut self,
        from: AmbulanceId,
        to: AmbulanceId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), DispatchError> {
        let emergency = self.responding_emergency(from)?;
        let receiver = self.ambulance_index(to)?;
        if self.ambulances[receiver].status != AmbulanceStatus::Available {
            return Err(DispatchError::IllegalTransition);
        }
        let donor = from.get() as usize;
        if !self.neighbours(donor, receiver) {
            return Err(DispatchError::NotAdjacent);
        }

        let target = self
            .emergency_position(emergency)
            .map(|call| self.active[call].location)
            .ok_or(DispatchError::UnknownEmergency)?;
        let route = self
            .network
            .shortest_path(self.ambulances[receiver].location, target);
        let (Some(path), cost) = route.into_parts() else {
            return Err(DispatchError::Unreachable);
        };

        let _ = self
            .ledger
            .transfer(from, to)
            .ok_or(DispatchError::IllegalTransition)?;
        self.ambulances[receiver].travel(AmbulanceStatus::Responding, path, cost);
        tracing::debug!(
            from = from.get(),
            to = to.get(),
            emergency = emergency.get(),
            "assignment transferred"
        );
        out_events.push(Event::AssignmentTransferred {
            from,
            to,
            emergency,
        });
        self.make_available(donor, out_events);
        Ok(())
    }

    fn redeploy(
        &mut self,
        ambulance: AmbulanceId,
        destination: LocationId,
    ) -> Result<(), DispatchError> {
        let index = self.ambulance_index(ambulance)?;
        if self.ambulances[index].status != AmbulanceStatus::Available {
            return Err(DispatchError::IllegalTransition);
        }
        if self.network.location(destination).is_none() {
            return Err(DispatchError::InvalidLocation);
        }
        let route = self
            .network
            .shortest_path(self.ambulances[index].location, destination);
        let (Some(path), cost) = route.into_parts() else {
            return Err(DispatchError::Unreachable);
        };
        self.ambulances[index].travel(AmbulanceStatus::Redeploying, path, cost);
        Ok(())
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Rejected commands leave the world untouched and are reported through
/// [`Event::CommandRejected`], or [`Event::DispatchRejected`] for dispatches.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    let (ambulance, outcome) = match command {
        Command::Dispatch {
            ambulance,
            emergency,
        } => {
            world.assign(&[Assignment::new(ambulance, emergency)], out_events);
            return;
        }
        Command::Reroute {
            ambulance,
            path,
            cost,
        } => (
            ambulance,
            world
                .reroute(ambulance, path, cost)
                .map(|()| Some(Event::AmbulanceRerouted { ambulance })),
        ),
        Command::Release { ambulance } => (
            ambulance,
            world.release(ambulance, out_events).map(|()| None),
        ),
        Command::SwapAssignments { first, second } => (
            first,
            world
                .swap(first, second)
                .map(|()| Some(Event::AssignmentsSwapped { first, second })),
        ),
        Command::TransferAssignment { from, to } => {
            (from, world.transfer(from, to, out_events).map(|()| None))
        }
        Command::Redeploy {
            ambulance,
            destination,
        } => (
            ambulance,
            world.redeploy(ambulance, destination).map(|()| {
                Some(Event::AmbulanceRedeploying {
                    ambulance,
                    destination,
                })
            }),
        ),
    };

    match outcome {
        Ok(Some(event)) => {
            tracing::debug!(ambulance = ambulance.get(), ?event, "command applied");
            out_events.push(event);
        }
        Ok(None) => {}
        Err(reason) => {
            tracing::warn!(ambulance = ambulance.get(), %reason, "command rejected");
            out_events.push(Event::CommandRejected { ambulance, reason });
        }
    }
    debug_assert!(world.ledger.is_consistent());
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use ambulance_dispatch_core::{
        AmbulanceId, AmbulanceStatus, EmergencyId, EmergencyStatus, LocationCategory, LocationId,
    };

    use super::{Ambulance, Emergency, RoadNetwork, Route, World, WorldConfig};

    /// Current simulation tick.
    #[must_use]
    pub fn tick(world: &World) -> u64 {
        world.tick
    }

    /// Road network the world routes over.
    #[must_use]
    pub fn network(world: &World) -> &RoadNetwork {
        &world.network
    }

    /// Tuning the world was built with.
    #[must_use]
    pub fn config(world: &World) -> &WorldConfig {
        &world.config
    }

    /// Every ambulance ordered by identifier.
    #[must_use]
    pub fn ambulances(world: &World) -> &[Ambulance] {
        &world.ambulances
    }

    /// Looks up a single ambulance.
    #[must_use]
    pub fn ambulance(world: &World, id: AmbulanceId) -> Option<&Ambulance> {
        world.ambulances.get(id.get() as usize)
    }

    /// Emergencies that are pending, dispatched, or carrying a patient.
    #[must_use]
    pub fn active_emergencies(world: &World) -> &[Emergency] {
        &world.active
    }

    /// Emergencies whose patient reached a hospital, in completion order.
    #[must_use]
    pub fn completed_emergencies(world: &World) -> &[Emergency] {
        &world.completed
    }

    /// Emergencies that aged out without a dispatch, in expiry order.
    #[must_use]
    pub fn expired_emergencies(world: &World) -> &[Emergency] {
        &world.expired
    }

    /// Looks up an emergency in any collection.
    #[must_use]
    pub fn emergency(world: &World, id: EmergencyId) -> Option<&Emergency> {
        world
            .active
            .iter()
            .chain(&world.completed)
            .chain(&world.expired)
            .find(|emergency| emergency.id == id)
    }

    /// Emergency currently assigned to the ambulance.
    #[must_use]
    pub fn assignment_of(world: &World, ambulance: AmbulanceId) -> Option<EmergencyId> {
        world.ledger.emergency_of(ambulance)
    }

    /// Ambulance currently assigned to the emergency.
    #[must_use]
    pub fn responder_of(world: &World, emergency: EmergencyId) -> Option<AmbulanceId> {
        world.ledger.ambulance_of(emergency)
    }

    /// Active emergencies that still wait for a dispatch.
    pub fn pending_emergencies(world: &World) -> impl Iterator<Item = &Emergency> {
        world
            .active
            .iter()
            .filter(|emergency| emergency.status == EmergencyStatus::Pending)
    }

    /// Ambulances idle and free for a dispatch.
    pub fn available_ambulances(world: &World) -> impl Iterator<Item = &Ambulance> {
        world
            .ambulances
            .iter()
            .filter(|ambulance| ambulance.status == AmbulanceStatus::Available)
    }

    /// Locations where emergencies may occur.
    #[must_use]
    pub fn spawn_candidates(world: &World) -> &[LocationId] {
        &world.spawn_candidates
    }

    /// Cheapest hospital route from `from`, preferring lower ids on ties.
    #[must_use]
    pub fn nearest_hospital(world: &World, from: LocationId) -> Option<(LocationId, Route)> {
        world
            .network
            .locations_of(LocationCategory::Hospital)
            .map(|hospital| {
                (
                    hospital.id(),
                    world.network.shortest_path(from, hospital.id()),
                )
            })
            .filter(|(_, route)| route.is_reachable())
            .min_by(|a, b| a.1.cost().total_cmp(&b.1.cost()))
    }
}
