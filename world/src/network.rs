//! Weighted road graph with congestion updates and Dijkstra routing.

use std::{cmp::Ordering, collections::BinaryHeap};

use ambulance_dispatch_core::{Location, LocationCategory, LocationId};
use rand::Rng;
use thiserror::Error;

/// Reasons a road network cannot be built or updated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The network contains no locations.
    #[error("road network has no locations")]
    Empty,
    /// The weight table is not a square matrix matching the location count.
    #[error("weight table must be {expected}x{expected}")]
    DimensionMismatch {
        /// Number of locations the table must cover.
        expected: usize,
    },
    /// A location's identifier does not match its index.
    #[error("location at index {index} carries a mismatched identifier")]
    IdMismatch {
        /// Index of the offending location.
        index: usize,
    },
    /// The table stores different weights for the two directions of a road.
    #[error("road {from:?}-{to:?} is not symmetric")]
    Asymmetric {
        /// First endpoint of the road.
        from: LocationId,
        /// Second endpoint of the road.
        to: LocationId,
    },
    /// A location has a road to itself.
    #[error("location {location:?} has a self loop")]
    NonZeroDiagonal {
        /// Location with the self loop.
        location: LocationId,
    },
    /// A weight is negative, NaN, or infinite, or an update is not positive.
    #[error("road {from:?}-{to:?} has an invalid weight")]
    InvalidWeight {
        /// First endpoint of the road.
        from: LocationId,
        /// Second endpoint of the road.
        to: LocationId,
    },
    /// A location identifier lies outside the network.
    #[error("location {location:?} lies outside the network")]
    InvalidLocation {
        /// Identifier that was out of range.
        location: LocationId,
    },
    /// The original topology has no road between the endpoints.
    #[error("no road connects {from:?} and {to:?}")]
    NoSuchRoad {
        /// First endpoint of the missing road.
        from: LocationId,
        /// Second endpoint of the missing road.
        to: LocationId,
    },
}

/// Result of a shortest-path query.
///
/// Unreachable destinations are reported as a missing path with an infinite
/// cost; callers branch on [`Route::path`] before using the route.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    path: Option<Vec<LocationId>>,
    cost: f64,
}

impl Route {
    /// Sentinel returned when no path connects the endpoints.
    #[must_use]
    pub const fn unreachable() -> Self {
        Self {
            path: None,
            cost: f64::INFINITY,
        }
    }

    fn found(path: Vec<LocationId>, cost: f64) -> Self {
        Self {
            path: Some(path),
            cost,
        }
    }

    /// Ordered locations from the source to the destination, both included.
    #[must_use]
    pub fn path(&self) -> Option<&[LocationId]> {
        self.path.as_deref()
    }

    /// Total travel time of the route, or infinity when unreachable.
    #[must_use]
    pub const fn cost(&self) -> f64 {
        self.cost
    }

    /// Reports whether the destination can be reached.
    #[must_use]
    pub const fn is_reachable(&self) -> bool {
        self.path.is_some()
    }

    /// Splits the route into its path and cost.
    #[must_use]
    pub fn into_parts(self) -> (Option<Vec<LocationId>>, f64) {
        (self.path, self.cost)
    }
}

/// Selects how travel-time queries treat per-road variability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TravelMode {
    /// Costs come straight from the weight matrix.
    Deterministic,
    /// Each traversed road is scaled by a fresh random delay factor.
    Stochastic,
}

/// Tuning knobs for congestion and stochastic travel.
#[derive(Clone, Debug)]
pub struct RoadNetworkConfig {
    /// Upper bound of the extra delay fraction applied per road in stochastic queries.
    pub stochastic_bound: f64,
    /// Weight a congested road may never exceed.
    pub congestion_cap: f64,
    /// Largest whole increment a single congestion event adds to a road.
    pub congestion_step: u32,
}

impl Default for RoadNetworkConfig {
    fn default() -> Self {
        Self {
            stochastic_bound: 0.5,
            congestion_cap: 5.0,
            congestion_step: 3,
        }
    }
}

/// Weight change applied by [`RoadNetwork::perturb`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Congestion {
    /// First endpoint of the congested road.
    pub from: LocationId,
    /// Second endpoint of the congested road.
    pub to: LocationId,
    /// Weight before the congestion event.
    pub previous: f64,
    /// Weight after the congestion event.
    pub weight: f64,
}

/// Undirected road graph over a fixed topology with mutable weights.
#[derive(Clone, Debug)]
pub struct RoadNetwork {
    locations: Vec<Location>,
    weights: Vec<f64>,
    original: Vec<f64>,
    neighbors: Vec<Vec<usize>>,
    roads: Vec<(usize, usize)>,
    config: RoadNetworkConfig,
}

impl RoadNetwork {
    /// Builds a network from locations and a dense symmetric weight table.
    ///
    /// A zero weight marks the absence of a road. The table is validated for
    /// shape, symmetry, a zero diagonal, and finite non-negative weights.
    pub fn new(locations: Vec<Location>, weights: Vec<Vec<f64>>) -> Result<Self, NetworkError> {
        Self::with_config(locations, weights, RoadNetworkConfig::default())
    }

    /// Builds a network with explicit congestion and travel tuning.
    pub fn with_config(
        locations: Vec<Location>,
        weights: Vec<Vec<f64>>,
        config: RoadNetworkConfig,
    ) -> Result<Self, NetworkError> {
        let count = locations.len();
        if count == 0 {
            return Err(NetworkError::Empty);
        }

        for (index, location) in locations.iter().enumerate() {
            if location.id().index() != index {
                return Err(NetworkError::IdMismatch { index });
            }
        }

        if weights.len() != count || weights.iter().any(|row| row.len() != count) {
            return Err(NetworkError::DimensionMismatch { expected: count });
        }

        let mut dense = Vec::with_capacity(count * count);
        for row in &weights {
            dense.extend_from_slice(row);
        }

        let mut neighbors = vec![Vec::new(); count];
        let mut roads = Vec::new();
        for from in 0..count {
            for to in 0..count {
                let weight = dense[from * count + to];
                let (a, b) = (locations[from].id(), locations[to].id());
                if !weight.is_finite() || weight < 0.0 {
                    return Err(NetworkError::InvalidWeight { from: a, to: b });
                }
                if from == to {
                    if weight != 0.0 {
                        return Err(NetworkError::NonZeroDiagonal { location: a });
                    }
                    continue;
                }
                if weight != dense[to * count + from] {
                    return Err(NetworkError::Asymmetric { from: a, to: b });
                }
                if weight > 0.0 {
                    neighbors[from].push(to);
                    if from < to {
                        roads.push((from, to));
                    }
                }
            }
        }

        Ok(Self {
            locations,
            original: dense.clone(),
            weights: dense,
            neighbors,
            roads,
            config,
        })
    }

    /// Builds a network from an edge list of `(from, to, weight)` roads.
    pub fn from_roads(
        locations: Vec<Location>,
        roads: &[(u32, u32, f64)],
    ) -> Result<Self, NetworkError> {
        let count = locations.len();
        let mut weights = vec![vec![0.0; count]; count];
        for &(from, to, weight) in roads {
            let (a, b) = (from as usize, to as usize);
            if a >= count {
                return Err(NetworkError::InvalidLocation {
                    location: LocationId::new(from),
                });
            }
            if b >= count {
                return Err(NetworkError::InvalidLocation {
                    location: LocationId::new(to),
                });
            }
            weights[a][b] = weight;
            weights[b][a] = weight;
        }
        Self::new(locations, weights)
    }

    /// Number of locations in the network.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Reports whether the network has no locations. Always false once built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// All locations ordered by identifier.
    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Looks up a single location.
    #[must_use]
    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(id.index())
    }

    /// Iterates over the locations of one category.
    pub fn locations_of(&self, category: LocationCategory) -> impl Iterator<Item = &Location> {
        self.locations
            .iter()
            .filter(move |location| location.category() == category)
    }

    /// Active tuning of the network.
    #[must_use]
    pub fn config(&self) -> &RoadNetworkConfig {
        &self.config
    }

    /// Current weight of the road between two locations; zero when absent.
    #[must_use]
    pub fn weight(&self, from: LocationId, to: LocationId) -> f64 {
        self.cell(from, to).map_or(0.0, |index| self.weights[index])
    }

    /// Weight of the road at construction time; zero when absent.
    #[must_use]
    pub fn original_weight(&self, from: LocationId, to: LocationId) -> f64 {
        self.cell(from, to).map_or(0.0, |index| self.original[index])
    }

    /// Reports whether a road directly connects the two locations.
    #[must_use]
    pub fn are_adjacent(&self, from: LocationId, to: LocationId) -> bool {
        self.original_weight(from, to) > 0.0
    }

    /// Iterates over every road once as `(from, to, current weight)`.
    pub fn roads(&self) -> impl Iterator<Item = (LocationId, LocationId, f64)> + '_ {
        self.roads.iter().map(move |&(from, to)| {
            (
                self.locations[from].id(),
                self.locations[to].id(),
                self.weights[from * self.len() + to],
            )
        })
    }

    /// Computes the cheapest route between two locations using the current weights.
    #[must_use]
    pub fn shortest_path(&self, from: LocationId, to: LocationId) -> Route {
        let count = self.len();
        let (source, target) = (from.index(), to.index());
        if source >= count || target >= count {
            return Route::unreachable();
        }
        if source == target {
            return Route::found(vec![from], 0.0);
        }

        let mut best = vec![f64::INFINITY; count];
        let mut previous: Vec<Option<usize>> = vec![None; count];
        let mut frontier = BinaryHeap::new();
        best[source] = 0.0;
        frontier.push(Frontier {
            cost: 0.0,
            node: source,
        });

        while let Some(Frontier { cost, node }) = frontier.pop() {
            if cost > best[node] {
                continue;
            }
            if node == target {
                break;
            }

            for &next in &self.neighbors[node] {
                let candidate = cost + self.weights[node * count + next];
                if candidate < best[next] {
                    best[next] = candidate;
                    previous[next] = Some(node);
                    frontier.push(Frontier {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }

        if !best[target].is_finite() {
            return Route::unreachable();
        }

        let mut path = vec![self.locations[target].id()];
        let mut cursor = target;
        while let Some(parent) = previous[cursor] {
            path.push(self.locations[parent].id());
            cursor = parent;
        }
        path.reverse();
        Route::found(path, best[target])
    }

    /// Travel-time query honouring the requested variability model.
    ///
    /// Stochastic queries keep the deterministic path but scale each road by an
    /// independent factor in `[1, 1 + stochastic_bound]`, drawn on every call.
    pub fn travel_time<R>(
        &self,
        from: LocationId,
        to: LocationId,
        mode: TravelMode,
        rng: &mut R,
    ) -> Route
    where
        R: Rng + ?Sized,
    {
        let route = self.shortest_path(from, to);
        if mode == TravelMode::Deterministic {
            return route;
        }

        let (Some(path), _) = route.into_parts() else {
            return Route::unreachable();
        };
        let bound = self.config.stochastic_bound.max(0.0);
        let cost = path
            .windows(2)
            .map(|pair| self.weight(pair[0], pair[1]) * rng.gen_range(1.0..=1.0 + bound))
            .sum();
        Route::found(path, cost)
    }

    /// Replaces the weight of an existing road in both directions.
    pub fn update_weight(
        &mut self,
        from: LocationId,
        to: LocationId,
        weight: f64,
    ) -> Result<(), NetworkError> {
        let index = self
            .cell(from, to)
            .ok_or_else(|| self.out_of_range(from, to))?;
        if self.original[index] <= 0.0 {
            return Err(NetworkError::NoSuchRoad { from, to });
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(NetworkError::InvalidWeight { from, to });
        }

        self.write(from.index(), to.index(), weight);
        Ok(())
    }

    /// Congests a uniformly chosen road by a bounded random increment.
    ///
    /// Returns `None` without touching the network when the chosen road
    /// already sits at the congestion cap.
    pub fn perturb<R>(&mut self, rng: &mut R) -> Option<Congestion>
    where
        R: Rng + ?Sized,
    {
        if self.roads.is_empty() {
            return None;
        }

        let (from, to) = self.roads[rng.gen_range(0..self.roads.len())];
        let previous = self.weights[from * self.len() + to];
        let cap = self.config.congestion_cap;
        if previous >= cap {
            return None;
        }

        let increment = rng.gen_range(1..=self.config.congestion_step.max(1));
        let weight = (previous + f64::from(increment)).min(cap);
        self.write(from, to, weight);

        let congestion = Congestion {
            from: self.locations[from].id(),
            to: self.locations[to].id(),
            previous,
            weight,
        };
        tracing::debug!(
            from = congestion.from.get(),
            to = congestion.to.get(),
            previous,
            weight,
            "road congested"
        );
        Some(congestion)
    }

    /// Restores every weight to its construction-time value.
    pub fn reset(&mut self) {
        self.weights.copy_from_slice(&self.original);
    }

    fn write(&mut self, from: usize, to: usize, weight: f64) {
        let count = self.len();
        self.weights[from * count + to] = weight;
        self.weights[to * count + from] = weight;
    }

    fn cell(&self, from: LocationId, to: LocationId) -> Option<usize> {
        let count = self.len();
        if from.index() < count && to.index() < count {
            Some(from.index() * count + to.index())
        } else {
            None
        }
    }

    fn out_of_range(&self, from: LocationId, to: LocationId) -> NetworkError {
        let location = if from.index() >= self.len() { from } else { to };
        NetworkError::InvalidLocation { location }
    }
}

#[derive(Clone, Copy, Debug)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}
