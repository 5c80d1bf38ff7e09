#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Genetic search for ambulance-to-emergency assignments.
//!
//! A genome holds one slot per pending emergency; each slot names an
//! ambulance from the candidate pool or stays empty. Fitness sums the
//! priority oracle's score of every legal pair and subtracts fixed penalties
//! for empty slots, repeated ambulances, and unreachable pairs. Travel times
//! are cached once up front so the search never touches the road network.

use std::collections::BTreeSet;

use ambulance_dispatch_core::{
    evaluate_priority, AmbulanceId, Assignment, EmergencyId, LocationId, PriorityOracle, Severity,
};
use ambulance_dispatch_world::{query, Ambulance, AssignmentPolicy, Emergency, RoadNetwork, World};
use rand::{
    seq::{index, SliceRandom},
    Rng, SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use thiserror::Error;

type Genome = Vec<Option<usize>>;

/// Tuning of the genetic search.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    /// Genomes per generation.
    pub population_size: usize,
    /// Generations of selection and refill.
    pub generations: usize,
    /// Probability that a child has two slots swapped.
    pub mutation_rate: f64,
    /// Evaluations averaged per genome when travel jitter is enabled.
    pub monte_carlo_runs: usize,
    /// Fitness subtracted for every emergency left without an ambulance.
    pub unassigned_penalty: f64,
    /// Fitness subtracted for every repeated use of an ambulance.
    pub duplicate_penalty: f64,
    /// Fitness subtracted for every pair without a route.
    pub unreachable_penalty: f64,
    /// Score substituted when the priority oracle fails.
    pub oracle_failure_score: f64,
    /// Optional random scaling of cached travel times during evaluation.
    pub travel_jitter: Option<TravelJitter>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 25,
            mutation_rate: 0.1,
            monte_carlo_runs: 10,
            unassigned_penalty: 50.0,
            duplicate_penalty: 100.0,
            unreachable_penalty: 100.0,
            oracle_failure_score: 0.0,
            travel_jitter: None,
        }
    }
}

/// Multiplicative range applied to travel times in Monte Carlo evaluations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TravelJitter {
    /// Smallest factor.
    pub low: f64,
    /// Largest factor.
    pub high: f64,
}

impl Default for TravelJitter {
    fn default() -> Self {
        Self {
            low: 0.8,
            high: 1.5,
        }
    }
}

/// Failures of the assignment search.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AssignmentError {
    /// The winning genome used an ambulance more than once.
    #[error("ambulance {ambulance:?} assigned more than once")]
    DuplicateAssignment {
        /// Ambulance that appeared twice.
        ambulance: AmbulanceId,
    },
    /// A tuning parameter lies outside its valid range.
    #[error("optimizer parameter `{name}` is out of range")]
    InvalidConfig {
        /// Name of the offending parameter.
        name: &'static str,
    },
}

/// Ambulance offered to the optimizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Identifier of the ambulance.
    pub id: AmbulanceId,
    /// Location the ambulance departs from.
    pub location: LocationId,
}

impl From<&Ambulance> for Candidate {
    fn from(ambulance: &Ambulance) -> Self {
        Self {
            id: ambulance.id(),
            location: ambulance.location(),
        }
    }
}

/// Emergency offered to the optimizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Incident {
    /// Identifier of the emergency.
    pub id: EmergencyId,
    /// Location of the emergency.
    pub location: LocationId,
    /// Severity used for scoring; the reported value for live emergencies.
    pub severity: Severity,
}

impl From<&Emergency> for Incident {
    fn from(emergency: &Emergency) -> Self {
        Self {
            id: emergency.id(),
            location: emergency.location(),
            severity: emergency.reported(),
        }
    }
}

/// Generational genetic search over assignment genomes.
#[derive(Debug)]
pub struct AssignmentOptimizer<'a, O: ?Sized> {
    landscape: Landscape<'a, O>,
    rng: ChaCha8Rng,
    seed: u64,
}

impl<'a, O> AssignmentOptimizer<'a, O>
where
    O: PriorityOracle + ?Sized,
{
    /// Prepares a search, caching travel times for every candidate pair.
    pub fn new(
        ambulances: Vec<Candidate>,
        emergencies: Vec<Incident>,
        network: &RoadNetwork,
        oracle: &'a O,
        seed: u64,
        config: OptimizerConfig,
    ) -> Result<Self, AssignmentError> {
        validate(&config)?;

        let mut travel = Vec::with_capacity(ambulances.len() * emergencies.len());
        for ambulance in &ambulances {
            for emergency in &emergencies {
                travel.push(
                    network
                        .shortest_path(ambulance.location, emergency.location)
                        .cost(),
                );
            }
        }

        Ok(Self {
            landscape: Landscape {
                ambulances,
                emergencies,
                travel,
                oracle,
                config,
            },
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        })
    }

    /// Cached travel time from a candidate to an incident, by position.
    #[must_use]
    pub fn travel_time(&self, ambulance: usize, emergency: usize) -> Option<f64> {
        self.landscape.travel(ambulance, emergency)
    }

    /// Runs the search and returns the best duplicate-free assignment.
    pub fn solve(&mut self) -> Result<Vec<Assignment>, AssignmentError> {
        let landscape = &self.landscape;
        if landscape.ambulances.is_empty() || landscape.emergencies.is_empty() {
            return Ok(Vec::new());
        }

        let config = &landscape.config;
        let mut population: Vec<Genome> = (0..config.population_size)
            .map(|_| landscape.random_genome(&mut self.rng))
            .collect();

        for generation in 0..config.generations {
            let fitness = landscape.rank(&population, self.seed, generation);
            let mut order: Vec<usize> = (0..population.len()).collect();
            order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));

            let keep = (config.population_size / 2).max(1);
            let survivors: Vec<Genome> = order
                .iter()
                .take(keep)
                .map(|&index| population[index].clone())
                .collect();
            tracing::trace!(
                generation,
                best = fitness[order[0]],
                "assignment generation ranked"
            );

            let mut next = survivors.clone();
            while next.len() < config.population_size {
                let child = if survivors.len() >= 2 {
                    let parents = index::sample(&mut self.rng, survivors.len(), 2);
                    crossover(
                        &survivors[parents.index(0)],
                        &survivors[parents.index(1)],
                        &mut self.rng,
                    )
                } else {
                    survivors[0].clone()
                };
                next.push(mutate(child, config.mutation_rate, &mut self.rng));
            }
            population = next;
        }

        let fitness = landscape.rank(&population, self.seed, config.generations);
        let mut best = 0;
        for (index, score) in fitness.iter().enumerate() {
            if *score > fitness[best] {
                best = index;
            }
        }
        tracing::debug!(
            fitness = fitness[best],
            emergencies = landscape.emergencies.len(),
            ambulances = landscape.ambulances.len(),
            "assignment search finished"
        );
        landscape.decode(&population[best])
    }
}

#[derive(Debug)]
struct Landscape<'a, O: ?Sized> {
    ambulances: Vec<Candidate>,
    emergencies: Vec<Incident>,
    travel: Vec<f64>,
    oracle: &'a O,
    config: OptimizerConfig,
}

impl<O> Landscape<'_, O>
where
    O: PriorityOracle + ?Sized,
{
    fn travel(&self, ambulance: usize, emergency: usize) -> Option<f64> {
        if ambulance < self.ambulances.len() && emergency < self.emergencies.len() {
            Some(self.travel[ambulance * self.emergencies.len() + emergency])
        } else {
            None
        }
    }

    fn random_genome(&self, rng: &mut ChaCha8Rng) -> Genome {
        let mut pool: Vec<usize> = (0..self.ambulances.len()).collect();
        pool.shuffle(rng);
        let mut genome: Genome = vec![None; self.emergencies.len()];
        for (slot, ambulance) in genome.iter_mut().zip(pool) {
            *slot = Some(ambulance);
        }
        genome
    }

    fn rank(&self, population: &[Genome], seed: u64, generation: usize) -> Vec<f64> {
        population
            .par_iter()
            .enumerate()
            .map(|(index, genome)| self.fitness(genome, seed, generation, index))
            .collect()
    }

    fn fitness(&self, genome: &[Option<usize>], seed: u64, generation: usize, index: usize) -> f64 {
        let Some(jitter) = self.config.travel_jitter else {
            return self.evaluate(genome, || 1.0);
        };

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(((generation as u64) << 32) | index as u64);
        let runs = self.config.monte_carlo_runs.max(1);
        let total: f64 = (0..runs)
            .map(|_| self.evaluate(genome, || rng.gen_range(jitter.low..=jitter.high)))
            .sum();
        total / runs as f64
    }

    fn evaluate(&self, genome: &[Option<usize>], mut factor: impl FnMut() -> f64) -> f64 {
        let config = &self.config;
        let mut used = vec![false; self.ambulances.len()];
        let mut score = 0.0;

        for (slot, gene) in genome.iter().enumerate() {
            let Some(ambulance) = *gene else {
                score -= config.unassigned_penalty;
                continue;
            };
            if used[ambulance] {
                score -= config.duplicate_penalty;
                continue;
            }
            used[ambulance] = true;

            let travel = self.travel[ambulance * self.emergencies.len() + slot];
            if !travel.is_finite() {
                score -= config.unreachable_penalty;
                continue;
            }
            score += evaluate_priority(
                self.oracle,
                self.emergencies[slot].severity.as_f64(),
                travel * factor(),
                config.oracle_failure_score,
            );
        }
        score
    }

    fn decode(&self, genome: &[Option<usize>]) -> Result<Vec<Assignment>, AssignmentError> {
        let mut seen = BTreeSet::new();
        let mut assignments = Vec::new();
        for (slot, gene) in genome.iter().enumerate() {
            let Some(ambulance) = *gene else {
                continue;
            };
            let id = self.ambulances[ambulance].id;
            if !seen.insert(id) {
                return Err(AssignmentError::DuplicateAssignment { ambulance: id });
            }
            assignments.push(Assignment::new(id, self.emergencies[slot].id));
        }
        Ok(assignments)
    }
}

fn validate(config: &OptimizerConfig) -> Result<(), AssignmentError> {
    if config.population_size == 0 {
        return Err(AssignmentError::InvalidConfig {
            name: "population_size",
        });
    }
    if !(0.0..=1.0).contains(&config.mutation_rate) {
        return Err(AssignmentError::InvalidConfig {
            name: "mutation_rate",
        });
    }
    if let Some(jitter) = config.travel_jitter {
        if !(jitter.low.is_finite() && jitter.high.is_finite())
            || jitter.low <= 0.0
            || jitter.low > jitter.high
        {
            return Err(AssignmentError::InvalidConfig {
                name: "travel_jitter",
            });
        }
    }
    Ok(())
}

/// Single-point crossover that never introduces a repeated ambulance.
///
/// The child copies a prefix of `first`, then walks `second` from its start,
/// taking genes not used yet and leaving a gap otherwise.
fn crossover(first: &[Option<usize>], second: &[Option<usize>], rng: &mut ChaCha8Rng) -> Genome {
    let size = first.len();
    if size < 2 {
        return first.to_vec();
    }

    let cut = rng.gen_range(1..size);
    let mut child: Genome = first[..cut].to_vec();
    let mut used: BTreeSet<usize> = child.iter().flatten().copied().collect();
    for gene in second {
        if child.len() >= size {
            break;
        }
        match *gene {
            Some(ambulance) if used.insert(ambulance) => child.push(Some(ambulance)),
            _ => child.push(None),
        }
    }
    child
}

fn mutate(mut genome: Genome, rate: f64, rng: &mut ChaCha8Rng) -> Genome {
    if genome.len() >= 2 && rng.gen_bool(rate) {
        let picks = index::sample(rng, genome.len(), 2);
        genome.swap(picks.index(0), picks.index(1));
    }
    genome
}

/// Assignment policy that runs a fresh genetic search every tick.
///
/// Available ambulances are matched against pending emergencies; the search
/// seed mixes the base seed with the current tick.
#[derive(Debug)]
pub struct GeneticDispatch<O> {
    oracle: O,
    config: OptimizerConfig,
    seed: u64,
}

impl<O> GeneticDispatch<O>
where
    O: PriorityOracle,
{
    /// Creates the policy around a priority oracle.
    #[must_use]
    pub fn new(oracle: O, config: OptimizerConfig, seed: u64) -> Self {
        Self {
            oracle,
            config,
            seed,
        }
    }

    /// Oracle scoring candidate pairs.
    #[must_use]
    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

impl<O> AssignmentPolicy for GeneticDispatch<O>
where
    O: PriorityOracle,
{
    fn decide(&mut self, world: &World) -> Vec<Assignment> {
        let ambulances: Vec<Candidate> = query::available_ambulances(world)
            .map(Candidate::from)
            .collect();
        let emergencies: Vec<Incident> = query::pending_emergencies(world)
            .map(Incident::from)
            .collect();
        let seed = self.seed ^ query::tick(world).wrapping_mul(0x9e37_79b9_7f4a_7c15);

        let outcome = AssignmentOptimizer::new(
            ambulances,
            emergencies,
            query::network(world),
            &self.oracle,
            seed,
            self.config.clone(),
        )
        .and_then(|mut optimizer| optimizer.solve());

        outcome.unwrap_or_else(|error| {
            tracing::warn!(%error, tick = query::tick(world), "assignment search failed");
            Vec::new()
        })
    }
}
