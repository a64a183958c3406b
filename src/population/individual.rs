//! Individual wrapper type
//!
//! This module provides the Individual type that wraps an opaque payload with
//! its identity, fitness state, and genealogy tags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::payload::Payload;

/// Genealogy tags recording how an individual came to be
///
/// Used for reporting only; never consulted for correctness.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Name of the crossover operator that produced this individual
    pub crossover: Option<String>,
    /// Name of the last mutation operator applied
    pub mutation: Option<String>,
    /// Ids of the parents involved
    pub parents: Vec<u64>,
}

impl Provenance {
    /// Provenance for a crossover child
    pub fn from_crossover(operator: &str, parent_a: u64, parent_b: u64) -> Self {
        Self {
            crossover: Some(operator.to_string()),
            mutation: None,
            parents: vec![parent_a, parent_b],
        }
    }

    /// Provenance for a mutated clone
    pub fn from_mutation(operator: &str, parent: u64) -> Self {
        Self {
            crossover: None,
            mutation: Some(operator.to_string()),
            parents: vec![parent],
        }
    }
}

/// An individual in the population
///
/// Wraps an opaque domain payload with identity and fitness metadata. The id
/// is unset until the individual is added to a population, which assigns a
/// fresh one from its watermark.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Individual<P: Payload> {
    /// Unique id within the owning population (None until added)
    pub id: Option<u64>,
    /// The opaque domain payload
    pub payload: P,
    /// Total weighted fitness (None if not yet evaluated)
    pub fitness: Option<f64>,
    /// Last computed scalar per fitness module
    pub module_fitness: BTreeMap<String, f64>,
    /// True whenever the payload has changed since the last evaluation
    pub needs_evaluation: bool,
    /// True when any fitness module failed in the last round
    pub fitness_invalid: bool,
    /// Genealogy tags
    pub provenance: Provenance,
}

impl<P: Payload> Individual<P> {
    /// Create a new unevaluated individual
    pub fn new(payload: P) -> Self {
        Self {
            id: None,
            payload,
            fitness: None,
            module_fitness: BTreeMap::new(),
            needs_evaluation: true,
            fitness_invalid: false,
            provenance: Provenance::default(),
        }
    }

    /// Create an individual with a known total fitness
    pub fn with_fitness(payload: P, fitness: f64) -> Self {
        Self {
            id: None,
            payload,
            fitness: Some(fitness),
            module_fitness: BTreeMap::new(),
            needs_evaluation: false,
            fitness_invalid: false,
            provenance: Provenance::default(),
        }
    }

    /// Attach provenance tags
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Check if this individual carries a usable fitness value
    pub fn is_valid(&self) -> bool {
        self.fitness.is_some() && !self.fitness_invalid
    }

    /// Check if this individual has been evaluated at least once
    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Record that the payload changed under the named mutation operator
    ///
    /// Cached module scalars are kept: they remain the "last computed" values
    /// used as gather fallbacks until the next successful round.
    pub fn mark_mutated(&mut self, operator: &str) {
        self.needs_evaluation = true;
        self.provenance.mutation = Some(operator.to_string());
    }

    /// Record a freshly computed per-module scalar
    pub fn set_module_fitness(&mut self, module: &str, value: f64) {
        self.module_fitness.insert(module.to_string(), value);
    }

    /// Record the weighted total for this round
    pub fn set_total_fitness(&mut self, total: f64) {
        self.fitness = Some(total);
        self.fitness_invalid = false;
    }

    /// Flag this individual as failed for the round
    ///
    /// Invalid individuals are excluded from convergence statistics and are
    /// not eligible to survive.
    pub fn mark_invalid(&mut self) {
        self.fitness = None;
        self.fitness_invalid = true;
    }

    /// Check if this individual is better than another
    ///
    /// A valid fitness always beats an invalid or absent one.
    pub fn is_better_than(&self, other: &Self) -> bool {
        match (self.is_valid(), other.is_valid()) {
            (true, true) => self.fitness > other.fitness,
            (true, false) => true,
            (false, _) => false,
        }
    }
}
