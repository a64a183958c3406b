//! Checkpoint state
//!
//! A checkpoint is a self-contained snapshot of a run: the population with
//! its id watermark, the generation counter, the run seed, and the reporting
//! history. The RNG is persisted as its seed only; a resumed run restarts the
//! stream from that seed rather than splicing into the old one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PopulationError;
use crate::payload::Payload;
use crate::population::{Individual, Population};
use crate::stats::GenerationSummary;

/// Current checkpoint schema version
pub const CHECKPOINT_VERSION: u32 = 1;

/// A complete snapshot of engine state
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Checkpoint<P: Payload> {
    /// Schema version this snapshot was written with
    pub version: u32,
    /// Generation counter at snapshot time
    pub generation: usize,
    /// Seed of the run's RNG
    pub seed: u64,
    /// Population id watermark
    pub max_id: u64,
    /// Every individual, in id order
    pub population: Vec<Individual<P>>,
    /// Best total fitness per completed generation
    pub best_history: Vec<f64>,
    /// Generation summaries recorded so far
    pub summaries: Vec<GenerationSummary>,
    /// Free-form run metadata
    pub metadata: BTreeMap<String, String>,
}

impl<P: Payload> Checkpoint<P> {
    /// Snapshot a population at a generation
    pub fn new(population: &Population<P>, seed: u64) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            generation: population.generation(),
            seed,
            max_id: population.max_id(),
            population: population.iter().cloned().collect(),
            best_history: Vec::new(),
            summaries: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach the best-fitness history
    pub fn with_best_history(mut self, history: Vec<f64>) -> Self {
        self.best_history = history;
        self
    }

    /// Attach the generation summaries
    pub fn with_summaries(mut self, summaries: Vec<GenerationSummary>) -> Self {
        self.summaries = summaries;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// True when this build can read the snapshot
    pub fn is_compatible(&self) -> bool {
        self.version <= CHECKPOINT_VERSION
    }

    /// Rebuild the population from the snapshot
    pub fn restore_population(&self) -> Result<Population<P>, PopulationError> {
        Population::from_parts(self.population.clone(), self.generation, self.max_id)
    }
}
