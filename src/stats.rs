//! Run statistics
//!
//! Per-generation fitness distributions and operator counters. The summary is
//! emitted every generation, including generations where some individuals
//! failed evaluation.

use serde::{Deserialize, Serialize};

use crate::payload::Payload;
use crate::population::Population;

/// Fitness distribution over the valid members of one generation
///
/// Individuals flagged fitness-invalid are excluded from every field except
/// `invalid`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessStats {
    /// Number of individuals with a usable fitness
    pub evaluated: usize,
    /// Number of individuals flagged fitness-invalid
    pub invalid: usize,
    /// Minimum valid fitness
    pub min: f64,
    /// Maximum valid fitness
    pub max: f64,
    /// Mean valid fitness
    pub mean: f64,
    /// Median valid fitness
    pub median: f64,
    /// Sample standard deviation of valid fitnesses
    pub std: f64,
}

impl FitnessStats {
    /// Compute statistics from a population
    pub fn from_population<P: Payload>(population: &Population<P>) -> Self {
        let mut fitnesses: Vec<f64> = population
            .valid_fitnesses()
            .into_iter()
            .map(|(_, f)| f)
            .collect();
        let invalid = population.iter().filter(|i| i.fitness_invalid).count();

        if fitnesses.is_empty() {
            return Self {
                evaluated: 0,
                invalid,
                ..Self::default()
            };
        }

        fitnesses.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = fitnesses.len();
        let min = fitnesses[0];
        let max = fitnesses[n - 1];
        let mean = fitnesses.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (fitnesses[n / 2 - 1] + fitnesses[n / 2]) / 2.0
        } else {
            fitnesses[n / 2]
        };
        let std = if n > 1 {
            let variance =
                fitnesses.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Self {
            evaluated: n,
            invalid,
            min,
            max,
            mean,
            median,
            std,
        }
    }
}

/// Summary of a single generation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Generation number
    pub generation: usize,
    /// Fitness distribution after the survive phase
    pub fitness: FitnessStats,
    /// Parent pairs selected
    pub pairs_selected: usize,
    /// Crossover operator invocations
    pub crossover_attempts: usize,
    /// Crossover invocations that produced at least one child
    pub crossover_successes: usize,
    /// Children added to the pool
    pub children: usize,
    /// Mutation operator invocations
    pub mutation_attempts: usize,
    /// Mutations that changed a payload
    pub mutation_successes: usize,
    /// Individuals that failed evaluation this round
    pub evaluation_failures: usize,
    /// Individuals removed by the predator (including invalid ones)
    pub removed: usize,
}

impl GenerationSummary {
    /// One-line report for the generation log
    pub fn log_line(&self) -> String {
        format!(
            "gen {}: fitness min={:.6} mean={:.6} median={:.6} max={:.6} std={:.6} \
             (valid {}, failed {}) xover {}/{} mut {}/{} children {} removed {}",
            self.generation,
            self.fitness.min,
            self.fitness.mean,
            self.fitness.median,
            self.fitness.max,
            self.fitness.std,
            self.fitness.evaluated,
            self.evaluation_failures,
            self.crossover_successes,
            self.crossover_attempts,
            self.mutation_successes,
            self.mutation_attempts,
            self.children,
            self.removed,
        )
    }
}

/// Statistics collector for an entire run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Summaries per generation
    pub generations: Vec<GenerationSummary>,
    /// Reason the run terminated
    pub termination_reason: Option<String>,
}

impl RunStats {
    /// Create a new stats collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a generation's summary
    pub fn record(&mut self, summary: GenerationSummary) {
        self.generations.push(summary);
    }

    /// Number of generations recorded
    pub fn num_generations(&self) -> usize {
        self.generations.len()
    }

    /// History of the per-generation maximum fitness
    pub fn max_fitness_history(&self) -> Vec<f64> {
        self.generations.iter().map(|g| g.fitness.max).collect()
    }

    /// History of the per-generation minimum fitness
    pub fn min_fitness_history(&self) -> Vec<f64> {
        self.generations.iter().map(|g| g.fitness.min).collect()
    }

    /// Set the termination reason
    pub fn set_termination_reason(&mut self, reason: &str) {
        self.termination_reason = Some(reason.to_string());
    }
}
