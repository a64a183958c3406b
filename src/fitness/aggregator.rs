//! Fitness aggregation
//!
//! Runs every configured fitness module over the individuals that need
//! evaluation and combines the per-module scalars into one weighted total.
//! Modules run in name order so a round is deterministic for a fixed seed.
//!
//! A module result that misses the round deadline falls back to the
//! individual's cached scalar for that module when one exists; the individual
//! then keeps its `needs_evaluation` flag so the next round tries again. A
//! hard module failure, or a miss with no cache, flags the individual
//! fitness-invalid for the round.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ModuleSpec, OperatorParams};
use crate::error::{ConfigError, EvaluationError};
use crate::evaluate::DistributedEvaluator;
use crate::fitness::traits::FitnessModule;
use crate::payload::Payload;
use crate::population::Population;

/// One configured module with its contribution weight
pub struct ModuleEntry<P: Payload> {
    /// Contribution weight in the weighted total
    pub weight: f64,
    /// The module instance, shared with worker threads
    pub module: Arc<dyn FitnessModule<P>>,
}

/// Outcome counters for one evaluation round
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    /// Individuals that needed evaluation this round
    pub requested: usize,
    /// Individuals fully refreshed (every module returned a fresh scalar)
    pub fresh: usize,
    /// Individuals that used at least one cached module scalar
    pub fallbacks: usize,
    /// Individuals flagged fitness-invalid this round
    pub failures: usize,
}

type ModuleFactory<P> =
    Box<dyn Fn(&OperatorParams) -> Result<Arc<dyn FitnessModule<P>>, ConfigError> + Send + Sync>;

/// Catalog of fitness module factories
pub struct ModuleCatalog<P: Payload> {
    factories: BTreeMap<String, ModuleFactory<P>>,
}

impl<P: Payload> Default for ModuleCatalog<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> ModuleCatalog<P> {
    /// Empty catalog
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a module factory under a name
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&OperatorParams) -> Result<Arc<dyn FitnessModule<P>>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Instantiate every configured module into an aggregator
    pub fn build_aggregator(
        &self,
        table: &BTreeMap<String, ModuleSpec>,
    ) -> Result<FitnessAggregator<P>, ConfigError> {
        let mut modules = Vec::with_capacity(table.len());
        for (name, spec) in table {
            let factory = self
                .factories
                .get(name)
                .ok_or_else(|| ConfigError::UnknownModule(name.clone()))?;
            modules.push((name.clone(), ModuleEntry {
                weight: spec.weight,
                module: factory(&spec.params)?,
            }));
        }
        Ok(FitnessAggregator { modules })
    }
}

/// Weighted combination of fitness modules
///
/// Modules are held in name order; the table comes from a BTreeMap so the
/// ordering is already canonical.
pub struct FitnessAggregator<P: Payload> {
    modules: Vec<(String, ModuleEntry<P>)>,
}

impl<P: Payload> FitnessAggregator<P> {
    /// Build directly from (name, entry) rows, mostly for tests
    pub fn from_modules(mut modules: Vec<(String, ModuleEntry<P>)>) -> Self {
        modules.sort_by(|a, b| a.0.cmp(&b.0));
        Self { modules }
    }

    /// Configured module names in evaluation order
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Evaluate every individual flagged as needing evaluation
    ///
    /// Individuals not flagged keep their fitness untouched.
    pub fn calculate_fitnesses(
        &self,
        population: &mut Population<P>,
        evaluator: &DistributedEvaluator,
    ) -> EvaluationReport {
        let ids = population.needs_evaluation_ids();
        let mut report = EvaluationReport {
            requested: ids.len(),
            ..EvaluationReport::default()
        };
        if ids.is_empty() {
            return report;
        }

        // Snapshot in ordinal (ascending id) order; workers see clones.
        let snapshot: Vec<_> = ids
            .iter()
            .filter_map(|id| population.get(*id).cloned())
            .collect();

        // fresh[i][m]: module m returned a fresh scalar for ordinal i.
        let mut fresh = vec![vec![false; self.modules.len()]; ids.len()];
        // failed[i]: some module hard-failed or missed with no cached scalar.
        let mut failed = vec![false; ids.len()];

        for (module_index, (name, entry)) in self.modules.iter().enumerate() {
            let results = evaluator.evaluate_module(&entry.module, &snapshot);
            for (ordinal, slot) in results.into_iter().enumerate() {
                let id = ids[ordinal];
                let Some(individual) = population.get_mut(id) else {
                    continue;
                };
                match slot {
                    Some(Ok((score, note))) => {
                        individual.set_module_fitness(name, score);
                        fresh[ordinal][module_index] = true;
                        if !note.is_empty() {
                            log::debug!("module {name} id {id}: {note}");
                        }
                    }
                    Some(Err(
                        EvaluationError::TimedOut { .. } | EvaluationError::WorkerLost { .. },
                    ))
                    | None => {
                        // Missing gather result: fall back to the cached
                        // scalar when the individual has one from an earlier
                        // round.
                        if !individual.module_fitness.contains_key(name) {
                            failed[ordinal] = true;
                        }
                    }
                    Some(Err(err)) => {
                        log::warn!("module {name} id {id} failed: {err}");
                        failed[ordinal] = true;
                    }
                }
            }
        }

        for (ordinal, &id) in ids.iter().enumerate() {
            let Some(individual) = population.get_mut(id) else {
                continue;
            };
            if failed[ordinal] {
                individual.mark_invalid();
                report.failures += 1;
                continue;
            }
            let total: f64 = self
                .modules
                .iter()
                .map(|(name, entry)| {
                    entry.weight * individual.module_fitness.get(name).copied().unwrap_or(0.0)
                })
                .sum();
            individual.set_total_fitness(total);
            if fresh[ordinal].iter().all(|&f| f) {
                individual.needs_evaluation = false;
                report.fresh += 1;
            } else {
                // At least one cached scalar was substituted; keep the flag
                // so the next round tries this individual again.
                report.fallbacks += 1;
            }
        }
        report
    }
}
