//! Evolution engine
//!
//! The generation loop: select parent pairs, cross them over, mutate the
//! combined pool, evaluate everything that changed, then let the predator
//! trim the pool back to the configured size. Operator draws are weighted and
//! may land on the implicit no-op; a generation with no drawn selection
//! simply produces no children.
//!
//! Convergence is checked at the top of each iteration against the upcoming
//! generation number, so a `max_generations` of 3 stops the run before
//! generation 4 executes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::checkpoint::{Checkpoint, CheckpointManager};
use crate::config::EngineConfig;
use crate::convergence::ConvergenceMonitor;
use crate::error::{ConfigError, EngineError, EvoResult};
use crate::evaluate::DistributedEvaluator;
use crate::fitness::{FitnessAggregator, ModuleCatalog};
use crate::operators::{BestPredator, OperatorCatalog, OperatorRegistry, PredatorStrategy};
use crate::payload::Payload;
use crate::population::{Individual, Population, Provenance};
use crate::stats::{FitnessStats, GenerationSummary, RunStats};

/// Outcome of a completed run
#[derive(Clone, Debug)]
pub struct RunResult<P: Payload> {
    /// Best valid individual at termination, if any
    pub best: Option<Individual<P>>,
    /// Last completed generation
    pub generation: usize,
    /// Why the run stopped
    pub reason: String,
    /// Per-generation statistics
    pub stats: RunStats,
}

/// Builder assembling an engine from its configuration and catalogs
pub struct EngineBuilder<P: Payload> {
    config: Option<EngineConfig>,
    operators: OperatorCatalog<P>,
    modules: ModuleCatalog<P>,
    initial: Vec<Individual<P>>,
    resume: Option<Checkpoint<P>>,
    stop: Option<Arc<AtomicBool>>,
}

impl<P: Payload> Default for EngineBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> EngineBuilder<P> {
    /// Empty builder with the default operator catalog
    pub fn new() -> Self {
        Self {
            config: None,
            operators: OperatorCatalog::with_defaults(),
            modules: ModuleCatalog::new(),
            initial: Vec::new(),
            resume: None,
            stop: None,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the operator catalog
    pub fn operators(mut self, operators: OperatorCatalog<P>) -> Self {
        self.operators = operators;
        self
    }

    /// Replace the fitness module catalog
    pub fn modules(mut self, modules: ModuleCatalog<P>) -> Self {
        self.modules = modules;
        self
    }

    /// Seed the initial population
    pub fn initial_population(mut self, individuals: Vec<Individual<P>>) -> Self {
        self.initial = individuals;
        self
    }

    /// Resume from a checkpoint instead of a fresh population
    pub fn resume_from(mut self, checkpoint: Checkpoint<P>) -> Self {
        self.resume = Some(checkpoint);
        self
    }

    /// Install a shared stop flag
    ///
    /// Setting the flag makes the engine write a final checkpoint and return
    /// after the in-flight generation completes.
    pub fn stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Validate everything and build the engine
    pub fn build(self) -> EvoResult<Engine<P>> {
        let mut config = self
            .config
            .ok_or_else(|| ConfigError::Invalid("no configuration supplied".to_string()))?;
        config.validate().map_err(EngineError::Config)?;

        let registry = self.operators.build_registry(&config)?;
        let aggregator = self.modules.build_aggregator(&config.fitness)?;
        let evaluator = DistributedEvaluator::new(
            config.nworkers,
            Duration::from_millis(config.eval_timeout_ms),
        );
        let checkpoints = config.checkpoint.as_ref().map(CheckpointManager::from_config);

        let (population, best_history, run_stats, seed) = match self.resume {
            Some(checkpoint) => {
                if !checkpoint.is_compatible() {
                    return Err(EngineError::Checkpoint(
                        crate::error::CheckpointError::VersionMismatch {
                            expected: crate::checkpoint::CHECKPOINT_VERSION,
                            found: checkpoint.version,
                        },
                    ));
                }
                // The stored seed overrides the configured one so the resumed
                // run stays tied to the original.
                config.seed = checkpoint.seed;
                let population = checkpoint.restore_population()?;
                let stats = RunStats {
                    generations: checkpoint.summaries,
                    termination_reason: None,
                };
                (population, checkpoint.best_history, stats, checkpoint.seed)
            }
            None => {
                if self.initial.is_empty() {
                    return Err(EngineError::EmptyPopulation);
                }
                let population = Population::from_individuals(self.initial)?;
                (population, Vec::new(), RunStats::new(), config.seed)
            }
        };

        if population.len() < config.nkeep {
            return Err(EngineError::Config(ConfigError::Invalid(format!(
                "initial population of {} is smaller than nkeep {}",
                population.len(),
                config.nkeep
            ))));
        }

        let monitor = ConvergenceMonitor::from_config(&config.convergence);
        Ok(Engine {
            rng: StdRng::seed_from_u64(seed),
            seed,
            config,
            registry,
            aggregator,
            evaluator,
            monitor,
            checkpoints,
            population,
            best_history,
            stats: run_stats,
            stop: self.stop.unwrap_or_default(),
        })
    }
}

/// The evolution engine
pub struct Engine<P: Payload> {
    config: EngineConfig,
    registry: OperatorRegistry<P>,
    aggregator: FitnessAggregator<P>,
    evaluator: DistributedEvaluator,
    monitor: ConvergenceMonitor,
    checkpoints: Option<CheckpointManager>,
    population: Population<P>,
    best_history: Vec<f64>,
    stats: RunStats,
    rng: StdRng,
    seed: u64,
    stop: Arc<AtomicBool>,
}

impl<P: Payload> Engine<P> {
    /// Start building an engine
    pub fn builder() -> EngineBuilder<P> {
        EngineBuilder::new()
    }

    /// The current population
    pub fn population(&self) -> &Population<P> {
        &self.population
    }

    /// A handle that stops the run when set
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Best total fitness per completed generation
    pub fn best_history(&self) -> &[f64] {
        &self.best_history
    }

    /// Snapshot the current engine state
    pub fn checkpoint(&self) -> Checkpoint<P> {
        Checkpoint::new(&self.population, self.seed)
            .with_best_history(self.best_history.clone())
            .with_summaries(self.stats.generations.clone())
    }

    /// Run to convergence or until stopped
    pub fn run(mut self) -> EvoResult<RunResult<P>> {
        // The seed generation arrives unevaluated.
        let report = self
            .aggregator
            .calculate_fitnesses(&mut self.population, &self.evaluator);
        if report.failures > 0 {
            log::warn!(
                "initial evaluation: {} of {} individuals failed",
                report.failures,
                report.requested
            );
        }

        let reason = loop {
            let generation = self.population.generation();
            if self.stop.load(Ordering::SeqCst) {
                log::info!("stop requested at generation {generation}");
                if let Some(manager) = &self.checkpoints {
                    manager.save(&self.checkpoint())?;
                }
                break "stop requested".to_string();
            }

            let fitness = FitnessStats::from_population(&self.population);
            if self.monitor.observe(generation + 1, &fitness) {
                break self.monitor.reason().to_string();
            }

            let next = generation + 1;
            if let Err(err) = self.step(next) {
                // Leave the last completed generation on disk before
                // surfacing the failure.
                if let Some(manager) = &self.checkpoints {
                    if let Err(flush_err) = manager.save(&self.checkpoint()) {
                        log::error!("final checkpoint flush failed: {flush_err}");
                    }
                }
                return Err(err);
            }

            if let Some(manager) = &self.checkpoints {
                if manager.should_save(next) {
                    manager.save(&self.checkpoint())?;
                }
            }
        };

        self.stats.set_termination_reason(&reason);
        log::info!(
            "run finished at generation {}: {reason}",
            self.population.generation()
        );
        Ok(RunResult {
            best: self.population.best().cloned(),
            generation: self.population.generation(),
            reason,
            stats: self.stats,
        })
    }

    /// Execute one generation
    fn step(&mut self, generation: usize) -> EvoResult<()> {
        let mut summary = GenerationSummary {
            generation,
            ..GenerationSummary::default()
        };

        // Selection: one strategy drawn for the whole generation.
        let pairs = match self.registry.selection.draw(&mut self.rng) {
            Some((_, strategy)) => strategy.select_pairs(&self.population, &mut self.rng),
            None => Vec::new(),
        };
        summary.pairs_selected = pairs.len();

        // Crossover: an operator is drawn per pair.
        let mut children = Vec::new();
        for (father, mother) in pairs {
            let Some((name, operator)) = self.registry.crossover.draw(&mut self.rng) else {
                continue;
            };
            let (Some(a), Some(b)) = (self.population.get(father), self.population.get(mother))
            else {
                continue;
            };
            summary.crossover_attempts += 1;
            match operator.crossover(a, b, &mut self.rng) {
                Ok((first, second)) => {
                    let mut produced = false;
                    for child in [first, second].into_iter().flatten() {
                        children.push(
                            child.with_provenance(Provenance::from_crossover(
                                name, father, mother,
                            )),
                        );
                        produced = true;
                    }
                    if produced {
                        summary.crossover_successes += 1;
                    }
                }
                Err(err) => {
                    log::warn!("crossover {name} on ({father}, {mother}) failed: {err}");
                }
            }
        }
        summary.children = children.len();
        self.population.extend(children)?;

        // Mutation: an operator is drawn per individual over the combined
        // pool of survivors and new children.
        let mut mutated_clones = Vec::new();
        for id in self.population.ids() {
            let Some((name, operator)) = self.registry.mutation.draw(&mut self.rng) else {
                continue;
            };
            summary.mutation_attempts += 1;

            if self.config.keep_original {
                let Some(original) = self.population.get(id) else {
                    continue;
                };
                let mut payload = original.payload.clone();
                match operator.mutate(&mut payload, &mut self.rng) {
                    Ok(true) => {
                        summary.mutation_successes += 1;
                        mutated_clones.push(
                            Individual::new(payload)
                                .with_provenance(Provenance::from_mutation(name, id)),
                        );
                    }
                    Ok(false) => {}
                    Err(err) => {
                        log::warn!("mutation {name} on {id} failed: {err}");
                    }
                }
            } else {
                let Some(individual) = self.population.get_mut(id) else {
                    continue;
                };
                match operator.mutate(&mut individual.payload, &mut self.rng) {
                    Ok(true) => {
                        summary.mutation_successes += 1;
                        individual.mark_mutated(name);
                    }
                    Ok(false) => {}
                    Err(err) => {
                        log::warn!("mutation {name} on {id} failed: {err}");
                    }
                }
            }
        }
        self.population.extend(mutated_clones)?;

        // Evaluate everything whose payload changed.
        let report = self
            .aggregator
            .calculate_fitnesses(&mut self.population, &self.evaluator);
        summary.evaluation_failures = report.failures;

        // Survive: one predator drawn per generation; with nothing drawn the
        // pool is still trimmed elitistically so the size invariant holds.
        let removed = match self.registry.predator.draw(&mut self.rng) {
            Some((_, predator)) => predator.kill(
                &mut self.population,
                self.config.nkeep,
                self.config.keep_best,
                &mut self.rng,
            ),
            None => BestPredator::new().kill(
                &mut self.population,
                self.config.nkeep,
                self.config.keep_best,
                &mut self.rng,
            ),
        };
        summary.removed = removed.len();

        self.population.set_generation(generation);
        summary.fitness = FitnessStats::from_population(&self.population);
        self.best_history.push(summary.fitness.max);
        log::info!("{}", summary.log_line());
        self.stats.record(summary);
        Ok(())
    }
}
