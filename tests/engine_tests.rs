//! End-to-end engine runs over a small vector payload

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use distevo::checkpoint::load_checkpoint;
use distevo::config::{
    CheckpointConfig, CheckpointFormat, ConvergenceConfig, EngineConfig, ModuleSpec, OperatorSpec,
};
use distevo::engine::Engine;
use distevo::error::OperatorError;
use distevo::fitness::{FnModule, ModuleCatalog};
use distevo::operators::{CrossoverOperator, MutationOperator, OperatorCatalog};
use distevo::population::Individual;
use rand::rngs::StdRng;
use rand::Rng;

type Genome = Vec<f64>;

/// Single-point-ish crossover: children average their parents.
struct BlendCrossover;

impl CrossoverOperator<Genome> for BlendCrossover {
    fn crossover(
        &self,
        parent_a: &Individual<Genome>,
        parent_b: &Individual<Genome>,
        _rng: &mut StdRng,
    ) -> Result<(Option<Individual<Genome>>, Option<Individual<Genome>>), OperatorError> {
        let blended: Genome = parent_a
            .payload
            .iter()
            .zip(&parent_b.payload)
            .map(|(a, b)| (a + b) / 2.0)
            .collect();
        Ok((Some(Individual::new(blended)), None))
    }
}

/// Additive noise on every gene.
struct JitterMutation {
    scale: f64,
}

impl MutationOperator<Genome> for JitterMutation {
    fn mutate(&self, payload: &mut Genome, rng: &mut StdRng) -> Result<bool, OperatorError> {
        for gene in payload.iter_mut() {
            *gene += (rng.gen::<f64>() - 0.5) * self.scale;
        }
        Ok(true)
    }
}

/// Mutation that always declines.
struct NeverMutation;

impl MutationOperator<Genome> for NeverMutation {
    fn mutate(&self, _payload: &mut Genome, _rng: &mut StdRng) -> Result<bool, OperatorError> {
        Ok(false)
    }
}

fn catalog_with_genome_operators() -> OperatorCatalog<Genome> {
    let mut catalog = OperatorCatalog::with_defaults();
    catalog.register_crossover("blend", |_| Ok(Box::new(BlendCrossover)));
    catalog.register_mutation("jitter", |params| {
        let scale = distevo::config::param_f64(params, "scale", 0.1)?;
        Ok(Box::new(JitterMutation { scale }))
    });
    catalog.register_mutation("never", |_| Ok(Box::new(NeverMutation)));
    catalog
}

fn constant_modules() -> ModuleCatalog<Genome> {
    let mut modules = ModuleCatalog::new();
    modules.register("constant", |_| {
        Ok(Arc::new(FnModule::new(
            "constant",
            |_: &Individual<Genome>| Ok((1.0, String::new())),
        )))
    });
    modules
}

fn first_gene_modules() -> ModuleCatalog<Genome> {
    let mut modules = ModuleCatalog::new();
    modules.register("first_gene", |_| {
        Ok(Arc::new(FnModule::new(
            "first_gene",
            |ind: &Individual<Genome>| Ok((ind.payload[0], String::new())),
        )))
    });
    modules
}

fn seeds(values: &[f64]) -> Vec<Individual<Genome>> {
    values.iter().map(|&v| Individual::new(vec![v])).collect()
}

#[test]
fn constant_fitness_run_is_steady() {
    let mut config = EngineConfig::new(10, "constant");
    config.convergence = ConvergenceConfig::MaxGen { max_generations: 3 };

    let engine = Engine::builder()
        .config(config)
        .modules(constant_modules())
        .initial_population(seeds(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]))
        .build()
        .unwrap();
    let result = engine.run().unwrap();

    assert_eq!(result.generation, 3);
    assert_eq!(result.reason, "maximum generation count reached");
    for summary in &result.stats.generations {
        assert_eq!(summary.fitness.evaluated, 10);
        assert_eq!(summary.fitness.min, 1.0);
        assert_eq!(summary.fitness.max, 1.0);
        assert_eq!(summary.removed, 0);
    }
}

#[test]
fn best_predator_keeps_the_fittest_individual() {
    let mut config = EngineConfig::new(1, "first_gene");
    config.convergence = ConvergenceConfig::MaxGen { max_generations: 1 };
    config
        .predator
        .insert("best".to_string(), OperatorSpec::weighted(1.0));

    let engine = Engine::builder()
        .config(config)
        .modules(first_gene_modules())
        .initial_population(seeds(&[1.0, 5.0]))
        .build()
        .unwrap();
    let result = engine.run().unwrap();

    let best = result.best.unwrap();
    assert_eq!(best.fitness, Some(5.0));
    assert_eq!(best.id, Some(2));
}

#[test]
fn declined_mutation_leaves_evaluation_state_untouched() {
    let mut config = EngineConfig::new(5, "constant");
    config.convergence = ConvergenceConfig::MaxGen { max_generations: 3 };
    config
        .mutation
        .insert("never".to_string(), OperatorSpec::weighted(1.0));

    let engine = Engine::builder()
        .config(config)
        .operators(catalog_with_genome_operators())
        .modules(constant_modules())
        .initial_population(seeds(&[0.0, 1.0, 2.0, 3.0, 4.0]))
        .build()
        .unwrap();
    let result = engine.run().unwrap();

    for summary in &result.stats.generations {
        assert_eq!(summary.mutation_attempts, 5);
        assert_eq!(summary.mutation_successes, 0);
        // Nothing was re-evaluated after the seed round.
        assert_eq!(summary.evaluation_failures, 0);
        assert_eq!(summary.fitness.evaluated, 5);
    }
}

#[test]
fn timed_out_individual_is_excluded_from_stats_and_survival() {
    let mut config = EngineConfig::new(3, "slow");
    config.convergence = ConvergenceConfig::MaxGen { max_generations: 1 };
    config.eval_timeout_ms = 300;
    config.nworkers = 4;
    config.fitness.clear();
    config
        .fitness
        .insert("slow".to_string(), ModuleSpec::weighted(1.0));
    config
        .predator
        .insert("best".to_string(), OperatorSpec::weighted(1.0));

    let mut modules = ModuleCatalog::new();
    modules.register("slow", |_| {
        Ok(Arc::new(FnModule::new("slow", |ind: &Individual<Genome>| {
            if ind.payload[0] == 9.0 {
                // Never answers within the deadline.
                std::thread::sleep(Duration::from_secs(30));
            }
            Ok((ind.payload[0], String::new()))
        })))
    });

    let engine = Engine::builder()
        .config(config)
        .modules(modules)
        .initial_population(seeds(&[1.0, 2.0, 3.0, 9.0]))
        .build()
        .unwrap();
    let result = engine.run().unwrap();

    // The hung individual would have the best score, but it never finished
    // and must not survive or skew the statistics.
    let summary = &result.stats.generations[0];
    assert_eq!(summary.fitness.evaluated, 3);
    assert_eq!(summary.fitness.max, 3.0);
    assert_eq!(result.best.unwrap().fitness, Some(3.0));
}

#[test]
fn zero_weight_crossover_never_fires() {
    let mut config = EngineConfig::new(6, "constant");
    config.convergence = ConvergenceConfig::MaxGen { max_generations: 4 };
    config
        .selection
        .insert("tournament".to_string(), OperatorSpec::weighted(1.0));
    config
        .crossover
        .insert("blend".to_string(), OperatorSpec::weighted(0.0));

    let engine = Engine::builder()
        .config(config)
        .operators(catalog_with_genome_operators())
        .modules(constant_modules())
        .initial_population(seeds(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]))
        .build()
        .unwrap();
    let result = engine.run().unwrap();

    for summary in &result.stats.generations {
        assert!(summary.pairs_selected > 0);
        assert_eq!(summary.crossover_attempts, 0);
        assert_eq!(summary.children, 0);
    }
}

#[test]
fn full_operator_stack_improves_fitness() {
    let mut config = EngineConfig::new(8, "first_gene");
    config.seed = 7;
    // Mutated clones are added next to their pristine originals, so the
    // per-generation maximum can only ratchet upward.
    config.keep_original = true;
    config.convergence = ConvergenceConfig::MaxGen {
        max_generations: 30,
    };
    config
        .selection
        .insert("rank".to_string(), OperatorSpec::weighted(1.0));
    config
        .crossover
        .insert("blend".to_string(), OperatorSpec::weighted(0.9));
    let mut jitter = OperatorSpec::weighted(0.5);
    jitter
        .params
        .insert("scale".to_string(), serde_json::json!(1.0));
    config.mutation.insert("jitter".to_string(), jitter);
    config
        .predator
        .insert("best".to_string(), OperatorSpec::weighted(1.0));

    let engine = Engine::builder()
        .config(config)
        .operators(catalog_with_genome_operators())
        .modules(first_gene_modules())
        .initial_population(seeds(&[0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7]))
        .build()
        .unwrap();
    let result = engine.run().unwrap();

    let history: Vec<f64> = result
        .stats
        .generations
        .iter()
        .map(|g| g.fitness.max)
        .collect();
    // Elitism keeps the maximum monotone; jitter should push it past the
    // seeded optimum at some point over 30 generations.
    for pair in history.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-12);
    }
    assert!(*history.last().unwrap() > 0.7);
}

#[test]
fn checkpoint_resume_continues_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::new(6, "first_gene");
    config.seed = 21;
    config.convergence = ConvergenceConfig::MaxGen { max_generations: 4 };
    config
        .mutation
        .insert("jitter".to_string(), OperatorSpec::weighted(0.5));
    config
        .predator
        .insert("best".to_string(), OperatorSpec::weighted(1.0));
    config.checkpoint = Some(CheckpointConfig {
        directory: dir.path().to_path_buf(),
        base_name: "run".to_string(),
        interval: 2,
        keep_n: 5,
        format: CheckpointFormat::Json,
    });

    let engine = Engine::builder()
        .config(config.clone())
        .operators(catalog_with_genome_operators())
        .modules(first_gene_modules())
        .initial_population(seeds(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]))
        .build()
        .unwrap();
    let first = engine.run().unwrap();
    assert_eq!(first.generation, 4);

    let checkpoint =
        load_checkpoint::<Genome>(&dir.path().join("run_gen000004.json")).unwrap();
    assert_eq!(checkpoint.generation, 4);
    assert_eq!(checkpoint.seed, 21);
    assert_eq!(checkpoint.population.len(), 6);

    // Resume with a higher generation budget and keep going.
    let mut resumed_config = config;
    resumed_config.convergence = ConvergenceConfig::MaxGen { max_generations: 8 };
    let resumed = Engine::builder()
        .config(resumed_config)
        .operators(catalog_with_genome_operators())
        .modules(first_gene_modules())
        .resume_from(checkpoint)
        .build()
        .unwrap();
    let second = resumed.run().unwrap();

    assert_eq!(second.generation, 8);
    // The resumed run carries the earlier summaries forward.
    assert_eq!(second.stats.num_generations(), 8);
    // Ids allocated after resume never collide with checkpointed ones.
    let max_summary_gen = second
        .stats
        .generations
        .iter()
        .map(|g| g.generation)
        .max()
        .unwrap();
    assert_eq!(max_summary_gen, 8);
}

#[test]
fn fixed_seed_runs_are_identical() {
    let run = || {
        let mut config = EngineConfig::new(6, "first_gene");
        config.seed = 1234;
        config.convergence = ConvergenceConfig::MaxGen { max_generations: 6 };
        config
            .selection
            .insert("rank".to_string(), OperatorSpec::weighted(0.7));
        config
            .crossover
            .insert("blend".to_string(), OperatorSpec::weighted(0.6));
        config
            .mutation
            .insert("jitter".to_string(), OperatorSpec::weighted(0.4));
        config
            .predator
            .insert("roulette".to_string(), OperatorSpec::weighted(0.8));

        let engine = Engine::builder()
            .config(config)
            .operators(catalog_with_genome_operators())
            .modules(first_gene_modules())
            .initial_population(seeds(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]))
            .build()
            .unwrap();
        engine.run().unwrap()
    };

    let a = run();
    let b = run();
    assert_eq!(a.best.as_ref().unwrap().fitness, b.best.as_ref().unwrap().fitness);
    assert_eq!(a.best.as_ref().unwrap().id, b.best.as_ref().unwrap().id);
    let line = |r: &distevo::engine::RunResult<Genome>| -> Vec<String> {
        r.stats.generations.iter().map(|g| g.log_line()).collect()
    };
    assert_eq!(line(&a), line(&b));
}

#[test]
fn population_size_invariant_holds_every_generation() {
    let mut config = EngineConfig::new(5, "first_gene");
    config.seed = 3;
    config.convergence = ConvergenceConfig::MaxGen {
        max_generations: 10,
    };
    config
        .selection
        .insert("tournament".to_string(), OperatorSpec::weighted(1.0));
    config
        .crossover
        .insert("blend".to_string(), OperatorSpec::weighted(1.0));
    config
        .mutation
        .insert("jitter".to_string(), OperatorSpec::weighted(0.3));
    // No predator configured: the engine falls back to elitist trimming.

    let engine = Engine::builder()
        .config(config)
        .operators(catalog_with_genome_operators())
        .modules(first_gene_modules())
        .initial_population(seeds(&[0.0, 1.0, 2.0, 3.0, 4.0]))
        .build()
        .unwrap();
    let result = engine.run().unwrap();

    for summary in &result.stats.generations {
        assert_eq!(
            summary.fitness.evaluated + summary.fitness.invalid,
            5,
            "generation {} broke the size invariant",
            summary.generation
        );
    }
}

#[test]
fn keep_original_adds_mutated_clones() {
    static MUTATIONS: AtomicUsize = AtomicUsize::new(0);

    struct CountingJitter;
    impl MutationOperator<Genome> for CountingJitter {
        fn mutate(&self, payload: &mut Genome, _rng: &mut StdRng) -> Result<bool, OperatorError> {
            MUTATIONS.fetch_add(1, Ordering::SeqCst);
            payload[0] += 1.0;
            Ok(true)
        }
    }

    let mut config = EngineConfig::new(4, "first_gene");
    config.keep_original = true;
    config.convergence = ConvergenceConfig::MaxGen { max_generations: 1 };
    config
        .mutation
        .insert("bump".to_string(), OperatorSpec::weighted(1.0));
    config
        .predator
        .insert("best".to_string(), OperatorSpec::weighted(1.0));

    let mut catalog = OperatorCatalog::with_defaults();
    catalog.register_mutation("bump", |_| Ok(Box::new(CountingJitter)));

    let engine = Engine::builder()
        .config(config)
        .operators(catalog)
        .modules(first_gene_modules())
        .initial_population(seeds(&[0.0, 1.0, 2.0, 3.0]))
        .build()
        .unwrap();
    let result = engine.run().unwrap();

    assert_eq!(MUTATIONS.load(Ordering::SeqCst), 4);
    let summary = &result.stats.generations[0];
    // Four originals plus four bumped clones existed before the predator
    // trimmed back to nkeep.
    assert_eq!(summary.mutation_successes, 4);
    assert_eq!(summary.removed, 4);
    // The best is a bumped clone of the 3.0 seed.
    assert_eq!(result.best.unwrap().fitness, Some(4.0));
}
