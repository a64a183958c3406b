//! Minimize the sphere function with the full operator stack.
//!
//! Run with logging:
//!
//! ```sh
//! RUST_LOG=info cargo run --example sphere_search
//! ```

use std::sync::Arc;

use distevo::config::{ConvergenceConfig, EngineConfig, OperatorSpec};
use distevo::engine::Engine;
use distevo::error::OperatorError;
use distevo::fitness::{FnModule, ModuleCatalog};
use distevo::operators::{CrossoverOperator, MutationOperator, OperatorCatalog};
use distevo::population::Individual;
use rand::rngs::StdRng;
use rand::Rng;

type Genome = Vec<f64>;

struct BlendCrossover;

impl CrossoverOperator<Genome> for BlendCrossover {
    fn crossover(
        &self,
        parent_a: &Individual<Genome>,
        parent_b: &Individual<Genome>,
        rng: &mut StdRng,
    ) -> Result<(Option<Individual<Genome>>, Option<Individual<Genome>>), OperatorError> {
        let alpha = rng.gen::<f64>();
        let mix = |a: &Genome, b: &Genome| -> Genome {
            a.iter()
                .zip(b)
                .map(|(x, y)| alpha * x + (1.0 - alpha) * y)
                .collect()
        };
        Ok((
            Some(Individual::new(mix(&parent_a.payload, &parent_b.payload))),
            Some(Individual::new(mix(&parent_b.payload, &parent_a.payload))),
        ))
    }
}

struct GaussianJitter {
    sigma: f64,
}

impl MutationOperator<Genome> for GaussianJitter {
    fn mutate(&self, payload: &mut Genome, rng: &mut StdRng) -> Result<bool, OperatorError> {
        use rand_distr::{Distribution, Normal};
        let normal = Normal::new(0.0, self.sigma)
            .map_err(|e| OperatorError::MutationFailed(e.to_string()))?;
        for gene in payload.iter_mut() {
            *gene += normal.sample(rng);
        }
        Ok(true)
    }
}

fn main() {
    env_logger::init();

    let mut config = EngineConfig::new(20, "sphere");
    config.seed = 2024;
    config.keep_original = true;
    config.convergence = ConvergenceConfig::GenRepAvg {
        tolerance: 1e-9,
        reqrep: 20,
    };
    config
        .selection
        .insert("rank".to_string(), OperatorSpec::weighted(1.0));
    config
        .crossover
        .insert("blend".to_string(), OperatorSpec::weighted(0.8));
    config
        .mutation
        .insert("jitter".to_string(), OperatorSpec::weighted(0.4));
    config
        .predator
        .insert("best".to_string(), OperatorSpec::weighted(1.0));

    let mut operators = OperatorCatalog::with_defaults();
    operators.register_crossover("blend", |_| Ok(Box::new(BlendCrossover)));
    operators.register_mutation("jitter", |params| {
        let sigma = distevo::config::param_f64(params, "sigma", 0.25)?;
        Ok(Box::new(GaussianJitter { sigma }))
    });

    let mut modules = ModuleCatalog::new();
    modules.register("sphere", |_| {
        Ok(Arc::new(FnModule::new(
            "sphere",
            |ind: &Individual<Genome>| {
                let distance: f64 = ind.payload.iter().map(|x| x * x).sum();
                Ok((-distance, format!("d2={distance:.4}")))
            },
        )))
    });

    let mut seed_rng = <StdRng as rand::SeedableRng>::seed_from_u64(1);
    let initial = (0..20)
        .map(|_| Individual::new((0..5).map(|_| seed_rng.gen_range(-5.0..5.0)).collect()))
        .collect();

    let engine = Engine::builder()
        .config(config)
        .operators(operators)
        .modules(modules)
        .initial_population(initial)
        .build()
        .expect("engine configuration is valid");

    let result = engine.run().expect("run completes");
    let best = result.best.expect("at least one valid individual");
    println!(
        "stopped after generation {} ({}): best fitness {:.6} at {:?}",
        result.generation,
        result.reason,
        best.fitness.unwrap_or(f64::NAN),
        best.payload,
    );
}
