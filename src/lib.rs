//! # distevo
//!
//! A population-based evolutionary search engine with pluggable, weighted
//! operators and distributed fitness evaluation.
//!
//! The engine drives a classic generation loop over an opaque domain payload:
//! parent selection, crossover, mutation, evaluation, and survivor selection.
//! Each operator category is a weighted table of named operators; draws may
//! land on an implicit no-op when the configured weights sum below one.
//! Fitness is the weighted combination of independent modules, evaluated by a
//! scatter/gather worker pool with a round deadline and one retry. Runs can
//! be checkpointed atomically and resumed.
//!
//! ## Example
//!
//! ```
//! use distevo::config::{EngineConfig, ConvergenceConfig};
//! use distevo::engine::Engine;
//! use distevo::fitness::{FnModule, ModuleCatalog};
//! use distevo::population::Individual;
//! use std::sync::Arc;
//!
//! let mut config = EngineConfig::new(8, "sum");
//! config.convergence = ConvergenceConfig::MaxGen { max_generations: 5 };
//!
//! let mut modules = ModuleCatalog::new();
//! modules.register("sum", |_| {
//!     Ok(Arc::new(FnModule::new("sum", |ind: &Individual<Vec<f64>>| {
//!         Ok((ind.payload.iter().sum(), String::new()))
//!     })))
//! });
//!
//! let engine = Engine::builder()
//!     .config(config)
//!     .modules(modules)
//!     .initial_population((0..8).map(|i| Individual::new(vec![i as f64])).collect())
//!     .build()
//!     .unwrap();
//! let result = engine.run().unwrap();
//! assert_eq!(result.generation, 5);
//! ```

pub mod checkpoint;
pub mod config;
pub mod convergence;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod fitness;
pub mod operators;
pub mod payload;
pub mod population;
pub mod stats;

/// Common imports for engine embedders
pub mod prelude {
    pub use crate::checkpoint::{Checkpoint, CheckpointManager};
    pub use crate::config::{ConvergenceConfig, EngineConfig, ModuleSpec, OperatorSpec};
    pub use crate::engine::{Engine, EngineBuilder, RunResult};
    pub use crate::error::{EngineError, EvoResult};
    pub use crate::evaluate::{DistributedEvaluator, PartitionPolicy};
    pub use crate::fitness::{FitnessAggregator, FitnessModule, FnModule, ModuleCatalog};
    pub use crate::operators::{
        CrossoverOperator, MutationOperator, OperatorCatalog, PredatorStrategy, SelectionStrategy,
    };
    pub use crate::payload::Payload;
    pub use crate::population::{Individual, Population, Provenance};
    pub use crate::stats::{FitnessStats, GenerationSummary, RunStats};
}
