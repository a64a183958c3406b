//! Engine configuration
//!
//! Declarative run configuration: operator tables mapping registered names to
//! weights and parameters, fitness module weights, convergence strategy, and
//! checkpoint cadence. The whole structure is serde-friendly so runs can be
//! driven from JSON files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Tolerance applied when checking that category weights sum to at most 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Parameter bag passed to operator and module factories
pub type OperatorParams = Map<String, Value>;

/// Weight and parameters for one configured operator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperatorSpec {
    /// Draw probability within the operator's category
    pub weight: f64,
    /// Operator-specific parameters, interpreted by its factory
    #[serde(default)]
    pub params: OperatorParams,
}

impl OperatorSpec {
    /// Spec with a weight and no parameters
    pub fn weighted(weight: f64) -> Self {
        Self {
            weight,
            params: Map::new(),
        }
    }
}

/// Named operator table for one category
pub type OperatorTable = BTreeMap<String, OperatorSpec>;

/// Weight and parameters for one configured fitness module
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Contribution weight in the aggregated total
    pub weight: f64,
    /// Module-specific parameters, interpreted by its factory
    #[serde(default)]
    pub params: OperatorParams,
}

impl ModuleSpec {
    /// Spec with a weight and no parameters
    pub fn weighted(weight: f64) -> Self {
        Self {
            weight,
            params: Map::new(),
        }
    }
}

/// Convergence strategy selection
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ConvergenceConfig {
    /// Stop after a fixed number of generations
    MaxGen {
        /// Last generation allowed to run
        max_generations: usize,
    },
    /// Stop when the minimum fitness has not moved for `reqrep` generations
    GenRepMin {
        /// Movement below this is treated as no change
        tolerance: f64,
        /// Required consecutive repetitions
        reqrep: usize,
    },
    /// Stop when the mean fitness has not moved for `reqrep` generations
    GenRepAvg {
        /// Movement below this is treated as no change
        tolerance: f64,
        /// Required consecutive repetitions
        reqrep: usize,
    },
    /// Stop when the fitness standard deviation drops below a threshold
    Std {
        /// Standard deviation threshold
        tolerance: f64,
    },
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self::MaxGen {
            max_generations: 100,
        }
    }
}

/// Checkpoint persistence format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointFormat {
    /// Human-readable JSON
    Json,
    /// Compact binary with a magic/version header
    Binary,
}

/// Checkpoint cadence and placement
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory checkpoints are written to
    pub directory: std::path::PathBuf,
    /// Base file name, suffixed with the generation number
    #[serde(default = "default_base_name")]
    pub base_name: String,
    /// Save every this many generations
    #[serde(default = "default_interval")]
    pub interval: usize,
    /// Retain at most this many checkpoint files
    #[serde(default = "default_keep_n")]
    pub keep_n: usize,
    /// Persistence format
    #[serde(default = "default_format")]
    pub format: CheckpointFormat,
}

fn default_base_name() -> String {
    "checkpoint".to_string()
}

fn default_interval() -> usize {
    10
}

fn default_keep_n() -> usize {
    3
}

fn default_format() -> CheckpointFormat {
    CheckpointFormat::Json
}

/// Full engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Population size after each survive phase
    pub nkeep: usize,
    /// Number of evaluation workers
    #[serde(default = "default_nworkers")]
    pub nworkers: usize,
    /// Pin the best valid individual against removal
    #[serde(default = "default_true")]
    pub keep_best: bool,
    /// On mutation, keep the pristine original alongside the mutated clone
    #[serde(default)]
    pub keep_original: bool,
    /// RNG seed for the whole run
    #[serde(default)]
    pub seed: u64,
    /// Per-module evaluation round deadline in milliseconds
    #[serde(default = "default_eval_timeout_ms")]
    pub eval_timeout_ms: u64,
    /// Selection operator table
    #[serde(default)]
    pub selection: OperatorTable,
    /// Crossover operator table
    #[serde(default)]
    pub crossover: OperatorTable,
    /// Mutation operator table
    #[serde(default)]
    pub mutation: OperatorTable,
    /// Predator operator table
    #[serde(default)]
    pub predator: OperatorTable,
    /// Fitness module table
    pub fitness: BTreeMap<String, ModuleSpec>,
    /// Convergence strategy
    #[serde(default)]
    pub convergence: ConvergenceConfig,
    /// Checkpoint cadence; None disables checkpointing
    #[serde(default)]
    pub checkpoint: Option<CheckpointConfig>,
}

fn default_nworkers() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_eval_timeout_ms() -> u64 {
    30_000
}

impl EngineConfig {
    /// Minimal configuration with one fitness module at weight 1.0
    pub fn new(nkeep: usize, fitness_module: &str) -> Self {
        let mut fitness = BTreeMap::new();
        fitness.insert(fitness_module.to_string(), ModuleSpec::weighted(1.0));
        Self {
            nkeep,
            nworkers: default_nworkers(),
            keep_best: true,
            keep_original: false,
            seed: 0,
            eval_timeout_ms: default_eval_timeout_ms(),
            selection: OperatorTable::new(),
            crossover: OperatorTable::new(),
            mutation: OperatorTable::new(),
            predator: OperatorTable::new(),
            fitness,
            convergence: ConvergenceConfig::default(),
            checkpoint: None,
        }
    }

    /// Validate the configuration
    ///
    /// Checks structural constraints only; operator and module names are
    /// resolved against their catalogs at build time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nkeep == 0 {
            return Err(ConfigError::Invalid("nkeep must be at least 1".to_string()));
        }
        if self.nworkers == 0 {
            return Err(ConfigError::Invalid(
                "nworkers must be at least 1".to_string(),
            ));
        }
        if self.fitness.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one fitness module is required".to_string(),
            ));
        }
        for (name, spec) in &self.fitness {
            if !spec.weight.is_finite() || spec.weight < 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name: format!("fitness.{name}.weight"),
                    reason: "must be finite and non-negative".to_string(),
                });
            }
        }
        for (category, table) in [
            ("selection", &self.selection),
            ("crossover", &self.crossover),
            ("mutation", &self.mutation),
            ("predator", &self.predator),
        ] {
            Self::validate_table(category, table)?;
        }
        Ok(())
    }

    fn validate_table(category: &str, table: &OperatorTable) -> Result<(), ConfigError> {
        let mut sum = 0.0;
        for (name, spec) in table {
            if !spec.weight.is_finite() || spec.weight < 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name: format!("{category}.{name}.weight"),
                    reason: "must be finite and non-negative".to_string(),
                });
            }
            sum += spec.weight;
        }
        if sum > 1.0 + WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSumExceeded {
                category: category.to_string(),
                sum,
            });
        }
        Ok(())
    }
}

/// Read an f64 parameter with a default
pub fn param_f64(params: &OperatorParams, name: &str, default: f64) -> Result<f64, ConfigError> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value.as_f64().ok_or_else(|| ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: "expected a number".to_string(),
        }),
    }
}

/// Read a usize parameter with a default
pub fn param_usize(
    params: &OperatorParams,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| ConfigError::InvalidParameter {
                name: name.to_string(),
                reason: "expected a non-negative integer".to_string(),
            }),
    }
}

/// Read a bool parameter with a default
pub fn param_bool(params: &OperatorParams, name: &str, default: bool) -> Result<bool, ConfigError> {
    match params.get(name) {
        None => Ok(default),
        Some(value) => value.as_bool().ok_or_else(|| ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
