//! Error types for distevo
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Error type for configuration validation
///
/// All of these are fatal at startup; no partial run is attempted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Operator weights in one category sum above 1.0
    #[error("{category} operator weights sum to {sum}, must not exceed 1.0")]
    WeightSumExceeded { category: String, sum: f64 },

    /// A configured operator name has no registered implementation
    #[error("Unknown {category} operator: {name}")]
    UnknownOperator { category: String, name: String },

    /// A configured fitness module name has no registered implementation
    #[error("Unknown fitness module: {0}")]
    UnknownModule(String),

    /// An operator or module parameter is missing or out of range
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Generic configuration problem
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Error type for operator failures
///
/// Operator errors are recovered locally: the affected individual or pair is
/// left unmodified and the generation continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperatorError {
    /// Crossover operation failed
    #[error("Crossover failed: {0}")]
    CrossoverFailed(String),

    /// Mutation operation failed
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// Selection operation failed
    #[error("Selection failed: {0}")]
    SelectionFailed(String),

    /// Predator operation failed
    #[error("Predator failed: {0}")]
    PredatorFailed(String),
}

/// Error type for fitness evaluation failures
///
/// These are recovered at the round level: the individual's module score is
/// marked invalid and the generation as a whole proceeds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    /// The fitness module itself reported a failure
    #[error("Module {module} failed: {reason}")]
    ModuleFailed { module: String, reason: String },

    /// No result arrived for a position before the round deadline
    #[error("Module {module} timed out for ordinal {ordinal}")]
    TimedOut { module: String, ordinal: usize },

    /// The worker disappeared mid-round
    #[error("Worker {worker} lost during gather")]
    WorkerLost { worker: usize },
}

/// Error type for population bookkeeping
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PopulationError {
    /// An individual with this id is already present
    #[error("Duplicate individual id: {0}")]
    DuplicateId(u64),

    /// No individual with this id exists
    #[error("No individual with id: {0}")]
    MissingId(u64),
}

/// Error type for checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// IO error during checkpoint
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Checkpoint version is newer than this build supports
    #[error("Version mismatch: expected <= {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Checkpoint file not found
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// Corrupted checkpoint data
    #[error("Corrupted checkpoint: {0}")]
    Corrupted(String),
}

/// Top-level error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Population bookkeeping error
    #[error("Population error: {0}")]
    Population(#[from] PopulationError),

    /// Checkpoint error
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// An evaluation round failed beyond per-individual recovery
    #[error("Evaluation round failed: {0}")]
    Evaluation(String),

    /// Empty population
    #[error("Empty population")]
    EmptyPopulation,
}

/// Result type alias for engine operations
pub type EvoResult<T> = Result<T, EngineError>;
