//! Fitness modules and aggregation

pub mod aggregator;
pub mod traits;

pub use aggregator::{EvaluationReport, FitnessAggregator, ModuleCatalog, ModuleEntry};
pub use traits::{FitnessModule, FnModule};

/// Prelude for fitness module
pub mod prelude {
    pub use super::aggregator::{EvaluationReport, FitnessAggregator, ModuleCatalog, ModuleEntry};
    pub use super::traits::{FitnessModule, FnModule};
}
