//! Genetic operators
//!
//! Traits for the four operator seams, the built-in selection and predator
//! strategies, and the weighted registry that draws operators per generation.

pub mod predator;
pub mod registry;
pub mod selection;
pub mod traits;

pub use predator::{BestPredator, FussPredator, RankPredator, RoulettePredator, TournamentPredator};
pub use registry::{OperatorCatalog, OperatorRegistry, WeightedSet};
pub use selection::{RandomPairSelection, RankSelection, TournamentSelection};
pub use traits::{CrossoverOperator, MutationOperator, PredatorStrategy, SelectionStrategy};

/// Prelude for operators module
pub mod prelude {
    pub use super::registry::{OperatorCatalog, OperatorRegistry, WeightedSet};
    pub use super::traits::{
        CrossoverOperator, MutationOperator, PredatorStrategy, SelectionStrategy,
    };
}
