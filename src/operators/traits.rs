//! Operator traits
//!
//! The four operator seams of the generation loop. Concrete crossover and
//! mutation bodies are domain-specific and supplied by the embedding
//! application; selection and predator strategies ship with the crate.

use rand::rngs::StdRng;

use crate::error::OperatorError;
use crate::payload::Payload;
use crate::population::{Individual, Population};

/// Selection operator trait
///
/// Picks parent pairs for reproduction. At most `floor(len/2)` pairs may be
/// returned; only individuals with a usable fitness are eligible.
pub trait SelectionStrategy<P: Payload>: Send + Sync {
    /// Select parent pairs from the population, returned as id pairs
    fn select_pairs(&self, population: &Population<P>, rng: &mut StdRng) -> Vec<(u64, u64)>;
}

/// Crossover operator trait
///
/// Combines two parents into up to two children. A child carries
/// `needs_evaluation = true`, no id, and provenance naming the operator and
/// both parent ids; the caller fills in provenance.
pub trait CrossoverOperator<P: Payload>: Send + Sync {
    /// Apply crossover to two parents
    ///
    /// Either child slot may be `None` when the operator declines to produce
    /// it.
    #[allow(clippy::type_complexity)]
    fn crossover(
        &self,
        parent_a: &Individual<P>,
        parent_b: &Individual<P>,
        rng: &mut StdRng,
    ) -> Result<(Option<Individual<P>>, Option<Individual<P>>), OperatorError>;
}

/// Mutation operator trait
///
/// Perturbs a payload in place. `Ok(false)` means the operator declined (for
/// example, no eligible sites) and the individual must be left untouched;
/// this is distinct from an error.
pub trait MutationOperator<P: Payload>: Send + Sync {
    /// Apply mutation to a payload, reporting whether a structural change
    /// was made
    fn mutate(&self, payload: &mut P, rng: &mut StdRng) -> Result<bool, OperatorError>;
}

/// Predator (survivor selection) operator trait
///
/// Trims the population back to `nkeep`, returning the removed individuals.
/// Implementations must discard fitness-invalid individuals first and, when
/// `keep_best` is set, pin the single best valid individual so the strategy
/// can never remove it.
pub trait PredatorStrategy<P: Payload>: Send + Sync {
    /// Reduce the population to `nkeep` members
    fn kill(
        &self,
        population: &mut Population<P>,
        nkeep: usize,
        keep_best: bool,
        rng: &mut StdRng,
    ) -> Vec<Individual<P>>;
}
