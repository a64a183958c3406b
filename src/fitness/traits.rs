//! Fitness module trait
//!
//! A fitness module scores one aspect of an individual. Modules are combined
//! by the aggregator with configured weights; each returns a raw scalar plus a
//! short diagnostic string kept for reporting.

use crate::error::EvaluationError;
use crate::payload::Payload;
use crate::population::Individual;

/// One scoring concern, evaluated per individual
pub trait FitnessModule<P: Payload>: Send + Sync {
    /// Stable module name, used in configuration and per-module caches
    fn name(&self) -> &str;

    /// Score one individual, returning the raw scalar and a diagnostic note
    fn evaluate(&self, individual: &Individual<P>) -> Result<(f64, String), EvaluationError>;

    /// Score a batch of individuals
    ///
    /// The default evaluates one at a time; modules backed by an external
    /// process can override this to amortize setup cost.
    fn evaluate_batch(
        &self,
        individuals: &[Individual<P>],
    ) -> Vec<Result<(f64, String), EvaluationError>> {
        individuals.iter().map(|i| self.evaluate(i)).collect()
    }

    /// True when a single evaluation can take long enough to hit the round
    /// deadline under normal operation
    fn may_block(&self) -> bool {
        false
    }
}

/// Adaptor turning a closure into a fitness module
pub struct FnModule<F> {
    name: String,
    func: F,
}

impl<F> FnModule<F> {
    /// Wrap a closure under the given module name
    pub fn new(name: &str, func: F) -> Self {
        Self {
            name: name.to_string(),
            func,
        }
    }
}

impl<P, F> FitnessModule<P> for FnModule<F>
where
    P: Payload,
    F: Fn(&Individual<P>) -> Result<(f64, String), EvaluationError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, individual: &Individual<P>) -> Result<(f64, String), EvaluationError> {
        (self.func)(individual)
    }
}
