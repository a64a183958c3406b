//! Operator registry
//!
//! Factories turn configured (name, weight, params) rows into boxed operator
//! instances, collected per category into weighted sets. A weighted set draw
//! may return no operator at all: the unassigned probability mass (1 minus the
//! sum of configured weights) is the implicit no-op.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::{
    param_bool, param_f64, param_usize, EngineConfig, OperatorParams, OperatorTable,
    WEIGHT_SUM_TOLERANCE,
};
use crate::error::ConfigError;
use crate::operators::predator::{
    BestPredator, FussPredator, RankPredator, RoulettePredator, TournamentPredator,
};
use crate::operators::selection::{RandomPairSelection, RankSelection, TournamentSelection};
use crate::operators::traits::{
    CrossoverOperator, MutationOperator, PredatorStrategy, SelectionStrategy,
};
use crate::payload::Payload;

/// One named, weighted operator instance
struct WeightedEntry<T> {
    name: String,
    weight: f64,
    item: T,
}

/// A category of operators with weighted draws
///
/// Draws land on an entry with probability equal to its weight, or on nothing
/// with the remaining probability.
pub struct WeightedSet<T> {
    entries: Vec<WeightedEntry<T>>,
}

impl<T> WeightedSet<T> {
    /// Empty set: every draw is a no-op
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from (name, weight, item) rows, checking the weight sum
    pub fn from_entries(
        category: &str,
        entries: Vec<(String, f64, T)>,
    ) -> Result<Self, ConfigError> {
        let sum: f64 = entries.iter().map(|(_, w, _)| w).sum();
        if sum > 1.0 + WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSumExceeded {
                category: category.to_string(),
                sum,
            });
        }
        Ok(Self {
            entries: entries
                .into_iter()
                .map(|(name, weight, item)| WeightedEntry { name, weight, item })
                .collect(),
        })
    }

    /// Number of configured entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are configured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw one entry, or None for the implicit no-op
    pub fn draw(&self, rng: &mut StdRng) -> Option<(&str, &T)> {
        let r = rng.gen::<f64>();
        let mut cumulative = 0.0;
        for entry in &self.entries {
            cumulative += entry.weight;
            if r < cumulative {
                return Some((entry.name.as_str(), &entry.item));
            }
        }
        None
    }
}

type SelectionFactory<P> =
    Box<dyn Fn(&OperatorParams) -> Result<Box<dyn SelectionStrategy<P>>, ConfigError> + Send + Sync>;
type CrossoverFactory<P> =
    Box<dyn Fn(&OperatorParams) -> Result<Box<dyn CrossoverOperator<P>>, ConfigError> + Send + Sync>;
type MutationFactory<P> =
    Box<dyn Fn(&OperatorParams) -> Result<Box<dyn MutationOperator<P>>, ConfigError> + Send + Sync>;
type PredatorFactory<P> =
    Box<dyn Fn(&OperatorParams) -> Result<Box<dyn PredatorStrategy<P>>, ConfigError> + Send + Sync>;

/// Catalog of operator factories, keyed by name within each category
///
/// Selection and predator strategies are payload-agnostic and registered by
/// default; crossover and mutation operate on the domain payload and must be
/// registered by the embedding application.
pub struct OperatorCatalog<P: Payload> {
    selection: BTreeMap<String, SelectionFactory<P>>,
    crossover: BTreeMap<String, CrossoverFactory<P>>,
    mutation: BTreeMap<String, MutationFactory<P>>,
    predator: BTreeMap<String, PredatorFactory<P>>,
}

impl<P: Payload> Default for OperatorCatalog<P> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<P: Payload> OperatorCatalog<P> {
    /// Empty catalog with no registered factories
    pub fn empty() -> Self {
        Self {
            selection: BTreeMap::new(),
            crossover: BTreeMap::new(),
            mutation: BTreeMap::new(),
            predator: BTreeMap::new(),
        }
    }

    /// Catalog preloaded with the built-in selection and predator strategies
    pub fn with_defaults() -> Self {
        let mut catalog = Self::empty();

        catalog.register_selection("rank", |params| {
            let p_min = param_f64(params, "p_min", 0.01)?;
            let unique_parents = param_bool(params, "unique_parents", false)?;
            let unique_pairs = param_bool(params, "unique_pairs", false)?;
            Ok(Box::new(
                RankSelection::new(p_min)
                    .with_unique_parents(unique_parents)
                    .with_unique_pairs(unique_pairs),
            ))
        });
        catalog.register_selection("tournament", |params| {
            let size = param_usize(params, "tournament_size", 3)?;
            Ok(Box::new(TournamentSelection::new(size)))
        });
        catalog.register_selection("random_pair", |params| {
            let p = param_f64(params, "p", 0.5)?;
            Ok(Box::new(RandomPairSelection::new(p)))
        });

        catalog.register_predator("best", |_params| Ok(Box::new(BestPredator::new())));
        catalog.register_predator("roulette", |_params| Ok(Box::new(RoulettePredator::new())));
        catalog.register_predator("rank", |params| {
            let pressure = param_f64(params, "selection_pressure", 1.5)?;
            Ok(Box::new(RankPredator::new(pressure)))
        });
        catalog.register_predator("tournament", |params| {
            let size = param_usize(params, "tournament_size", 3)?;
            Ok(Box::new(TournamentPredator::new(size)))
        });
        catalog.register_predator("fuss", |_params| Ok(Box::new(FussPredator::new())));

        catalog
    }

    /// Register a selection strategy factory
    pub fn register_selection<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&OperatorParams) -> Result<Box<dyn SelectionStrategy<P>>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.selection.insert(name.to_string(), Box::new(factory));
    }

    /// Register a crossover operator factory
    pub fn register_crossover<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&OperatorParams) -> Result<Box<dyn CrossoverOperator<P>>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.crossover.insert(name.to_string(), Box::new(factory));
    }

    /// Register a mutation operator factory
    pub fn register_mutation<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&OperatorParams) -> Result<Box<dyn MutationOperator<P>>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.mutation.insert(name.to_string(), Box::new(factory));
    }

    /// Register a predator strategy factory
    pub fn register_predator<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&OperatorParams) -> Result<Box<dyn PredatorStrategy<P>>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.predator.insert(name.to_string(), Box::new(factory));
    }

    /// Instantiate every configured operator into a registry
    pub fn build_registry(&self, config: &EngineConfig) -> Result<OperatorRegistry<P>, ConfigError> {
        Ok(OperatorRegistry {
            selection: Self::build_category("selection", &self.selection, &config.selection)?,
            crossover: Self::build_category("crossover", &self.crossover, &config.crossover)?,
            mutation: Self::build_category("mutation", &self.mutation, &config.mutation)?,
            predator: Self::build_category("predator", &self.predator, &config.predator)?,
        })
    }

    fn build_category<T>(
        category: &str,
        factories: &BTreeMap<
            String,
            Box<dyn Fn(&OperatorParams) -> Result<T, ConfigError> + Send + Sync>,
        >,
        table: &OperatorTable,
    ) -> Result<WeightedSet<T>, ConfigError> {
        let mut entries = Vec::with_capacity(table.len());
        for (name, spec) in table {
            let factory = factories
                .get(name)
                .ok_or_else(|| ConfigError::UnknownOperator {
                    category: category.to_string(),
                    name: name.clone(),
                })?;
            entries.push((name.clone(), spec.weight, factory(&spec.params)?));
        }
        WeightedSet::from_entries(category, entries)
    }
}

/// Instantiated operators for one run
pub struct OperatorRegistry<P: Payload> {
    /// Selection strategies, one drawn per generation
    pub selection: WeightedSet<Box<dyn SelectionStrategy<P>>>,
    /// Crossover operators, one drawn per parent pair
    pub crossover: WeightedSet<Box<dyn CrossoverOperator<P>>>,
    /// Mutation operators, one drawn per individual
    pub mutation: WeightedSet<Box<dyn MutationOperator<P>>>,
    /// Predator strategies, one drawn per generation
    pub predator: WeightedSet<Box<dyn PredatorStrategy<P>>>,
}
