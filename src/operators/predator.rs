//! Predator (survivor selection) strategies
//!
//! A predator trims the combined pool back to the target size after
//! evaluation. Fitness-invalid individuals are discarded before any strategy
//! runs; with `keep_best`, the single best valid individual is pinned and can
//! never be removed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};

use crate::operators::traits::PredatorStrategy;
use crate::payload::Payload;
use crate::population::{Individual, Population};

/// Drop every fitness-invalid or unevaluated individual from the pool
///
/// Returns the removed individuals. Run by every strategy before survivor
/// selection proper.
fn purge_invalid<P: Payload>(population: &mut Population<P>) -> Vec<Individual<P>> {
    let doomed: Vec<u64> = population
        .iter()
        .filter(|i| !i.is_valid())
        .filter_map(|i| i.id)
        .collect();
    doomed
        .into_iter()
        .filter_map(|id| population.remove(id))
        .collect()
}

/// Id of the pinned individual, when elitism is requested
fn pinned_id<P: Payload>(population: &Population<P>, keep_best: bool) -> Option<u64> {
    if keep_best {
        population.best().and_then(|b| b.id)
    } else {
        None
    }
}

/// Retain exactly the given survivor ids, returning everyone else
fn retain_survivors<P: Payload>(
    population: &mut Population<P>,
    survivors: &[u64],
) -> Vec<Individual<P>> {
    let doomed: Vec<u64> = population
        .ids()
        .into_iter()
        .filter(|id| !survivors.contains(id))
        .collect();
    doomed
        .into_iter()
        .filter_map(|id| population.remove(id))
        .collect()
}

/// Elitist predator: keep the top `nkeep` by fitness, ties to the lower id
#[derive(Clone, Debug, Default)]
pub struct BestPredator;

impl BestPredator {
    /// Create a new elitist predator
    pub fn new() -> Self {
        Self
    }
}

impl<P: Payload> PredatorStrategy<P> for BestPredator {
    fn kill(
        &self,
        population: &mut Population<P>,
        nkeep: usize,
        _keep_best: bool,
        _rng: &mut StdRng,
    ) -> Vec<Individual<P>> {
        let mut removed = purge_invalid(population);

        let mut ranked = population.valid_fitnesses();
        // Descending fitness, ascending id on ties.
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let survivors: Vec<u64> = ranked.iter().take(nkeep).map(|(id, _)| *id).collect();
        removed.extend(retain_survivors(population, &survivors));
        removed
    }
}

/// Roulette predator: survival probability proportional to offset fitness
#[derive(Clone, Debug, Default)]
pub struct RoulettePredator;

impl RoulettePredator {
    /// Create a new roulette predator
    pub fn new() -> Self {
        Self
    }
}

impl<P: Payload> PredatorStrategy<P> for RoulettePredator {
    fn kill(
        &self,
        population: &mut Population<P>,
        nkeep: usize,
        keep_best: bool,
        rng: &mut StdRng,
    ) -> Vec<Individual<P>> {
        let mut removed = purge_invalid(population);
        let pinned = pinned_id(population, keep_best);

        let mut pool = population.valid_fitnesses();
        let min_fitness = pool
            .iter()
            .map(|(_, f)| *f)
            .fold(f64::INFINITY, f64::min);
        let offset = if min_fitness < 0.0 { -min_fitness + 1.0 } else { 0.0 };

        let mut survivors: Vec<u64> = Vec::with_capacity(nkeep);
        if let Some(id) = pinned {
            survivors.push(id);
            pool.retain(|&(pid, _)| pid != id);
        }
        while survivors.len() < nkeep && !pool.is_empty() {
            let weights: Vec<f64> = pool.iter().map(|(_, f)| f + offset).collect();
            let idx = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(rng),
                Err(_) => rng.gen_range(0..pool.len()),
            };
            survivors.push(pool[idx].0);
            pool.remove(idx);
        }
        removed.extend(retain_survivors(population, &survivors));
        removed
    }
}

/// Rank predator: survival probability by Baker linear ranking
#[derive(Clone, Debug)]
pub struct RankPredator {
    /// Selection pressure in [1.0, 2.0]
    pub selection_pressure: f64,
}

impl RankPredator {
    /// Create a new rank predator
    pub fn new(selection_pressure: f64) -> Self {
        Self {
            selection_pressure: selection_pressure.clamp(1.0, 2.0),
        }
    }
}

impl Default for RankPredator {
    fn default() -> Self {
        Self::new(1.5)
    }
}

impl<P: Payload> PredatorStrategy<P> for RankPredator {
    fn kill(
        &self,
        population: &mut Population<P>,
        nkeep: usize,
        keep_best: bool,
        rng: &mut StdRng,
    ) -> Vec<Individual<P>> {
        let mut removed = purge_invalid(population);
        let pinned = pinned_id(population, keep_best);

        let mut pool = population.valid_fitnesses();
        pool.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut survivors: Vec<u64> = Vec::with_capacity(nkeep);
        if let Some(id) = pinned {
            survivors.push(id);
            pool.retain(|&(pid, _)| pid != id);
        }
        let sp = self.selection_pressure;
        while survivors.len() < nkeep && !pool.is_empty() {
            let n = pool.len();
            // Baker's linear ranking: weight(rank) = 2 - sp + 2(sp-1)rank/(n-1)
            let weights: Vec<f64> = (0..n)
                .map(|rank| {
                    if n == 1 {
                        1.0
                    } else {
                        2.0 - sp + 2.0 * (sp - 1.0) * rank as f64 / (n - 1) as f64
                    }
                })
                .collect();
            let idx = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(rng),
                Err(_) => rng.gen_range(0..n),
            };
            survivors.push(pool[idx].0);
            pool.remove(idx);
        }
        removed.extend(retain_survivors(population, &survivors));
        removed
    }
}

/// Tournament predator: each survivor slot is won by the best of a random
/// subset of the remaining pool
#[derive(Clone, Debug)]
pub struct TournamentPredator {
    /// Number of candidates competing per tournament
    pub tournament_size: usize,
}

impl TournamentPredator {
    /// Create a new tournament predator
    pub fn new(tournament_size: usize) -> Self {
        Self {
            tournament_size: tournament_size.max(1),
        }
    }
}

impl<P: Payload> PredatorStrategy<P> for TournamentPredator {
    fn kill(
        &self,
        population: &mut Population<P>,
        nkeep: usize,
        keep_best: bool,
        rng: &mut StdRng,
    ) -> Vec<Individual<P>> {
        let mut removed = purge_invalid(population);
        let pinned = pinned_id(population, keep_best);

        let mut pool = population.valid_fitnesses();
        let mut survivors: Vec<u64> = Vec::with_capacity(nkeep);
        if let Some(id) = pinned {
            survivors.push(id);
            pool.retain(|&(pid, _)| pid != id);
        }
        while survivors.len() < nkeep && !pool.is_empty() {
            let size = self.tournament_size.min(pool.len());
            let entrants: Vec<(u64, f64)> = pool.choose_multiple(rng, size).copied().collect();
            let winner = entrants
                .iter()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(id, _)| *id);
            if let Some(id) = winner {
                survivors.push(id);
                pool.retain(|&(pid, _)| pid != id);
            }
        }
        removed.extend(retain_survivors(population, &survivors));
        removed
    }
}

/// FUSS predator (Fixed Uniform Selection Scheme)
///
/// Picks a uniform random point on the fitness interval and keeps the
/// `nkeep` individuals whose fitness is nearest that point. Preserves
/// diversity better than pure elitism.
#[derive(Clone, Debug, Default)]
pub struct FussPredator;

impl FussPredator {
    /// Create a new FUSS predator
    pub fn new() -> Self {
        Self
    }
}

impl<P: Payload> PredatorStrategy<P> for FussPredator {
    fn kill(
        &self,
        population: &mut Population<P>,
        nkeep: usize,
        keep_best: bool,
        rng: &mut StdRng,
    ) -> Vec<Individual<P>> {
        let mut removed = purge_invalid(population);
        let pinned = pinned_id(population, keep_best);

        let mut pool = population.valid_fitnesses();
        let fmin = pool.iter().map(|(_, f)| *f).fold(f64::INFINITY, f64::min);
        let fmax = pool
            .iter()
            .map(|(_, f)| *f)
            .fold(f64::NEG_INFINITY, f64::max);
        let point = if fmax > fmin {
            rng.gen_range(fmin..fmax)
        } else {
            fmin
        };

        let mut survivors: Vec<u64> = Vec::with_capacity(nkeep);
        if let Some(id) = pinned {
            survivors.push(id);
            pool.retain(|&(pid, _)| pid != id);
        }
        // Ascending distance from the sampled point, ties to the lower id.
        pool.sort_by(|a, b| {
            let da = (a.1 - point).abs();
            let db = (b.1 - point).abs();
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        for (id, _) in pool {
            if survivors.len() >= nkeep {
                break;
            }
            survivors.push(id);
        }
        removed.extend(retain_survivors(population, &survivors));
        removed
    }
}
