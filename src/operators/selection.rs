//! Selection strategies
//!
//! Parent-pair selection over the valid members of a population. One strategy
//! is drawn per generation from the operator registry.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};

use crate::operators::traits::SelectionStrategy;
use crate::payload::Payload;
use crate::population::Population;

/// Candidates sorted worst-to-best by fitness
///
/// The pool is shuffled before the stable sort so that tied fitnesses end up
/// in uniformly random relative order.
fn ranked_candidates<P: Payload>(population: &Population<P>, rng: &mut StdRng) -> Vec<(u64, f64)> {
    let mut candidates = population.valid_fitnesses();
    candidates.shuffle(rng);
    candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

/// Rank selection
///
/// Selection probability is linearly interpolated between `p_min` for the
/// worst-ranked candidate and `p_max = 2/N - p_min` for the best, so the
/// distribution sums to one. Fathers and mothers are drawn without
/// replacement from this distribution.
#[derive(Clone, Debug)]
pub struct RankSelection {
    /// Probability assigned to the worst-ranked candidate
    pub p_min: f64,
    /// Remove both parents from the pool once a pair is formed
    pub unique_parents: bool,
    /// Never select the same (unordered) pair twice in one generation
    pub unique_pairs: bool,
}

impl RankSelection {
    /// Create a new rank selection
    pub fn new(p_min: f64) -> Self {
        Self {
            p_min,
            unique_parents: false,
            unique_pairs: false,
        }
    }

    /// Require distinct parents across pairs
    pub fn with_unique_parents(mut self, unique: bool) -> Self {
        self.unique_parents = unique;
        self
    }

    /// Require distinct pairs
    pub fn with_unique_pairs(mut self, unique: bool) -> Self {
        self.unique_pairs = unique;
        self
    }

    /// Rank weights for a pool of `n` candidates, worst first
    fn rank_weights(&self, n: usize) -> Vec<f64> {
        if n == 1 {
            return vec![1.0];
        }
        let p_max = (2.0 / n as f64 - self.p_min).max(0.0);
        (0..n)
            .map(|rank| {
                self.p_min + (p_max - self.p_min) * rank as f64 / (n - 1) as f64
            })
            .map(|w| w.max(0.0))
            .collect()
    }
}

impl<P: Payload> SelectionStrategy<P> for RankSelection {
    fn select_pairs(&self, population: &Population<P>, rng: &mut StdRng) -> Vec<(u64, u64)> {
        let mut pool = ranked_candidates(population, rng);
        let npairs = population.len() / 2;
        let mut pairs = Vec::with_capacity(npairs);
        let mut used_pairs: Vec<(u64, u64)> = Vec::new();

        for _ in 0..npairs {
            if pool.len() < 2 {
                break;
            }
            let weights = self.rank_weights(pool.len());
            let father_idx = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(rng),
                Err(_) => rng.gen_range(0..pool.len()),
            };
            let father = pool[father_idx].0;

            // The father is removed from the temporary distribution before
            // the mother draw.
            let mut remaining = pool.clone();
            remaining.remove(father_idx);
            let mother_weights = self.rank_weights(remaining.len());
            let mother_idx = match WeightedIndex::new(&mother_weights) {
                Ok(dist) => dist.sample(rng),
                Err(_) => rng.gen_range(0..remaining.len()),
            };
            let mother = remaining[mother_idx].0;

            let key = (father.min(mother), father.max(mother));
            if self.unique_pairs && used_pairs.contains(&key) {
                continue;
            }
            used_pairs.push(key);
            pairs.push((father, mother));

            if self.unique_parents {
                pool.retain(|&(id, _)| id != father && id != mother);
            }
        }
        pairs
    }
}

/// Tournament selection
///
/// Each parent is the best member of a fixed-size random subset; the second
/// parent's tournament draws from the pool with the first parent removed.
#[derive(Clone, Debug)]
pub struct TournamentSelection {
    /// Number of candidates competing per tournament
    pub tournament_size: usize,
}

impl TournamentSelection {
    /// Create a new tournament selection with the given size
    pub fn new(tournament_size: usize) -> Self {
        Self {
            tournament_size: tournament_size.max(1),
        }
    }

    /// Run one tournament over the pool, ties drawn uniformly
    fn run_tournament(&self, pool: &[(u64, f64)], rng: &mut StdRng) -> Option<u64> {
        if pool.is_empty() {
            return None;
        }
        let size = self.tournament_size.min(pool.len());
        let entrants: Vec<&(u64, f64)> = pool.choose_multiple(rng, size).collect();
        let best_fitness = entrants
            .iter()
            .map(|(_, f)| *f)
            .fold(f64::NEG_INFINITY, f64::max);
        let tied: Vec<u64> = entrants
            .iter()
            .filter(|(_, f)| *f == best_fitness)
            .map(|(id, _)| *id)
            .collect();
        tied.choose(rng).copied()
    }
}

impl<P: Payload> SelectionStrategy<P> for TournamentSelection {
    fn select_pairs(&self, population: &Population<P>, rng: &mut StdRng) -> Vec<(u64, u64)> {
        let pool = population.valid_fitnesses();
        let npairs = population.len() / 2;
        let mut pairs = Vec::with_capacity(npairs);

        for _ in 0..npairs {
            let Some(father) = self.run_tournament(&pool, rng) else {
                break;
            };
            let remaining: Vec<(u64, f64)> =
                pool.iter().copied().filter(|&(id, _)| id != father).collect();
            let Some(mother) = self.run_tournament(&remaining, rng) else {
                break;
            };
            pairs.push((father, mother));
        }
        pairs
    }
}

/// Random pair selection
///
/// Every unordered pair of distinct valid individuals is included
/// independently with probability `p`, truncated to the pair cap.
#[derive(Clone, Debug)]
pub struct RandomPairSelection {
    /// Inclusion probability per pair
    pub p: f64,
}

impl RandomPairSelection {
    /// Create a new random pair selection
    pub fn new(p: f64) -> Self {
        Self { p }
    }
}

impl<P: Payload> SelectionStrategy<P> for RandomPairSelection {
    fn select_pairs(&self, population: &Population<P>, rng: &mut StdRng) -> Vec<(u64, u64)> {
        let pool = population.valid_fitnesses();
        let cap = population.len() / 2;
        let mut pairs = Vec::new();

        'outer: for i in 0..pool.len() {
            for j in (i + 1)..pool.len() {
                if rng.gen::<f64>() < self.p {
                    pairs.push((pool[i].0, pool[j].0));
                    if pairs.len() >= cap {
                        break 'outer;
                    }
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::Individual;
    use rand::SeedableRng;

    fn seeded_population(n: usize) -> Population<Vec<f64>> {
        let individuals = (0..n)
            .map(|i| Individual::with_fitness(vec![i as f64], i as f64 * 10.0))
            .collect();
        Population::from_individuals(individuals).unwrap()
    }

    #[test]
    fn test_rank_weights_sum_to_one() {
        let selection = RankSelection::new(0.01);
        for n in [2usize, 5, 10, 50] {
            let weights = selection.rank_weights(n);
            let sum: f64 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "n={n} sum={sum}");
        }
    }

    #[test]
    fn test_rank_weights_increase_with_rank() {
        let selection = RankSelection::new(0.01);
        let weights = selection.rank_weights(10);
        for pair in weights.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_rank_selection_pair_cap() {
        let mut rng = StdRng::seed_from_u64(7);
        let pop = seeded_population(9);
        let pairs = RankSelection::new(0.01).select_pairs(&pop, &mut rng);
        assert!(pairs.len() <= 4);
        for (a, b) in &pairs {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_rank_selection_unique_parents() {
        let mut rng = StdRng::seed_from_u64(7);
        let pop = seeded_population(10);
        let pairs = RankSelection::new(0.01)
            .with_unique_parents(true)
            .select_pairs(&pop, &mut rng);

        let mut seen = Vec::new();
        for (a, b) in pairs {
            assert!(!seen.contains(&a));
            assert!(!seen.contains(&b));
            seen.push(a);
            seen.push(b);
        }
    }

    #[test]
    fn test_tournament_prefers_fit_individuals() {
        let mut rng = StdRng::seed_from_u64(3);
        let pop = seeded_population(10);
        let selection = TournamentSelection::new(10);
        // With a tournament over the entire pool, the winner is always the
        // best individual.
        let pairs = selection.select_pairs(&pop, &mut rng);
        assert!(!pairs.is_empty());
        for (father, _) in pairs {
            assert_eq!(pop.get(father).unwrap().fitness, Some(90.0));
        }
    }

    #[test]
    fn test_tournament_parents_distinct_within_pair() {
        let mut rng = StdRng::seed_from_u64(11);
        let pop = seeded_population(6);
        let pairs = TournamentSelection::new(2).select_pairs(&pop, &mut rng);
        for (a, b) in pairs {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_random_pair_probability_extremes() {
        let mut rng = StdRng::seed_from_u64(5);
        let pop = seeded_population(8);

        let none = RandomPairSelection::new(0.0).select_pairs(&pop, &mut rng);
        assert!(none.is_empty());

        let all = RandomPairSelection::new(1.0).select_pairs(&pop, &mut rng);
        assert_eq!(all.len(), 4); // capped at floor(8/2)
    }

    #[test]
    fn test_selection_skips_invalid_individuals() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut pop = seeded_population(6);
        pop.get_mut(1).unwrap().mark_invalid();
        pop.get_mut(2).unwrap().mark_invalid();

        let pairs = TournamentSelection::new(2).select_pairs(&pop, &mut rng);
        for (a, b) in pairs {
            assert!(a > 2 && b > 2);
        }
    }

    #[test]
    fn test_selection_empty_population() {
        let mut rng = StdRng::seed_from_u64(1);
        let pop: Population<Vec<f64>> = Population::new();
        assert!(RankSelection::new(0.01)
            .select_pairs(&pop, &mut rng)
            .is_empty());
        assert!(TournamentSelection::new(3)
            .select_pairs(&pop, &mut rng)
            .is_empty());
    }
}
