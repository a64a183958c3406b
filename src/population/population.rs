//! Population container
//!
//! An id-keyed collection of individuals. Iteration follows ascending id
//! order, which doubles as the stable ordinal order used to correlate
//! scattered per-worker results and to make checkpoint round-trips
//! deterministic.

use std::collections::BTreeMap;

use crate::error::PopulationError;
use crate::payload::Payload;
use crate::population::individual::Individual;

/// The id-keyed set of individuals active in the current generation
///
/// Owns id allocation: `max_id` is a watermark that only moves forward, so an
/// id is never reused while the population that issued it is live.
#[derive(Clone, Debug)]
pub struct Population<P: Payload> {
    members: BTreeMap<u64, Individual<P>>,
    generation: usize,
    max_id: u64,
}

impl<P: Payload> Population<P> {
    /// Create an empty population at generation 0
    pub fn new() -> Self {
        Self {
            members: BTreeMap::new(),
            generation: 0,
            max_id: 0,
        }
    }

    /// Create a population from a list of individuals, assigning fresh ids
    /// to any that lack one
    pub fn from_individuals(individuals: Vec<Individual<P>>) -> Result<Self, PopulationError> {
        let mut pop = Self::new();
        pop.extend(individuals)?;
        Ok(pop)
    }

    /// Rebuild a population from checkpointed parts
    pub fn from_parts(
        individuals: Vec<Individual<P>>,
        generation: usize,
        max_id: u64,
    ) -> Result<Self, PopulationError> {
        let mut pop = Self::from_individuals(individuals)?;
        pop.generation = generation;
        pop.max_id = pop.max_id.max(max_id);
        Ok(pop)
    }

    /// Get the current generation
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Set the generation number
    pub fn set_generation(&mut self, generation: usize) {
        self.generation = generation;
    }

    /// Get the id allocation watermark
    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    /// Allocate and return a fresh id
    pub fn get_new_id(&mut self) -> u64 {
        self.max_id += 1;
        self.max_id
    }

    /// Get the population size
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the population is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add an individual, assigning an id if it has none
    ///
    /// Returns the individual's id. Adding an individual whose id is already
    /// present is rejected.
    pub fn add(&mut self, mut individual: Individual<P>) -> Result<u64, PopulationError> {
        let id = match individual.id {
            Some(id) => {
                if self.members.contains_key(&id) {
                    return Err(PopulationError::DuplicateId(id));
                }
                self.max_id = self.max_id.max(id);
                id
            }
            None => {
                let id = self.get_new_id();
                individual.id = Some(id);
                id
            }
        };
        self.members.insert(id, individual);
        Ok(id)
    }

    /// Remove and return the individual with the given id
    pub fn remove(&mut self, id: u64) -> Option<Individual<P>> {
        self.members.remove(&id)
    }

    /// Atomically swap the population contents for a new list
    ///
    /// The generation counter and id watermark are kept; id-less entries get
    /// fresh ids.
    pub fn replace(&mut self, individuals: Vec<Individual<P>>) -> Result<(), PopulationError> {
        let mut incoming: BTreeMap<u64, Individual<P>> = BTreeMap::new();
        let mut max_id = self.max_id;
        for mut individual in individuals {
            let id = match individual.id {
                Some(id) => {
                    if incoming.contains_key(&id) {
                        return Err(PopulationError::DuplicateId(id));
                    }
                    max_id = max_id.max(id);
                    id
                }
                None => {
                    max_id += 1;
                    individual.id = Some(max_id);
                    max_id
                }
            };
            incoming.insert(id, individual);
        }
        self.members = incoming;
        self.max_id = max_id;
        Ok(())
    }

    /// Bulk add, assigning ids to entries that lack one
    pub fn extend(&mut self, individuals: Vec<Individual<P>>) -> Result<Vec<u64>, PopulationError> {
        let mut ids = Vec::with_capacity(individuals.len());
        for individual in individuals {
            ids.push(self.add(individual)?);
        }
        Ok(ids)
    }

    /// Get an individual by id
    pub fn get(&self, id: u64) -> Option<&Individual<P>> {
        self.members.get(&id)
    }

    /// Get a mutable reference to an individual by id
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Individual<P>> {
        self.members.get_mut(&id)
    }

    /// Ordinal position of an individual in ascending-id order
    pub fn position(&self, id: u64) -> Option<usize> {
        self.members.keys().position(|&k| k == id)
    }

    /// Get an individual by ordinal position
    pub fn get_by_position(&self, position: usize) -> Option<&Individual<P>> {
        self.members.values().nth(position)
    }

    /// Iterate over individuals in ascending-id order
    pub fn iter(&self) -> impl Iterator<Item = &Individual<P>> {
        self.members.values()
    }

    /// Iterate mutably in ascending-id order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Individual<P>> {
        self.members.values_mut()
    }

    /// Ids in ascending order
    pub fn ids(&self) -> Vec<u64> {
        self.members.keys().copied().collect()
    }

    /// Take the individuals out in ascending-id order
    pub fn into_individuals(self) -> Vec<Individual<P>> {
        self.members.into_values().collect()
    }

    /// Ids of individuals whose payload changed since last evaluation
    pub fn needs_evaluation_ids(&self) -> Vec<u64> {
        self.members
            .iter()
            .filter(|(_, i)| i.needs_evaluation)
            .map(|(&id, _)| id)
            .collect()
    }

    /// (id, fitness) pairs for individuals with a usable fitness
    pub fn valid_fitnesses(&self) -> Vec<(u64, f64)> {
        self.members
            .iter()
            .filter_map(|(&id, i)| {
                if i.is_valid() {
                    i.fitness.map(|f| (id, f))
                } else {
                    None
                }
            })
            .collect()
    }

    /// The best valid individual, ties broken by lower id
    pub fn best(&self) -> Option<&Individual<P>> {
        let mut best: Option<&Individual<P>> = None;
        for individual in self.members.values() {
            if !individual.is_valid() {
                continue;
            }
            match best {
                // Strict comparison: the earlier (lower-id) member wins ties.
                Some(b) if !individual.is_better_than(b) => {}
                _ => best = Some(individual),
            }
        }
        best
    }
}

impl<P: Payload> Default for Population<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_population() -> Population<Vec<f64>> {
        let individuals = vec![
            Individual::with_fitness(vec![1.0], 10.0),
            Individual::with_fitness(vec![2.0], 20.0),
            Individual::with_fitness(vec![3.0], 30.0),
        ];
        Population::from_individuals(individuals).unwrap()
    }

    #[test]
    fn test_population_new() {
        let pop: Population<Vec<f64>> = Population::new();
        assert!(pop.is_empty());
        assert_eq!(pop.generation(), 0);
        assert_eq!(pop.max_id(), 0);
    }

    #[test]
    fn test_add_assigns_monotonic_ids() {
        let pop = seeded_population();
        assert_eq!(pop.ids(), vec![1, 2, 3]);
        assert_eq!(pop.max_id(), 3);
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut pop = seeded_population();
        let mut dup = Individual::with_fitness(vec![9.0], 1.0);
        dup.id = Some(2);
        assert_eq!(pop.add(dup), Err(PopulationError::DuplicateId(2)));
        assert_eq!(pop.len(), 3);
    }

    #[test]
    fn test_add_with_high_id_bumps_watermark() {
        let mut pop = seeded_population();
        let mut ind = Individual::with_fitness(vec![9.0], 1.0);
        ind.id = Some(100);
        pop.add(ind).unwrap();
        assert_eq!(pop.max_id(), 100);
        assert_eq!(pop.get_new_id(), 101);
    }

    #[test]
    fn test_remove() {
        let mut pop = seeded_population();
        let removed = pop.remove(2).unwrap();
        assert_eq!(removed.fitness, Some(20.0));
        assert_eq!(pop.len(), 2);
        assert!(pop.get(2).is_none());
    }

    #[test]
    fn test_ids_never_reused_after_removal() {
        let mut pop = seeded_population();
        pop.remove(3);
        let id = pop.add(Individual::with_fitness(vec![4.0], 40.0)).unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn test_replace_is_atomic_swap() {
        let mut pop = seeded_population();
        pop.set_generation(5);
        pop.replace(vec![
            Individual::with_fitness(vec![7.0], 70.0),
            Individual::with_fitness(vec![8.0], 80.0),
        ])
        .unwrap();

        assert_eq!(pop.len(), 2);
        assert_eq!(pop.generation(), 5);
        // Fresh ids continue past the old watermark.
        assert_eq!(pop.ids(), vec![4, 5]);
    }

    #[test]
    fn test_replace_duplicate_id_fails() {
        let mut pop = seeded_population();
        let mut a = Individual::with_fitness(vec![1.0], 1.0);
        a.id = Some(8);
        let mut b = Individual::with_fitness(vec![2.0], 2.0);
        b.id = Some(8);
        assert!(pop.replace(vec![a, b]).is_err());
    }

    #[test]
    fn test_position_and_get_by_position() {
        let mut pop = seeded_population();
        pop.remove(1);
        assert_eq!(pop.position(2), Some(0));
        assert_eq!(pop.position(3), Some(1));
        assert_eq!(pop.position(1), None);
        assert_eq!(pop.get_by_position(1).unwrap().id, Some(3));
        assert!(pop.get_by_position(5).is_none());
    }

    #[test]
    fn test_needs_evaluation_ids() {
        let mut pop = seeded_population();
        pop.get_mut(2).unwrap().mark_mutated("rattle");
        assert_eq!(pop.needs_evaluation_ids(), vec![2]);
    }

    #[test]
    fn test_valid_fitnesses_excludes_invalid() {
        let mut pop = seeded_population();
        pop.get_mut(2).unwrap().mark_invalid();
        let valid = pop.valid_fitnesses();
        assert_eq!(valid, vec![(1, 10.0), (3, 30.0)]);
    }

    #[test]
    fn test_best_tie_breaks_to_lower_id() {
        let individuals = vec![
            Individual::with_fitness(vec![1.0], 30.0),
            Individual::with_fitness(vec![2.0], 30.0),
            Individual::with_fitness(vec![3.0], 10.0),
        ];
        let pop = Population::from_individuals(individuals).unwrap();
        assert_eq!(pop.best().unwrap().id, Some(1));
    }

    #[test]
    fn test_from_parts_round_trip() {
        let pop = seeded_population();
        let members: Vec<_> = pop.clone().into_individuals();
        let restored = Population::from_parts(members, pop.generation(), pop.max_id()).unwrap();
        assert_eq!(restored.ids(), pop.ids());
        assert_eq!(restored.max_id(), pop.max_id());
    }
}
