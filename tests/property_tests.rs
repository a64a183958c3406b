//! Property tests for the structural invariants

use distevo::checkpoint::{load_checkpoint, save_checkpoint, Checkpoint};
use distevo::config::CheckpointFormat;
use distevo::operators::WeightedSet;
use distevo::population::{Individual, Population};
use distevo::stats::FitnessStats;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

proptest! {
    #[test]
    fn ids_stay_unique_under_churn(
        removals in prop::collection::vec(0u64..40, 0..20),
        additions in 0usize..20,
        seed_size in 1usize..20,
    ) {
        let mut pop = Population::from_individuals(
            (0..seed_size).map(|i| Individual::new(vec![i as f64])).collect(),
        ).unwrap();

        for id in removals {
            pop.remove(id);
        }
        for i in 0..additions {
            pop.add(Individual::new(vec![i as f64])).unwrap();
        }

        let ids = pop.ids();
        let mut deduped = ids.clone();
        deduped.dedup();
        prop_assert_eq!(&ids, &deduped);
        // The watermark covers every live id.
        for id in ids {
            prop_assert!(id <= pop.max_id());
        }
    }

    #[test]
    fn watermark_never_moves_backward(
        operations in prop::collection::vec(prop::bool::ANY, 1..40),
    ) {
        let mut pop: Population<Vec<f64>> = Population::new();
        let mut last = pop.max_id();
        for add in operations {
            if add {
                pop.add(Individual::new(vec![0.0])).unwrap();
            } else if let Some(&id) = pop.ids().first() {
                pop.remove(id);
            }
            prop_assert!(pop.max_id() >= last);
            last = pop.max_id();
        }
    }

    #[test]
    fn weighted_draw_respects_configured_mass(
        weights in prop::collection::vec(0.0f64..0.2, 1..5),
        seed in any::<u64>(),
    ) {
        let entries: Vec<(String, f64, usize)> = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| (format!("op{i}"), w, i))
            .collect();
        let set = WeightedSet::from_entries("mutation", entries).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..50 {
            if let Some((name, &index)) = set.draw(&mut rng) {
                let expected = format!("op{index}");
                prop_assert_eq!(name, expected.as_str());
                prop_assert!(index < weights.len());
            }
        }
    }

    #[test]
    fn fitness_stats_are_ordered(
        fitnesses in prop::collection::vec(-1e6f64..1e6, 1..50),
    ) {
        let pop = Population::from_individuals(
            fitnesses
                .iter()
                .map(|&f| Individual::with_fitness(vec![f], f))
                .collect(),
        ).unwrap();
        let stats = FitnessStats::from_population(&pop);

        prop_assert_eq!(stats.evaluated, fitnesses.len());
        prop_assert!(stats.min <= stats.median);
        prop_assert!(stats.median <= stats.max);
        prop_assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        prop_assert!(stats.std >= 0.0);
    }

    #[test]
    fn checkpoint_round_trips_in_both_formats(
        payloads in prop::collection::vec(
            prop::collection::vec(-100.0f64..100.0, 1..4),
            1..10,
        ),
        generation in 0usize..1000,
        seed in any::<u64>(),
    ) {
        let mut pop = Population::from_individuals(
            payloads.into_iter().map(Individual::new).collect(),
        ).unwrap();
        pop.set_generation(generation);
        let checkpoint = Checkpoint::new(&pop, seed);

        let dir = tempfile::tempdir().unwrap();
        for format in [CheckpointFormat::Json, CheckpointFormat::Binary] {
            let path = dir.path().join(match format {
                CheckpointFormat::Json => "state.json",
                CheckpointFormat::Binary => "state.bin",
            });
            save_checkpoint(&path, &checkpoint, format).unwrap();
            let loaded: Checkpoint<Vec<f64>> = load_checkpoint(&path).unwrap();

            prop_assert_eq!(loaded.generation, generation);
            prop_assert_eq!(loaded.seed, seed);
            prop_assert_eq!(loaded.max_id, pop.max_id());

            let restored = loaded.restore_population().unwrap();
            prop_assert_eq!(restored.ids(), pop.ids());
            for (a, b) in restored.iter().zip(pop.iter()) {
                prop_assert_eq!(&a.payload, &b.payload);
            }
        }
    }
}
