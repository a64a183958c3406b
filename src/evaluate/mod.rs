//! Distributed evaluation
//!
//! Scatter/gather execution of one fitness module over a population slice.
//! Individuals are cloned to worker threads by ordinal position, results are
//! gathered over a channel until a round deadline, and missing ordinals get
//! exactly one retry with the same partitioning. A worker stuck inside a
//! module call is abandoned, never joined.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::EvaluationError;
use crate::fitness::FitnessModule;
use crate::payload::Payload;
use crate::population::Individual;

/// Result slot for one ordinal: None means no answer before the deadline
pub type SlotResult = Option<Result<(f64, String), EvaluationError>>;

/// How ordinals are assigned to workers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionPolicy {
    /// Ordinal `i` goes to worker `i % nworkers`
    RoundRobin,
    /// Ordinals are split into contiguous blocks, one per worker
    Contiguous,
}

impl PartitionPolicy {
    /// Worker index per ordinal
    pub fn assign(&self, count: usize, nworkers: usize) -> Vec<usize> {
        let nworkers = nworkers.max(1);
        match self {
            Self::RoundRobin => (0..count).map(|i| i % nworkers).collect(),
            Self::Contiguous => {
                let base = count / nworkers;
                let extra = count % nworkers;
                let mut assignment = Vec::with_capacity(count);
                for worker in 0..nworkers {
                    let share = base + usize::from(worker < extra);
                    assignment.extend(std::iter::repeat(worker).take(share));
                }
                assignment
            }
        }
    }
}

/// Scatter/gather evaluator with a fixed worker count and round deadline
pub struct DistributedEvaluator {
    nworkers: usize,
    timeout: Duration,
    partition: PartitionPolicy,
}

impl DistributedEvaluator {
    /// Create an evaluator
    pub fn new(nworkers: usize, timeout: Duration) -> Self {
        Self {
            nworkers: nworkers.max(1),
            timeout,
            partition: PartitionPolicy::RoundRobin,
        }
    }

    /// Override the partition policy
    pub fn with_partition(mut self, partition: PartitionPolicy) -> Self {
        self.partition = partition;
        self
    }

    /// Number of workers
    pub fn nworkers(&self) -> usize {
        self.nworkers
    }

    /// Evaluate one module over the given individuals
    ///
    /// The returned vector is aligned with the input: slot `i` holds the
    /// module result for `individuals[i]`, or None when no answer arrived
    /// within the deadline even after the retry round.
    pub fn evaluate_module<P: Payload>(
        &self,
        module: &Arc<dyn FitnessModule<P>>,
        individuals: &[Individual<P>],
    ) -> Vec<SlotResult> {
        let mut results: Vec<SlotResult> = vec![None; individuals.len()];
        if individuals.is_empty() {
            return results;
        }

        let all: Vec<usize> = (0..individuals.len()).collect();
        let mut disconnected = self.scatter_round(module, individuals, &all, &mut results);

        let missing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            log::warn!(
                "module {}: {} of {} results missed the deadline, retrying once",
                module.name(),
                missing.len(),
                individuals.len()
            );
            disconnected = self.scatter_round(module, individuals, &missing, &mut results);
        }

        // Ordinals still unanswered after the retry. An early channel
        // disconnect means the worker exited without sending; otherwise the
        // round deadline expired with the worker still running.
        let retried = if missing.is_empty() { &all } else { &missing };
        let assignment = self.partition.assign(retried.len(), self.nworkers);
        for (pos, &ordinal) in retried.iter().enumerate() {
            if results[ordinal].is_some() {
                continue;
            }
            let err = if disconnected {
                log::warn!(
                    "module {}: worker {} lost before answering ordinal {ordinal}",
                    module.name(),
                    assignment[pos]
                );
                EvaluationError::WorkerLost {
                    worker: assignment[pos],
                }
            } else {
                log::warn!(
                    "module {}: ordinal {ordinal} timed out after retry",
                    module.name()
                );
                EvaluationError::TimedOut {
                    module: module.name().to_string(),
                    ordinal,
                }
            };
            results[ordinal] = Some(Err(err));
        }
        results
    }

    /// One scatter/gather round over the given ordinals
    ///
    /// Returns true when the gather channel disconnected with results still
    /// outstanding, meaning every worker exited before the deadline.
    fn scatter_round<P: Payload>(
        &self,
        module: &Arc<dyn FitnessModule<P>>,
        individuals: &[Individual<P>],
        ordinals: &[usize],
        results: &mut [SlotResult],
    ) -> bool {
        let assignment = self.partition.assign(ordinals.len(), self.nworkers);
        let (tx, rx) = mpsc::channel::<(usize, Result<(f64, String), EvaluationError>)>();

        for worker in 0..self.nworkers {
            let share: Vec<(usize, Individual<P>)> = ordinals
                .iter()
                .enumerate()
                .filter(|(pos, _)| assignment[*pos] == worker)
                .map(|(_, &ordinal)| (ordinal, individuals[ordinal].clone()))
                .collect();
            if share.is_empty() {
                continue;
            }
            let module = Arc::clone(module);
            let tx = tx.clone();
            // Detached on purpose: a worker wedged inside a module call must
            // not block the round past its deadline.
            thread::spawn(move || {
                for (ordinal, individual) in share {
                    let result = module.evaluate(&individual);
                    if tx.send((ordinal, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let deadline = Instant::now() + self.timeout;
        let mut outstanding = ordinals.len();
        while outstanding > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match rx.recv_timeout(deadline - now) {
                Ok((ordinal, result)) => {
                    results[ordinal] = Some(result);
                    outstanding -= 1;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => return false,
                Err(mpsc::RecvTimeoutError::Disconnected) => return true,
            }
        }
        false
    }
}
