//! Convergence detection
//!
//! Strategies observe the per-generation fitness distribution and decide when
//! the run is done. The monitor latches: once converged, it stays converged
//! for the rest of the run.

use crate::config::ConvergenceConfig;
use crate::stats::FitnessStats;

/// A termination criterion fed one observation per generation
pub trait ConvergenceStrategy: Send {
    /// Observe one generation; returns true when the criterion is met
    fn observe(&mut self, generation: usize, stats: &FitnessStats) -> bool;

    /// Human-readable reason reported on termination
    fn reason(&self) -> &'static str;
}

/// Stop after a fixed generation count
pub struct MaxGenerations {
    max: usize,
}

impl MaxGenerations {
    /// Stop once the observed generation exceeds `max`
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl ConvergenceStrategy for MaxGenerations {
    fn observe(&mut self, generation: usize, _stats: &FitnessStats) -> bool {
        generation > self.max
    }

    fn reason(&self) -> &'static str {
        "maximum generation count reached"
    }
}

/// Stop when a tracked statistic stops moving
///
/// Converges after the statistic has stayed within `tolerance` of its tracked
/// value for `reqrep` consecutive generations; any larger move resets the
/// counter and re-anchors the tracked value.
struct Repetition {
    tolerance: f64,
    reqrep: usize,
    tracked: Option<f64>,
    reps: usize,
}

impl Repetition {
    fn new(tolerance: f64, reqrep: usize) -> Self {
        Self {
            tolerance,
            reqrep: reqrep.max(1),
            tracked: None,
            reps: 0,
        }
    }

    fn observe(&mut self, value: f64) -> bool {
        match self.tracked {
            Some(anchor) if (value - anchor).abs() <= self.tolerance => {
                self.reps += 1;
            }
            _ => {
                self.tracked = Some(value);
                self.reps = 0;
            }
        }
        self.reps >= self.reqrep
    }
}

/// Stop when the minimum fitness stops moving
pub struct GenRepMin {
    inner: Repetition,
}

impl GenRepMin {
    /// Converge after `reqrep` generations of the minimum within `tolerance`
    pub fn new(tolerance: f64, reqrep: usize) -> Self {
        Self {
            inner: Repetition::new(tolerance, reqrep),
        }
    }
}

impl ConvergenceStrategy for GenRepMin {
    fn observe(&mut self, _generation: usize, stats: &FitnessStats) -> bool {
        if stats.evaluated == 0 {
            return false;
        }
        self.inner.observe(stats.min)
    }

    fn reason(&self) -> &'static str {
        "minimum fitness stagnated"
    }
}

/// Stop when the mean fitness stops moving
pub struct GenRepAvg {
    inner: Repetition,
}

impl GenRepAvg {
    /// Converge after `reqrep` generations of the mean within `tolerance`
    pub fn new(tolerance: f64, reqrep: usize) -> Self {
        Self {
            inner: Repetition::new(tolerance, reqrep),
        }
    }
}

impl ConvergenceStrategy for GenRepAvg {
    fn observe(&mut self, _generation: usize, stats: &FitnessStats) -> bool {
        if stats.evaluated == 0 {
            return false;
        }
        self.inner.observe(stats.mean)
    }

    fn reason(&self) -> &'static str {
        "mean fitness stagnated"
    }
}

/// Stop when the fitness spread collapses
pub struct StdDev {
    tolerance: f64,
}

impl StdDev {
    /// Converge when the sample standard deviation drops below `tolerance`
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl ConvergenceStrategy for StdDev {
    fn observe(&mut self, _generation: usize, stats: &FitnessStats) -> bool {
        stats.evaluated > 1 && stats.std < self.tolerance
    }

    fn reason(&self) -> &'static str {
        "fitness spread collapsed"
    }
}

/// Run state as seen by the monitor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// The run continues
    Running,
    /// The criterion has been met; latched until the run ends
    Converged,
}

/// Latching wrapper around a convergence strategy
pub struct ConvergenceMonitor {
    strategy: Box<dyn ConvergenceStrategy>,
    state: RunState,
}

impl ConvergenceMonitor {
    /// Wrap a strategy
    pub fn new(strategy: Box<dyn ConvergenceStrategy>) -> Self {
        Self {
            strategy,
            state: RunState::Running,
        }
    }

    /// Build the monitor a configuration asks for
    pub fn from_config(config: &ConvergenceConfig) -> Self {
        let strategy: Box<dyn ConvergenceStrategy> = match *config {
            ConvergenceConfig::MaxGen { max_generations } => {
                Box::new(MaxGenerations::new(max_generations))
            }
            ConvergenceConfig::GenRepMin { tolerance, reqrep } => {
                Box::new(GenRepMin::new(tolerance, reqrep))
            }
            ConvergenceConfig::GenRepAvg { tolerance, reqrep } => {
                Box::new(GenRepAvg::new(tolerance, reqrep))
            }
            ConvergenceConfig::Std { tolerance } => Box::new(StdDev::new(tolerance)),
        };
        Self::new(strategy)
    }

    /// Current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Feed one generation's statistics; returns true when converged
    pub fn observe(&mut self, generation: usize, stats: &FitnessStats) -> bool {
        if self.state == RunState::Converged {
            return true;
        }
        if self.strategy.observe(generation, stats) {
            self.state = RunState::Converged;
        }
        self.state == RunState::Converged
    }

    /// Termination reason of the wrapped strategy
    pub fn reason(&self) -> &'static str {
        self.strategy.reason()
    }
}
