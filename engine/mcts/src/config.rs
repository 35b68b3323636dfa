//! Search configuration parameters.

use std::time::Duration;

use crate::policy::SelectionStrategy;

/// Configuration for a search session.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Exploration constant `c` in the UCT rule
    /// `q + c * sqrt(ln(n_parent) / n_edge)`.
    pub exploration: f64,

    /// Wall-clock budget per move. The search loop stops issuing new
    /// iterations once 90% of this has elapsed; an iteration already in
    /// progress is never preempted.
    pub timeout: Duration,

    /// From this turn on, move selection is deterministic (argmax over the
    /// strategy's score). Earlier turns sample from the normalized scores.
    pub deterministic_after_turn: u32,

    /// Initial temperature. Decayed by `tau_alpha` after every committed
    /// move; carried session state, not fed back into sampling.
    pub tau: f64,

    /// Multiplicative temperature decay factor.
    pub tau_alpha: f64,

    /// How root-edge statistics are turned into a move.
    pub strategy: SelectionStrategy,

    /// Once the turn number exceeds this, rollout workers greedily take any
    /// immediately winning move instead of a random one.
    pub endgame_turn_threshold: u32,

    /// A rollout that has not reached a terminal state after this many moves
    /// is reported as a failed worker and aborts the evaluation.
    pub max_playout_len: u32,

    /// Rollout workers per evaluation; 0 disables rollouts entirely, which
    /// is only a valid configuration together with a value function. The
    /// default is one worker per hardware core.
    pub workers: usize,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration: 1.4,
            timeout: Duration::from_secs(60),
            deterministic_after_turn: 10,
            tau: 1.0,
            tau_alpha: 0.9,
            strategy: SelectionStrategy::MaxChild,
            endgame_turn_threshold: 2,
            max_playout_len: 2_000,
            workers: default_workers(),
        }
    }
}

impl MctsConfig {
    /// A fast configuration for tests: tiny budget, deterministic from the
    /// first turn, single rollout worker.
    pub fn for_testing() -> Self {
        Self {
            timeout: Duration::from_millis(100),
            deterministic_after_turn: 0,
            workers: 1,
            max_playout_len: 100,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration = c;
        self
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_deterministic_after_turn(mut self, turn: u32) -> Self {
        self.deterministic_after_turn = turn;
        self
    }
}

/// One rollout worker per hardware core.
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
