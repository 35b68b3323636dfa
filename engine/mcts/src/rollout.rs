//! Parallel random-rollout evaluation.
//!
//! A fixed-size worker pool plays one randomized game per worker from a leaf
//! state to completion and aggregates the signed outcomes into a value
//! estimate. Workers share nothing mutable: each gets its own clone of the
//! starting state and its own RNG, and the evaluation call joins all of them
//! before returning.

use game_core::{Game, Player};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::trace;

/// Rollout evaluation failures. Both are fatal for the evaluation cycle
/// they occur in; nothing is silently dropped or retried.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("failed to build rollout thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("rollout did not reach a terminal state within {0} moves")]
    Stalled(u32),
}

/// Aggregated result of one evaluation call.
#[derive(Debug, Clone, Copy)]
pub struct RolloutOutcome {
    /// Summed signed outcomes across workers, from the searching player's
    /// perspective.
    pub value: f64,

    /// Summed outcome magnitudes; the statistical weight the result carries
    /// in backpropagation.
    pub weight: u32,

    /// Mean playout length across workers. Diagnostic only.
    pub mean_length: f64,
}

/// Fixed-size pool of rollout workers.
pub struct RolloutPool {
    pool: rayon::ThreadPool,
    workers: usize,
    endgame_turn_threshold: u32,
    max_playout_len: u32,
}

impl RolloutPool {
    pub fn new(
        workers: usize,
        endgame_turn_threshold: u32,
        max_playout_len: u32,
    ) -> Result<Self, RolloutError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        Ok(Self {
            pool,
            workers,
            endgame_turn_threshold,
            max_playout_len,
        })
    }

    /// Number of playouts run per evaluation call.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run one playout per worker from `state` and aggregate the outcomes.
    ///
    /// Past `endgame_turn_threshold` turns, each worker checks every legal
    /// move for an immediate win and greedily takes the first one it finds;
    /// the reported outcome is then scaled by the number of simultaneously
    /// available winning moves. A worker whose playout stalls fails the
    /// whole evaluation with [`RolloutError::Stalled`].
    pub fn evaluate<G: Game>(
        &self,
        game: &G,
        state: &G::State,
        turn: u32,
        searcher: Player,
    ) -> Result<RolloutOutcome, RolloutError> {
        let threshold = self.endgame_turn_threshold;
        let max_len = self.max_playout_len;
        let results: Vec<Result<(f64, u32), RolloutError>> = self.pool.install(|| {
            (0..self.workers)
                .into_par_iter()
                .map(|_| playout(game, state.clone(), turn, searcher, threshold, max_len))
                .collect()
        });

        let mut value = 0.0;
        let mut weight = 0.0;
        let mut total_len = 0u64;
        for result in results {
            let (v, len) = result?;
            value += v;
            weight += v.abs();
            total_len += u64::from(len);
        }
        let outcome = RolloutOutcome {
            value,
            weight: weight as u32,
            mean_length: total_len as f64 / self.workers as f64,
        };
        trace!(
            value = outcome.value,
            weight = outcome.weight,
            mean_length = outcome.mean_length,
            "rollout evaluation complete"
        );
        Ok(outcome)
    }
}

/// One randomized playout to a terminal state.
///
/// Returns the signed outcome (+magnitude when the terminal side to move is
/// not the searcher, i.e. the searcher made or benefits from the final move)
/// and the number of moves played.
fn playout<G: Game>(
    game: &G,
    mut state: G::State,
    turn: u32,
    searcher: Player,
    endgame_turn_threshold: u32,
    max_playout_len: u32,
) -> Result<(f64, u32), RolloutError> {
    let mut rng = ChaCha20Rng::from_entropy();
    let mut magnitude = 1.0;
    let mut len = 0u32;

    while !game.is_terminal(&state) {
        if len >= max_playout_len {
            return Err(RolloutError::Stalled(max_playout_len));
        }
        let actions = game.legal_actions(&state);
        debug_assert!(!actions.is_empty(), "non-terminal state with no legal actions");
        if actions.is_empty() {
            break;
        }

        state = if turn > endgame_turn_threshold {
            let mut successors: Vec<G::State> =
                actions.iter().map(|a| game.apply(&state, a)).collect();
            let winning: Vec<usize> = successors
                .iter()
                .enumerate()
                .filter(|(_, s)| game.is_terminal(s))
                .map(|(i, _)| i)
                .collect();
            if let Some(&first) = winning.first() {
                magnitude = winning.len() as f64;
                successors.swap_remove(first)
            } else {
                let idx = rng.gen_range(0..successors.len());
                successors.swap_remove(idx)
            }
        } else {
            let idx = rng.gen_range(0..actions.len());
            game.apply(&state, &actions[idx])
        };
        len += 1;
    }

    let value = if game.side_to_move(&state) == searcher {
        -magnitude
    } else {
        magnitude
    };
    Ok((value, len))
}
