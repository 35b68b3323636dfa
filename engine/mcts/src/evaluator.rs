//! Learned value-function hook.
//!
//! When a value function is configured the search evaluates a leaf with a
//! single call instead of running random rollouts. Absence is a valid
//! configuration as long as rollouts are enabled; training such a function
//! is out of scope here.

use game_core::Game;

/// A scalar position evaluator from the searching player's perspective.
///
/// Estimates are expected in `[-1.0, 1.0]`: -1 a certain loss, +1 a certain
/// win. Implementations are called from the single search thread only, but
/// must be `Send + Sync` so sessions can move across threads.
pub trait ValueFn<G: Game>: Send + Sync {
    fn evaluate(&self, state: &G::State) -> f64;
}

impl<G: Game, F> ValueFn<G> for F
where
    F: Fn(&G::State) -> f64 + Send + Sync,
{
    fn evaluate(&self, state: &G::State) -> f64 {
        self(state)
    }
}
