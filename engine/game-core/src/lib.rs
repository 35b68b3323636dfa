//! Game-state abstraction consumed by the search engine.
//!
//! The engine never inspects board geometry or rules. Everything it needs
//! from a game is expressed by the [`Game`] trait: legal-move generation, a
//! pure transition function, a terminal predicate, the side to move, and a
//! content-derived state key used for equality and tree-reuse lookups.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// One of the two sides in an adversarial, perfect-information game.
///
/// `White` is the side that moves first from the initial position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    White,
    Black,
}

impl Player {
    /// The other side.
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

/// A two-player, perfect-information board game.
///
/// Implementations must be cheap to query: the search engine calls
/// `legal_actions` and `apply` millions of times per move budget, and rollout
/// workers call them concurrently through a shared reference.
///
/// `apply` is a pure transition: it never mutates the input state and always
/// produces the successor reached by playing `action`. `state_key` must be
/// derived from state content only, so that two states that compare equal
/// hash to the same key across processes (it keys persisted trees).
pub trait Game: Send + Sync + 'static {
    /// Full game state. Cloned once per rollout worker and once per tree node.
    type State: Clone + Send + Sync + 'static;

    /// A single move. Small and cheap to clone.
    type Action: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// The state the game starts from.
    fn initial_state(&self) -> Self::State;

    /// All legal actions for the side to move. Empty only in terminal states.
    fn legal_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Pure transition function: the state reached by playing `action`.
    fn apply(&self, state: &Self::State, action: &Self::Action) -> Self::State;

    /// Whether the game is over in `state`.
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// The side to move in `state`. In terminal states this is the side that
    /// did *not* make the final move, which is how the engine derives the
    /// outcome sign.
    fn side_to_move(&self, state: &Self::State) -> Player;

    /// Content-derived identity of `state`, stable across processes.
    fn state_key(&self, state: &Self::State) -> u64;
}
