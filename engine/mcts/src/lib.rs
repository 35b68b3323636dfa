//! Monte-Carlo Tree Search for adversarial perfect-information games.
//!
//! Game-agnostic over the [`game_core::Game`] trait. A [`Mcts`] session
//! builds a [`tree::SearchTree`] under a wall-clock budget using UCT
//! selection, one-leaf expansion, evaluation by parallel random rollouts
//! (or an optional learned value function), and leaf-to-root
//! backpropagation with alternating perspective. The tree survives across
//! turns: committing a move advances the root and prunes everything
//! unreachable.

pub mod config;
pub mod evaluator;
pub mod node;
pub mod policy;
pub mod rollout;
pub mod search;
pub mod tree;

pub use config::MctsConfig;
pub use evaluator::ValueFn;
pub use node::{Edge, EdgeId, Node, NodeId};
pub use policy::{SelectionStrategy, UnknownStrategy};
pub use rollout::{RolloutError, RolloutOutcome, RolloutPool};
pub use search::{Mcts, SearchError};
pub use tree::SearchTree;
