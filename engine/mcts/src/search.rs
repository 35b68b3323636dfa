//! Search session and core iteration loop.
//!
//! A [`Mcts`] session owns one [`SearchTree`] and runs the standard four-phase
//! loop against a wall-clock deadline: descend by UCT to a leaf, expand it,
//! evaluate it (terminal shortcut, value function, or parallel rollouts), and
//! fold the result back along the descent path.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use game_core::{Game, Player};
use rand::distributions::WeightedError;
use rand::Rng;
use thiserror::Error;
use tracing::info;

use crate::config::MctsConfig;
use crate::evaluator::ValueFn;
use crate::node::{EdgeId, NodeId};
use crate::policy::{self, SelectionStrategy};
use crate::rollout::{RolloutError, RolloutPool};
use crate::tree::SearchTree;

/// Errors raised by search construction, iteration, and move selection.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Rollouts are disabled and no value function was supplied; non-terminal
    /// leaves cannot be evaluated. Raised at construction, never mid-search.
    #[error("neither rollouts nor a value function are configured")]
    NoEvaluator,

    #[error(transparent)]
    Rollout(#[from] RolloutError),

    #[error("selection strategy {0} is recognized but not implemented")]
    NotImplemented(SelectionStrategy),

    #[error("root position has no legal moves")]
    NoLegalMoves,

    #[error("failed to build sampling distribution: {0}")]
    Distribution(#[from] WeightedError),
}

/// One search session: a tree, the side it searches for, and an evaluator.
pub struct Mcts<G: Game> {
    game: Arc<G>,
    tree: SearchTree<G>,
    color: Player,
    config: MctsConfig,
    rollout: Option<RolloutPool>,
    value_fn: Option<Box<dyn ValueFn<G>>>,
    tau: f64,
}

impl<G: Game> fmt::Debug for Mcts<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mcts")
            .field("color", &self.color)
            .field("config", &self.config)
            .field("tau", &self.tau)
            .finish_non_exhaustive()
    }
}

impl<G: Game> Mcts<G> {
    /// Session with rollout evaluation, rooted at `state`.
    pub fn new(
        game: Arc<G>,
        color: Player,
        state: G::State,
        config: MctsConfig,
    ) -> Result<Self, SearchError> {
        Self::with_options(game, color, state, config, None)
    }

    /// Session with an optional value function. With `config.workers == 0`
    /// the value function is mandatory.
    pub fn with_options(
        game: Arc<G>,
        color: Player,
        state: G::State,
        config: MctsConfig,
        value_fn: Option<Box<dyn ValueFn<G>>>,
    ) -> Result<Self, SearchError> {
        let tree = SearchTree::new(game.as_ref(), state);
        Self::from_tree(game, color, tree, config, value_fn)
    }

    /// Session over an existing tree, typically one loaded from storage.
    pub fn from_tree(
        game: Arc<G>,
        color: Player,
        tree: SearchTree<G>,
        config: MctsConfig,
        value_fn: Option<Box<dyn ValueFn<G>>>,
    ) -> Result<Self, SearchError> {
        if config.workers == 0 && value_fn.is_none() {
            return Err(SearchError::NoEvaluator);
        }
        let rollout = if config.workers > 0 {
            Some(RolloutPool::new(
                config.workers,
                config.endgame_turn_threshold,
                config.max_playout_len,
            )?)
        } else {
            None
        };
        let tau = config.tau;
        Ok(Self {
            game,
            tree,
            color,
            config,
            rollout,
            value_fn,
            tau,
        })
    }

    #[inline]
    pub fn tree(&self) -> &SearchTree<G> {
        &self.tree
    }

    #[inline]
    pub fn tree_mut(&mut self) -> &mut SearchTree<G> {
        &mut self.tree
    }

    #[inline]
    pub fn color(&self) -> Player {
        self.color
    }

    #[inline]
    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// Run search iterations until `deadline`.
    ///
    /// The deadline is checked between iterations; an iteration in progress
    /// is never preempted. Later simulations within the budget count for
    /// more: a scale factor K doubles every time the cumulative simulation
    /// count crosses a power of two, starting at 2^6, and multiplies both
    /// the propagated value and weight. Returns the simulation count.
    pub fn run(&mut self, deadline: Instant, turn: u32) -> Result<u64, SearchError> {
        let per_iteration = self
            .rollout
            .as_ref()
            .map_or(1, |pool| pool.workers() as u64);
        let mut simulations: u64 = 0;
        let mut segment: u32 = 6;

        while Instant::now() < deadline {
            let k = 2f64.powi((segment - 6) as i32);
            let (leaf, path) = self.select_leaf();
            self.simulate(leaf, &path, turn, k)?;
            simulations += per_iteration;
            if simulations >= 1 << segment {
                segment += 1;
            }
        }
        info!(
            simulations,
            turn,
            max_depth = self.tree.max_depth(),
            "search budget exhausted"
        );
        Ok(simulations)
    }

    /// Descend from the root by UCT until a leaf.
    ///
    /// An unvisited edge has infinite priority; the first one encountered is
    /// taken without scoring the rest. Edges already on this descent's path
    /// are excluded from re-selection; if that excludes every edge of a node,
    /// the descent stops there.
    fn select_leaf(&self) -> (NodeId, Vec<EdgeId>) {
        let mut path = Vec::new();
        let mut current = self.tree.root();
        loop {
            let node = self.tree.node(current);
            if node.is_leaf() {
                return (current, path);
            }

            let parent_visits: u32 = node.edges.iter().map(|&e| self.tree.edge(e).n).sum();
            let ln_parent = f64::from(parent_visits.max(1)).ln();
            let mut chosen = None;
            let mut best_score = f64::NEG_INFINITY;
            for &eid in &node.edges {
                if path.contains(&eid) {
                    continue;
                }
                let edge = self.tree.edge(eid);
                if edge.n == 0 {
                    chosen = Some(eid);
                    break;
                }
                let score = edge.q
                    + self.config.exploration * (ln_parent / f64::from(edge.n)).sqrt();
                if score > best_score {
                    best_score = score;
                    chosen = Some(eid);
                }
            }

            match chosen {
                Some(eid) => {
                    path.push(eid);
                    current = self.tree.edge(eid).child;
                }
                None => return (current, path),
            }
        }
    }

    /// Evaluate `leaf` and backpropagate the result along `path`.
    ///
    /// Terminal leaves and expansions that uncover a terminal child resolve
    /// to certain win/loss without calling the evaluator.
    fn simulate(
        &mut self,
        leaf: NodeId,
        path: &[EdgeId],
        turn: u32,
        k: f64,
    ) -> Result<(), SearchError> {
        let state = self.tree.node(leaf).state.clone();

        if self.game.is_terminal(&state) {
            // The side to move at a terminal state is the side that did not
            // make the final move, and lost.
            let value = if self.game.side_to_move(&state) == self.color {
                -1.0
            } else {
                1.0
            };
            self.tree.backpropagate(path, k * value, scaled_weight(1, k));
            return Ok(());
        }

        if self.tree.expand(self.game.as_ref(), leaf) {
            // The side to move at the leaf can end the game in one move.
            let value = if self.game.side_to_move(&state) == self.color {
                1.0
            } else {
                -1.0
            };
            self.tree.backpropagate(path, k * value, scaled_weight(1, k));
            return Ok(());
        }

        let (value, weight) = if let Some(value_fn) = &self.value_fn {
            (value_fn.evaluate(&state), 1)
        } else if let Some(pool) = &self.rollout {
            let outcome = pool.evaluate(self.game.as_ref(), &state, turn, self.color)?;
            (outcome.value, outcome.weight.max(1))
        } else {
            // Ruled out at construction time.
            return Err(SearchError::NoEvaluator);
        };
        self.tree.backpropagate(path, k * value, scaled_weight(weight, k));
        Ok(())
    }

    /// Pick the move to play from the root statistics. Does not modify the
    /// tree; pair with [`Mcts::commit`] once the move is actually made.
    pub fn select_move<R: Rng>(
        &self,
        turn: u32,
        rng: &mut R,
    ) -> Result<(G::Action, NodeId), SearchError> {
        let eid = policy::choose_edge(&self.tree, &self.config, turn, rng)?;
        let edge = self.tree.edge(eid);
        Ok((edge.action.clone(), edge.child))
    }

    /// Commit an own move: advance the root to `child` and decay the
    /// temperature. Returns a forced reply if the new root has one.
    pub fn commit(&mut self, child: NodeId) -> Option<(G::Action, NodeId)> {
        self.tau *= self.config.tau_alpha;
        self.tree.advance_root(self.game.as_ref(), child)
    }

    /// Advance the root to the opponent's chosen position. Same forced-move
    /// contract as [`Mcts::commit`], without the temperature decay.
    pub fn advance_to_state(&mut self, state: G::State) -> Option<(G::Action, NodeId)> {
        self.tree.advance_root_to_state(self.game.as_ref(), state)
    }
}

/// Weight scaled by K. K is a power of two, so this is exact.
#[inline]
fn scaled_weight(weight: u32, k: f64) -> u32 {
    (f64::from(weight) * k) as u32
}
