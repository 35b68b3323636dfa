//! Root move selection.
//!
//! After the search budget is spent, the root edges' statistics are turned
//! into per-move scores by a [`SelectionStrategy`] and a single edge is
//! picked: argmax once play has become deterministic, multinomial sampling
//! over the normalized scores before that.

use std::fmt;
use std::str::FromStr;

use game_core::Game;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::MctsConfig;
use crate::node::EdgeId;
use crate::search::SearchError;
use crate::tree::SearchTree;

/// How root-edge statistics map to move scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Score by mean value `q`, shifted so every score is positive.
    MaxChild,
    /// Score by visit count `n`.
    RobustChild,
    /// Recognized but not implemented.
    MaxRobustChild,
    /// Recognized but not implemented.
    SecureChild,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MaxChild => "max_child",
            Self::RobustChild => "robust_child",
            Self::MaxRobustChild => "max_robust_child",
            Self::SecureChild => "secure_child",
        };
        f.write_str(name)
    }
}

/// A strategy name that does not match any recognized strategy.
#[derive(Debug, Error)]
#[error("unknown selection strategy: {0:?}")]
pub struct UnknownStrategy(pub String);

impl FromStr for SelectionStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max_child" => Ok(Self::MaxChild),
            "robust_child" => Ok(Self::RobustChild),
            "max_robust_child" => Ok(Self::MaxRobustChild),
            "secure_child" => Ok(Self::SecureChild),
            other => Err(UnknownStrategy(other.to_owned())),
        }
    }
}

/// Score every root edge under `strategy`, in root-edge order.
///
/// `MaxChild` shifts scores by the minimum `q` plus a small epsilon so the
/// worst move still carries nonzero sampling weight.
pub fn root_scores<G: Game>(
    tree: &SearchTree<G>,
    strategy: SelectionStrategy,
) -> Result<Vec<(EdgeId, f64)>, SearchError> {
    let edges = tree.root_edges();
    match strategy {
        SelectionStrategy::MaxChild => {
            let min_q = edges
                .iter()
                .map(|&eid| tree.edge(eid).q)
                .fold(f64::INFINITY, f64::min);
            Ok(edges
                .iter()
                .map(|&eid| (eid, tree.edge(eid).q - min_q + 1e-5))
                .collect())
        }
        SelectionStrategy::RobustChild => Ok(edges
            .iter()
            .map(|&eid| (eid, f64::from(tree.edge(eid).n)))
            .collect()),
        other @ (SelectionStrategy::MaxRobustChild | SelectionStrategy::SecureChild) => {
            Err(SearchError::NotImplemented(other))
        }
    }
}

/// Pick the root edge to play.
///
/// From `deterministic_after_turn` on this is argmax over the scores, first
/// occurrence winning ties; before that the edge is sampled from the scores
/// as multinomial weights.
pub fn choose_edge<G: Game, R: Rng>(
    tree: &SearchTree<G>,
    config: &MctsConfig,
    turn: u32,
    rng: &mut R,
) -> Result<EdgeId, SearchError> {
    let scores = root_scores(tree, config.strategy)?;
    if scores.is_empty() {
        return Err(SearchError::NoLegalMoves);
    }

    let chosen = if turn >= config.deterministic_after_turn {
        scores
            .iter()
            .fold(scores[0], |best, &cand| {
                if cand.1 > best.1 {
                    cand
                } else {
                    best
                }
            })
            .0
    } else {
        let dist = WeightedIndex::new(scores.iter().map(|&(_, s)| s))?;
        scores[dist.sample(rng)].0
    };
    debug!(
        turn,
        strategy = %config.strategy,
        edge = chosen.0,
        "selected root edge"
    );
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use games_tictactoe::TicTacToe;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    /// Expanded initial-position tree with edge 0 at n=10, w=7 and edge 1 at
    /// n=5, w=1; all other root edges unvisited.
    fn scored_tree() -> SearchTree<TicTacToe> {
        let game = TicTacToe::new();
        let mut tree = SearchTree::new(&game, game.initial_state());
        tree.expand(&game, tree.root());
        let (a, b) = (tree.root_edges()[0], tree.root_edges()[1]);
        tree.edge_mut(a).record(7.0, 10);
        tree.edge_mut(b).record(1.0, 5);
        tree
    }

    #[test]
    fn max_child_and_robust_child_agree_on_the_clear_best() {
        let tree = scored_tree();
        let best = tree.root_edges()[0];
        let config = MctsConfig::default().with_deterministic_after_turn(0);
        let mut rng = ChaCha20Rng::seed_from_u64(11);

        for strategy in [SelectionStrategy::MaxChild, SelectionStrategy::RobustChild] {
            let chosen =
                choose_edge(&tree, &config.clone().with_strategy(strategy), 5, &mut rng)
                    .unwrap();
            assert_eq!(chosen, best);
        }
    }

    #[test]
    fn sampling_respects_zero_weights() {
        let game = TicTacToe::new();
        let mut tree = SearchTree::new(&game, game.initial_state());
        tree.expand(&game, tree.root());
        let only = tree.root_edges()[3];
        tree.edge_mut(only).record(2.0, 8);

        // Below the deterministic turn, but under robust_child every other
        // edge has weight zero, so the sample is forced.
        let config = MctsConfig::default()
            .with_strategy(SelectionStrategy::RobustChild)
            .with_deterministic_after_turn(100);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(choose_edge(&tree, &config, 1, &mut rng).unwrap(), only);
        }
    }

    #[test]
    fn unimplemented_strategies_are_reported() {
        let tree = scored_tree();
        for strategy in [
            SelectionStrategy::MaxRobustChild,
            SelectionStrategy::SecureChild,
        ] {
            let err = root_scores(&tree, strategy).unwrap_err();
            assert!(matches!(err, SearchError::NotImplemented(s) if s == strategy));
        }
    }

    #[test]
    fn strategy_names_round_trip() {
        for strategy in [
            SelectionStrategy::MaxChild,
            SelectionStrategy::RobustChild,
            SelectionStrategy::MaxRobustChild,
            SelectionStrategy::SecureChild,
        ] {
            assert_eq!(strategy.to_string().parse::<SelectionStrategy>().unwrap(), strategy);
        }
        assert!("ucb_tuned".parse::<SelectionStrategy>().is_err());
    }
}
