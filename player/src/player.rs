//! Per-turn driver for one side of a game.
//!
//! An [`Actor`] owns the search session for its color and walks it through
//! the game: compute a move under the time budget, commit it once played,
//! advance past the opponent's replies. On the first turn the actor also
//! handles the opening tree: White persists a shallow cut of what it just
//! searched, Black tries to reuse a previously saved one from the opposite
//! perspective.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use game_core::{Game, Player};
use mcts::{Mcts, MctsConfig, NodeId};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::storage::TreeStore;

/// Depth the opening tree is cut to before it is persisted.
const SAVED_TREE_DEPTH: u32 = 2;

/// One side of a game: a search session plus turn bookkeeping.
pub struct Actor<G: Game> {
    game: Arc<G>,
    color: Player,
    config: MctsConfig,
    mcts: Mcts<G>,
    store: Option<Arc<TreeStore>>,
    turn: u32,
    pending: Option<(G::Action, NodeId)>,
    forced: Option<(G::Action, NodeId)>,
    swap_on_advance: bool,
    rng: ChaCha20Rng,
}

impl<G> Actor<G>
where
    G: Game,
    G::State: Serialize + DeserializeOwned,
    G::Action: Serialize + DeserializeOwned,
{
    /// Actor starting from the game's initial position.
    pub fn new(
        game: Arc<G>,
        color: Player,
        config: MctsConfig,
        store: Option<Arc<TreeStore>>,
    ) -> Result<Self> {
        let state = game.initial_state();
        Self::with_state(game, color, state, config, store)
    }

    /// Actor starting from an arbitrary position. The opening tree is only
    /// consulted when `state` is the initial position.
    pub fn with_state(
        game: Arc<G>,
        color: Player,
        state: G::State,
        config: MctsConfig,
        store: Option<Arc<TreeStore>>,
    ) -> Result<Self> {
        let (mcts, swap_on_advance) =
            Self::build_mcts(&game, color, state, &config, store.as_deref())?;
        Ok(Self {
            game,
            color,
            config,
            mcts,
            store,
            turn: 1,
            pending: None,
            forced: None,
            swap_on_advance,
            rng: ChaCha20Rng::from_entropy(),
        })
    }

    /// Build the session, reusing a persisted opening tree when one exists
    /// for this exact position. A missing tree is the normal case; a corrupt
    /// or unreadable one is logged and ignored.
    ///
    /// A loaded tree carries White's statistics. Black still loads it, but
    /// defers the perspective swap until the root has advanced past White's
    /// first move, at which point the root edges are Black's own choices.
    fn build_mcts(
        game: &Arc<G>,
        color: Player,
        state: G::State,
        config: &MctsConfig,
        store: Option<&TreeStore>,
    ) -> Result<(Mcts<G>, bool)> {
        if let Some(store) = store {
            let key = game.state_key(&state);
            if key == game.state_key(&game.initial_state()) {
                match store.load::<G>(key) {
                    Ok(Some(tree)) => {
                        info!(key, ?color, "loaded opening tree");
                        let mcts =
                            Mcts::from_tree(game.clone(), color, tree, config.clone(), None)?;
                        return Ok((mcts, color == Player::Black));
                    }
                    Ok(None) => debug!(key, "no opening tree on record"),
                    Err(err) => warn!(%err, "failed to load opening tree"),
                }
            }
        }
        let mcts = Mcts::new(game.clone(), color, state, config.clone())?;
        Ok((mcts, false))
    }

    #[inline]
    pub fn color(&self) -> Player {
        self.color
    }

    /// 1-based count of this actor's own moves.
    #[inline]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Compute this actor's move for the current turn.
    ///
    /// A forced move detected while advancing the root is played without
    /// searching. Otherwise the search runs until 90% of the configured
    /// budget has elapsed, leaving headroom to select and transmit the move.
    pub fn compute_move(&mut self) -> Result<G::Action> {
        if let Some((action, child)) = self.forced.take() {
            info!(turn = self.turn, action = ?action, "playing forced move");
            self.pending = Some((action.clone(), child));
            return Ok(action);
        }

        let deadline = Instant::now() + self.config.timeout.mul_f64(0.9);
        let simulations = self
            .mcts
            .run(deadline, self.turn)
            .context("search failed")?;
        for &eid in self.mcts.tree().root_edges() {
            let edge = self.mcts.tree().edge(eid);
            info!(action = ?edge.action, n = edge.n, w = edge.w, q = edge.q, "root edge");
        }

        let (action, child) = self.mcts.select_move(self.turn, &mut self.rng)?;
        info!(turn = self.turn, action = ?action, simulations, "selected move");
        self.pending = Some((action.clone(), child));
        Ok(action)
    }

    /// Commit the move computed this turn: persist the opening tree if this
    /// is the first turn, advance the root, bump the turn counter.
    pub fn advance_turn(&mut self) -> Result<()> {
        let (action, child) = self
            .pending
            .take()
            .context("no move computed this turn")?;
        if self.turn == 1 {
            self.save_opening_tree()?;
        }
        self.forced = self.mcts.commit(child);
        debug!(turn = self.turn, action = ?action, tau = self.mcts.tau(), "committed move");
        self.turn += 1;
        Ok(())
    }

    /// Advance past the opponent's move to `state`.
    ///
    /// The opponent's move does not advance this actor's turn: `turn`
    /// counts own moves, so the first-turn save and the turn-gated search
    /// thresholds fire at the same own-move count for both sides.
    pub fn observe_opponent(&mut self, state: G::State) {
        self.forced = self.mcts.advance_to_state(state);
        if self.swap_on_advance {
            // The loaded statistics were White's; the edges under the new
            // root are this side's own choices.
            self.mcts.tree_mut().swap_values();
            self.swap_on_advance = false;
        }
    }

    /// Persist a shallow cut of the current tree as the opening tree.
    ///
    /// Only meaningful while the root is still the shared first-turn
    /// position; calling this later is a programming error.
    pub fn save_opening_tree(&mut self) -> Result<()> {
        assert!(
            self.turn == 1,
            "opening tree can only be saved on the first turn"
        );
        let Some(store) = &self.store else {
            return Ok(());
        };
        self.mcts.tree_mut().cut_tree(SAVED_TREE_DEPTH);
        let tree = self.mcts.tree();
        let key = tree.node(tree.root()).key;
        store.save(key, tree)?;
        info!(key, "saved opening tree");
        Ok(())
    }

    /// Discard the session and start over from the initial position.
    pub fn reset(&mut self) -> Result<()> {
        self.mcts.tree_mut().clear();
        let (mcts, swap_on_advance) = Self::build_mcts(
            &self.game,
            self.color,
            self.game.initial_state(),
            &self.config,
            self.store.as_deref(),
        )?;
        self.mcts = mcts;
        self.swap_on_advance = swap_on_advance;
        self.turn = 1;
        self.pending = None;
        self.forced = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use games_tictactoe::TicTacToe;
    use mcts::SearchTree;

    use super::*;

    fn fast_config() -> MctsConfig {
        MctsConfig::for_testing().with_timeout(Duration::from_millis(30))
    }

    #[test]
    fn self_play_reaches_a_terminal_state() {
        let game = Arc::new(TicTacToe::new());
        let mut white = Actor::new(game.clone(), Player::White, fast_config(), None).unwrap();
        let mut black = Actor::new(game.clone(), Player::Black, fast_config(), None).unwrap();

        let mut state = game.initial_state();
        for _ in 0..9 {
            if game.is_terminal(&state) {
                break;
            }
            let (mover, observer) = match game.side_to_move(&state) {
                Player::White => (&mut white, &mut black),
                Player::Black => (&mut black, &mut white),
            };
            let action = mover.compute_move().unwrap();
            state = game.apply(&state, &action);
            mover.advance_turn().unwrap();
            observer.observe_opponent(state.clone());
        }
        assert!(game.is_terminal(&state));
    }

    #[test]
    fn forced_win_is_played_without_search() {
        let game = Arc::new(TicTacToe::new());
        // X: 0, 1; O: 3; O to move.
        let mut before = game.initial_state();
        for m in [0u8, 3, 1] {
            before = game.apply(&before, &m);
        }
        let mut actor =
            Actor::with_state(game.clone(), Player::White, before.clone(), fast_config(), None)
                .unwrap();

        // O plays 4; X now wins immediately at 2, which the root advance
        // detects before any search runs.
        actor.observe_opponent(game.apply(&before, &4));
        assert!(actor.forced.is_some());
        let action = actor.compute_move().unwrap();
        assert_eq!(action, 2);
        assert_eq!(actor.turn(), 1);
    }

    #[test]
    fn black_saves_its_opening_tree_after_its_first_move() {
        let game = Arc::new(TicTacToe::new());
        let store = Arc::new(TreeStore::open_in_memory().unwrap());
        let mut black =
            Actor::new(game.clone(), Player::Black, fast_config(), Some(store.clone())).unwrap();

        // White opens; Black's own turn counter is still on its first move.
        let opening = game.apply(&game.initial_state(), &4);
        black.observe_opponent(opening.clone());
        assert_eq!(black.turn(), 1);

        black.compute_move().unwrap();
        black.advance_turn().unwrap();
        assert_eq!(black.turn(), 2);

        let saved: SearchTree<TicTacToe> = store
            .load(game.state_key(&opening))
            .unwrap()
            .expect("saved keyed by the root Black searched from");
        assert!(saved.max_depth() <= 2);
    }

    #[test]
    fn opening_tree_is_saved_on_the_first_turn() {
        let game = Arc::new(TicTacToe::new());
        let store = Arc::new(TreeStore::open_in_memory().unwrap());
        let mut white =
            Actor::new(game.clone(), Player::White, fast_config(), Some(store.clone())).unwrap();

        white.compute_move().unwrap();
        white.advance_turn().unwrap();
        assert_eq!(white.turn(), 2);

        let key = game.state_key(&game.initial_state());
        let saved: SearchTree<TicTacToe> = store.load(key).unwrap().expect("saved on turn 1");
        assert!(saved.max_depth() <= 2);

        // A later Black actor finds the tree and schedules the perspective
        // swap for its first root advance.
        let black =
            Actor::new(game.clone(), Player::Black, fast_config(), Some(store)).unwrap();
        assert!(black.swap_on_advance);
    }

    #[test]
    fn missing_opening_tree_is_not_an_error() {
        let game = Arc::new(TicTacToe::new());
        let store = Arc::new(TreeStore::open_in_memory().unwrap());
        let actor = Actor::new(game, Player::Black, fast_config(), Some(store)).unwrap();
        assert!(!actor.swap_on_advance);
    }

    #[test]
    #[should_panic(expected = "first turn")]
    fn saving_after_the_first_turn_panics() {
        let game = Arc::new(TicTacToe::new());
        let mut actor = Actor::new(game, Player::White, fast_config(), None).unwrap();
        actor.compute_move().unwrap();
        actor.advance_turn().unwrap();
        let _ = actor.save_opening_tree();
    }

    #[test]
    fn reset_starts_a_fresh_game() {
        let game = Arc::new(TicTacToe::new());
        let mut actor = Actor::new(game.clone(), Player::White, fast_config(), None).unwrap();
        actor.compute_move().unwrap();
        actor.advance_turn().unwrap();

        actor.reset().unwrap();
        assert_eq!(actor.turn(), 1);
        assert!(actor.pending.is_none());
        let key = actor.mcts.tree().node(actor.mcts.tree().root()).key;
        assert_eq!(key, game.state_key(&game.initial_state()));
    }
}
