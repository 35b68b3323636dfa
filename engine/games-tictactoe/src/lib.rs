//! TicTacToe implementation of the [`game_core::Game`] trait.
//!
//! This is the reference game used by the engine's tests and the self-play
//! binary. X plays as [`Player::White`] and moves first.
//!
//! The engine's value model only knows win/loss: at a terminal state the side
//! to move is the side that did not make the final move, and it is scored as
//! the loser. A drawn board therefore counts against the side to move; for a
//! reference game used to exercise the search this is acceptable.

use std::hash::{Hash, Hasher};

use game_core::{Game, Player};
use serde::{Deserialize, Serialize};

/// Complete TicTacToe position: board, side to move, result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    /// 0 = empty, 1 = X, 2 = O.
    board: [u8; 9],
    /// 1 = X, 2 = O.
    current_player: u8,
    /// 0 = ongoing, 1 = X won, 2 = O won, 3 = draw.
    winner: u8,
}

impl State {
    pub fn new() -> Self {
        Self {
            board: [0; 9],
            current_player: 1,
            winner: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.winner != 0
    }

    /// Empty positions, in board order. Empty once the game is over.
    pub fn legal_moves(&self) -> Vec<u8> {
        if self.is_done() {
            return Vec::new();
        }
        (0..9u8)
            .filter(|&pos| self.board[pos as usize] == 0)
            .collect()
    }

    /// The position reached by playing `position`. Illegal moves return the
    /// state unchanged.
    pub fn make_move(&self, position: u8) -> State {
        if self.is_done() || position >= 9 || self.board[position as usize] != 0 {
            return *self;
        }

        let mut next = *self;
        next.board[position as usize] = self.current_player;
        next.winner = Self::check_winner(&next.board);
        // The mover always hands the turn over, terminal or not; the side to
        // move in a finished game is the side that did not make the last move.
        next.current_player = if self.current_player == 1 { 2 } else { 1 };
        next
    }

    fn check_winner(board: &[u8; 9]) -> u8 {
        const LINES: [[usize; 3]; 8] = [
            [0, 1, 2],
            [3, 4, 5],
            [6, 7, 8], // rows
            [0, 3, 6],
            [1, 4, 7],
            [2, 5, 8], // columns
            [0, 4, 8],
            [2, 4, 6], // diagonals
        ];

        for line in &LINES {
            let [a, b, c] = *line;
            if board[a] != 0 && board[a] == board[b] && board[b] == board[c] {
                return board[a];
            }
        }

        if board.iter().all(|&cell| cell != 0) {
            return 3;
        }

        0
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// The game object. Stateless; all position data lives in [`State`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TicTacToe;

impl TicTacToe {
    pub fn new() -> Self {
        Self
    }
}

impl Game for TicTacToe {
    type State = State;
    type Action = u8;

    fn initial_state(&self) -> State {
        State::new()
    }

    fn legal_actions(&self, state: &State) -> Vec<u8> {
        state.legal_moves()
    }

    fn apply(&self, state: &State, action: &u8) -> State {
        state.make_move(*action)
    }

    fn is_terminal(&self, state: &State) -> bool {
        state.is_done()
    }

    fn side_to_move(&self, state: &State) -> Player {
        if state.current_player == 1 {
            Player::White
        } else {
            Player::Black
        }
    }

    fn state_key(&self, state: &State) -> u64 {
        // DefaultHasher::new() hashes with fixed keys, so this is stable
        // across processes; persisted-tree lookups rely on that.
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        state.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_has_nine_moves() {
        let game = TicTacToe::new();
        let state = game.initial_state();
        assert_eq!(game.legal_actions(&state).len(), 9);
        assert!(!game.is_terminal(&state));
        assert_eq!(game.side_to_move(&state), Player::White);
    }

    #[test]
    fn apply_is_pure() {
        let game = TicTacToe::new();
        let state = game.initial_state();
        let next = game.apply(&state, &4);
        assert_eq!(game.legal_actions(&state).len(), 9);
        assert_eq!(game.legal_actions(&next).len(), 8);
        assert_eq!(game.side_to_move(&next), Player::Black);
    }

    #[test]
    fn row_win_is_terminal_with_loser_to_move() {
        let game = TicTacToe::new();
        // X: 0, 1, 2 (top row); O: 3, 4.
        let mut state = game.initial_state();
        for m in [0u8, 3, 1, 4, 2] {
            state = game.apply(&state, &m);
        }
        assert!(game.is_terminal(&state));
        // X made the winning move, so Black (the loser) is the side to move.
        assert_eq!(game.side_to_move(&state), Player::Black);
        assert!(game.legal_actions(&state).is_empty());
    }

    #[test]
    fn state_key_tracks_content() {
        let game = TicTacToe::new();
        let a = game.initial_state();
        let b = game.initial_state();
        assert_eq!(game.state_key(&a), game.state_key(&b));
        let c = game.apply(&a, &0);
        assert_ne!(game.state_key(&a), game.state_key(&c));
    }
}
