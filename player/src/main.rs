//! Player binary: plays a full game of self-play TicTacToe with one MCTS
//! actor per side, demonstrating the per-turn driver end to end. The White
//! actor persists its opening tree when a database path is configured, and a
//! later run reuses it for both sides.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use game_core::{Game, Player};
use games_tictactoe::TicTacToe;
use tracing::info;

use player::{Actor, Config, TreeStore};

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;
    init_tracing(&config.log_level)?;

    let mcts_config = config.mcts_config()?;
    info!(
        strategy = %config.strategy,
        timeout_secs = config.timeout_secs,
        "starting self-play game"
    );

    let store = match &config.db_path {
        Some(path) => Some(Arc::new(TreeStore::open(path)?)),
        None => None,
    };

    let game = Arc::new(TicTacToe::new());
    let mut white = Actor::new(
        game.clone(),
        Player::White,
        mcts_config.clone(),
        store.clone(),
    )?;
    let mut black = Actor::new(game.clone(), Player::Black, mcts_config, store)?;

    let mut state = game.initial_state();
    while !game.is_terminal(&state) {
        let side = game.side_to_move(&state);
        let (mover, observer) = match side {
            Player::White => (&mut white, &mut black),
            Player::Black => (&mut black, &mut white),
        };
        let action = mover.compute_move()?;
        state = game.apply(&state, &action);
        mover.advance_turn()?;
        observer.observe_opponent(state.clone());
        info!(side = ?side, action = ?action, "move played");
    }

    // At a finished game the side to move did not make the last move.
    let loser = game.side_to_move(&state);
    info!(winner = ?loser.opponent(), loser = ?loser, "game over");
    Ok(())
}
