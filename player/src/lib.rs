//! Game-playing driver built on the `mcts` search engine.
//!
//! Pairs a per-turn [`Actor`] with SQLite-backed opening-tree persistence
//! and the CLI configuration for the player binary.

pub mod config;
pub mod player;
pub mod storage;

pub use config::Config;
pub use player::Actor;
pub use storage::{StorageError, TreeStore};
