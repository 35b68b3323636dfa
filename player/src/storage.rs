//! Opening-tree persistence.
//!
//! The tree built on the first turn is the only one worth keeping: it is the
//! single position every game shares. Trees are serialized with bincode and
//! stored in SQLite keyed by the root position's state key, so White's saved
//! opening can be found again by either side in a later game.

use std::path::Path;
use std::sync::Mutex;

use game_core::Game;
use mcts::SearchTree;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode or decode tree: {0}")]
    Codec(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// SQLite-backed store for persisted search trees.
///
/// Uses a Mutex since rusqlite's Connection is not Sync.
pub struct TreeStore {
    conn: Mutex<Connection>,
}

impl TreeStore {
    /// Open the store at `db_path`, creating the database and its parent
    /// directories if needed.
    pub fn open(db_path: &str) -> Result<Self, StorageError> {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(db_path)?)
    }

    /// In-memory store. Contents are lost on drop; intended for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS trees (
                state_key INTEGER PRIMARY KEY,
                tree BLOB NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist `tree` under `key`, replacing any previous tree for the same
    /// position.
    pub fn save<G>(&self, key: u64, tree: &SearchTree<G>) -> Result<(), StorageError>
    where
        G: Game,
        G::State: Serialize,
        G::Action: Serialize,
    {
        let blob = bincode::serialize(tree)?;
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO trees (state_key, tree) VALUES (?1, ?2)",
            params![key as i64, blob],
        )?;
        Ok(())
    }

    /// Load the tree stored under `key`. `None` is the normal case for a
    /// position that was never saved, not an error.
    pub fn load<G>(&self, key: u64) -> Result<Option<SearchTree<G>>, StorageError>
    where
        G: Game,
        G::State: DeserializeOwned,
        G::Action: DeserializeOwned,
    {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT tree FROM trees WHERE state_key = ?1",
                params![key as i64],
                |row| row.get(0),
            )
            .optional()?;
        match blob {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use games_tictactoe::TicTacToe;
    use tempfile::tempdir;

    use super::*;

    fn small_tree(game: &TicTacToe) -> SearchTree<TicTacToe> {
        let mut tree = SearchTree::new(game, game.initial_state());
        tree.expand(game, tree.root());
        let first = tree.root_edges()[0];
        tree.backpropagate(&[first], 3.0, 4);
        tree
    }

    #[test]
    fn save_and_load_round_trip() {
        let game = TicTacToe::new();
        let store = TreeStore::open_in_memory().unwrap();
        let tree = small_tree(&game);
        let key = game.state_key(&game.initial_state());

        store.save(key, &tree).unwrap();
        let loaded: SearchTree<TicTacToe> = store.load(key).unwrap().expect("tree was saved");

        assert_eq!(loaded.live_nodes(), tree.live_nodes());
        assert_eq!(loaded.live_edges(), tree.live_edges());
        let edge = loaded.edge(loaded.root_edges()[0]);
        assert_eq!(edge.n, 4);
        assert!((edge.w - 3.0).abs() < 1e-9);
    }

    #[test]
    fn missing_key_loads_as_none() {
        let store = TreeStore::open_in_memory().unwrap();
        let loaded = store.load::<TicTacToe>(0xdead_beef).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_replaces_an_existing_tree() {
        let game = TicTacToe::new();
        let store = TreeStore::open_in_memory().unwrap();
        let key = game.state_key(&game.initial_state());

        store.save(key, &small_tree(&game)).unwrap();
        let fresh = SearchTree::new(&game, game.initial_state());
        store.save(key, &fresh).unwrap();

        let loaded: SearchTree<TicTacToe> = store.load(key).unwrap().expect("tree was saved");
        assert_eq!(loaded.live_nodes(), 1);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/trees.db");
        let store = TreeStore::open(path.to_str().unwrap()).unwrap();
        assert!(store.load::<TicTacToe>(1).unwrap().is_none());
    }
}
