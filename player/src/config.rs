//! Configuration for the player binary.
//!
//! CLI arguments take priority, with environment variable fallbacks.

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use game_core::Player;
use mcts::{MctsConfig, SelectionStrategy};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(name = "player")]
#[command(about = "Time-budgeted MCTS game player")]
pub struct Config {
    /// Side to play: white or black
    #[arg(long, env = "PLAYER_COLOR", default_value = "white")]
    pub color: String,

    /// Wall-clock budget per move in seconds
    #[arg(long, env = "PLAYER_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Move selection strategy (max_child, robust_child, max_robust_child, secure_child)
    #[arg(long, env = "PLAYER_STRATEGY", default_value = "robust_child")]
    pub strategy: String,

    /// Turn from which move selection becomes deterministic
    #[arg(long, env = "PLAYER_DETERMINISTIC_AFTER_TURN", default_value_t = 10)]
    pub deterministic_after_turn: u32,

    /// Path to the opening-tree SQLite database (omit to disable persistence)
    #[arg(long, env = "PLAYER_DB_PATH")]
    pub db_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PLAYER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.player_color()?;
        self.selection_strategy()?;
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be greater than 0"));
        }
        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }
        Ok(())
    }

    pub fn player_color(&self) -> Result<Player> {
        match self.color.to_ascii_lowercase().as_str() {
            "white" => Ok(Player::White),
            "black" => Ok(Player::Black),
            other => Err(anyhow!("invalid color '{}', expected white or black", other)),
        }
    }

    pub fn selection_strategy(&self) -> Result<SelectionStrategy> {
        Ok(self.strategy.parse::<SelectionStrategy>()?)
    }

    /// Search configuration derived from the parsed arguments.
    pub fn mcts_config(&self) -> Result<MctsConfig> {
        Ok(MctsConfig::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_strategy(self.selection_strategy()?)
            .with_deterministic_after_turn(self.deterministic_after_turn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            color: "white".into(),
            timeout_secs: 60,
            strategy: "robust_child".into(),
            deterministic_after_turn: 10,
            db_path: None,
            log_level: "info".into(),
        }
    }

    #[test]
    fn validate_accepts_valid_configuration() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_color() {
        let mut cfg = base_config();
        cfg.color = "red".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid color"));
    }

    #[test]
    fn validate_rejects_unknown_strategy() {
        let mut cfg = base_config();
        cfg.strategy = "best_child".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut cfg = base_config();
        cfg.timeout_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "nope".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid log level"));
    }

    #[test]
    fn color_parsing_is_case_insensitive() {
        let mut cfg = base_config();
        cfg.color = "Black".into();
        assert_eq!(cfg.player_color().unwrap(), Player::Black);
    }

    #[test]
    fn mcts_config_carries_the_arguments() {
        let cfg = base_config();
        let mcts = cfg.mcts_config().unwrap();
        assert_eq!(mcts.timeout, Duration::from_secs(60));
        assert_eq!(mcts.strategy, SelectionStrategy::RobustChild);
        assert_eq!(mcts.deterministic_after_turn, 10);
    }
}
