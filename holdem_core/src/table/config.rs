//! Table configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::{Chips, TableError};

pub const DEFAULT_SMALL_BLIND: Chips = 10;
pub const DEFAULT_BIG_BLIND: Chips = 20;
pub const DEFAULT_STARTING_STACK: Chips = 1000;
pub const DEFAULT_MIN_BUY_IN: Chips = 500;
pub const DEFAULT_MAX_BUY_IN: Chips = 2000;
pub const DEFAULT_MAX_SEATS: usize = 10;
pub const DEFAULT_MIN_PLAYERS: usize = 2;
pub const DEFAULT_RESTART_DELAY_MS: u64 = 5000;

/// Per-table parameters. Cash tables enforce the buy-in range; tournament
/// tables seat players with whatever stack the coordinator hands over.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableConfig {
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub ante: Chips,
    /// Stack granted when a join carries no explicit buy-in.
    pub starting_stack: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub max_seats: usize,
    pub min_players: usize,
    pub auto_restart: bool,
    pub restart_delay_ms: u64,
    pub tournament_mode: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            small_blind: DEFAULT_SMALL_BLIND,
            big_blind: DEFAULT_BIG_BLIND,
            ante: 0,
            starting_stack: DEFAULT_STARTING_STACK,
            min_buy_in: DEFAULT_MIN_BUY_IN,
            max_buy_in: DEFAULT_MAX_BUY_IN,
            max_seats: DEFAULT_MAX_SEATS,
            min_players: DEFAULT_MIN_PLAYERS,
            auto_restart: true,
            restart_delay_ms: DEFAULT_RESTART_DELAY_MS,
            tournament_mode: false,
        }
    }
}

impl TableConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn validate(&self) -> Result<(), TableError> {
        if self.big_blind <= self.small_blind {
            return Err(TableError::InvalidConfig(
                "big blind must be greater than small blind".to_string(),
            ));
        }
        if self.max_buy_in < self.min_buy_in {
            return Err(TableError::InvalidConfig(
                "max buy-in must be at least min buy-in".to_string(),
            ));
        }
        if self.max_seats < 2 || self.max_seats > DEFAULT_MAX_SEATS {
            return Err(TableError::InvalidConfig(
                "max seats must be between 2 and 10".to_string(),
            ));
        }
        if self.min_players < 2 || self.min_players > self.max_seats {
            return Err(TableError::InvalidConfig(
                "min players must be between 2 and max seats".to_string(),
            ));
        }
        Ok(())
    }

    /// Cash tables accept buy-ins within `[min, max]`; tournament tables
    /// accept the stack the coordinator assigns.
    pub fn validate_buy_in(&self, amount: Chips) -> Result<(), TableError> {
        if self.tournament_mode {
            return Ok(());
        }
        if amount < self.min_buy_in || amount > self.max_buy_in {
            return Err(TableError::BuyInOutOfRange {
                min: self.min_buy_in,
                max: self.max_buy_in,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_table_parameters() {
        let config = TableConfig::default();
        assert_eq!(config.small_blind, 10);
        assert_eq!(config.big_blind, 20);
        assert_eq!(config.starting_stack, 1000);
        assert_eq!(config.min_buy_in, 500);
        assert_eq!(config.max_buy_in, 2000);
        assert_eq!(config.max_seats, 10);
        assert_eq!(config.min_players, 2);
        assert!(config.auto_restart);
        assert_eq!(config.restart_delay(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_buy_in_range_enforced_for_cash_tables() {
        let config = TableConfig::default();
        assert!(config.validate_buy_in(500).is_ok());
        assert!(config.validate_buy_in(2000).is_ok());
        assert_eq!(
            config.validate_buy_in(499),
            Err(TableError::BuyInOutOfRange { min: 500, max: 2000 })
        );
        assert_eq!(
            config.validate_buy_in(2001),
            Err(TableError::BuyInOutOfRange { min: 500, max: 2000 })
        );
    }

    #[test]
    fn test_buy_in_unchecked_in_tournament_mode() {
        let config = TableConfig {
            tournament_mode: true,
            ..TableConfig::default()
        };
        assert!(config.validate_buy_in(1).is_ok());
        assert!(config.validate_buy_in(1_000_000).is_ok());
    }

    #[test]
    fn test_invalid_blinds_rejected() {
        let config = TableConfig {
            small_blind: 20,
            big_blind: 20,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
