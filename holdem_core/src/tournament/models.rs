//! Tournament data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::game::Chips;

/// Tournament lifecycle states.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Registering,
    Starting,
    Active,
    FinalTable,
    Finished,
    Cancelled,
}

/// One step of the blind schedule.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BlindLevel {
    pub level: u32,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub ante: Chips,
    pub duration_secs: u64,
}

impl BlindLevel {
    pub fn new(level: u32, small_blind: Chips, big_blind: Chips, duration_secs: u64) -> Self {
        Self {
            level,
            small_blind,
            big_blind,
            ante: 0,
            duration_secs,
        }
    }

    pub fn with_ante(mut self, ante: Chips) -> Self {
        self.ante = ante;
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// The standard blind schedule: 10/20 doubling up through 400/800 with
/// antes from level six.
pub fn standard_blind_schedule(level_secs: u64) -> Vec<BlindLevel> {
    vec![
        BlindLevel::new(1, 10, 20, level_secs),
        BlindLevel::new(2, 15, 30, level_secs),
        BlindLevel::new(3, 25, 50, level_secs),
        BlindLevel::new(4, 50, 100, level_secs),
        BlindLevel::new(5, 75, 150, level_secs),
        BlindLevel::new(6, 100, 200, level_secs).with_ante(25),
        BlindLevel::new(7, 150, 300, level_secs).with_ante(25),
        BlindLevel::new(8, 200, 400, level_secs).with_ante(50),
        BlindLevel::new(9, 300, 600, level_secs).with_ante(75),
        BlindLevel::new(10, 400, 800, level_secs).with_ante(100),
    ]
}

/// Tournament parameters.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TournamentConfig {
    pub name: String,
    pub buy_in: Chips,
    pub starting_stack: Chips,
    pub min_players: usize,
    pub max_players: usize,
    /// Seats per child table; also the final-table collapse threshold.
    pub table_size: usize,
    pub registration_delay_secs: u64,
    pub blind_levels: Vec<BlindLevel>,
    /// Prize pool percentages by finish position, best first.
    pub prize_percents: Vec<u32>,
}

impl TournamentConfig {
    /// The default sit-and-go: 4 players, entry fee 100, starting stack
    /// 1000, 65/35 split, 10-minute registration window.
    pub fn sit_and_go(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buy_in: 100,
            starting_stack: 1000,
            min_players: 2,
            max_players: 4,
            table_size: 4,
            registration_delay_secs: 600,
            blind_levels: standard_blind_schedule(600),
            prize_percents: vec![65, 35],
        }
    }

    /// Standard multi-table tournament: ten-minute levels.
    pub fn standard(name: impl Into<String>, buy_in: Chips) -> Self {
        Self {
            name: name.into(),
            buy_in,
            starting_stack: 1500,
            min_players: 4,
            max_players: 18,
            table_size: 6,
            registration_delay_secs: 120,
            blind_levels: standard_blind_schedule(600),
            prize_percents: vec![50, 30, 20],
        }
    }

    /// Turbo variant: five-minute levels and a one-minute registration
    /// window.
    pub fn turbo(name: impl Into<String>, buy_in: Chips) -> Self {
        let name = name.into();
        Self {
            registration_delay_secs: 60,
            blind_levels: standard_blind_schedule(300),
            ..Self::standard(format!("{name} (Turbo)"), buy_in)
        }
    }

    pub fn registration_delay(&self) -> Duration {
        Duration::from_secs(self.registration_delay_secs)
    }

    pub fn validate(&self) -> Result<(), super::TournamentError> {
        use super::TournamentError::InvalidConfig;
        if self.name.is_empty() {
            return Err(InvalidConfig("tournament name is required".to_string()));
        }
        if self.buy_in == 0 {
            return Err(InvalidConfig("buy-in must be positive".to_string()));
        }
        if self.starting_stack == 0 {
            return Err(InvalidConfig("starting stack must be positive".to_string()));
        }
        if self.min_players < 2 {
            return Err(InvalidConfig("min players must be at least 2".to_string()));
        }
        if self.min_players > self.max_players {
            return Err(InvalidConfig(
                "min players cannot exceed max players".to_string(),
            ));
        }
        if self.table_size < 2 || self.table_size > 10 {
            return Err(InvalidConfig(
                "table size must be between 2 and 10".to_string(),
            ));
        }
        if self.blind_levels.is_empty() {
            return Err(InvalidConfig(
                "at least one blind level is required".to_string(),
            ));
        }
        for level in &self.blind_levels {
            if level.small_blind == 0 || level.big_blind <= level.small_blind {
                return Err(InvalidConfig(format!(
                    "blind level {}: invalid blinds",
                    level.level
                )));
            }
            if level.duration_secs == 0 {
                return Err(InvalidConfig(format!(
                    "blind level {}: duration must be positive",
                    level.level
                )));
            }
        }
        if self.prize_percents.is_empty() || self.prize_percents.iter().sum::<u32>() > 100 {
            return Err(InvalidConfig(
                "prize percentages must be non-empty and sum to at most 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// A player on the tournament roster.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegisteredPlayer {
    pub id: String,
    pub name: String,
    pub buy_in_paid: Chips,
    pub registered_at: DateTime<Utc>,
    pub eliminated: bool,
    /// Finish position; 0 while the player is still in.
    pub position: u32,
    pub prize: Chips,
}

/// A child table owned by a tournament. The table engine itself lives in
/// the shared table registry; the tournament tracks identity only.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TournamentTable {
    pub id: String,
    pub player_ids: Vec<String>,
    pub is_active: bool,
    pub is_final: bool,
}

/// Internal tournament state. Snapshots for the wire come from
/// [`Tournament::info`].
#[derive(Clone, Debug)]
pub struct Tournament {
    pub id: String,
    pub config: TournamentConfig,
    pub status: TournamentStatus,
    pub players: BTreeMap<String, RegisteredPlayer>,
    pub tables: BTreeMap<String, TournamentTable>,
    pub prize_pool: Chips,
    pub current_level: usize,
    pub level_started_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub winners: Vec<String>,
    pub(crate) eliminated_count: u32,
    /// Bumping a generation invalidates any timer armed under the old one.
    pub(crate) reg_timer_gen: u64,
    pub(crate) reg_timer_armed: bool,
    pub(crate) level_timer_gen: u64,
}

impl Tournament {
    pub fn new(id: impl Into<String>, config: TournamentConfig) -> Self {
        Self {
            id: id.into(),
            config,
            status: TournamentStatus::Registering,
            players: BTreeMap::new(),
            tables: BTreeMap::new(),
            prize_pool: 0,
            current_level: 0,
            level_started_at: None,
            started_at: None,
            ended_at: None,
            winners: Vec::new(),
            eliminated_count: 0,
            reg_timer_gen: 0,
            reg_timer_armed: false,
            level_timer_gen: 0,
        }
    }

    /// The blind level currently in effect; past the end of the schedule
    /// the last level stays in force.
    pub fn current_blind_level(&self) -> &BlindLevel {
        let levels = &self.config.blind_levels;
        levels
            .get(self.current_level)
            .unwrap_or_else(|| levels.last().expect("schedule is non-empty"))
    }

    pub fn survivors(&self) -> Vec<&RegisteredPlayer> {
        self.players.values().filter(|p| !p.eliminated).collect()
    }

    pub fn active_tables(&self) -> Vec<&TournamentTable> {
        self.tables.values().filter(|t| t.is_active).collect()
    }

    pub fn info(&self) -> TournamentInfo {
        TournamentInfo {
            id: self.id.clone(),
            name: self.config.name.clone(),
            status: self.status,
            buy_in: self.config.buy_in,
            starting_stack: self.config.starting_stack,
            min_players: self.config.min_players,
            max_players: self.config.max_players,
            players_count: self.players.len(),
            survivors_count: self.players.values().filter(|p| !p.eliminated).count(),
            prize_pool: self.prize_pool,
            current_level: self.current_blind_level().clone(),
            tables: self.tables.values().cloned().collect(),
            players: self.players.values().cloned().collect(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            winners: self.winners.clone(),
        }
    }
}

/// Wire snapshot of a tournament.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TournamentInfo {
    pub id: String,
    pub name: String,
    pub status: TournamentStatus,
    pub buy_in: Chips,
    pub starting_stack: Chips,
    pub min_players: usize,
    pub max_players: usize,
    pub players_count: usize,
    pub survivors_count: usize,
    pub prize_pool: Chips,
    pub current_level: BlindLevel,
    pub tables: Vec<TournamentTable>,
    pub players: Vec<RegisteredPlayer>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub winners: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sit_and_go_defaults() {
        let config = TournamentConfig::sit_and_go("4-Player Sit & Go");
        assert_eq!(config.max_players, 4);
        assert_eq!(config.buy_in, 100);
        assert_eq!(config.starting_stack, 1000);
        assert_eq!(config.prize_percents, vec![65, 35]);
        assert_eq!(config.registration_delay(), Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_standard_schedule_shape() {
        let levels = standard_blind_schedule(600);
        assert_eq!(levels.len(), 10);
        assert_eq!(levels[0].small_blind, 10);
        assert_eq!(levels[0].big_blind, 20);
        assert_eq!(levels[5].ante, 25);
        assert_eq!(levels[9].small_blind, 400);
        assert_eq!(levels[9].big_blind, 800);
        assert_eq!(levels[9].ante, 100);
        assert!(levels.iter().all(|l| l.duration_secs == 600));
    }

    #[test]
    fn test_turbo_levels_and_registration() {
        let config = TournamentConfig::turbo("Nightly", 50);
        assert!(config.name.contains("Turbo"));
        assert_eq!(config.registration_delay(), Duration::from_secs(60));
        assert!(config.blind_levels.iter().all(|l| l.duration_secs == 300));
    }

    #[test]
    fn test_blind_level_saturates_past_schedule() {
        let mut tournament = Tournament::new("t", TournamentConfig::sit_and_go("x"));
        tournament.current_level = 99;
        assert_eq!(tournament.current_blind_level().big_blind, 800);
    }

    #[test]
    fn test_config_validation_catches_bad_levels() {
        let mut config = TournamentConfig::sit_and_go("x");
        config.blind_levels[0].big_blind = config.blind_levels[0].small_blind;
        assert!(config.validate().is_err());

        let mut config = TournamentConfig::sit_and_go("x");
        config.prize_percents = vec![80, 30];
        assert!(config.validate().is_err());
    }
}
