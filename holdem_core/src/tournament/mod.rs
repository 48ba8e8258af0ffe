//! Tournament coordinator: registration, blind-level timers, eliminations,
//! the final-table collapse and prize distribution.

pub mod manager;
pub mod models;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::TableError;

pub use manager::TournamentManager;
pub use models::{
    standard_blind_schedule, BlindLevel, RegisteredPlayer, Tournament, TournamentConfig,
    TournamentInfo, TournamentStatus, TournamentTable,
};

#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum TournamentError {
    #[error("tournament already exists")]
    TournamentExists,
    #[error("tournament not found")]
    TournamentNotFound,
    #[error("tournament registration is closed")]
    RegistrationClosed,
    #[error("player already registered")]
    AlreadyRegistered,
    #[error("tournament is full")]
    TournamentFull,
    #[error("player not registered")]
    NotRegistered,
    #[error("not enough players to start tournament")]
    NotEnoughPlayers,
    #[error("tournament already started or finished")]
    AlreadyStarted,
    #[error("tournament is not running")]
    NotRunning,
    #[error("tournament already finished or cancelled")]
    AlreadyOver,
    #[error("player not found")]
    PlayerNotFound,
    #[error("player already eliminated")]
    AlreadyEliminated,
    #[error("invalid tournament config: {0}")]
    InvalidConfig(String),
    #[error("table error: {0}")]
    Table(#[from] TableError),
}
