//! # Holdem Core
//!
//! A real-time, multi-table Texas Hold'em engine with tournament
//! scaffolding.
//!
//! The library is the authoritative source of truth for card dealing,
//! betting rules, pot arithmetic and winner determination. Each table is
//! owned by a dedicated actor task; its command inbox serializes every
//! mutation, and subscribers observe committed state changes in order.
//!
//! ## Modules
//!
//! - [`game`]: cards, the seven-card evaluator and the table state
//!   machine (hand lifecycle, betting rounds, side pots, showdown).
//! - [`table`]: table actors, per-table configuration and the shared
//!   table registry.
//! - [`tournament`]: the tournament coordinator (registration windows,
//!   blind-level timers, eliminations, final-table collapse, payouts).
//! - [`net`]: the wire envelope and payload validation.
//!
//! ## Example
//!
//! ```
//! use holdem_core::game::PokerTable;
//! use holdem_core::table::TableConfig;
//!
//! let mut table = PokerTable::new("lobby-1", TableConfig::default());
//! table.join("alice", "Alice", None).unwrap();
//! ```

pub mod game;
pub mod net;
pub mod table;
pub mod tournament;

pub use game::{Chips, Phase, PlayerAction, PokerTable, TableError, TableView};
pub use table::{TableConfig, TableHandle, TableManager};
pub use tournament::{TournamentConfig, TournamentError, TournamentInfo, TournamentManager};
