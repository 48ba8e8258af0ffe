//! Table actor message types.

use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};

use super::config::TableConfig;
use crate::game::{Chips, PlayerAction, TableError, TableView};

/// Commands accepted by a [`super::actor::TableActor`]. Each command is
/// processed to completion before the next one starts; the inbox is the
/// table's serialization point.
#[derive(Debug)]
pub enum TableCommand {
    Join {
        player_id: String,
        name: String,
        buy_in: Option<Chips>,
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    SetReady {
        player_id: String,
        ready: bool,
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    StartGame {
        player_id: String,
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    Action {
        player_id: String,
        action: PlayerAction,
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    ForceRestart {
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    /// Unredacted view; callers must personalize before sending anywhere.
    View {
        reply: oneshot::Sender<TableView>,
    },
    ReadyStatus {
        reply: oneshot::Sender<BTreeMap<String, bool>>,
    },
    GetConfig {
        reply: oneshot::Sender<TableConfig>,
    },
    UpdateConfig {
        config: TableConfig,
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    ValidateBuyIn {
        amount: Chips,
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    /// Applied by the tournament coordinator on blind-level ticks.
    SetBlinds {
        small: Chips,
        big: Chips,
        ante: Chips,
        reply: oneshot::Sender<()>,
    },
    /// Deal a hand without lobby ceremony (tournament tables).
    BeginHand {
        reply: oneshot::Sender<Result<(), TableError>>,
    },
    SetConnected {
        player_id: String,
        connected: bool,
    },
    Subscribe {
        id: u64,
        sender: mpsc::Sender<TableNotice>,
    },
    Unsubscribe {
        id: u64,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Pushed to subscribers after each committed mutation, in commit order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableNotice {
    /// Seating, readiness or configuration changed.
    Updated,
    /// A betting action was applied.
    ActionApplied,
    HandStarted,
    /// Showdown reached and pots distributed.
    HandFinished,
    /// The table detected an internal invariant violation and refuses
    /// further actions.
    Halted,
}

/// Emitted to the owning tournament, if any.
#[derive(Clone, Debug)]
pub enum TableEvent {
    HandFinished {
        table_id: String,
        /// Players who were dealt into the hand and finished it broke.
        busted: Vec<String>,
    },
}
