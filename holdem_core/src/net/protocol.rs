//! Wire protocol: a single envelope wraps all traffic.
//!
//! ```json
//! { "type": "<string>", "version": 1, "payload": { ... }, "timestamp": 1700000000000 }
//! ```
//!
//! Envelope-level failures (oversized frame, malformed JSON, unknown type,
//! bad version, invalid payload) produce one `error` response and leave
//! the connection open; nothing is retried at this layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::game::{Chips, PlayerAction, TableView};
use crate::table::TableConfig;
use crate::tournament::{BlindLevel, TournamentInfo};

/// Maximum inbound frame size in bytes; keeps the envelope schema tight.
pub const MAX_FRAME_BYTES: usize = 512;

/// Protocol version this server speaks.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProtocolError {
    #[error("empty message")]
    EmptyMessage,
    #[error("message too large ({0} bytes, max {MAX_FRAME_BYTES})")]
    FrameTooLarge(usize),
    #[error("invalid json envelope: {0}")]
    InvalidJson(String),
    #[error("invalid version: {0}")]
    InvalidVersion(u32),
    #[error("unknown message type: {0}")]
    UnknownType(String),
    #[error("invalid payload format: {0}")]
    InvalidPayload(String),
    #[error("{field} is required for {kind}")]
    MissingField {
        field: &'static str,
        kind: MessageType,
    },
    #[error("player name too long (max 50 chars)")]
    PlayerNameTooLong,
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Every message type on the wire, inbound and outbound.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Inbound.
    Join,
    JoinWithBuyin,
    SetReady,
    StartGame,
    PokerAction,
    GetState,
    ReadyStatus,
    TournamentCreate,
    TournamentRegister,
    TournamentStart,
    TournamentInfo,
    TournamentList,
    GetTableConfig,
    UpdateTableConfig,
    ValidateBuyin,
    ForceRestart,
    // Outbound.
    Update,
    PokerUpdate,
    TournamentUpdate,
    Error,
    InternalError,
}

impl MessageType {
    pub fn is_inbound(&self) -> bool {
        !matches!(
            self,
            Self::Update
                | Self::PokerUpdate
                | Self::TournamentUpdate
                | Self::Error
                | Self::InternalError
        )
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = serde_json::to_value(self).expect("message type serializes");
        write!(f, "{}", name.as_str().unwrap_or("?"))
    }
}

/// The generic envelope.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Fields any inbound payload may carry; validation is per message type.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct InboundPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Chips>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_in_amount: Option<Chips>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_in: Option<Chips>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<TableConfig>,
}

impl InboundPayload {
    /// Validate the payload against its message type's constraints.
    pub fn validate(&self, kind: MessageType) -> Result<(), ProtocolError> {
        use MessageType::*;
        match kind {
            Join | SetReady | StartGame | PokerAction | JoinWithBuyin | TournamentRegister => {
                let player = self.require_str(self.player.as_deref(), "player", kind)?;
                if player.len() > 50 {
                    return Err(ProtocolError::PlayerNameTooLong);
                }
            }
            _ => {}
        }
        match kind {
            JoinWithBuyin => {
                if self.buy_in_amount.unwrap_or(0) == 0 {
                    return Err(ProtocolError::NonPositiveAmount);
                }
            }
            SetReady => {
                if self.ready.is_none() {
                    return Err(ProtocolError::MissingField {
                        field: "ready",
                        kind,
                    });
                }
            }
            PokerAction => {
                let action = self.require_str(self.action.as_deref(), "action", kind)?;
                match action {
                    "fold" | "check" | "call" | "all_in" => {}
                    "raise" => {
                        if self.amount.unwrap_or(0) == 0 {
                            return Err(ProtocolError::NonPositiveAmount);
                        }
                    }
                    other => return Err(ProtocolError::UnknownAction(other.to_string())),
                }
            }
            TournamentCreate => {
                self.require_str(self.tournament_id.as_deref(), "tournament_id", kind)?;
                self.require_str(self.tournament_name.as_deref(), "tournament_name", kind)?;
                if self.buy_in.unwrap_or(0) == 0 {
                    return Err(ProtocolError::NonPositiveAmount);
                }
            }
            TournamentRegister | TournamentStart | TournamentInfo => {
                self.require_str(self.tournament_id.as_deref(), "tournament_id", kind)?;
            }
            ValidateBuyin => {
                if self.buy_in_amount.unwrap_or(0) == 0 {
                    return Err(ProtocolError::NonPositiveAmount);
                }
            }
            UpdateTableConfig => {
                if self.config.is_none() {
                    return Err(ProtocolError::MissingField {
                        field: "config",
                        kind,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Convert a validated `poker_action` payload into an engine action.
    pub fn to_action(&self) -> Result<PlayerAction, ProtocolError> {
        match self.action.as_deref() {
            Some("fold") => Ok(PlayerAction::Fold),
            Some("check") => Ok(PlayerAction::Check),
            Some("call") => Ok(PlayerAction::Call),
            Some("all_in") => Ok(PlayerAction::AllIn),
            Some("raise") => {
                let amount = self.amount.unwrap_or(0);
                if amount == 0 {
                    return Err(ProtocolError::NonPositiveAmount);
                }
                Ok(PlayerAction::Raise(amount))
            }
            Some(other) => Err(ProtocolError::UnknownAction(other.to_string())),
            None => Err(ProtocolError::MissingField {
                field: "action",
                kind: MessageType::PokerAction,
            }),
        }
    }

    fn require_str<'a>(
        &self,
        value: Option<&'a str>,
        field: &'static str,
        kind: MessageType,
    ) -> Result<&'a str, ProtocolError> {
        match value {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(ProtocolError::MissingField { field, kind }),
        }
    }
}

/// Fields any outbound payload may carry.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OutboundPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TableView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_status: Option<BTreeMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament: Option<TournamentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournaments: Option<Vec<TournamentInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<TableConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blind_level: Option<BlindLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutboundPayload {
    pub fn state(state: TableView) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Unpack and validate an inbound frame.
pub fn unpack_inbound(raw: &[u8]) -> Result<(MessageType, InboundPayload), ProtocolError> {
    if raw.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if raw.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(raw.len()));
    }
    let envelope: Envelope =
        serde_json::from_slice(raw).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    if envelope.version < 1 {
        return Err(ProtocolError::InvalidVersion(envelope.version));
    }
    let kind: MessageType = serde_json::from_value(serde_json::Value::String(envelope.kind.clone()))
        .map_err(|_| ProtocolError::UnknownType(envelope.kind.clone()))?;
    if !kind.is_inbound() {
        return Err(ProtocolError::UnknownType(envelope.kind));
    }
    let payload: InboundPayload = serde_json::from_value(envelope.payload)
        .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
    payload.validate(kind)?;
    Ok((kind, payload))
}

/// Pack an outbound envelope, stamping the send time.
pub fn pack_outbound(kind: MessageType, payload: &OutboundPayload) -> String {
    let envelope = serde_json::json!({
        "type": kind,
        "version": PROTOCOL_VERSION,
        "payload": payload,
        "timestamp": Utc::now().timestamp_millis(),
    });
    envelope.to_string()
}

/// A standard `error` frame.
pub fn error_frame(message: impl Into<String>) -> String {
    pack_outbound(MessageType::Error, &OutboundPayload::error(message))
}

/// A distinct frame for internal invariant violations.
pub fn internal_error_frame(message: impl Into<String>) -> String {
    pack_outbound(MessageType::InternalError, &OutboundPayload::error(message))
}
