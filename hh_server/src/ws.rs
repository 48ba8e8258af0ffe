//! WebSocket endpoint: `/ws/:table_id`.
//!
//! Each connection runs two cooperating tasks bridged by a bounded send
//! queue owned by the hub: the write task drains the queue and pings the
//! peer, the read loop enforces the pong deadline, validates inbound
//! envelopes and dispatches commands. All table state flows back through
//! the hub's personalized fan-out; only command errors and query replies
//! are sent directly.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use holdem_core::net::{
    error_frame, pack_outbound, unpack_inbound, InboundPayload, MessageType, OutboundPayload,
};
use holdem_core::tournament::TournamentError;

use crate::api::AppState;
use crate::hub::SEND_QUEUE_CAPACITY;

/// Ping cadence; must stay under the pong deadline.
const PING_PERIOD: Duration = Duration::from_secs(54);
/// A connection that produces no frame (pong included) within this
/// window is considered dead.
const PONG_WAIT: Duration = Duration::from_secs(60);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(table_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, table_id, state))
}

async fn handle_socket(socket: WebSocket, table_id: String, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(SEND_QUEUE_CAPACITY);
    let token = state.hub.register(&table_id, out_tx).await;
    info!("websocket connected: channel={table_id} token={token}");

    // Write task: drain the queue, ping on a timer, close when the hub
    // drops our sender (eviction) or a write fails.
    let write_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + PING_PERIOD,
            PING_PERIOD,
        );
        loop {
            tokio::select! {
                frame = out_rx.recv() => match frame {
                    Some(frame) => {
                        if ws_tx.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                },
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read loop with the pong deadline: any frame resets the clock.
    loop {
        let frame = match tokio::time::timeout(PONG_WAIT, ws_rx.next()).await {
            Err(_) => {
                warn!("channel={table_id} token={token}: pong deadline exceeded");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!("channel={table_id} token={token}: read error: {err}");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };
        match frame {
            Message::Text(text) => {
                dispatch(&state, &table_id, token, text.as_bytes()).await;
            }
            Message::Close(_) => break,
            // Pings are answered by axum; pongs only feed the deadline.
            _ => {}
        }
    }

    state.hub.unregister(&table_id, token).await;
    write_task.abort();
    info!("websocket disconnected: channel={table_id} token={token}");
}

/// Validate and route one inbound frame.
async fn dispatch(state: &AppState, channel: &str, token: u64, raw: &[u8]) {
    let (kind, payload) = match unpack_inbound(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            state
                .hub
                .send_to(channel, token, error_frame(err.to_string()))
                .await;
            return;
        }
    };

    match kind {
        MessageType::Join | MessageType::JoinWithBuyin => {
            handle_join(state, channel, token, kind, &payload).await;
        }
        MessageType::SetReady => {
            let player = payload.player.as_deref().unwrap_or_default();
            let ready = payload.ready.unwrap_or_default();
            match table_op(state, channel).await {
                Ok(table) => match table.set_ready(player, ready).await {
                    Ok(()) => {
                        // Ready flags carry no cards, so the cross-replica
                        // bus may carry them verbatim.
                        if let Ok(status) = table.ready_status().await {
                            let frame = pack_outbound(
                                MessageType::ReadyStatus,
                                &OutboundPayload {
                                    ready_status: Some(status),
                                    ..OutboundPayload::default()
                                },
                            );
                            state.hub.broadcast(channel, frame).await;
                        }
                    }
                    Err(err) => reply_error(state, channel, token, err.to_string()).await,
                },
                Err(message) => reply_error(state, channel, token, message).await,
            }
        }
        MessageType::StartGame => {
            let player = payload.player.as_deref().unwrap_or_default();
            match table_op(state, channel).await {
                Ok(table) => {
                    if let Err(err) = table.start_game(player).await {
                        reply_error(state, channel, token, err.to_string()).await;
                    }
                }
                Err(message) => reply_error(state, channel, token, message).await,
            }
        }
        MessageType::PokerAction => {
            let player = payload.player.as_deref().unwrap_or_default();
            let action = match payload.to_action() {
                Ok(action) => action,
                Err(err) => {
                    reply_error(state, channel, token, err.to_string()).await;
                    return;
                }
            };
            match table_op(state, channel).await {
                Ok(table) => {
                    if let Err(err) = table.action(player, action).await {
                        reply_error(state, channel, token, err.to_string()).await;
                    }
                }
                Err(message) => reply_error(state, channel, token, message).await,
            }
        }
        MessageType::ForceRestart => match table_op(state, channel).await {
            Ok(table) => {
                if let Err(err) = table.force_restart().await {
                    reply_error(state, channel, token, err.to_string()).await;
                }
            }
            Err(message) => reply_error(state, channel, token, message).await,
        },
        MessageType::GetState => match table_op(state, channel).await {
            Ok(table) => match table.view().await {
                Ok(view) => {
                    let state_view = match state.hub.player_of(channel, token).await {
                        Some(player) => view.personalized(&player),
                        None => view.public(),
                    };
                    let frame =
                        pack_outbound(MessageType::Update, &OutboundPayload::state(state_view));
                    state.hub.send_to(channel, token, frame).await;
                }
                Err(err) => reply_error(state, channel, token, err.to_string()).await,
            },
            Err(message) => reply_error(state, channel, token, message).await,
        },
        MessageType::ReadyStatus => match table_op(state, channel).await {
            Ok(table) => match table.ready_status().await {
                Ok(status) => {
                    let frame = pack_outbound(
                        MessageType::ReadyStatus,
                        &OutboundPayload {
                            ready_status: Some(status),
                            ..OutboundPayload::default()
                        },
                    );
                    state.hub.send_to(channel, token, frame).await;
                }
                Err(err) => reply_error(state, channel, token, err.to_string()).await,
            },
            Err(message) => reply_error(state, channel, token, message).await,
        },
        MessageType::GetTableConfig => match table_op(state, channel).await {
            Ok(table) => match table.config().await {
                Ok(config) => {
                    let frame = pack_outbound(
                        MessageType::Update,
                        &OutboundPayload {
                            config: Some(config),
                            ..OutboundPayload::default()
                        },
                    );
                    state.hub.send_to(channel, token, frame).await;
                }
                Err(err) => reply_error(state, channel, token, err.to_string()).await,
            },
            Err(message) => reply_error(state, channel, token, message).await,
        },
        MessageType::UpdateTableConfig => {
            let Some(config) = payload.config.clone() else {
                return;
            };
            match table_op(state, channel).await {
                Ok(table) => match table.update_config(config.clone()).await {
                    Ok(()) => {
                        let frame = pack_outbound(
                            MessageType::Update,
                            &OutboundPayload {
                                config: Some(config),
                                message: Some("table config updated".to_string()),
                                ..OutboundPayload::default()
                            },
                        );
                        state.hub.send_to(channel, token, frame).await;
                    }
                    Err(err) => reply_error(state, channel, token, err.to_string()).await,
                },
                Err(message) => reply_error(state, channel, token, message).await,
            }
        }
        MessageType::ValidateBuyin => {
            let amount = payload.buy_in_amount.unwrap_or_default();
            match table_op(state, channel).await {
                Ok(table) => match table.validate_buy_in(amount).await {
                    Ok(()) => {
                        let frame = pack_outbound(
                            MessageType::Update,
                            &OutboundPayload {
                                message: Some(format!("buy-in of {amount} is valid")),
                                ..OutboundPayload::default()
                            },
                        );
                        state.hub.send_to(channel, token, frame).await;
                    }
                    Err(err) => reply_error(state, channel, token, err.to_string()).await,
                },
                Err(message) => reply_error(state, channel, token, message).await,
            }
        }
        MessageType::TournamentCreate
        | MessageType::TournamentRegister
        | MessageType::TournamentStart
        | MessageType::TournamentInfo
        | MessageType::TournamentList => {
            handle_tournament(state, channel, token, kind, &payload).await;
        }
        // unpack_inbound rejects outbound-only types.
        _ => {}
    }
}

async fn handle_join(
    state: &AppState,
    channel: &str,
    token: u64,
    kind: MessageType,
    payload: &InboundPayload,
) {
    let player = payload.player.clone().unwrap_or_default();
    let buy_in = match kind {
        MessageType::JoinWithBuyin => payload.buy_in_amount,
        _ => None,
    };

    // Tables are created lazily on first join.
    let table = state.tables.get_or_create(channel).await;
    state.hub.attach_table(channel, &table).await;

    match table.join(&player, &player, buy_in).await {
        Ok(()) => {
            state.hub.bind_player(channel, token, &player).await;
            debug!("player {player} joined channel {channel}");
        }
        Err(err) => reply_error(state, channel, token, err.to_string()).await,
    }
}

async fn handle_tournament(
    state: &AppState,
    channel: &str,
    token: u64,
    kind: MessageType,
    payload: &InboundPayload,
) {
    let result: Result<OutboundPayload, TournamentError> = match kind {
        MessageType::TournamentCreate => {
            let id = payload.tournament_id.clone().unwrap_or_default();
            let name = payload.tournament_name.clone().unwrap_or_default();
            let buy_in = payload.buy_in.unwrap_or_default();
            let created = match payload.tournament_type.as_deref() {
                Some("turbo") => state.tournaments.create_turbo(&id, &name, buy_in).await,
                _ => state.tournaments.create_standard(&id, &name, buy_in).await,
            };
            created.map(|tournament| OutboundPayload {
                tournament: Some(tournament),
                message: Some("tournament created successfully".to_string()),
                ..OutboundPayload::default()
            })
        }
        MessageType::TournamentRegister => {
            let id = payload.tournament_id.clone().unwrap_or_default();
            let player = payload.player.clone().unwrap_or_default();
            state
                .tournaments
                .register(&id, &player, &player)
                .await
                .map(|tournament| OutboundPayload {
                    players_count: Some(tournament.players_count),
                    registered: Some(true),
                    tournament: Some(tournament),
                    message: Some("successfully registered for tournament".to_string()),
                    ..OutboundPayload::default()
                })
        }
        MessageType::TournamentStart => {
            let id = payload.tournament_id.clone().unwrap_or_default();
            state
                .tournaments
                .start(&id)
                .await
                .map(|tournament| OutboundPayload {
                    tournament: Some(tournament),
                    message: Some("tournament started successfully".to_string()),
                    ..OutboundPayload::default()
                })
        }
        MessageType::TournamentInfo => {
            let id = payload.tournament_id.clone().unwrap_or_default();
            state
                .tournaments
                .info(&id)
                .await
                .map(|tournament| OutboundPayload {
                    players_count: Some(tournament.players_count),
                    blind_level: Some(tournament.current_level.clone()),
                    tournament: Some(tournament),
                    message: Some("tournament information".to_string()),
                    ..OutboundPayload::default()
                })
        }
        MessageType::TournamentList => Ok(OutboundPayload {
            tournaments: Some(state.tournaments.list().await),
            message: Some("tournament list".to_string()),
            ..OutboundPayload::default()
        }),
        _ => return,
    };

    match result {
        Ok(payload) => {
            let frame = pack_outbound(MessageType::TournamentUpdate, &payload);
            state.hub.send_to(channel, token, frame).await;
        }
        Err(err) => reply_error(state, channel, token, err.to_string()).await,
    }
}

/// Commands other than join require the channel's table to exist.
async fn table_op(
    state: &AppState,
    channel: &str,
) -> Result<holdem_core::table::TableHandle, String> {
    state
        .tables
        .get(channel)
        .await
        .ok_or_else(|| "table not found".to_string())
}

async fn reply_error(state: &AppState, channel: &str, token: u64, message: String) {
    state.hub.send_to(channel, token, error_frame(message)).await;
}
