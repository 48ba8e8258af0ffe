//! Connection hub: per-channel client registry, external pub/sub fan-in
//! and personalized broadcast.
//!
//! The hub owns every connection's outbound queue; a connection holds
//! only its channel id and token, and unregisters itself through the hub
//! (lifetimes stay acyclic). Dropping a queue sender ends the
//! connection's write task, which closes the socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use holdem_core::net::{internal_error_frame, pack_outbound, MessageType, OutboundPayload};
use holdem_core::table::{TableHandle, TableManager, TableNotice};

use crate::store::Store;

/// Outbound queue depth per connection; a full queue evicts the client.
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// A registered connection as the hub sees it.
#[derive(Clone)]
pub struct ClientHandle {
    pub token: u64,
    /// The player this connection authenticated as (set on join).
    pub player: Option<String>,
    sender: mpsc::Sender<String>,
}

#[derive(Default)]
struct Channel {
    clients: HashMap<u64, ClientHandle>,
    store_subscribed: bool,
    table_attached: bool,
}

pub struct Hub {
    store: Arc<dyn Store>,
    tables: TableManager,
    channels: RwLock<HashMap<String, Channel>>,
    next_token: AtomicU64,
}

impl Hub {
    pub fn new(store: Arc<dyn Store>, tables: TableManager) -> Arc<Self> {
        Arc::new(Self {
            store,
            tables,
            channels: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }

    /// Register a connection on a channel. The first connection starts
    /// the channel's store subscription; if the table already exists its
    /// notice fan-out is attached as well.
    pub async fn register(
        self: &Arc<Self>,
        channel: &str,
        sender: mpsc::Sender<String>,
    ) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut channels = self.channels.write().await;
        let entry = channels.entry(channel.to_string()).or_default();
        entry.clients.insert(
            token,
            ClientHandle {
                token,
                player: None,
                sender,
            },
        );
        if !entry.store_subscribed {
            entry.store_subscribed = true;
            self.spawn_store_subscriber(channel.to_string());
        }
        let needs_attach = !entry.table_attached;
        drop(channels);

        if needs_attach {
            if let Some(handle) = self.tables.get(channel).await {
                self.attach_table(channel, &handle).await;
            }
        }
        info!("client {token} registered on channel {channel}");
        token
    }

    /// Remove a connection. Its seat, if any, is marked disconnected
    /// unless another connection is still bound to the same player. The
    /// store subscription is retained to keep reconnects cheap.
    pub async fn unregister(self: &Arc<Self>, channel: &str, token: u64) {
        let player = {
            let mut channels = self.channels.write().await;
            let Some(entry) = channels.get_mut(channel) else {
                return;
            };
            let removed = entry.clients.remove(&token);
            let player = removed.and_then(|c| c.player);
            if let Some(player) = &player {
                let still_bound = entry
                    .clients
                    .values()
                    .any(|c| c.player.as_deref() == Some(player));
                if still_bound {
                    None
                } else {
                    Some(player.clone())
                }
            } else {
                None
            }
        };

        if let Some(player) = player {
            if let Some(handle) = self.tables.get(channel).await {
                let _ = handle.set_connected(&player, false).await;
            }
        }
        info!("client {token} unregistered from channel {channel}");
    }

    /// Bind a connection to the player it joined as.
    pub async fn bind_player(&self, channel: &str, token: u64, player: &str) {
        let mut channels = self.channels.write().await;
        if let Some(client) = channels
            .get_mut(channel)
            .and_then(|entry| entry.clients.get_mut(&token))
        {
            client.player = Some(player.to_string());
        }
    }

    pub async fn player_of(&self, channel: &str, token: u64) -> Option<String> {
        let channels = self.channels.read().await;
        channels
            .get(channel)?
            .clients
            .get(&token)?
            .player
            .clone()
    }

    /// Start fanning a table actor's notices out to this channel.
    /// Idempotent; the fan-out task runs for the table's lifetime. The
    /// subscription is enqueued here, before the caller's next command,
    /// so no subsequent commit can be missed.
    pub async fn attach_table(self: &Arc<Self>, channel: &str, handle: &TableHandle) {
        {
            let mut channels = self.channels.write().await;
            let entry = channels.entry(channel.to_string()).or_default();
            if entry.table_attached {
                return;
            }
            entry.table_attached = true;
        }
        let sub_id = self.next_token.fetch_add(1, Ordering::Relaxed);
        let Ok(notices) = handle.subscribe(sub_id).await else {
            let mut channels = self.channels.write().await;
            if let Some(entry) = channels.get_mut(channel) {
                entry.table_attached = false;
            }
            return;
        };
        let hub = Arc::clone(self);
        let channel = channel.to_string();
        let handle = handle.clone();
        tokio::spawn(async move {
            hub.run_notice_fanout(channel, handle, notices).await;
        });
    }

    /// One task per channel: drain commit-ordered table notices, take a
    /// snapshot per notice and deliver per-recipient views. Clients on a
    /// channel observe updates in commit order.
    async fn run_notice_fanout(
        self: Arc<Self>,
        channel: String,
        handle: TableHandle,
        mut notices: mpsc::Receiver<TableNotice>,
    ) {
        while let Some(notice) = notices.recv().await {
            if notice == TableNotice::Halted {
                self.local_broadcast(
                    &channel,
                    internal_error_frame("table halted after internal error"),
                )
                .await;
                continue;
            }
            let kind = match notice {
                TableNotice::ActionApplied => MessageType::PokerUpdate,
                _ => MessageType::Update,
            };
            let Ok(view) = handle.view().await else {
                break;
            };
            self.broadcast_personalized(&channel, |client| {
                let state = match &client.player {
                    Some(player) => view.personalized(player),
                    None => view.public(),
                };
                Some(pack_outbound(kind, &OutboundPayload::state(state)))
            })
            .await;
        }
        debug!("notice fan-out for channel {channel} ended");
        let mut channels = self.channels.write().await;
        if let Some(entry) = channels.get_mut(&channel) {
            entry.table_attached = false;
        }
    }

    /// Publish a frame onto the store; every replica (this one included)
    /// fans it out to its local clients via the subscription task.
    pub async fn broadcast(&self, channel: &str, frame: String) {
        if let Err(err) = self.store.publish(channel, frame.into_bytes()).await {
            warn!("publish to channel {channel} failed: {err}");
        }
    }

    /// Deliver a frame to every local connection on the channel.
    pub async fn local_broadcast(self: &Arc<Self>, channel: &str, frame: String) {
        self.broadcast_personalized(channel, |_| Some(frame.clone()))
            .await;
    }

    /// Render a per-recipient frame and deliver it directly, bypassing
    /// the store (personalization varies per recipient and must not
    /// transit shared infrastructure). Connections with a full or closed
    /// queue are evicted.
    pub async fn broadcast_personalized<F>(self: &Arc<Self>, channel: &str, render: F)
    where
        F: Fn(&ClientHandle) -> Option<String>,
    {
        let clients: Vec<ClientHandle> = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(entry) => entry.clients.values().cloned().collect(),
                None => return,
            }
        };

        let mut evicted = Vec::new();
        for client in &clients {
            let Some(frame) = render(client) else {
                continue;
            };
            match client.sender.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        "client {} on channel {channel} cannot keep up, evicting",
                        client.token
                    );
                    evicted.push(client.token);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    evicted.push(client.token);
                }
            }
        }
        for token in evicted {
            self.unregister(channel, token).await;
        }
    }

    /// Direct reply to a single connection.
    pub async fn send_to(self: &Arc<Self>, channel: &str, token: u64, frame: String) {
        let client = {
            let channels = self.channels.read().await;
            channels
                .get(channel)
                .and_then(|entry| entry.clients.get(&token))
                .cloned()
        };
        let Some(client) = client else {
            return;
        };
        if client.sender.try_send(frame).is_err() {
            self.unregister(channel, token).await;
        }
    }

    /// Store fan-in: whatever arrives on the external bus goes to every
    /// local connection. Transient store failures restart the
    /// subscription with a small backoff.
    fn spawn_store_subscriber(self: &Arc<Self>, channel: String) {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match hub.store.subscribe(&channel).await {
                    Ok(mut messages) => {
                        debug!("subscribed to store channel {channel}");
                        while let Some(message) = messages.recv().await {
                            match String::from_utf8(message.data) {
                                Ok(frame) => hub.local_broadcast(&channel, frame).await,
                                Err(_) => {
                                    warn!("dropping non-utf8 frame on channel {channel}");
                                }
                            }
                        }
                        warn!("store subscription for {channel} ended, restarting");
                    }
                    Err(err) => {
                        warn!("store subscription for {channel} failed: {err}");
                    }
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        });
    }
}
