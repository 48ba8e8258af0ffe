//! The external pub/sub store: a best-effort fan-out bus between server
//! replicas. Local fan-out inside one replica never round-trips the
//! store; personalized payloads must not touch it at all.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, Mutex};

/// One message received from a channel subscription.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreMessage {
    pub channel: String,
    pub data: Vec<u8>,
}

/// Publish/subscribe over some external bus.
#[async_trait]
pub trait Store: Send + Sync {
    async fn publish(&self, channel: &str, data: Vec<u8>) -> Result<()>;
    /// Open a subscription; the stream ends when the underlying
    /// connection drops, and callers are expected to resubscribe.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<StoreMessage>>;
}

/// Redis-backed store.
pub struct RedisStore {
    client: redis::Client,
    publisher: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let publisher = client
            .get_connection_manager()
            .await
            .context("redis connection failed")?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn publish(&self, channel: &str, data: Vec<u8>) -> Result<()> {
        let mut publisher = self.publisher.clone();
        let _: () = publisher
            .publish(channel, data)
            .await
            .context("redis publish failed")?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<StoreMessage>> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .context("redis pubsub connection failed")?;
        pubsub
            .subscribe(channel)
            .await
            .context("redis subscribe failed")?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let data: Vec<u8> = match msg.get_payload() {
                    Ok(data) => data,
                    Err(err) => {
                        tracing::warn!("dropping unreadable pubsub payload: {err}");
                        continue;
                    }
                };
                let message = StoreMessage {
                    channel: msg.get_channel_name().to_string(),
                    data,
                };
                if tx.send(message).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// In-process store used by tests and single-replica deployments without
/// Redis. Fan-out still flows through the same subscription path.
#[derive(Default)]
pub struct MemoryStore {
    channels: Mutex<HashMap<String, broadcast::Sender<StoreMessage>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<StoreMessage> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn publish(&self, channel: &str, data: Vec<u8>) -> Result<()> {
        let sender = self.sender(channel).await;
        // No subscribers is fine; pub/sub is best-effort.
        let _ = sender.send(StoreMessage {
            channel: channel.to_string(),
            data,
        });
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<StoreMessage>> {
        let mut source = self.sender(channel).await.subscribe();
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("memory store subscriber lagged by {skipped}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }
}
