//! Table actor: owns one [`PokerTable`] and serializes every mutation
//! through its inbox. Auto-restart runs as a deferred deadline inside the
//! actor loop and re-checks table state when it fires.

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::config::TableConfig;
use super::messages::{TableCommand, TableEvent, TableNotice};
use crate::game::{Chips, Phase, PlayerAction, PokerTable, SeatStatus, TableError, TableView};

const INBOX_CAPACITY: usize = 100;
const NOTICE_CAPACITY: usize = 64;

/// Cheap cloneable handle for sending commands to a table actor.
#[derive(Clone, Debug)]
pub struct TableHandle {
    sender: mpsc::Sender<TableCommand>,
    table_id: String,
}

impl TableHandle {
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    async fn send(&self, command: TableCommand) -> Result<(), TableError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| TableError::TableClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> TableCommand,
    ) -> Result<T, TableError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| TableError::TableClosed)
    }

    pub async fn join(
        &self,
        player_id: &str,
        name: &str,
        buy_in: Option<Chips>,
    ) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Join {
            player_id: player_id.to_string(),
            name: name.to_string(),
            buy_in,
            reply,
        })
        .await?
    }

    pub async fn set_ready(&self, player_id: &str, ready: bool) -> Result<(), TableError> {
        self.request(|reply| TableCommand::SetReady {
            player_id: player_id.to_string(),
            ready,
            reply,
        })
        .await?
    }

    pub async fn start_game(&self, player_id: &str) -> Result<(), TableError> {
        self.request(|reply| TableCommand::StartGame {
            player_id: player_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn action(&self, player_id: &str, action: PlayerAction) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Action {
            player_id: player_id.to_string(),
            action,
            reply,
        })
        .await?
    }

    pub async fn force_restart(&self) -> Result<(), TableError> {
        self.request(|reply| TableCommand::ForceRestart { reply }).await?
    }

    /// The unredacted table view. Personalize before it leaves the process.
    pub async fn view(&self) -> Result<TableView, TableError> {
        self.request(|reply| TableCommand::View { reply }).await
    }

    /// The view as `viewer` is allowed to see it: only their own hole
    /// cards in the clear.
    pub async fn view_for(&self, viewer: &str) -> Result<TableView, TableError> {
        Ok(self.view().await?.personalized(viewer))
    }

    pub async fn ready_status(&self) -> Result<BTreeMap<String, bool>, TableError> {
        self.request(|reply| TableCommand::ReadyStatus { reply }).await
    }

    pub async fn config(&self) -> Result<TableConfig, TableError> {
        self.request(|reply| TableCommand::GetConfig { reply }).await
    }

    pub async fn update_config(&self, config: TableConfig) -> Result<(), TableError> {
        self.request(|reply| TableCommand::UpdateConfig { config, reply })
            .await?
    }

    pub async fn validate_buy_in(&self, amount: Chips) -> Result<(), TableError> {
        self.request(|reply| TableCommand::ValidateBuyIn { amount, reply })
            .await?
    }

    pub async fn set_blinds(&self, small: Chips, big: Chips, ante: Chips) -> Result<(), TableError> {
        self.request(|reply| TableCommand::SetBlinds {
            small,
            big,
            ante,
            reply,
        })
        .await
    }

    pub async fn begin_hand(&self) -> Result<(), TableError> {
        self.request(|reply| TableCommand::BeginHand { reply }).await?
    }

    pub async fn set_connected(&self, player_id: &str, connected: bool) -> Result<(), TableError> {
        self.send(TableCommand::SetConnected {
            player_id: player_id.to_string(),
            connected,
        })
        .await
    }

    /// Subscribe to commit-ordered state change notices. `id` must be
    /// unique per subscriber and is also the unsubscribe key.
    pub async fn subscribe(&self, id: u64) -> Result<mpsc::Receiver<TableNotice>, TableError> {
        let (tx, rx) = mpsc::channel(NOTICE_CAPACITY);
        self.send(TableCommand::Subscribe { id, sender: tx }).await?;
        Ok(rx)
    }

    pub async fn unsubscribe(&self, id: u64) -> Result<(), TableError> {
        self.send(TableCommand::Unsubscribe { id }).await
    }

    pub async fn close(&self) -> Result<(), TableError> {
        self.request(|reply| TableCommand::Close { reply }).await
    }
}

/// The actor task owning a single table.
pub struct TableActor {
    table: PokerTable,
    inbox: mpsc::Receiver<TableCommand>,
    subscribers: HashMap<u64, mpsc::Sender<TableNotice>>,
    events: Option<mpsc::UnboundedSender<TableEvent>>,
    restart_at: Option<Instant>,
    closed: bool,
}

impl TableActor {
    pub fn new(
        id: impl Into<String>,
        config: TableConfig,
        events: Option<mpsc::UnboundedSender<TableEvent>>,
    ) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let id = id.into();
        let actor = Self {
            table: PokerTable::new(id.clone(), config),
            inbox,
            subscribers: HashMap::new(),
            events,
            restart_at: None,
            closed: false,
        };
        let handle = TableHandle {
            sender,
            table_id: id,
        };
        (actor, handle)
    }

    pub async fn run(mut self) {
        info!("table {} actor starting", self.table.id);
        loop {
            let restart_at = self.restart_at;
            tokio::select! {
                command = self.inbox.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = async {
                    tokio::time::sleep_until(restart_at.expect("guarded")).await;
                }, if restart_at.is_some() => {
                    self.fire_auto_restart();
                }
            }
            if self.closed {
                break;
            }
        }
        info!("table {} actor closed", self.table.id);
    }

    fn handle(&mut self, command: TableCommand) {
        match command {
            TableCommand::Join {
                player_id,
                name,
                buy_in,
                reply,
            } => {
                let result = self.table.join(&player_id, &name, buy_in);
                self.after_mutation(&result, TableNotice::Updated);
                let _ = reply.send(result);
            }
            TableCommand::SetReady {
                player_id,
                ready,
                reply,
            } => {
                let result = self.table.set_ready(&player_id, ready);
                self.after_mutation(&result, TableNotice::Updated);
                let _ = reply.send(result);
            }
            TableCommand::StartGame { player_id, reply } => {
                let result = self.table.start_game(&player_id);
                self.after_mutation(&result, TableNotice::HandStarted);
                let _ = reply.send(result);
            }
            TableCommand::Action {
                player_id,
                action,
                reply,
            } => {
                let before_showdown = self.table.phase != Phase::Showdown;
                let result = self.table.player_action(&player_id, action);
                self.after_mutation(&result, TableNotice::ActionApplied);
                if result.is_ok() && before_showdown && self.table.phase == Phase::Showdown {
                    self.on_hand_finished();
                }
                let _ = reply.send(result);
            }
            TableCommand::ForceRestart { reply } => {
                let result = self.table.force_restart();
                if result.is_ok() {
                    self.restart_at = None;
                }
                self.after_mutation(&result, TableNotice::HandStarted);
                let _ = reply.send(result);
            }
            TableCommand::View { reply } => {
                let _ = reply.send(self.table.view());
            }
            TableCommand::ReadyStatus { reply } => {
                let _ = reply.send(self.table.ready_status());
            }
            TableCommand::GetConfig { reply } => {
                let _ = reply.send(self.table.config.clone());
            }
            TableCommand::UpdateConfig { config, reply } => {
                let result = self.table.update_config(config);
                self.after_mutation(&result, TableNotice::Updated);
                let _ = reply.send(result);
            }
            TableCommand::ValidateBuyIn { amount, reply } => {
                let _ = reply.send(self.table.config.validate_buy_in(amount));
            }
            TableCommand::SetBlinds {
                small,
                big,
                ante,
                reply,
            } => {
                self.table.set_blinds(small, big, ante);
                self.notify(TableNotice::Updated);
                let _ = reply.send(());
            }
            TableCommand::BeginHand { reply } => {
                let result = self.table.begin_hand();
                if result.is_ok() {
                    self.restart_at = None;
                }
                self.after_mutation(&result, TableNotice::HandStarted);
                let _ = reply.send(result);
            }
            TableCommand::SetConnected {
                player_id,
                connected,
            } => {
                let before_showdown = self.table.phase != Phase::Showdown;
                let result = self.table.set_connected(&player_id, connected);
                match result {
                    Ok(()) => {
                        self.notify(TableNotice::Updated);
                        // The disconnect may have folded the hand closed.
                        if before_showdown && self.table.phase == Phase::Showdown {
                            self.on_hand_finished();
                        }
                    }
                    Err(TableError::PlayerNotFound) => {}
                    Err(ref err) => {
                        self.after_mutation(&result, TableNotice::Updated);
                        debug!("table {}: set_connected: {err}", self.table.id);
                    }
                }
            }
            TableCommand::Subscribe { id, sender } => {
                self.subscribers.insert(id, sender);
            }
            TableCommand::Unsubscribe { id } => {
                self.subscribers.remove(&id);
            }
            TableCommand::Close { reply } => {
                self.closed = true;
                let _ = reply.send(());
            }
        }
    }

    /// Notify subscribers after a successful mutation; surface a halt to
    /// everyone when an invariant violation slipped through.
    fn after_mutation(&mut self, result: &Result<(), TableError>, notice: TableNotice) {
        match result {
            Ok(()) => self.notify(notice),
            Err(TableError::Invariant(_)) => self.notify(TableNotice::Halted),
            Err(_) => {}
        }
    }

    fn notify(&mut self, notice: TableNotice) {
        self.subscribers.retain(|id, sender| {
            match sender.try_send(notice) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        "table {}: subscriber {} lagging, dropping notice",
                        self.table.id, id
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    /// Showdown was reached: report bust-outs to the owning tournament
    /// and arm the auto-restart deadline.
    fn on_hand_finished(&mut self) {
        self.notify(TableNotice::HandFinished);

        if let Some(events) = &self.events {
            let busted: Vec<String> = self
                .table
                .seats
                .iter()
                .filter(|s| s.status != SeatStatus::SittingOut && s.stack == 0)
                .map(|s| s.player_id.clone())
                .collect();
            let _ = events.send(TableEvent::HandFinished {
                table_id: self.table.id.clone(),
                busted,
            });
        }

        if self.table.can_auto_restart() {
            self.restart_at = Some(Instant::now() + self.table.config.restart_delay());
        }
    }

    /// The deferred restart re-checks state when it fires: the phase may
    /// have moved or the seats emptied since it was scheduled.
    fn fire_auto_restart(&mut self) {
        self.restart_at = None;
        if !self.table.can_auto_restart() {
            debug!(
                "table {}: auto-restart skipped, conditions no longer hold",
                self.table.id
            );
            return;
        }
        match self.table.begin_hand() {
            Ok(()) => self.notify(TableNotice::HandStarted),
            Err(err) => debug!("table {}: auto-restart failed: {err}", self.table.id),
        }
    }
}
