//! Tournament coordinator.
//!
//! The coordinator owns the tournament registry and drives lifecycle
//! transitions: registration with a delayed auto-start, child table
//! creation, blind-level ticks, eliminations, the final-table collapse
//! and prize distribution. It never serializes table operations itself;
//! it invokes table handles, which carry their own per-table
//! serialization. Timers re-check tournament state when they fire.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};

use super::models::{
    RegisteredPlayer, Tournament, TournamentConfig, TournamentInfo, TournamentStatus,
    TournamentTable,
};
use super::TournamentError;
use crate::game::Chips;
use crate::table::{TableConfig, TableEvent, TableManager};

#[derive(Clone)]
pub struct TournamentManager {
    inner: Arc<Inner>,
}

struct Inner {
    tournaments: RwLock<HashMap<String, Arc<Mutex<Tournament>>>>,
    /// Child table id -> owning tournament id.
    table_index: RwLock<HashMap<String, String>>,
    tables: TableManager,
    events_tx: mpsc::UnboundedSender<TableEvent>,
}

impl TournamentManager {
    /// Create a coordinator bound to the shared table registry and start
    /// its elimination event loop.
    pub fn new(tables: TableManager) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            inner: Arc::new(Inner {
                tournaments: RwLock::new(HashMap::new()),
                table_index: RwLock::new(HashMap::new()),
                tables,
                events_tx,
            }),
        };
        tokio::spawn(manager.clone().run_event_loop(events_rx));
        manager
    }

    /// Drain hand-completion events from child tables and translate
    /// bust-outs into eliminations.
    async fn run_event_loop(self, mut events_rx: mpsc::UnboundedReceiver<TableEvent>) {
        while let Some(event) = events_rx.recv().await {
            let TableEvent::HandFinished { table_id, busted } = event;
            let tournament_id = {
                let index = self.inner.table_index.read().await;
                index.get(&table_id).cloned()
            };
            let Some(tournament_id) = tournament_id else {
                continue;
            };
            for player_id in busted {
                match self.eliminate(&tournament_id, &player_id).await {
                    Ok(()) => {}
                    Err(TournamentError::AlreadyEliminated)
                    | Err(TournamentError::PlayerNotFound)
                    | Err(TournamentError::TournamentNotFound) => {}
                    Err(err) => {
                        error!("tournament {tournament_id}: elimination failed: {err}");
                    }
                }
            }
        }
    }

    pub async fn create(
        &self,
        id: &str,
        config: TournamentConfig,
    ) -> Result<TournamentInfo, TournamentError> {
        config.validate()?;
        let mut tournaments = self.inner.tournaments.write().await;
        if tournaments.contains_key(id) {
            return Err(TournamentError::TournamentExists);
        }
        let tournament = Tournament::new(id, config);
        let info = tournament.info();
        tournaments.insert(id.to_string(), Arc::new(Mutex::new(tournament)));
        info!("tournament {id} created ({})", info.name);
        Ok(info)
    }

    pub async fn create_standard(
        &self,
        id: &str,
        name: &str,
        buy_in: Chips,
    ) -> Result<TournamentInfo, TournamentError> {
        self.create(id, TournamentConfig::standard(name, buy_in)).await
    }

    pub async fn create_turbo(
        &self,
        id: &str,
        name: &str,
        buy_in: Chips,
    ) -> Result<TournamentInfo, TournamentError> {
        self.create(id, TournamentConfig::turbo(name, buy_in)).await
    }

    pub async fn create_sit_and_go(&self, id: &str, name: &str) -> Result<TournamentInfo, TournamentError> {
        self.create(id, TournamentConfig::sit_and_go(name)).await
    }

    /// Register a player. Reaching the minimum arms the registration
    /// timer; when it fires the tournament starts on its own.
    pub async fn register(
        &self,
        id: &str,
        player_id: &str,
        name: &str,
    ) -> Result<TournamentInfo, TournamentError> {
        let tournament = self.get_arc(id).await?;
        let mut t = tournament.lock().await;
        if t.status != TournamentStatus::Registering {
            return Err(TournamentError::RegistrationClosed);
        }
        if t.players.contains_key(player_id) {
            return Err(TournamentError::AlreadyRegistered);
        }
        if t.players.len() >= t.config.max_players {
            return Err(TournamentError::TournamentFull);
        }
        let buy_in = t.config.buy_in;
        t.players.insert(
            player_id.to_string(),
            RegisteredPlayer {
                id: player_id.to_string(),
                name: name.to_string(),
                buy_in_paid: buy_in,
                registered_at: Utc::now(),
                eliminated: false,
                position: 0,
                prize: 0,
            },
        );
        t.prize_pool += buy_in;
        info!(
            "tournament {id}: {name} registered ({}/{})",
            t.players.len(),
            t.config.max_players
        );

        if t.players.len() >= t.config.min_players && !t.reg_timer_armed {
            t.reg_timer_armed = true;
            t.reg_timer_gen += 1;
            self.arm_registration_timer(id.to_string(), t.reg_timer_gen, t.config.registration_delay());
        }
        Ok(t.info())
    }

    /// Withdraw during registration; refunds the prize pool and disarms
    /// the pending start if the roster drops below the minimum.
    pub async fn unregister(&self, id: &str, player_id: &str) -> Result<TournamentInfo, TournamentError> {
        let tournament = self.get_arc(id).await?;
        let mut t = tournament.lock().await;
        if t.status != TournamentStatus::Registering {
            return Err(TournamentError::RegistrationClosed);
        }
        let player = t
            .players
            .remove(player_id)
            .ok_or(TournamentError::NotRegistered)?;
        t.prize_pool -= player.buy_in_paid;
        if t.players.len() < t.config.min_players && t.reg_timer_armed {
            t.reg_timer_armed = false;
            t.reg_timer_gen += 1;
        }
        Ok(t.info())
    }

    /// Start now, regardless of the registration timer.
    pub async fn start(&self, id: &str) -> Result<TournamentInfo, TournamentError> {
        let tournament = self.get_arc(id).await?;
        let mut t = tournament.lock().await;
        self.start_locked(&mut t).await?;
        Ok(t.info())
    }

    /// Record a player's elimination; triggers the final-table collapse
    /// and, on the last survivor, finishes the tournament.
    pub async fn eliminate(&self, id: &str, player_id: &str) -> Result<(), TournamentError> {
        let tournament = self.get_arc(id).await?;
        let mut t = tournament.lock().await;
        if !matches!(
            t.status,
            TournamentStatus::Active | TournamentStatus::FinalTable
        ) {
            return Err(TournamentError::NotRunning);
        }
        let roster = t.players.len() as u32;
        let eliminated_count = t.eliminated_count;
        let player = t
            .players
            .get_mut(player_id)
            .ok_or(TournamentError::PlayerNotFound)?;
        if player.eliminated {
            return Err(TournamentError::AlreadyEliminated);
        }
        player.eliminated = true;
        player.position = roster - eliminated_count;
        let (name, position) = (player.name.clone(), player.position);
        t.eliminated_count += 1;
        info!("tournament {id}: {name} eliminated in position {position}");

        let survivors = t.players.values().filter(|p| !p.eliminated).count();
        if survivors <= 1 {
            self.finish_locked(&mut t).await;
        } else if survivors <= t.config.table_size && t.status == TournamentStatus::Active {
            self.collapse_to_final_table(&mut t).await;
        }
        Ok(())
    }

    pub async fn cancel(&self, id: &str) -> Result<TournamentInfo, TournamentError> {
        let tournament = self.get_arc(id).await?;
        let mut t = tournament.lock().await;
        if matches!(
            t.status,
            TournamentStatus::Finished | TournamentStatus::Cancelled
        ) {
            return Err(TournamentError::AlreadyOver);
        }
        t.status = TournamentStatus::Cancelled;
        t.ended_at = Some(Utc::now());
        t.reg_timer_armed = false;
        t.reg_timer_gen += 1;
        t.level_timer_gen += 1;
        let table_ids: Vec<String> = t.tables.keys().cloned().collect();
        for table_id in table_ids {
            self.release_table(&table_id).await;
        }
        t.tables.clear();
        warn!("tournament {id} cancelled");
        Ok(t.info())
    }

    pub async fn info(&self, id: &str) -> Result<TournamentInfo, TournamentError> {
        let tournament = self.get_arc(id).await?;
        let t = tournament.lock().await;
        Ok(t.info())
    }

    pub async fn list(&self) -> Vec<TournamentInfo> {
        let tournaments = self.inner.tournaments.read().await;
        let mut infos = Vec::with_capacity(tournaments.len());
        for tournament in tournaments.values() {
            infos.push(tournament.lock().await.info());
        }
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub async fn list_active(&self) -> Vec<TournamentInfo> {
        self.list()
            .await
            .into_iter()
            .filter(|info| {
                matches!(
                    info.status,
                    TournamentStatus::Registering
                        | TournamentStatus::Starting
                        | TournamentStatus::Active
                        | TournamentStatus::FinalTable
                )
            })
            .collect()
    }

    // ---- internals ----

    async fn get_arc(&self, id: &str) -> Result<Arc<Mutex<Tournament>>, TournamentError> {
        self.inner
            .tournaments
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(TournamentError::TournamentNotFound)
    }

    /// Starting -> Active: spawn the initial child tables with the level-0
    /// blinds, seat everyone evenly, deal the first hands and arm the
    /// blind-level timer.
    async fn start_locked(&self, t: &mut Tournament) -> Result<(), TournamentError> {
        if !matches!(
            t.status,
            TournamentStatus::Registering | TournamentStatus::Starting
        ) {
            return Err(TournamentError::AlreadyStarted);
        }
        if t.players.len() < t.config.min_players {
            return Err(TournamentError::NotEnoughPlayers);
        }

        t.status = TournamentStatus::Starting;
        t.reg_timer_armed = false;
        t.reg_timer_gen += 1;
        t.started_at = Some(Utc::now());
        t.current_level = 0;
        t.level_started_at = Some(Utc::now());

        let player_ids: Vec<String> = t.players.keys().cloned().collect();
        let num_tables = player_ids.len().div_ceil(t.config.table_size);

        // Round-robin keeps table sizes within one of each other.
        let mut groups: Vec<Vec<String>> = vec![Vec::new(); num_tables];
        for (i, player_id) in player_ids.into_iter().enumerate() {
            groups[i % num_tables].push(player_id);
        }

        for (n, group) in groups.into_iter().enumerate() {
            let table_id = format!("{}_table_{}", t.id, n + 1);
            self.spawn_child_table(t, &table_id, group, false).await?;
        }

        t.status = TournamentStatus::Active;
        t.level_timer_gen += 1;
        self.arm_level_timer(
            t.id.clone(),
            t.level_timer_gen,
            t.current_blind_level().duration(),
        );
        info!(
            "tournament {}: started with {} players on {} table(s)",
            t.id,
            t.players.len(),
            t.tables.len()
        );
        Ok(())
    }

    /// Create one child table, seat `group` and deal the first hand.
    async fn spawn_child_table(
        &self,
        t: &mut Tournament,
        table_id: &str,
        group: Vec<String>,
        is_final: bool,
    ) -> Result<(), TournamentError> {
        let stack = t.config.starting_stack;
        let group = group.into_iter().map(|id| (id, stack)).collect();
        self.spawn_child_table_with_stacks(t, table_id, group, is_final)
            .await
    }

    async fn spawn_child_table_with_stacks(
        &self,
        t: &mut Tournament,
        table_id: &str,
        group: Vec<(String, Chips)>,
        is_final: bool,
    ) -> Result<(), TournamentError> {
        let level = t.current_blind_level().clone();
        let config = TableConfig {
            small_blind: level.small_blind,
            big_blind: level.big_blind,
            ante: level.ante,
            starting_stack: t.config.starting_stack,
            max_seats: t.config.table_size.max(group.len()),
            tournament_mode: true,
            ..TableConfig::default()
        };
        let handle = self
            .inner
            .tables
            .create_with(table_id, config, Some(self.inner.events_tx.clone()))
            .await?;
        self.inner
            .table_index
            .write()
            .await
            .insert(table_id.to_string(), t.id.clone());

        let mut player_ids = Vec::with_capacity(group.len());
        for (player_id, stack) in group {
            let name = t
                .players
                .get(&player_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| player_id.clone());
            handle.join(&player_id, &name, Some(stack)).await?;
            player_ids.push(player_id);
        }
        if let Err(err) = handle.begin_hand().await {
            // A lone leftover seat waits here until the field shrinks.
            debug!("tournament {}: table {table_id} not dealt: {err}", t.id);
        }

        t.tables.insert(
            table_id.to_string(),
            TournamentTable {
                id: table_id.to_string(),
                player_ids,
                is_active: true,
                is_final,
            },
        );
        Ok(())
    }

    /// Few enough survivors remain to seat them all together: deactivate
    /// every child table and move play onto a single final table,
    /// carrying stacks and the current blinds over.
    async fn collapse_to_final_table(&self, t: &mut Tournament) {
        t.status = TournamentStatus::FinalTable;

        // Collect survivor stacks from the tables they sit at.
        let mut stacks: HashMap<String, Chips> = HashMap::new();
        let active_ids: Vec<String> = t
            .active_tables()
            .iter()
            .map(|table| table.id.clone())
            .collect();
        for table_id in &active_ids {
            if let Some(handle) = self.inner.tables.get(table_id).await {
                if let Ok(view) = handle.view().await {
                    for seat in view.players {
                        stacks.insert(seat.id, seat.stack);
                    }
                }
            }
        }
        for table_id in &active_ids {
            if let Some(table) = t.tables.get_mut(table_id) {
                table.is_active = false;
            }
            self.release_table(table_id).await;
        }

        let survivors: Vec<(String, Chips)> = t
            .players
            .values()
            .filter(|p| !p.eliminated)
            .map(|p| {
                let stack = stacks.get(&p.id).copied().unwrap_or(t.config.starting_stack);
                (p.id.clone(), stack)
            })
            .collect();

        let final_id = format!("{}_final", t.id);
        info!(
            "tournament {}: collapsing to final table with {} survivors",
            t.id,
            survivors.len()
        );
        if let Err(err) = self
            .spawn_child_table_with_stacks(t, &final_id, survivors, true)
            .await
        {
            error!("tournament {}: final table creation failed: {err}", t.id);
        }
    }

    /// One survivor left: record the champion, stop the timers, pay out
    /// the prize pool and tear down the child tables.
    async fn finish_locked(&self, t: &mut Tournament) {
        t.status = TournamentStatus::Finished;
        t.ended_at = Some(Utc::now());
        t.level_timer_gen += 1;
        t.reg_timer_armed = false;
        t.reg_timer_gen += 1;

        for player in t.players.values_mut() {
            if !player.eliminated {
                player.position = 1;
            }
        }
        let mut standings: Vec<String> = t.players.keys().cloned().collect();
        standings.sort_by_key(|id| t.players[id].position);
        t.winners = standings
            .iter()
            .take(t.config.prize_percents.len())
            .cloned()
            .collect();

        let pool = t.prize_pool;
        let mut distributed: Chips = 0;
        let percents = t.config.prize_percents.clone();
        for (i, pct) in percents.iter().enumerate() {
            if let Some(id) = standings.get(i) {
                let prize = pool * pct / 100;
                if let Some(player) = t.players.get_mut(id) {
                    player.prize = prize;
                    distributed += prize;
                    info!(
                        "tournament {}: {} finishes {} and wins {}",
                        t.id,
                        player.name,
                        i + 1,
                        prize
                    );
                }
            }
        }
        // Integer rounding leftovers go to the champion.
        if distributed < pool {
            if let Some(id) = standings.first() {
                if let Some(player) = t.players.get_mut(id) {
                    player.prize += pool - distributed;
                }
            }
        }

        let table_ids: Vec<String> = t.tables.keys().cloned().collect();
        for table_id in table_ids {
            if let Some(table) = t.tables.get_mut(&table_id) {
                table.is_active = false;
            }
            self.release_table(&table_id).await;
        }
        info!("tournament {} finished", t.id);
    }

    async fn release_table(&self, table_id: &str) {
        self.inner.tables.close(table_id).await;
        self.inner.table_index.write().await.remove(table_id);
    }

    fn arm_registration_timer(&self, id: String, gen: u64, delay: Duration) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.registration_deadline(&id, gen).await;
        });
    }

    /// Fires after the registration delay; state may have moved since the
    /// timer was armed, so everything is re-checked under the lock.
    async fn registration_deadline(&self, id: &str, gen: u64) {
        let Ok(tournament) = self.get_arc(id).await else {
            return;
        };
        let mut t = tournament.lock().await;
        if t.status != TournamentStatus::Registering
            || !t.reg_timer_armed
            || t.reg_timer_gen != gen
            || t.players.len() < t.config.min_players
        {
            return;
        }
        if let Err(err) = self.start_locked(&mut t).await {
            error!("tournament {id}: delayed start failed: {err}");
        }
    }

    fn arm_level_timer(&self, id: String, gen: u64, delay: Duration) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.blind_level_tick(&id, gen).await;
        });
    }

    /// Advance the blind level and push the new blinds to every active
    /// child table. Past the end of the schedule the last level stays in
    /// force and the timer stops.
    async fn blind_level_tick(&self, id: &str, gen: u64) {
        let Ok(tournament) = self.get_arc(id).await else {
            return;
        };
        let mut t = tournament.lock().await;
        if !matches!(
            t.status,
            TournamentStatus::Active | TournamentStatus::FinalTable
        ) || t.level_timer_gen != gen
        {
            return;
        }
        t.current_level += 1;
        t.level_started_at = Some(Utc::now());
        if t.current_level >= t.config.blind_levels.len() {
            debug!("tournament {id}: blind schedule exhausted");
            return;
        }

        let level = t.current_blind_level().clone();
        info!(
            "tournament {id}: blinds up to {}/{} ante {}",
            level.small_blind, level.big_blind, level.ante
        );
        let active_ids: Vec<String> = t
            .active_tables()
            .iter()
            .map(|table| table.id.clone())
            .collect();
        for table_id in active_ids {
            if let Some(handle) = self.inner.tables.get(&table_id).await {
                let _ = handle
                    .set_blinds(level.small_blind, level.big_blind, level.ante)
                    .await;
            }
        }
        self.arm_level_timer(id.to_string(), gen, level.duration());
    }
}
