//! The per-table state machine: seating, blinds, dealing, betting rounds,
//! side-pot construction and showdown distribution.
//!
//! All methods here mutate a single [`PokerTable`]; serialization across
//! concurrent callers is the table actor's job (see `crate::table`).

use chrono::Utc;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::entities::{
    Chips, Deck, Phase, PlayerAction, PokerTable, Seat, SeatIndex, SeatStatus, SidePot,
};
use super::evaluator;

/// Errors surfaced by table operations. State is left unchanged on error,
/// except for [`TableError::Invariant`], which halts the table.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum TableError {
    #[error("table is full")]
    TableFull,
    #[error("player already at table")]
    AlreadySeated,
    #[error("buy-in must be between {min} and {max}")]
    BuyInOutOfRange { min: Chips, max: Chips },
    #[error("can only set ready status in lobby")]
    NotInLobby,
    #[error("game can only be started from lobby")]
    StartOutsideLobby,
    #[error("only the host can start the game")]
    NotHost,
    #[error("need at least 2 players to start")]
    NotEnoughPlayers,
    #[error("all players must be ready to start ({name} is not ready)")]
    PlayerNotReady { name: String },
    #[error("player not found")]
    PlayerNotFound,
    #[error("table not found")]
    TableNotFound,
    #[error("table already exists")]
    TableExists,
    #[error("not your turn")]
    NotYourTurn,
    #[error("no betting round in progress")]
    NoBettingRound,
    #[error("cannot check, there is a bet to match")]
    CannotCheck,
    #[error("no bet to call")]
    NothingToCall,
    #[error("raise must be positive")]
    NonPositiveRaise,
    #[error("minimum raise is {min}")]
    RaiseBelowMinimum { min: Chips },
    #[error("insufficient stack for this raise")]
    InsufficientStack,
    #[error("can only restart from showdown phase")]
    RestartOutsideShowdown,
    #[error("need at least 2 players with chips to restart")]
    NotEnoughStacks,
    #[error("cannot update config during a hand")]
    ConfigDuringHand,
    #[error("invalid table config: {0}")]
    InvalidConfig(String),
    #[error("table actor is closed")]
    TableClosed,
    #[error("table halted after internal error")]
    Halted,
    #[error("internal invariant violation: {0}")]
    Invariant(String),
}

impl PokerTable {
    /// Seat a player. Creates the seat, validates the buy-in when one is
    /// given, and promotes a waiting table to the lobby. A seat whose
    /// connection dropped can be reclaimed by rejoining under the same id.
    pub fn join(
        &mut self,
        player_id: &str,
        name: &str,
        buy_in: Option<Chips>,
    ) -> Result<(), TableError> {
        self.ensure_not_halted()?;
        if let Some(idx) = self.seat_of(player_id) {
            if !self.seats[idx].connected {
                self.seats[idx].connected = true;
                self.seats[idx].last_seen = Utc::now();
                info!("table {}: {} reconnected", self.id, self.seats[idx].name);
                return Ok(());
            }
            return Err(TableError::AlreadySeated);
        }
        if self.seats.len() >= self.config.max_seats {
            return Err(TableError::TableFull);
        }
        if let Some(amount) = buy_in {
            self.config.validate_buy_in(amount)?;
        }
        let stack = buy_in.unwrap_or(self.config.starting_stack);

        let is_host = self.seats.is_empty();
        let seat_idx = self.seats.len();
        self.seats.push(Seat::new(
            player_id.to_string(),
            name.to_string(),
            stack,
            seat_idx,
            is_host,
        ));
        if self.phase == Phase::Waiting {
            self.phase = Phase::Lobby;
        }
        // A seat added mid-hand waits for the next deal; the conservation
        // baseline absorbs its stack.
        if self.phase.in_hand() {
            self.hand_chip_total += stack;
        }
        info!("table {}: {} joined with {} chips", self.id, name, stack);
        Ok(())
    }

    /// Flip a player's ready flag. Valid only in the lobby; idempotent.
    pub fn set_ready(&mut self, player_id: &str, ready: bool) -> Result<(), TableError> {
        self.ensure_not_halted()?;
        if self.phase != Phase::Lobby {
            return Err(TableError::NotInLobby);
        }
        let idx = self.seat_of(player_id).ok_or(TableError::PlayerNotFound)?;
        self.seats[idx].ready = ready;
        Ok(())
    }

    /// Ready flags keyed by display name.
    pub fn ready_status(&self) -> BTreeMap<String, bool> {
        self.seats
            .iter()
            .map(|s| (s.name.clone(), s.ready))
            .collect()
    }

    /// Host-only transition from lobby into the first hand.
    pub fn start_game(&mut self, player_id: &str) -> Result<(), TableError> {
        self.ensure_not_halted()?;
        if self.phase != Phase::Lobby {
            return Err(TableError::StartOutsideLobby);
        }
        let idx = self.seat_of(player_id).ok_or(TableError::PlayerNotFound)?;
        if !self.seats[idx].is_host {
            return Err(TableError::NotHost);
        }
        if self.seats.len() < self.config.min_players {
            return Err(TableError::NotEnoughPlayers);
        }
        if let Some(unready) = self.seats.iter().find(|s| !s.ready) {
            return Err(TableError::PlayerNotReady {
                name: unready.name.clone(),
            });
        }
        self.begin_hand()
    }

    /// Restart a finished hand on demand. Only valid from showdown with
    /// enough funded seats.
    pub fn force_restart(&mut self) -> Result<(), TableError> {
        self.ensure_not_halted()?;
        if self.phase != Phase::Showdown {
            return Err(TableError::RestartOutsideShowdown);
        }
        if self.funded_seats() < self.config.min_players {
            return Err(TableError::NotEnoughStacks);
        }
        self.begin_hand()
    }

    /// Whether a pending auto-restart should still fire.
    pub fn can_auto_restart(&self) -> bool {
        self.config.auto_restart
            && !self.halted
            && self.phase == Phase::Showdown
            && self.funded_seats() >= self.config.min_players
    }

    /// Start a fresh hand: rebuild the deck, reset per-hand state, rotate
    /// the button, deal hole cards in two passes left of the dealer, and
    /// post antes and blinds.
    pub fn begin_hand(&mut self) -> Result<(), TableError> {
        self.ensure_not_halted()?;
        let eligible: Vec<SeatIndex> = self
            .seats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.stack > 0 && s.connected)
            .map(|(i, _)| i)
            .collect();
        if eligible.len() < self.config.min_players {
            return Err(TableError::NotEnoughPlayers);
        }

        self.deck = Deck::shuffled();
        self.community.clear();
        self.side_pots.clear();
        self.pot = 0;
        self.current_bet = 0;
        self.last_aggressor = None;
        self.showdown_at = None;
        for seat in &mut self.seats {
            seat.cards.clear();
            seat.current_bet = 0;
            seat.status = SeatStatus::SittingOut;
        }
        for &i in &eligible {
            self.seats[i].status = SeatStatus::Owes;
        }

        // The button moves one eligible seat clockwise; the first hand
        // starts on the earliest eligible seat.
        let dealer = match self.dealer {
            None => eligible[0],
            Some(prev) => *eligible.iter().find(|&&i| i > prev).unwrap_or(&eligible[0]),
        };
        self.dealer = Some(dealer);
        let d = eligible
            .iter()
            .position(|&i| i == dealer)
            .expect("dealer is eligible");
        let n = eligible.len();

        for _ in 0..2 {
            for k in 1..=n {
                let idx = eligible[(d + k) % n];
                let card = self.deck.deal();
                self.seats[idx].cards.push(card);
            }
        }

        // Antes first, then blinds. Heads-up the dealer posts the small
        // blind and opens the preflop action; otherwise the blinds sit
        // left of the button and action opens three seats past it.
        if self.config.ante > 0 {
            for &i in &eligible {
                self.post(i, self.config.ante);
            }
        }
        let (sb, bb, first) = if n == 2 {
            (eligible[d], eligible[(d + 1) % n], eligible[d])
        } else {
            (
                eligible[(d + 1) % n],
                eligible[(d + 2) % n],
                eligible[(d + 3) % n],
            )
        };
        self.post(sb, self.config.small_blind);
        self.post(bb, self.config.big_blind);
        self.current_bet = self.config.big_blind;
        // The small blind's forced contribution satisfies the round; the
        // big blind keeps the option to raise when action reaches it.
        if self.seats[sb].status == SeatStatus::Owes {
            self.seats[sb].status = SeatStatus::Acted;
        }

        self.phase = Phase::Preflop;
        self.hands_played += 1;
        self.hand_chip_total = self.total_chips();
        self.action_idx = first;
        info!(
            "table {}: hand {} started, dealer seat {}, blinds {}/{}",
            self.id, self.hands_played, dealer, self.config.small_blind, self.config.big_blind
        );
        self.settle_action_point();
        self.check_conservation()
    }

    /// Apply one betting action for the seat currently on the clock.
    pub fn player_action(
        &mut self,
        player_id: &str,
        action: PlayerAction,
    ) -> Result<(), TableError> {
        self.ensure_not_halted()?;
        if !self.phase.is_betting() {
            return Err(TableError::NoBettingRound);
        }
        let idx = self.seat_of(player_id).ok_or(TableError::PlayerNotFound)?;
        if idx != self.action_idx || !self.seat_needs_action(idx) {
            return Err(TableError::NotYourTurn);
        }

        match action {
            PlayerAction::Fold => {
                self.seats[idx].status = SeatStatus::Folded;
            }
            PlayerAction::Check => {
                if self.current_bet > self.seats[idx].current_bet {
                    return Err(TableError::CannotCheck);
                }
                self.seats[idx].status = SeatStatus::Acted;
            }
            PlayerAction::Call => {
                let need = self.current_bet.saturating_sub(self.seats[idx].current_bet);
                if need == 0 {
                    return Err(TableError::NothingToCall);
                }
                let seat = &mut self.seats[idx];
                let pay = need.min(seat.stack);
                seat.stack -= pay;
                seat.current_bet += pay;
                seat.status = if seat.stack == 0 {
                    SeatStatus::AllIn
                } else {
                    SeatStatus::Acted
                };
                self.pot += pay;
            }
            PlayerAction::Raise(amount) => {
                if amount == 0 {
                    return Err(TableError::NonPositiveRaise);
                }
                if amount < self.config.big_blind {
                    return Err(TableError::RaiseBelowMinimum {
                        min: self.config.big_blind,
                    });
                }
                let need = self.current_bet.saturating_sub(self.seats[idx].current_bet);
                let total = need
                    .checked_add(amount)
                    .ok_or(TableError::InsufficientStack)?;
                if total > self.seats[idx].stack {
                    return Err(TableError::InsufficientStack);
                }
                let seat = &mut self.seats[idx];
                seat.stack -= total;
                seat.current_bet += total;
                seat.status = if seat.stack == 0 {
                    SeatStatus::AllIn
                } else {
                    SeatStatus::Acted
                };
                self.pot += total;
                self.current_bet = self.seats[idx].current_bet;
                self.last_aggressor = Some(idx);
                self.reopen_action(idx);
            }
            PlayerAction::AllIn => {
                let push = self.seats[idx].stack;
                let seat = &mut self.seats[idx];
                seat.stack = 0;
                seat.current_bet += push;
                seat.status = SeatStatus::AllIn;
                self.pot += push;
                if self.seats[idx].current_bet > self.current_bet {
                    self.current_bet = self.seats[idx].current_bet;
                    self.last_aggressor = Some(idx);
                    self.reopen_action(idx);
                }
            }
        }

        debug!("table {}: seat {} {}", self.id, idx, action);
        self.advance_after_action();
        self.check_conservation()
    }

    /// Apply a new blind level. Takes effect from the next posting; the
    /// raise minimum follows immediately.
    pub fn set_blinds(&mut self, small: Chips, big: Chips, ante: Chips) {
        self.config.small_blind = small;
        self.config.big_blind = big;
        self.config.ante = ante;
        info!("table {}: blinds now {}/{} ante {}", self.id, small, big, ante);
    }

    /// Replace the table configuration. Not allowed while a hand is live.
    pub fn update_config(&mut self, config: crate::table::TableConfig) -> Result<(), TableError> {
        self.ensure_not_halted()?;
        if self.phase.in_hand() {
            return Err(TableError::ConfigDuringHand);
        }
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Track the connection state of a seat. A player who drops while on
    /// the clock folds immediately rather than stalling the table.
    pub fn set_connected(&mut self, player_id: &str, connected: bool) -> Result<(), TableError> {
        let idx = self.seat_of(player_id).ok_or(TableError::PlayerNotFound)?;
        self.seats[idx].connected = connected;
        self.seats[idx].last_seen = Utc::now();
        if !connected
            && self.phase.is_betting()
            && self.action_idx == idx
            && self.seat_needs_action(idx)
        {
            let id = self.seats[idx].player_id.clone();
            return self.player_action(&id, PlayerAction::Fold);
        }
        Ok(())
    }

    // ---- internals ----

    fn ensure_not_halted(&self) -> Result<(), TableError> {
        if self.halted {
            return Err(TableError::Halted);
        }
        Ok(())
    }

    fn funded_seats(&self) -> usize {
        self.seats
            .iter()
            .filter(|s| s.stack > 0 && s.connected)
            .count()
    }

    fn total_chips(&self) -> Chips {
        self.seats.iter().map(|s| s.stack).sum::<Chips>() + self.pot
    }

    /// A seat must act while it still owes action or while its matched
    /// state went stale behind a bigger bet it can respond to.
    fn seat_needs_action(&self, idx: SeatIndex) -> bool {
        let seat = &self.seats[idx];
        match seat.status {
            SeatStatus::Owes => true,
            SeatStatus::Acted => seat.stack > 0 && seat.current_bet < self.current_bet,
            _ => false,
        }
    }

    fn next_to_act_after(&self, start: SeatIndex) -> Option<SeatIndex> {
        let n = self.seats.len();
        (1..=n)
            .map(|k| (start + k) % n)
            .find(|&idx| self.seat_needs_action(idx))
    }

    fn post(&mut self, idx: SeatIndex, amount: Chips) {
        let seat = &mut self.seats[idx];
        let pay = amount.min(seat.stack);
        seat.stack -= pay;
        seat.current_bet += pay;
        if seat.stack == 0 {
            seat.status = SeatStatus::AllIn;
        }
        self.pot += pay;
    }

    /// A raise reopens the round for every live seat that is neither
    /// folded nor all-in.
    fn reopen_action(&mut self, raiser: SeatIndex) {
        for (i, seat) in self.seats.iter_mut().enumerate() {
            if i != raiser && seat.status == SeatStatus::Acted {
                seat.status = SeatStatus::Owes;
            }
        }
    }

    /// Make sure the action pointer rests on a seat that can act; with
    /// nothing owed anywhere (e.g. blinds put everyone all-in) the round
    /// settles immediately.
    fn settle_action_point(&mut self) {
        if !self.phase.is_betting() {
            return;
        }
        if self.seat_needs_action(self.action_idx) {
            return;
        }
        match self.next_to_act_after(self.action_idx) {
            Some(next) => self.action_idx = next,
            None => self.end_betting_round(),
        }
    }

    fn advance_after_action(&mut self) {
        let live = self.seats.iter().filter(|s| s.status.is_live()).count();
        if live < 2 {
            self.finish_by_folds();
            return;
        }
        match self.next_to_act_after(self.action_idx) {
            Some(next) => self.action_idx = next,
            None => self.end_betting_round(),
        }
    }

    /// Close the current betting round: fold the round's bets into side
    /// pots, reset per-seat round state and advance the phase. When no
    /// seat owes further action (a multi-way all-in), the remaining
    /// streets run out to showdown in one go.
    fn end_betting_round(&mut self) {
        loop {
            self.build_side_pots();
            for seat in &mut self.seats {
                seat.current_bet = 0;
                if seat.status == SeatStatus::Acted {
                    seat.status = SeatStatus::Owes;
                }
            }
            self.current_bet = 0;
            self.last_aggressor = None;

            match self.phase {
                Phase::Preflop => {
                    self.deck.burn();
                    for _ in 0..3 {
                        let card = self.deck.deal();
                        self.community.push(card);
                    }
                    self.phase = Phase::Flop;
                }
                Phase::Flop => {
                    self.deck.burn();
                    let card = self.deck.deal();
                    self.community.push(card);
                    self.phase = Phase::Turn;
                }
                Phase::Turn => {
                    self.deck.burn();
                    let card = self.deck.deal();
                    self.community.push(card);
                    self.phase = Phase::River;
                }
                Phase::River => {
                    self.phase = Phase::Showdown;
                    self.distribute_pots();
                    return;
                }
                _ => return,
            }

            // Post-flop action opens at the first seat owing action
            // clockwise from the dealer.
            let dealer = self.dealer.unwrap_or(0);
            match self.next_to_act_after(dealer) {
                Some(next) => {
                    self.action_idx = next;
                    return;
                }
                None => continue,
            }
        }
    }

    /// Everyone but one seat folded: absorb the round's bets and award
    /// all pots without dealing further streets.
    fn finish_by_folds(&mut self) {
        self.build_side_pots();
        for seat in &mut self.seats {
            seat.current_bet = 0;
        }
        self.current_bet = 0;
        self.last_aggressor = None;
        self.phase = Phase::Showdown;
        self.distribute_pots();
    }

    /// Partition the round's bets into contribution-level pots and merge
    /// them onto the table's pot list.
    ///
    /// Levels are the distinct bet sizes among live seats. Each level pot
    /// collects, from every seat (folded included), the slice of its bet
    /// between the previous level and this one; eligibility is the live
    /// seats at or above the level. Folded chips above the top live level
    /// are forfeit into the last pot.
    fn build_side_pots(&mut self) {
        let round_total: Chips = self.seats.iter().map(|s| s.current_bet).sum();
        if round_total == 0 {
            return;
        }

        let mut levels: Vec<Chips> = self
            .seats
            .iter()
            .filter(|s| s.status.is_live() && s.current_bet > 0)
            .map(|s| s.current_bet)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        let mut new_pots: Vec<SidePot> = Vec::new();
        if levels.is_empty() {
            // Every contributor folded; any live seat can win the chips.
            let eligible: Vec<SeatIndex> = self
                .seats
                .iter()
                .enumerate()
                .filter(|(_, s)| s.status.is_live())
                .map(|(i, _)| i)
                .collect();
            if eligible.is_empty() {
                return;
            }
            new_pots.push(SidePot {
                amount: round_total,
                eligible,
                level: 0,
            });
        } else {
            let mut prev: Chips = 0;
            for &level in &levels {
                let amount: Chips = self
                    .seats
                    .iter()
                    .map(|s| s.current_bet.min(level) - s.current_bet.min(prev))
                    .sum();
                let eligible: Vec<SeatIndex> = self
                    .seats
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.status.is_live() && s.current_bet >= level)
                    .map(|(i, _)| i)
                    .collect();
                if amount > 0 && !eligible.is_empty() {
                    new_pots.push(SidePot {
                        amount,
                        eligible,
                        level,
                    });
                }
                prev = level;
            }
            let leftover: Chips = self
                .seats
                .iter()
                .map(|s| s.current_bet.saturating_sub(prev))
                .sum();
            if leftover > 0 {
                if let Some(last) = new_pots.last_mut() {
                    last.amount += leftover;
                }
            }
        }

        for pot in new_pots {
            match self.side_pots.last_mut() {
                Some(last) if last.eligible == pot.eligible => last.amount += pot.amount,
                _ => self.side_pots.push(pot),
            }
        }
    }

    /// Award every side pot to the best live hand among its eligible
    /// seats. Ties split evenly; the integer remainder goes to the tied
    /// winner earliest clockwise from the dealer.
    fn distribute_pots(&mut self) {
        self.showdown_at = Some(Utc::now());
        let pots: Vec<SidePot> = std::mem::take(&mut self.side_pots);
        self.pot = 0;

        let scores: Vec<Option<u64>> = self
            .seats
            .iter()
            .map(|s| {
                if s.status.is_live() && !s.cards.is_empty() {
                    Some(evaluator::evaluate(&s.cards, &self.community).score)
                } else {
                    None
                }
            })
            .collect();

        for pot in pots {
            // Seats that folded after this pot formed drop out of its
            // eligibility; if none remain, any live seat can win it.
            let mut contenders: Vec<SeatIndex> = pot
                .eligible
                .iter()
                .copied()
                .filter(|&i| scores[i].is_some())
                .collect();
            if contenders.is_empty() {
                contenders = (0..self.seats.len())
                    .filter(|&i| scores[i].is_some())
                    .collect();
            }
            let Some(best) = contenders.iter().filter_map(|&i| scores[i]).max() else {
                continue;
            };
            let winners: Vec<SeatIndex> = contenders
                .into_iter()
                .filter(|&i| scores[i] == Some(best))
                .collect();

            let share = pot.amount / winners.len() as Chips;
            let remainder = pot.amount % winners.len() as Chips;
            for &w in &winners {
                self.seats[w].stack += share;
                info!(
                    "table {}: {} wins {} from pot at level {}",
                    self.id, self.seats[w].name, share, pot.level
                );
            }
            if remainder > 0 {
                let first = self.earliest_clockwise_from_dealer(&winners);
                self.seats[first].stack += remainder;
            }
        }
    }

    fn earliest_clockwise_from_dealer(&self, among: &[SeatIndex]) -> SeatIndex {
        let n = self.seats.len();
        let dealer = self.dealer.unwrap_or(0);
        (1..=n)
            .map(|k| (dealer + k) % n)
            .find(|idx| among.contains(idx))
            .unwrap_or(among[0])
    }

    /// Chip conservation holds after every mutation inside a hand. A
    /// mismatch is an internal fault; the table refuses further actions.
    fn check_conservation(&mut self) -> Result<(), TableError> {
        if !self.phase.in_hand() {
            return Ok(());
        }
        let now = self.total_chips();
        if now != self.hand_chip_total {
            self.halted = true;
            error!(
                "table {}: chip conservation violated ({} != {}), halting",
                self.id, now, self.hand_chip_total
            );
            return Err(TableError::Invariant(format!(
                "pot mismatch: {now} != {}",
                self.hand_chip_total
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Card, Rank, Suit};
    use crate::table::TableConfig;

    fn table_with(stacks: &[Chips]) -> PokerTable {
        let mut table = PokerTable::new("t", TableConfig::default());
        for (i, &stack) in stacks.iter().enumerate() {
            table
                .join(&format!("p{i}"), &format!("P{i}"), None)
                .unwrap();
            table.seats[i].stack = stack;
        }
        table
    }

    fn seat_bets(table: &mut PokerTable, bets: &[(usize, Chips, SeatStatus)]) {
        for &(idx, bet, status) in bets {
            table.seats[idx].current_bet = bet;
            table.seats[idx].status = status;
        }
    }

    #[test]
    fn test_side_pots_three_way_all_in() {
        let mut table = table_with(&[0, 0, 0]);
        seat_bets(
            &mut table,
            &[
                (0, 100, SeatStatus::AllIn),
                (1, 500, SeatStatus::AllIn),
                (2, 500, SeatStatus::Acted),
            ],
        );
        table.build_side_pots();

        assert_eq!(table.side_pots.len(), 2);
        assert_eq!(table.side_pots[0].amount, 300);
        assert_eq!(table.side_pots[0].eligible, vec![0, 1, 2]);
        assert_eq!(table.side_pots[0].level, 100);
        assert_eq!(table.side_pots[1].amount, 800);
        assert_eq!(table.side_pots[1].eligible, vec![1, 2]);
        assert_eq!(table.side_pots[1].level, 500);

        let total: Chips = table.side_pots.iter().map(|p| p.amount).sum();
        assert_eq!(total, 1100);
    }

    #[test]
    fn test_side_pot_levels_are_sorted_and_deduped() {
        let mut table = table_with(&[0, 0, 0, 0]);
        seat_bets(
            &mut table,
            &[
                (0, 100, SeatStatus::Acted),
                (1, 500, SeatStatus::Acted),
                (2, 300, SeatStatus::Acted),
                (3, 100, SeatStatus::Acted),
            ],
        );
        table.build_side_pots();

        let levels: Vec<Chips> = table.side_pots.iter().map(|p| p.level).collect();
        assert_eq!(levels, vec![100, 300, 500]);
        let total: Chips = table.side_pots.iter().map(|p| p.amount).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_side_pot_eligibility_is_a_lattice() {
        let mut table = table_with(&[0, 0, 0]);
        seat_bets(
            &mut table,
            &[
                (0, 100, SeatStatus::AllIn),
                (1, 300, SeatStatus::AllIn),
                (2, 500, SeatStatus::Acted),
            ],
        );
        table.build_side_pots();

        for pair in table.side_pots.windows(2) {
            let higher: &Vec<usize> = &pair[1].eligible;
            assert!(
                higher.iter().all(|i| pair[0].eligible.contains(i)),
                "higher pot eligibility must be contained in lower pot's"
            );
        }
    }

    #[test]
    fn test_folded_contribution_between_levels_is_conserved() {
        let mut table = table_with(&[0, 0, 0]);
        seat_bets(
            &mut table,
            &[
                (0, 100, SeatStatus::AllIn),
                (1, 300, SeatStatus::Folded),
                (2, 500, SeatStatus::Acted),
            ],
        );
        table.build_side_pots();

        let total: Chips = table.side_pots.iter().map(|p| p.amount).sum();
        assert_eq!(total, 900, "folded chips between levels must not vanish");
        // The folded seat is eligible for nothing.
        assert!(table.side_pots.iter().all(|p| !p.eligible.contains(&1)));
    }

    #[test]
    fn test_folded_overbet_above_top_level_goes_to_last_pot() {
        let mut table = table_with(&[0, 0]);
        seat_bets(
            &mut table,
            &[(0, 500, SeatStatus::Folded), (1, 300, SeatStatus::Acted)],
        );
        table.build_side_pots();

        assert_eq!(table.side_pots.len(), 1);
        assert_eq!(table.side_pots[0].amount, 800);
        assert_eq!(table.side_pots[0].eligible, vec![1]);
    }

    #[test]
    fn test_distribution_with_fixed_cards() {
        let mut table = table_with(&[0, 0, 500]);
        seat_bets(
            &mut table,
            &[
                (0, 100, SeatStatus::AllIn),
                (1, 500, SeatStatus::AllIn),
                (2, 500, SeatStatus::Acted),
            ],
        );
        table.pot = 1100;
        table.hand_chip_total = 1100 + 500;
        table.phase = Phase::River;
        table.dealer = Some(0);
        // Seat 0 holds the nut straight, seat 2 beats seat 1.
        table.seats[0].cards = vec![
            Card::new(Suit::Hearts, Rank::Ace),
            Card::new(Suit::Spades, Rank::King),
        ];
        table.seats[1].cards = vec![
            Card::new(Suit::Diamonds, Rank::Two),
            Card::new(Suit::Clubs, Rank::Three),
        ];
        table.seats[2].cards = vec![
            Card::new(Suit::Hearts, Rank::Queen),
            Card::new(Suit::Spades, Rank::Jack),
        ];
        table.community = vec![
            Card::new(Suit::Hearts, Rank::Ten),
            Card::new(Suit::Clubs, Rank::Jack),
            Card::new(Suit::Diamonds, Rank::Queen),
            Card::new(Suit::Clubs, Rank::Seven),
            Card::new(Suit::Diamonds, Rank::Six),
        ];

        table.build_side_pots();
        for seat in &mut table.seats {
            seat.current_bet = 0;
        }
        table.phase = Phase::Showdown;
        table.distribute_pots();

        // Seat 0 wins the 300 main pot; seat 2 wins the 800 side pot.
        assert_eq!(table.seats[0].stack, 300);
        assert_eq!(table.seats[1].stack, 0);
        assert_eq!(table.seats[2].stack, 500 + 800);
        assert!(table.side_pots.is_empty());
        assert_eq!(table.pot, 0);
    }

    #[test]
    fn test_split_pot_remainder_goes_clockwise_from_dealer() {
        let mut table = table_with(&[0, 0, 0]);
        seat_bets(
            &mut table,
            &[
                (0, 101, SeatStatus::Acted),
                (1, 101, SeatStatus::Acted),
                (2, 101, SeatStatus::Folded),
            ],
        );
        table.pot = 303;
        table.hand_chip_total = 303;
        table.dealer = Some(0);
        // Identical board-playing hands split.
        table.seats[0].cards = vec![
            Card::new(Suit::Spades, Rank::Two),
            Card::new(Suit::Hearts, Rank::Three),
        ];
        table.seats[1].cards = vec![
            Card::new(Suit::Diamonds, Rank::Two),
            Card::new(Suit::Clubs, Rank::Three),
        ];
        table.community = vec![
            Card::new(Suit::Clubs, Rank::Ten),
            Card::new(Suit::Diamonds, Rank::Jack),
            Card::new(Suit::Hearts, Rank::Queen),
            Card::new(Suit::Spades, Rank::King),
            Card::new(Suit::Clubs, Rank::Nine),
        ];

        table.build_side_pots();
        for seat in &mut table.seats {
            seat.current_bet = 0;
        }
        table.phase = Phase::Showdown;
        table.distribute_pots();

        // 303 splits 151/151 with the odd chip to seat 1, the first
        // winner clockwise from the dealer at seat 0.
        assert_eq!(table.seats[1].stack, 152);
        assert_eq!(table.seats[0].stack, 151);
    }

    #[test]
    fn test_conservation_violation_halts_table() {
        let mut table = table_with(&[1000, 1000]);
        for id in ["p0", "p1"] {
            table.set_ready(id, true).unwrap();
        }
        table.start_game("p0").unwrap();

        // Corrupt a stack behind the engine's back.
        table.seats[0].stack += 777;
        let err = table
            .player_action("p0", PlayerAction::Call)
            .unwrap_err();
        assert!(matches!(err, TableError::Invariant(_)));
        assert!(table.is_halted());
        assert_eq!(
            table.player_action("p1", PlayerAction::Fold),
            Err(TableError::Halted)
        );
    }
}
