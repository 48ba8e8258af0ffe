use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, thread_rng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::table::TableConfig;

/// Type alias for chip amounts. All bets and stacks are whole chips; a table
/// whose total chips approach ~4.2 billion has bigger problems than overflow.
pub type Chips = u32;

/// Type alias for seat positions around the table ring.
pub type SeatIndex = usize;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    /// The lowercase name used on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Hearts => "hearts",
            Self::Diamonds => "diamonds",
            Self::Clubs => "clubs",
            Self::Spades => "spades",
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Hearts => "♥",
            Self::Diamonds => "♦",
            Self::Clubs => "♣",
            Self::Spades => "♠",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Numeric value used for hand comparison. Ace is high (14); the wheel
    /// straight treats it as 1 during straight detection only.
    pub fn value(&self) -> u8 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten => 10,
            Self::Jack => 11,
            Self::Queen => 12,
            Self::King => 13,
            Self::Ace => 14,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// A playing card.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub const fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// A 52-card deck with a draw cursor. The deck itself is never serialized.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: Vec<Card>,
    next: usize,
}

impl Deck {
    /// A fresh, ordered 52-card deck.
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(suit, rank));
            }
        }
        debug_assert_eq!(cards.len(), 52);
        Self { cards, next: 0 }
    }

    /// A freshly shuffled deck. `thread_rng` is a CSPRNG, which is what a
    /// dealing shoe needs; there is no seeded mode.
    pub fn shuffled() -> Self {
        let mut deck = Self::standard();
        deck.cards.shuffle(&mut thread_rng());
        deck.debug_check_integrity();
        deck
    }

    /// Deal the next card. Panics if the deck is exhausted, which cannot
    /// happen in a legal hand (10 seats * 2 + 3 burns + 5 community = 28).
    pub fn deal(&mut self) -> Card {
        let card = self.cards[self.next];
        self.next += 1;
        card
    }

    /// Discard one card face down.
    pub fn burn(&mut self) {
        self.next += 1;
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.next
    }

    fn debug_check_integrity(&self) {
        if cfg!(debug_assertions) {
            let distinct: HashSet<Card> = self.cards.iter().copied().collect();
            assert_eq!(distinct.len(), 52, "deck contains duplicate cards");
        }
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::shuffled()
    }
}

/// Table lifecycle phases.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Lobby,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Phase {
    /// True while a betting round can still take place.
    pub fn is_betting(&self) -> bool {
        matches!(self, Self::Preflop | Self::Flop | Self::Turn | Self::River)
    }

    /// True from the first deal until pots are distributed.
    pub fn in_hand(&self) -> bool {
        self.is_betting() || matches!(self, Self::Showdown)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Lobby => "lobby",
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
        };
        write!(f, "{repr}")
    }
}

/// Per-hand betting state of a seat. This single variant replaces the
/// active/folded/all-in/still-owes flag soup: a seat is either out of the
/// hand entirely, owes action this round, has acted and matched, is all-in,
/// or has folded. Impossible combinations (folded-and-all-in) cannot be
/// represented.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeatStatus {
    /// Not dealt into the current hand (joined mid-hand, busted, or the
    /// table is between hands).
    SittingOut,
    /// Live and still owes action in the current betting round.
    Owes,
    /// Live, has acted this round and matched the current high bet.
    Acted,
    /// Pushed the whole stack in; no further actions.
    AllIn,
    Folded,
}

impl SeatStatus {
    /// Live means still able to win the pot at showdown.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Owes | Self::Acted | Self::AllIn)
    }

    /// Dealt into the current hand (live or folded).
    pub fn in_hand(&self) -> bool {
        self.is_live() || matches!(self, Self::Folded)
    }
}

/// A seat at a table.
#[derive(Clone, Debug)]
pub struct Seat {
    pub player_id: String,
    pub name: String,
    pub stack: Chips,
    pub cards: Vec<Card>,
    pub seat_idx: SeatIndex,
    pub status: SeatStatus,
    /// Contribution to the pot in the current betting round.
    pub current_bet: Chips,
    pub ready: bool,
    pub is_host: bool,
    pub connected: bool,
    pub last_seen: DateTime<Utc>,
}

impl Seat {
    pub fn new(player_id: String, name: String, stack: Chips, seat_idx: SeatIndex, is_host: bool) -> Self {
        Self {
            player_id,
            name,
            stack,
            cards: Vec::with_capacity(2),
            seat_idx,
            status: SeatStatus::SittingOut,
            current_bet: 0,
            ready: false,
            is_host,
            connected: true,
            last_seen: Utc::now(),
        }
    }
}

/// A side pot carved out at a betting-round boundary.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SidePot {
    pub amount: Chips,
    /// Seat indices eligible to win this pot, ascending.
    pub eligible: Vec<SeatIndex>,
    /// The per-seat contribution level that defines this pot.
    pub level: Chips,
}

/// A betting action submitted by a player.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    /// The raise increment above the table's current high bet.
    Raise(Chips),
    AllIn,
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Fold => "folds".to_string(),
            Self::Check => "checks".to_string(),
            Self::Call => "calls".to_string(),
            Self::Raise(amount) => format!("raises {amount}"),
            Self::AllIn => "goes all-in".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// A card as it appears on the wire. Opponents' hole cards are replaced by
/// the opaque `{"suit": "hidden", "rank": "?"}` placeholder.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CardView {
    pub suit: String,
    pub rank: String,
}

impl CardView {
    pub fn hidden() -> Self {
        Self {
            suit: "hidden".to_string(),
            rank: "?".to_string(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.suit == "hidden"
    }
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        Self {
            suit: card.suit.wire_name().to_string(),
            rank: card.rank.wire_name().to_string(),
        }
    }
}

/// A seat as it appears on the wire.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SeatView {
    pub id: String,
    pub name: String,
    pub stack: Chips,
    pub cards: Vec<CardView>,
    pub position: SeatIndex,
    pub is_active: bool,
    pub has_folded: bool,
    pub is_all_in: bool,
    pub current_bet: Chips,
    pub is_ready: bool,
    pub is_host: bool,
    pub is_connected: bool,
}

/// Full table state as it appears on the wire. Built unredacted by the
/// engine and personalized per recipient before it ever leaves the process;
/// the deck is never part of it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TableView {
    pub id: String,
    pub players: Vec<SeatView>,
    pub community_cards: Vec<CardView>,
    pub pot: Chips,
    pub side_pots: Vec<SidePot>,
    pub phase: Phase,
    pub current_player: Option<SeatIndex>,
    pub dealer_position: Option<SeatIndex>,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub ante: Chips,
    pub current_bet: Chips,
    pub start_time: DateTime<Utc>,
}

impl TableView {
    /// A copy of this view in which every seat except `viewer` has its hole
    /// cards replaced by opaque placeholders.
    pub fn personalized(&self, viewer: &str) -> TableView {
        let mut view = self.clone();
        for seat in &mut view.players {
            if seat.id != viewer {
                seat.cards = seat.cards.iter().map(|_| CardView::hidden()).collect();
            }
        }
        view
    }

    /// A copy with every hole card hidden, safe for spectators and
    /// connections that have not joined.
    pub fn public(&self) -> TableView {
        let mut view = self.clone();
        for seat in &mut view.players {
            seat.cards = seat.cards.iter().map(|_| CardView::hidden()).collect();
        }
        view
    }
}

/// The full table state owned by one actor task.
#[derive(Debug)]
pub struct PokerTable {
    pub id: String,
    pub config: TableConfig,
    pub seats: Vec<Seat>,
    pub community: Vec<Card>,
    pub deck: Deck,
    pub phase: Phase,
    /// Seat index of the dealer button; `None` until the first hand.
    pub dealer: Option<SeatIndex>,
    /// Highest per-seat contribution this betting round.
    pub current_bet: Chips,
    pub last_aggressor: Option<SeatIndex>,
    pub action_idx: SeatIndex,
    /// Running pot, including the current round's not-yet-partitioned bets.
    pub pot: Chips,
    pub side_pots: Vec<SidePot>,
    pub showdown_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub hands_played: u32,
    /// Total chips in play for the current hand, checked after every
    /// mutation. A mismatch halts the table.
    pub(crate) hand_chip_total: Chips,
    pub(crate) halted: bool,
}

impl PokerTable {
    pub fn new(id: impl Into<String>, config: TableConfig) -> Self {
        Self {
            id: id.into(),
            config,
            seats: Vec::with_capacity(10),
            community: Vec::with_capacity(5),
            deck: Deck::shuffled(),
            phase: Phase::Waiting,
            dealer: None,
            current_bet: 0,
            last_aggressor: None,
            action_idx: 0,
            pot: 0,
            side_pots: Vec::new(),
            showdown_at: None,
            started_at: Utc::now(),
            hands_played: 0,
            hand_chip_total: 0,
            halted: false,
        }
    }

    pub fn seat_of(&self, player_id: &str) -> Option<SeatIndex> {
        self.seats.iter().position(|s| s.player_id == player_id)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The wire-shaped, unredacted view of this table. Callers must
    /// personalize it before sending it anywhere.
    pub fn view(&self) -> TableView {
        TableView {
            id: self.id.clone(),
            players: self
                .seats
                .iter()
                .map(|s| SeatView {
                    id: s.player_id.clone(),
                    name: s.name.clone(),
                    stack: s.stack,
                    cards: s.cards.iter().map(CardView::from).collect(),
                    position: s.seat_idx,
                    is_active: s.status.is_live(),
                    has_folded: s.status == SeatStatus::Folded,
                    is_all_in: s.status == SeatStatus::AllIn,
                    current_bet: s.current_bet,
                    is_ready: s.ready,
                    is_host: s.is_host,
                    is_connected: s.connected,
                })
                .collect(),
            community_cards: self.community.iter().map(CardView::from).collect(),
            pot: self.pot,
            side_pots: self.side_pots.clone(),
            phase: self.phase,
            current_player: if self.phase.is_betting() {
                Some(self.action_idx)
            } else {
                None
            },
            dealer_position: self.dealer,
            small_blind: self.config.small_blind,
            big_blind: self.config.big_blind,
            ante: self.config.ante,
            current_bet: self.current_bet,
            start_time: self.started_at,
        }
    }
}
