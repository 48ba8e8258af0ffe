//! Core game logic: cards, the hand evaluator and the table state machine.

pub mod engine;
pub mod entities;
pub mod evaluator;

pub use engine::TableError;
pub use entities::{
    Card, CardView, Chips, Deck, Phase, PlayerAction, PokerTable, Rank, Seat, SeatIndex,
    SeatStatus, SeatView, SidePot, Suit, TableView,
};
pub use evaluator::{compare, determine_winners, evaluate, HandCategory, HandEvaluation};
