//! Best-five-of-seven hand evaluation.
//!
//! Evaluation produces a packed 64-bit score: category first, then the
//! primary group ranks, then kickers, so a plain integer comparison picks
//! the winner. The five-of-seven enumeration uses precomputed index tables
//! rather than a recursive generator; this is the hottest path in a busy
//! engine.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::entities::{Card, PokerTable, Rank, SeatIndex};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandCategory {
    fn weight(&self) -> u64 {
        match self {
            Self::HighCard => 0,
            Self::OnePair => 1,
            Self::TwoPair => 2,
            Self::ThreeOfAKind => 3,
            Self::Straight => 4,
            Self::Flush => 5,
            Self::FullHouse => 6,
            Self::FourOfAKind => 7,
            Self::StraightFlush => 8,
            Self::RoyalFlush => 9,
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "High Card",
            Self::OnePair => "One Pair",
            Self::TwoPair => "Two Pair",
            Self::ThreeOfAKind => "Three of a Kind",
            Self::Straight => "Straight",
            Self::Flush => "Flush",
            Self::FullHouse => "Full House",
            Self::FourOfAKind => "Four of a Kind",
            Self::StraightFlush => "Straight Flush",
            Self::RoyalFlush => "Royal Flush",
        };
        write!(f, "{repr}")
    }
}

/// Result of evaluating a hand.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HandEvaluation {
    pub category: HandCategory,
    /// Category weight and tiebreak ranks packed into one comparable
    /// integer: equal scores mean an exact split.
    pub score: u64,
    /// The five cards forming the hand (fewer if fewer were available).
    pub cards: Vec<Card>,
}

impl HandEvaluation {
    fn new(category: HandCategory, tiebreaks: [u8; 5], cards: Vec<Card>) -> Self {
        let mut score = category.weight() << 20;
        for (i, t) in tiebreaks.iter().enumerate() {
            score |= (*t as u64) << (16 - 4 * i);
        }
        Self {
            category,
            score,
            cards,
        }
    }
}

impl fmt::Display for HandEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.category)
    }
}

/// Returns 1, -1, or 0 as `a` beats, loses to, or ties `b`.
pub fn compare(a: &HandEvaluation, b: &HandEvaluation) -> i32 {
    match a.score.cmp(&b.score) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
    }
}

// All 5-card subsets of 7 cards (21) and of 6 cards (6), as index tables.
const FIVE_OF_SEVEN: [[usize; 5]; 21] = [
    [2, 3, 4, 5, 6],
    [1, 3, 4, 5, 6],
    [1, 2, 4, 5, 6],
    [1, 2, 3, 5, 6],
    [1, 2, 3, 4, 6],
    [1, 2, 3, 4, 5],
    [0, 3, 4, 5, 6],
    [0, 2, 4, 5, 6],
    [0, 2, 3, 5, 6],
    [0, 2, 3, 4, 6],
    [0, 2, 3, 4, 5],
    [0, 1, 4, 5, 6],
    [0, 1, 3, 5, 6],
    [0, 1, 3, 4, 6],
    [0, 1, 3, 4, 5],
    [0, 1, 2, 5, 6],
    [0, 1, 2, 4, 6],
    [0, 1, 2, 4, 5],
    [0, 1, 2, 3, 6],
    [0, 1, 2, 3, 5],
    [0, 1, 2, 3, 4],
];

const FIVE_OF_SIX: [[usize; 5]; 6] = [
    [1, 2, 3, 4, 5],
    [0, 2, 3, 4, 5],
    [0, 1, 3, 4, 5],
    [0, 1, 2, 4, 5],
    [0, 1, 2, 3, 5],
    [0, 1, 2, 3, 4],
];

/// Evaluate the best five-card hand available from hole plus community
/// cards. With fewer than five cards in total the result is a high-card
/// hand over whatever is present. Total on any valid input.
pub fn evaluate(hole: &[Card], community: &[Card]) -> HandEvaluation {
    let mut all: Vec<Card> = Vec::with_capacity(hole.len() + community.len());
    all.extend_from_slice(hole);
    all.extend_from_slice(community);

    if cfg!(debug_assertions) {
        let distinct: HashSet<Card> = all.iter().copied().collect();
        assert_eq!(distinct.len(), all.len(), "duplicate card in evaluation input");
    }

    if all.len() < 5 {
        return evaluate_partial(&all);
    }
    if all.len() == 5 {
        return evaluate_five(&all);
    }

    let combos: &[[usize; 5]] = match all.len() {
        6 => &FIVE_OF_SIX,
        7 => &FIVE_OF_SEVEN,
        n => unreachable!("evaluation over {n} cards"),
    };

    let mut best: Option<HandEvaluation> = None;
    let mut combo = [all[0]; 5];
    for indices in combos {
        for (slot, &i) in combo.iter_mut().zip(indices.iter()) {
            *slot = all[i];
        }
        let eval = evaluate_five(&combo);
        match &best {
            Some(b) if b.score >= eval.score => {}
            _ => best = Some(eval),
        }
    }
    best.expect("at least one combination")
}

/// Evaluate the winners among all not-folded seats at the table; returns
/// the seat indices whose score equals the maximum.
pub fn determine_winners(table: &PokerTable) -> Vec<SeatIndex> {
    let mut winners: Vec<SeatIndex> = Vec::new();
    let mut best_score = 0u64;
    for (idx, seat) in table.seats.iter().enumerate() {
        if !seat.status.is_live() || seat.cards.is_empty() {
            continue;
        }
        let eval = evaluate(&seat.cards, &table.community);
        if winners.is_empty() || eval.score > best_score {
            best_score = eval.score;
            winners = vec![idx];
        } else if eval.score == best_score {
            winners.push(idx);
        }
    }
    winners
}

fn evaluate_partial(cards: &[Card]) -> HandEvaluation {
    let mut values: Vec<u8> = cards.iter().map(|c| c.rank.value()).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    let mut tiebreaks = [0u8; 5];
    for (i, v) in values.iter().take(5).enumerate() {
        tiebreaks[i] = *v;
    }
    HandEvaluation::new(HandCategory::HighCard, tiebreaks, cards.to_vec())
}

fn evaluate_five(cards: &[Card]) -> HandEvaluation {
    debug_assert_eq!(cards.len(), 5);
    let mut sorted: Vec<Card> = cards.to_vec();
    sorted.sort_unstable_by(|a, b| b.rank.value().cmp(&a.rank.value()));

    let is_flush = sorted.iter().all(|c| c.suit == sorted[0].suit);
    let straight_high = straight_high_card(&sorted);

    if let Some(high) = straight_high {
        if is_flush {
            if high == Rank::Ace.value() {
                return HandEvaluation::new(HandCategory::RoyalFlush, [0; 5], sorted);
            }
            return HandEvaluation::new(HandCategory::StraightFlush, [high, 0, 0, 0, 0], sorted);
        }
    }

    // Group ranks by multiplicity: largest group first, ties by rank.
    let mut groups: Vec<(u8, u8)> = Vec::with_capacity(5); // (count, value)
    for card in &sorted {
        let v = card.rank.value();
        match groups.iter_mut().find(|(_, gv)| *gv == v) {
            Some((count, _)) => *count += 1,
            None => groups.push((1, v)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));

    match groups.as_slice() {
        [(4, quad), (1, kicker)] => HandEvaluation::new(
            HandCategory::FourOfAKind,
            [*quad, *kicker, 0, 0, 0],
            sorted,
        ),
        [(3, trips), (2, pair)] => HandEvaluation::new(
            HandCategory::FullHouse,
            [*trips, *pair, 0, 0, 0],
            sorted,
        ),
        _ if is_flush => {
            let t = descending_values(&sorted);
            HandEvaluation::new(HandCategory::Flush, t, sorted)
        }
        _ if straight_high.is_some() => HandEvaluation::new(
            HandCategory::Straight,
            [straight_high.unwrap(), 0, 0, 0, 0],
            sorted,
        ),
        [(3, trips), (1, k1), (1, k2)] => HandEvaluation::new(
            HandCategory::ThreeOfAKind,
            [*trips, *k1, *k2, 0, 0],
            sorted,
        ),
        [(2, high), (2, low), (1, kicker)] => HandEvaluation::new(
            HandCategory::TwoPair,
            [*high, *low, *kicker, 0, 0],
            sorted,
        ),
        [(2, pair), (1, k1), (1, k2), (1, k3)] => HandEvaluation::new(
            HandCategory::OnePair,
            [*pair, *k1, *k2, *k3, 0],
            sorted,
        ),
        _ => {
            let t = descending_values(&sorted);
            HandEvaluation::new(HandCategory::HighCard, t, sorted)
        }
    }
}

fn descending_values(sorted: &[Card]) -> [u8; 5] {
    let mut t = [0u8; 5];
    for (i, card) in sorted.iter().take(5).enumerate() {
        t[i] = card.rank.value();
    }
    t
}

/// Top card of a straight within five rank-descending cards, or `None`.
/// The wheel A-2-3-4-5 counts as a straight whose top card is the five.
fn straight_high_card(sorted: &[Card]) -> Option<u8> {
    let v: Vec<u8> = sorted.iter().map(|c| c.rank.value()).collect();
    if v.windows(2).all(|w| w[0] == w[1] + 1) {
        return Some(v[0]);
    }
    if v == [14, 5, 4, 3, 2] {
        return Some(5);
    }
    None
}
