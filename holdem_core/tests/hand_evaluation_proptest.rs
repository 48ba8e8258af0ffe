//! Property-based checks on the seven-card evaluator.

use holdem_core::game::{compare, evaluate, Card, HandCategory, Rank, Suit};
use proptest::prelude::*;

fn full_deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(52);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            cards.push(Card::new(suit, rank));
        }
    }
    cards
}

proptest! {
    /// Evaluation terminates on every valid 2+5 input, produces a
    /// five-card hand and compares equal to itself.
    #[test]
    fn evaluation_is_total_and_reflexive(
        cards in proptest::sample::subsequence(full_deck(), 7)
    ) {
        let eval = evaluate(&cards[..2], &cards[2..]);
        prop_assert_eq!(eval.cards.len(), 5);
        prop_assert_eq!(compare(&eval, &eval), 0);
    }

    /// The packed score orders by category first: the top bits of the
    /// score recover the category.
    #[test]
    fn score_encodes_category_in_high_bits(
        cards in proptest::sample::subsequence(full_deck(), 7)
    ) {
        let eval = evaluate(&cards[..2], &cards[2..]);
        let weight = eval.score >> 20;
        let expected = match eval.category {
            HandCategory::HighCard => 0,
            HandCategory::OnePair => 1,
            HandCategory::TwoPair => 2,
            HandCategory::ThreeOfAKind => 3,
            HandCategory::Straight => 4,
            HandCategory::Flush => 5,
            HandCategory::FullHouse => 6,
            HandCategory::FourOfAKind => 7,
            HandCategory::StraightFlush => 8,
            HandCategory::RoyalFlush => 9,
        };
        prop_assert_eq!(weight, expected);
    }

    /// Revealing another community card can never make the best
    /// five-card hand worse.
    #[test]
    fn extra_cards_never_weaken_a_hand(
        cards in proptest::sample::subsequence(full_deck(), 7)
    ) {
        let partial = evaluate(&cards[..2], &cards[2..6]);
        let full = evaluate(&cards[..2], &cards[2..7]);
        prop_assert!(full.score >= partial.score);
    }

    /// The best seven-card hand is at least as good as the board alone.
    #[test]
    fn hole_cards_never_weaken_the_board(
        cards in proptest::sample::subsequence(full_deck(), 7)
    ) {
        let board_only = evaluate(&cards[2..7], &[]);
        let full = evaluate(&cards[..2], &cards[2..7]);
        prop_assert!(full.score >= board_only.score);
    }

    /// Comparison is antisymmetric across random pairs of hands drawn
    /// from a shared board.
    #[test]
    fn comparison_is_antisymmetric(
        cards in proptest::sample::subsequence(full_deck(), 9)
    ) {
        let board = &cards[4..9];
        let a = evaluate(&cards[..2], board);
        let b = evaluate(&cards[2..4], board);
        prop_assert_eq!(compare(&a, &b), -compare(&b, &a));
    }
}
