//! Side-pot behavior driven through real betting sequences.

use holdem_core::game::{Chips, Phase, PlayerAction, PokerTable, SeatStatus};
use holdem_core::table::TableConfig;

fn table_with_stacks(stacks: &[Chips]) -> PokerTable {
    let mut table = PokerTable::new("t1", TableConfig::default());
    for (i, &stack) in stacks.iter().enumerate() {
        let name = format!("p{i}");
        table.join(&name, &name, None).unwrap();
        table.seats[i].stack = stack;
        table.set_ready(&name, true).unwrap();
    }
    table
}

#[test]
fn test_multi_way_all_in_builds_layered_pots() {
    // A short stack, two deep stacks: one all-in at 100 and two full
    // commitments at 500 produce a 300 main pot and an 800 side pot.
    let mut table = table_with_stacks(&[100, 500, 500]);
    table.start_game("p0").unwrap();

    // Dealer p0; blinds p1 (10) and p2 (20); action on p0.
    table.player_action("p0", PlayerAction::AllIn).unwrap();
    assert_eq!(table.current_bet, 100);
    table.player_action("p1", PlayerAction::AllIn).unwrap();
    assert_eq!(table.current_bet, 500);
    table.player_action("p2", PlayerAction::Call).unwrap();

    // All three are committed, so the board runs out to showdown and the
    // pots are awarded.
    assert_eq!(table.phase, Phase::Showdown);
    assert_eq!(table.community.len(), 5);
    assert!(table.side_pots.is_empty());
    assert_eq!(table.pot, 0);

    let total: Chips = table.seats.iter().map(|s| s.stack).sum();
    assert_eq!(total, 1100, "every chip is accounted for");
    // The short stack can win at most the 300 main pot.
    assert!(table.seats[0].stack <= 300);
}

#[test]
fn test_partial_stack_call_becomes_all_in_with_side_pot() {
    let mut table = table_with_stacks(&[1000, 150]);
    table.start_game("p0").unwrap();

    // Dealer p0 raises past the short stack's total.
    table.player_action("p0", PlayerAction::Raise(200)).unwrap();
    assert_eq!(table.seats[0].current_bet, 220);
    table.player_action("p1", PlayerAction::Call).unwrap();

    // The short seat called for less and is all-in; the overage is a
    // one-seat side pot that returns to the raiser at showdown.
    assert_eq!(table.phase, Phase::Showdown);
    let total: Chips = table.seats.iter().map(|s| s.stack).sum();
    assert_eq!(total, 1150);
    assert!(
        table.seats[0].stack >= 850,
        "the uncalled 70 always comes back to the raiser"
    );
}

#[test]
fn test_fold_after_contributing_forfeits_into_pot() {
    let mut table = table_with_stacks(&[1000, 1000, 1000]);
    table.start_game("p0").unwrap();

    table.player_action("p0", PlayerAction::Raise(40)).unwrap();
    table.player_action("p1", PlayerAction::Fold).unwrap();
    table.player_action("p2", PlayerAction::Call).unwrap();

    // The folded small blind's 10 stays in the pot.
    assert_eq!(table.phase, Phase::Flop);
    assert_eq!(table.pot, 130);
    assert_eq!(
        table.side_pots.iter().map(|p| p.amount).sum::<Chips>(),
        130
    );
    assert!(table
        .side_pots
        .iter()
        .all(|p| !p.eligible.contains(&1)));
}

#[test]
fn test_side_pots_accumulate_across_betting_rounds() {
    let mut table = table_with_stacks(&[1000, 1000]);
    table.start_game("p0").unwrap();

    table.player_action("p0", PlayerAction::Call).unwrap();
    table.player_action("p1", PlayerAction::Check).unwrap();
    assert_eq!(
        table.side_pots.iter().map(|p| p.amount).sum::<Chips>(),
        table.pot,
        "pot equals the sum of side pots at a round boundary"
    );

    table.player_action("p1", PlayerAction::Raise(50)).unwrap();
    table.player_action("p0", PlayerAction::Call).unwrap();
    assert_eq!(table.phase, Phase::Turn);
    assert_eq!(table.pot, 140);
    assert_eq!(
        table.side_pots.iter().map(|p| p.amount).sum::<Chips>(),
        140
    );
    // Same eligibility, so the rounds merge into a single pot.
    assert_eq!(table.side_pots.len(), 1);
}

#[test]
fn test_blinds_exceeding_stacks_post_all_in() {
    let mut table = table_with_stacks(&[1000, 5]);
    table.start_game("p0").unwrap();

    // The big blind could only post 5 of 20 and is all-in immediately.
    assert_eq!(table.seats[1].stack, 0);
    assert_eq!(table.seats[1].status, SeatStatus::AllIn);
    assert_eq!(table.seats[1].current_bet, 5);
    assert_eq!(table.current_bet, 20);

    // The dealer's call closes the hand; nothing is owed back and forth.
    table.player_action("p0", PlayerAction::Call).unwrap();
    assert_eq!(table.phase, Phase::Showdown);
    let total: Chips = table.seats.iter().map(|s| s.stack).sum();
    assert_eq!(total, 1005);
}

#[test]
fn test_ante_posting_deducts_from_every_active_seat() {
    let mut config = TableConfig::default();
    config.ante = 5;
    let mut table = PokerTable::new("t1", config);
    for name in ["p0", "p1", "p2"] {
        table.join(name, name, None).unwrap();
        table.set_ready(name, true).unwrap();
    }
    table.start_game("p0").unwrap();

    // Three antes plus the blinds.
    assert_eq!(table.pot, 3 * 5 + 10 + 20);
    assert_eq!(table.seats[0].stack, 995);
    assert_eq!(table.seats[1].stack, 985);
    assert_eq!(table.seats[2].stack, 975);
}
