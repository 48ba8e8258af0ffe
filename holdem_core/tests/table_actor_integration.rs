//! Table actor behavior: serialized commands, notifications and the
//! auto-restart timer.

use std::time::Duration;

use holdem_core::game::{Phase, PlayerAction, PokerTable, TableError};
use holdem_core::table::{TableActor, TableConfig, TableHandle, TableNotice};

fn fast_restart_config() -> TableConfig {
    TableConfig {
        restart_delay_ms: 100,
        ..TableConfig::default()
    }
}

fn spawn(config: TableConfig) -> TableHandle {
    let (actor, handle) = TableActor::new("t1", config, None);
    tokio::spawn(actor.run());
    handle
}

async fn seat_and_start(handle: &TableHandle, names: &[&str]) {
    for name in names {
        handle.join(name, name, None).await.unwrap();
        handle.set_ready(name, true).await.unwrap();
    }
    handle.start_game(names[0]).await.unwrap();
}

#[tokio::test]
async fn test_auto_restart_deals_next_hand() {
    let handle = spawn(fast_restart_config());
    seat_and_start(&handle, &["A", "B"]).await;

    // Folding ends the hand; the restart timer is armed at showdown.
    handle.action("A", PlayerAction::Fold).await.unwrap();
    let view = handle.view().await.unwrap();
    assert_eq!(view.phase, Phase::Showdown);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let view = handle.view().await.unwrap();
    assert_eq!(view.phase, Phase::Preflop, "hand restarted automatically");
    assert!(view.side_pots.is_empty());
    assert_eq!(view.pot, 30, "blinds posted for the fresh hand");
}

#[tokio::test]
async fn test_auto_restart_disabled_stays_in_showdown() {
    let config = TableConfig {
        auto_restart: false,
        restart_delay_ms: 100,
        ..TableConfig::default()
    };
    let handle = spawn(config);
    seat_and_start(&handle, &["A", "B"]).await;

    handle.action("A", PlayerAction::Fold).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let view = handle.view().await.unwrap();
    assert_eq!(view.phase, Phase::Showdown);
}

#[test]
fn test_auto_restart_requires_two_funded_seats() {
    let mut table = PokerTable::new("t1", TableConfig::default());
    table.join("A", "A", None).unwrap();
    table.join("B", "B", None).unwrap();
    table.phase = Phase::Showdown;
    assert!(table.can_auto_restart());

    table.seats[1].stack = 0;
    assert!(!table.can_auto_restart());
}

#[tokio::test]
async fn test_force_restart_through_handle() {
    let handle = spawn(TableConfig {
        auto_restart: false,
        ..TableConfig::default()
    });
    seat_and_start(&handle, &["A", "B"]).await;

    assert_eq!(
        handle.force_restart().await,
        Err(TableError::RestartOutsideShowdown)
    );

    handle.action("A", PlayerAction::Fold).await.unwrap();
    handle.force_restart().await.unwrap();
    let view = handle.view().await.unwrap();
    assert_eq!(view.phase, Phase::Preflop);
}

#[tokio::test]
async fn test_subscribers_observe_commits_in_order() {
    let handle = spawn(TableConfig {
        auto_restart: false,
        ..TableConfig::default()
    });
    let mut notices = handle.subscribe(1).await.unwrap();

    handle.join("A", "A", None).await.unwrap();
    handle.join("B", "B", None).await.unwrap();
    handle.set_ready("A", true).await.unwrap();
    handle.set_ready("B", true).await.unwrap();
    handle.start_game("A").await.unwrap();
    handle.action("A", PlayerAction::Fold).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(notice) =
        tokio::time::timeout(Duration::from_millis(200), notices.recv()).await
    {
        match notice {
            Some(notice) => seen.push(notice),
            None => break,
        }
    }
    assert_eq!(
        seen,
        vec![
            TableNotice::Updated,
            TableNotice::Updated,
            TableNotice::Updated,
            TableNotice::Updated,
            TableNotice::HandStarted,
            TableNotice::ActionApplied,
            TableNotice::HandFinished,
        ]
    );
}

#[tokio::test]
async fn test_failed_commands_do_not_notify() {
    let handle = spawn(TableConfig {
        auto_restart: false,
        ..TableConfig::default()
    });
    handle.join("A", "A", None).await.unwrap();
    let mut notices = handle.subscribe(7).await.unwrap();

    assert_eq!(
        handle.start_game("A").await,
        Err(TableError::NotEnoughPlayers)
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(100), notices.recv())
            .await
            .is_err(),
        "rejected commands leave subscribers silent"
    );
}

#[tokio::test]
async fn test_view_for_hides_opponents_cards() {
    let handle = spawn(TableConfig::default());
    seat_and_start(&handle, &["A", "B"]).await;

    let view = handle.view_for("A").await.unwrap();
    let me = view.players.iter().find(|p| p.id == "A").unwrap();
    let other = view.players.iter().find(|p| p.id == "B").unwrap();
    assert!(me.cards.iter().all(|c| !c.is_hidden()));
    assert!(other.cards.iter().all(|c| c.is_hidden()));
}

#[tokio::test]
async fn test_disconnect_folds_and_rejoin_reclaims_seat() {
    let handle = spawn(TableConfig {
        auto_restart: false,
        ..TableConfig::default()
    });
    seat_and_start(&handle, &["A", "B"]).await;

    handle.set_connected("A", false).await.unwrap();
    // Give the actor a beat to process the fire-and-forget command.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let view = handle.view().await.unwrap();
    assert_eq!(view.phase, Phase::Showdown);

    // Rejoining under the same id reclaims the seat.
    handle.join("A", "A", None).await.unwrap();
    let view = handle.view().await.unwrap();
    let seat = view.players.iter().find(|p| p.id == "A").unwrap();
    assert!(seat.is_connected);
}

#[tokio::test]
async fn test_update_config_rejected_mid_hand() {
    let handle = spawn(TableConfig {
        auto_restart: false,
        ..TableConfig::default()
    });
    seat_and_start(&handle, &["A", "B"]).await;

    let mut config = handle.config().await.unwrap();
    config.small_blind = 25;
    config.big_blind = 50;
    assert_eq!(
        handle.update_config(config).await,
        Err(TableError::ConfigDuringHand)
    );
}

#[tokio::test]
async fn test_set_blinds_applies_to_next_posting() {
    let handle = spawn(TableConfig {
        auto_restart: false,
        ..TableConfig::default()
    });
    seat_and_start(&handle, &["A", "B"]).await;

    handle.set_blinds(25, 50, 5).await.unwrap();
    handle.action("A", PlayerAction::Fold).await.unwrap();
    handle.force_restart().await.unwrap();

    let view = handle.view().await.unwrap();
    assert_eq!(view.small_blind, 25);
    assert_eq!(view.big_blind, 50);
    assert_eq!(view.ante, 5);
    // Two antes plus both blinds.
    assert_eq!(view.pot, 5 + 5 + 25 + 50);
}
