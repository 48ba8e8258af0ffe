//! Tournament coordinator lifecycle tests.

use std::time::Duration;

use holdem_core::game::Phase;
use holdem_core::table::{TableConfig, TableManager};
use holdem_core::tournament::{
    standard_blind_schedule, TournamentConfig, TournamentError, TournamentManager,
    TournamentStatus,
};

fn small_config() -> TournamentConfig {
    TournamentConfig {
        name: "Test SNG".to_string(),
        buy_in: 100,
        starting_stack: 1000,
        min_players: 4,
        max_players: 4,
        table_size: 2,
        registration_delay_secs: 3600,
        blind_levels: standard_blind_schedule(600),
        prize_percents: vec![65, 35],
    }
}

fn managers() -> (TableManager, TournamentManager) {
    let tables = TableManager::new(TableConfig::default());
    let tournaments = TournamentManager::new(tables.clone());
    (tables, tournaments)
}

async fn register_four(tournaments: &TournamentManager) {
    tournaments.create("t1", small_config()).await.unwrap();
    for name in ["alice", "bob", "carol", "dave"] {
        tournaments.register("t1", name, name).await.unwrap();
    }
}

#[tokio::test]
async fn test_registration_builds_prize_pool() {
    let (_, tournaments) = managers();
    tournaments.create("t1", small_config()).await.unwrap();

    let info = tournaments.register("t1", "alice", "alice").await.unwrap();
    assert_eq!(info.status, TournamentStatus::Registering);
    assert_eq!(info.prize_pool, 100);
    assert_eq!(info.players_count, 1);

    assert_eq!(
        tournaments.register("t1", "alice", "alice").await,
        Err(TournamentError::AlreadyRegistered)
    );

    let info = tournaments.unregister("t1", "alice").await.unwrap();
    assert_eq!(info.prize_pool, 0);
    assert_eq!(
        tournaments.unregister("t1", "alice").await,
        Err(TournamentError::NotRegistered)
    );
}

#[tokio::test]
async fn test_registration_caps_at_max_players() {
    let (_, tournaments) = managers();
    register_four(&tournaments).await;
    assert_eq!(
        tournaments.register("t1", "eve", "eve").await,
        Err(TournamentError::TournamentFull)
    );
}

#[tokio::test]
async fn test_start_spawns_evenly_seated_tables() {
    let (tables, tournaments) = managers();
    register_four(&tournaments).await;

    let info = tournaments.start("t1").await.unwrap();
    assert_eq!(info.status, TournamentStatus::Active);
    assert_eq!(info.prize_pool, 400);
    assert_eq!(info.tables.len(), 2, "four players across tables of two");
    assert!(info.tables.iter().all(|t| t.player_ids.len() == 2));

    // Child tables exist in the shared registry and are already dealing.
    for child in &info.tables {
        let handle = tables.get(&child.id).await.expect("child table registered");
        let view = handle.view().await.unwrap();
        assert_eq!(view.phase, Phase::Preflop);
        assert_eq!(view.small_blind, 10);
        assert_eq!(view.big_blind, 20);
        assert!(view.players.iter().all(|p| p.stack > 0));
    }

    // Registration is closed once play begins.
    assert_eq!(
        tournaments.register("t1", "eve", "eve").await,
        Err(TournamentError::RegistrationClosed)
    );
    assert_eq!(
        tournaments.start("t1").await,
        Err(TournamentError::AlreadyStarted)
    );
}

#[tokio::test]
async fn test_registration_timer_starts_tournament() {
    let (_, tournaments) = managers();
    let config = TournamentConfig {
        min_players: 2,
        max_players: 4,
        registration_delay_secs: 0,
        ..small_config()
    };
    tournaments.create("t1", config).await.unwrap();
    tournaments.register("t1", "alice", "alice").await.unwrap();
    let info = tournaments.register("t1", "bob", "bob").await.unwrap();
    assert_eq!(info.status, TournamentStatus::Registering);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let info = tournaments.info("t1").await.unwrap();
    assert_eq!(info.status, TournamentStatus::Active);
}

#[tokio::test]
async fn test_unregister_below_minimum_disarms_start_timer() {
    let (_, tournaments) = managers();
    let config = TournamentConfig {
        min_players: 2,
        max_players: 4,
        registration_delay_secs: 0,
        ..small_config()
    };
    tournaments.create("t1", config).await.unwrap();
    tournaments.register("t1", "alice", "alice").await.unwrap();
    tournaments.register("t1", "bob", "bob").await.unwrap();
    tournaments.unregister("t1", "bob").await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let info = tournaments.info("t1").await.unwrap();
    assert_eq!(
        info.status,
        TournamentStatus::Registering,
        "the armed start must re-check the roster when it fires"
    );
}

#[tokio::test]
async fn test_eliminations_assign_positions_and_finish() {
    let (_, tournaments) = managers();
    register_four(&tournaments).await;
    tournaments.start("t1").await.unwrap();

    // First out of four finishes fourth.
    tournaments.eliminate("t1", "alice").await.unwrap();
    let info = tournaments.info("t1").await.unwrap();
    let alice = info.players.iter().find(|p| p.id == "alice").unwrap();
    assert_eq!(alice.position, 4);
    assert_eq!(
        tournaments.eliminate("t1", "alice").await,
        Err(TournamentError::AlreadyEliminated)
    );

    // Two survivors fit one table: final-table collapse.
    tournaments.eliminate("t1", "bob").await.unwrap();
    let info = tournaments.info("t1").await.unwrap();
    assert_eq!(info.status, TournamentStatus::FinalTable);
    assert!(info.tables.iter().any(|t| t.is_final && t.is_active));
    assert_eq!(info.survivors_count, 2);

    // Last elimination ends the tournament and pays 65/35.
    tournaments.eliminate("t1", "carol").await.unwrap();
    let info = tournaments.info("t1").await.unwrap();
    assert_eq!(info.status, TournamentStatus::Finished);
    assert!(info.ended_at.is_some());

    let dave = info.players.iter().find(|p| p.id == "dave").unwrap();
    let carol = info.players.iter().find(|p| p.id == "carol").unwrap();
    assert_eq!(dave.position, 1);
    assert_eq!(carol.position, 2);
    assert_eq!(dave.prize, 260);
    assert_eq!(carol.prize, 140);
    assert_eq!(info.winners, vec!["dave".to_string(), "carol".to_string()]);
}

#[tokio::test]
async fn test_final_table_carries_blinds_and_stacks() {
    let (tables, tournaments) = managers();
    register_four(&tournaments).await;
    tournaments.start("t1").await.unwrap();

    tournaments.eliminate("t1", "alice").await.unwrap();
    tournaments.eliminate("t1", "bob").await.unwrap();

    let info = tournaments.info("t1").await.unwrap();
    let final_table = info.tables.iter().find(|t| t.is_final).unwrap();
    let handle = tables.get(&final_table.id).await.unwrap();
    let view = handle.view().await.unwrap();
    assert_eq!(view.phase, Phase::Preflop, "the final table deals on creation");
    assert_eq!(view.players.len(), 2);
    // All non-final tables are out of play.
    assert!(info
        .tables
        .iter()
        .filter(|t| !t.is_final)
        .all(|t| !t.is_active));
}

#[tokio::test]
async fn test_cancel_releases_tables() {
    let (tables, tournaments) = managers();
    register_four(&tournaments).await;
    let info = tournaments.start("t1").await.unwrap();
    let child_ids: Vec<String> = info.tables.iter().map(|t| t.id.clone()).collect();

    let info = tournaments.cancel("t1").await.unwrap();
    assert_eq!(info.status, TournamentStatus::Cancelled);
    for id in child_ids {
        assert!(tables.get(&id).await.is_none(), "child tables are torn down");
    }
    assert_eq!(
        tournaments.cancel("t1").await,
        Err(TournamentError::AlreadyOver)
    );
}

#[tokio::test]
async fn test_listing_filters_active() {
    let (_, tournaments) = managers();
    tournaments.create("t1", small_config()).await.unwrap();
    tournaments
        .create_standard("t2", "Nightly", 50)
        .await
        .unwrap();
    tournaments.create_turbo("t3", "Spin", 25).await.unwrap();

    let all = tournaments.list().await;
    assert_eq!(all.len(), 3);
    assert_eq!(tournaments.list_active().await.len(), 3);

    tournaments.cancel("t3").await.unwrap();
    assert_eq!(tournaments.list_active().await.len(), 2);
    assert_eq!(
        tournaments.info("missing").await.unwrap_err(),
        TournamentError::TournamentNotFound
    );
}
