//! HTTP router: the WebSocket endpoint, the tournament REST surface and
//! the static frontend.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::services::ServeDir;

use holdem_core::table::TableManager;
use holdem_core::tournament::TournamentManager;

use crate::hub::Hub;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub tables: TableManager,
    pub tournaments: TournamentManager,
}

pub fn create_router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/ws/:table_id", get(ws::ws_handler))
        .route(
            "/api/tournaments",
            get(list_tournaments).post(create_tournament),
        )
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

async fn list_tournaments(State(state): State<AppState>) -> impl IntoResponse {
    let tournaments = state.tournaments.list_active().await;
    Json(json!({
        "active_tournaments": tournaments.len(),
        "tournaments": tournaments,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateTournamentRequest {
    table_id: String,
    organizer: String,
}

/// Create the default sit-and-go for a table.
async fn create_tournament(
    State(state): State<AppState>,
    Json(request): Json<CreateTournamentRequest>,
) -> impl IntoResponse {
    if request.table_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "table_id is required").into_response();
    }
    tracing::info!(
        "creating sit-and-go for table {} (organizer {})",
        request.table_id,
        request.organizer
    );
    match state
        .tournaments
        .create_sit_and_go(&request.table_id, "4-Player Sit & Go")
        .await
    {
        Ok(tournament) => Json(json!({
            "success": true,
            "tournament": tournament,
        }))
        .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}
