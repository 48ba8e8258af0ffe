//! Multi-table hold'em server.
//!
//! One actor per table serializes game state; the hub fans updates out to
//! WebSocket clients and bridges replicas over Redis pub/sub.

use std::sync::Arc;

use anyhow::Error;
use pico_args::Arguments;

use holdem_core::table::{TableConfig, TableManager};
use holdem_core::tournament::TournamentManager;

use hh_server::config::ServerConfig;
use hh_server::hub::Hub;
use hh_server::store::{MemoryStore, RedisStore, Store};
use hh_server::{api, logging};

const HELP: &str = "\
Run a multi-table hold'em WebSocket server

USAGE:
  hh_server [OPTIONS]

OPTIONS:
  --port       PORT     HTTP listen port        [default: env HTTP_PORT or 8080]
  --redis      ADDR     Redis host:port         [default: env REDIS_ADDR or localhost:6379]
  --static-dir DIR      Frontend directory      [default: env STATIC_DIR or ./web]

FLAGS:
  -h, --help            Print help information

ENVIRONMENT:
  HTTP_PORT             HTTP listen port
  REDIS_ADDR            Redis address (host:port)
  REDIS_PASS            Redis password
  REDIS_DB              Redis database index
  STATIC_DIR            Static file directory
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // dotenvy does not override variables that are already set.
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    logging::init();

    let mut config = ServerConfig::from_env();
    if let Ok(port) = pargs.value_from_str::<_, String>("--port") {
        config.http_port = port;
    }
    if let Ok(addr) = pargs.value_from_str::<_, String>("--redis") {
        config.redis_addr = addr;
    }
    if let Ok(dir) = pargs.value_from_str::<_, String>("--static-dir") {
        config.static_dir = dir;
    }

    tracing::info!(
        "redis target {} (db {})",
        config.redis_addr,
        config.redis_db
    );

    let store: Arc<dyn Store> = match RedisStore::connect(&config.redis_url()).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::warn!(
                "redis unavailable ({err}); falling back to in-process fan-out"
            );
            Arc::new(MemoryStore::new())
        }
    };

    let tables = TableManager::new(TableConfig::default());
    let tournaments = TournamentManager::new(tables.clone());
    let hub = Hub::new(store, tables.clone());

    let state = api::AppState {
        hub,
        tables,
        tournaments,
    };
    let app = api::create_router(state, &config.static_dir);

    let bind = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {bind}: {e}"))?;

    tracing::info!("listening on {bind}");
    tracing::info!("websocket endpoint: ws://localhost:{}/ws/{{tableId}}", config.http_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    tracing::info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
}
