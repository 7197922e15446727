//! Survey Collection Backend
//!
//! - Axum HTTP API for survey responses, per-user question sets and answer sets
//! - Everything persisted as JSON files under a data root directory
//! - Optional static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   DATA_ROOT          : data directory (default ./data)
//!   STATIC_DIR         : front-end build directory (default ./static, empty disables)
//!   SERIALIZE_WRITES   : per-file write locking, true/false (default true)
//!   SURVEY_CONFIG_PATH : path to TOML config with the same keys in snake_case
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod config;
mod domain;
mod error;
mod protocol;
mod repository;
mod routes;
mod state;
mod store;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = ServerConfig::from_env();
  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

  // Shared state: repository over the flat-file store rooted at DATA_ROOT.
  let state = Arc::new(AppState::new(config).await?);

  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "survey_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "survey_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "survey_backend", error = %e, "Failed to listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "survey_backend", "Shutdown requested");
}
