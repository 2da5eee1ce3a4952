//! Quiz Engine · interactive quizzes from assistant text
//!
//! - Parses `**Question N:**` blocks with lettered options into questions
//! - Runs one single-writer session per quiz message (select / check / advance / complete / retake)
//! - Verifies each answer through an external text-generation oracle
//! - Axum HTTP + WebSocket API
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   ORACLE_URL          : chat endpoint taking {"message"} and answering {"reply"}
//!   ORACLE_TIMEOUT_SECS : oracle request timeout (default 20)
//!   OPENAI_API_KEY      : use OpenAI as the oracle when ORACLE_URL is unset
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_MODEL        : default "gpt-4o-mini"
//!   SESSION_IDLE_TTL_SECS : evict sessions idle this long (default 1800, 0 = never)
//!   MAX_SESSIONS        : live session cap, least recently used evicted first (default 1024)
//!   QUIZ_CONFIG_PATH    : path to TOML config (prompts + oracle + sessions)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"
//!   LOG_SPANS           : "close" or "full" to log span timings

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod parser;
mod session;
mod score;
mod views;
mod oracle;
mod openai;
mod verifier;
mod dispatch;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::{spawn_sweeper, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: config, oracle-backed verifier, session registry.
  let state = Arc::new(AppState::new());
  // Idle sessions are swept in the background for as long as the state lives.
  let _sweeper = spawn_sweeper(&state);

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quiz_engine", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "quiz_engine", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "quiz_engine", error = %e, "Could not listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "quiz_engine", "Shutdown requested");
}
