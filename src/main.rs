//! AI Mentor · gamified English tutor backend
//!
//! - Axum HTTP + WebSocket API
//! - Optional OpenAI integration for lessons, grading and speech (via environment variables)
//! - Offline tutor fallback backed by a built-in lesson bank
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                     : u16 (default 3000)
//!   MENTOR_DATA_PATH         : JSON file for profiles; in-memory when unset
//!   MENTOR_CALL_TIMEOUT_SECS : bound on each generation/grading call (default 30)
//!   OPENAI_API_KEY           : enables OpenAI integration if present
//!   OPENAI_BASE_URL          : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL        : default "gpt-4o-mini" (grading)
//!   OPENAI_STRONG_MODEL      : default "gpt-4o" (lesson generation)
//!   OPENAI_TTS_MODEL         : default "gpt-4o-mini-tts"
//!   OPENAI_TTS_VOICE         : default "alloy"
//!   AGENT_CONFIG_PATH        : path to TOML config (prompts + optional leaderboard seed)
//!   LOG_LEVEL                : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT               : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod schema;
mod seeds;
mod tutor;
mod openai;
mod store;
mod roadmap;
mod controller;
mod session;
mod profile;
mod leaderboard;
mod state;
mod protocol;
mod logic;
mod routes;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::ServerSettings;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = ServerSettings::from_env();

  // Shared application state (profile store, tutor backends, live sessions).
  let state = Arc::new(AppState::from_env(&settings).await?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  let listener = TcpListener::bind(settings.addr).await?;
  info!(target: "ai_mentor", addr = %settings.addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "ai_mentor", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
