//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/auth", post(http::http_post_auth))
        .route("/api/v1/logout", post(http::http_post_logout))
        .route("/api/v1/session", get(http::http_get_session))
        .route("/api/v1/onboarding", post(http::http_post_onboarding))
        .route("/api/v1/profile", get(http::http_get_profile).put(http::http_put_profile))
        .route("/api/v1/profile/avatar", post(http::http_post_avatar))
        .route("/api/v1/roadmap", get(http::http_get_roadmap))
        .route("/api/v1/lesson", get(http::http_get_lesson))
        .route("/api/v1/lesson/enter", post(http::http_post_enter))
        .route("/api/v1/lesson/retry", post(http::http_post_retry))
        .route("/api/v1/lesson/answer", post(http::http_post_answer))
        .route("/api/v1/lesson/next", post(http::http_post_next))
        .route("/api/v1/lesson/exit", post(http::http_post_exit))
        .route("/api/v1/leaderboard", get(http::http_get_leaderboard))
        .route("/api/v1/speech", post(http::http_post_speech))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
