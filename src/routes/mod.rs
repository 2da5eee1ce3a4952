//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers); adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/parse", post(http::http_post_parse))
        .route("/api/v1/quiz", post(http::http_post_quiz))
        .route("/api/v1/quiz/:id", get(http::http_get_quiz).delete(http::http_delete_quiz))
        .route("/api/v1/quiz/:id/select", post(http::http_post_select))
        .route("/api/v1/quiz/:id/check", post(http::http_post_check))
        .route("/api/v1/quiz/:id/advance", post(http::http_post_advance))
        .route("/api/v1/quiz/:id/complete", post(http::http_post_complete))
        .route("/api/v1/quiz/:id/retake", post(http::http_post_retake))
        .route("/api/v1/quiz/:id/result", get(http::http_get_result))
        // State + HTTP tracing + CORS
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
