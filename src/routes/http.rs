//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; rejected intents are normal 200 replies carrying a notice.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::dispatch::Intent;
use crate::error::{Rejection, StoreError};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

fn store_error(e: StoreError) -> Response {
  let status = match e {
    StoreError::UnknownSession(_) => StatusCode::NOT_FOUND,
    StoreError::SessionClosed(_) => StatusCode::GONE,
  };
  (status, Json(ErrorOut { error: e.to_string() })).into_response()
}

fn reply<T: serde::Serialize>(res: Result<T, StoreError>) -> Response {
  match res {
    Ok(v) => Json(v).into_response(),
    Err(e) => store_error(e),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, oracle: state.verifier.oracle_name(), sessions: state.session_count().await })
}

#[instrument(level = "info", skip(body), fields(text_len = body.text.len()))]
pub async fn http_post_parse(Json(body): Json<TextIn>) -> impl IntoResponse {
  Json(ParseOut { questions: parse_text(&body.text) })
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TextIn>,
) -> Response {
  let res = start_quiz(&state, body.text).await;
  if let Ok(out) = &res {
    info!(target: "quiz_engine", is_quiz = out.is_quiz, session = ?out.session_id, "HTTP start_quiz served");
  }
  reply(res)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_quiz(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  reply(get_snapshot(&state, &id).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_quiz(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match close_quiz(&state, &id).await {
    Ok(()) => StatusCode::NO_CONTENT.into_response(),
    Err(e) => store_error(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(position = body.position, letter = %body.letter))]
pub async fn http_post_select(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<SelectIn>,
) -> Response {
  reply(run_intent(&state, &id, body.into()).await)
}

#[instrument(level = "info", skip(state, body), fields(position = body.position))]
pub async fn http_post_check(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<CheckIn>,
) -> Response {
  let res = run_intent(&state, &id, body.into()).await;
  if let Ok(out) = &res {
    info!(target: "quiz_engine", session = %id, accepted = out.accepted, "HTTP check answered");
  }
  reply(res)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_advance(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  reply(run_intent(&state, &id, Intent::Advance).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_complete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  reply(run_intent(&state, &id, Intent::Complete).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_retake(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  reply(run_intent(&state, &id, Intent::Retake).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_result(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match get_results(&state, &id).await {
    Ok(Some(view)) => Json(view).into_response(),
    Ok(None) => (StatusCode::CONFLICT, Json(ErrorOut { error: Rejection::NotCompleted.to_string() })).into_response(),
    Err(e) => store_error(e),
  }
}
