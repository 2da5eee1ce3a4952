//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Parsing text into questions (no session)
//!   - Starting/resuming a quiz session for a message
//!   - Forwarding intents and snapshot/result reads to the session worker

use tracing::{info, instrument};

use crate::dispatch::{Intent, IntentOutcome};
use crate::domain::Question;
use crate::error::StoreError;
use crate::parser::parse;
use crate::protocol::StartOut;
use crate::state::AppState;
use crate::views::{ResultsView, SessionSnapshot};

#[instrument(level = "info", skip(text), fields(text_len = text.len()))]
pub fn parse_text(text: &str) -> Vec<Question> {
  let questions = parse(text);
  info!(target: "quiz_engine", questions = questions.len(), "Text parsed");
  questions
}

/// Start (or resume) the quiz for `text`. Text without questions comes back as narrative.
#[instrument(level = "info", skip(state, text), fields(text_len = text.len()))]
pub async fn start_quiz(state: &AppState, text: String) -> Result<StartOut, StoreError> {
  let Some((handle, resumed)) = state.start_session(&text).await else {
    info!(target: "quiz_engine", "Not a quiz; returning narrative");
    return Ok(StartOut { is_quiz: false, text: Some(text), session_id: None, resumed: None, snapshot: None });
  };
  let snapshot = handle.snapshot().await?;
  Ok(StartOut {
    is_quiz: true,
    text: None,
    session_id: Some(handle.id().to_string()),
    resumed: Some(resumed),
    snapshot: Some(snapshot),
  })
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn run_intent(state: &AppState, session_id: &str, intent: Intent) -> Result<IntentOutcome, StoreError> {
  let handle = state.get_session(session_id).await?;
  handle.intent(intent).await
}

pub async fn get_snapshot(state: &AppState, session_id: &str) -> Result<SessionSnapshot, StoreError> {
  state.get_session(session_id).await?.snapshot().await
}

pub async fn get_results(state: &AppState, session_id: &str) -> Result<Option<ResultsView>, StoreError> {
  state.get_session(session_id).await?.results().await
}

pub async fn close_quiz(state: &AppState, session_id: &str) -> Result<(), StoreError> {
  state.close_session(session_id).await
}
