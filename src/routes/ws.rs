//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! A `check` waits on the oracle, so it runs on its own task and its reply comes back
//! through a channel polled alongside the socket; the client keeps talking to the session
//! meanwhile. Replies to checks carry the `sessionId` so they can be matched up.
//!
//! Every quiz started or resumed over a socket is a claim on that session, released when
//! the socket goes away.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatch::Intent;
use crate::error::{Rejection, StoreError};
use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

/// Replies from checks still in flight.
const DEFERRED_REPLIES: usize = 32;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "quiz_engine", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "quiz_engine", "WebSocket connected");
  let (deferred_tx, mut deferred_rx) = mpsc::channel::<ServerWsMessage>(DEFERRED_REPLIES);
  let mut owned: Vec<String> = vec![];
  loop {
    let reply_msg = tokio::select! {
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "quiz_engine", "WS received: {:?}", &incoming);
            match handle_client_ws(incoming, &state, &mut owned, &deferred_tx).await {
              Some(reply) => reply,
              None => continue,
            }
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        },
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
        Some(Ok(_)) => continue,
      },
      Some(reply) = deferred_rx.recv() => reply,
    };

    let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });

    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "quiz_engine", error = %e, "WS send error");
      break;
    }
  }
  release_owned(&state, owned).await;
  info!(target: "quiz_engine", "WebSocket disconnected");
}

/// Give back this socket's claims; sessions nobody else holds are closed and their
/// in-flight checks resolve into nothing.
async fn release_owned(state: &AppState, owned: Vec<String>) {
  for id in owned {
    if let Err(e) = state.release_session(&id).await {
      debug!(target: "quiz_engine", session = %id, error = %e, "Session already gone at disconnect");
    }
  }
}

fn store_err(e: StoreError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

async fn intent_reply(state: &AppState, session_id: String, intent: Intent) -> ServerWsMessage {
  match run_intent(state, &session_id, intent).await {
    Ok(outcome) => ServerWsMessage::Outcome { session_id, outcome },
    Err(e) => store_err(e),
  }
}

/// Handle one client message. `None` means the reply will arrive later on `deferred`.
#[instrument(level = "info", skip(state, owned, deferred))]
async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &Arc<AppState>,
  owned: &mut Vec<String>,
  deferred: &mpsc::Sender<ServerWsMessage>,
) -> Option<ServerWsMessage> {
  let reply = match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Parse { text } => ServerWsMessage::Parsed { questions: parse_text(&text) },

    ClientWsMessage::StartQuiz { text } => match start_quiz(state, text).await {
      Ok(out) => match (out.session_id, out.snapshot) {
        (Some(session_id), Some(snapshot)) => {
          let resumed = out.resumed.unwrap_or(false);
          owned.push(session_id.clone());
          info!(target: "quiz_engine", session = %session_id, resumed, "WS quiz started");
          ServerWsMessage::Quiz { session_id, resumed, snapshot }
        }
        _ => ServerWsMessage::Narrative { text: out.text.unwrap_or_default() },
      },
      Err(e) => store_err(e),
    },

    ClientWsMessage::Snapshot { session_id } => match get_snapshot(state, &session_id).await {
      Ok(snapshot) => ServerWsMessage::Snapshot { snapshot },
      Err(e) => store_err(e),
    },

    ClientWsMessage::Select { session_id, position, letter } =>
      intent_reply(state, session_id, Intent::Select { position, letter }).await,

    ClientWsMessage::Check { session_id, position } => {
      let state = Arc::clone(state);
      let deferred = deferred.clone();
      tokio::spawn(async move {
        let reply = intent_reply(&state, session_id, Intent::Check { position }).await;
        if deferred.send(reply).await.is_err() {
          warn!(target: "quiz_engine", position, "Socket gone before check reply");
        }
      });
      return None;
    }

    ClientWsMessage::Advance { session_id } => intent_reply(state, session_id, Intent::Advance).await,

    ClientWsMessage::Complete { session_id } => intent_reply(state, session_id, Intent::Complete).await,

    ClientWsMessage::Retake { session_id } => intent_reply(state, session_id, Intent::Retake).await,

    ClientWsMessage::Results { session_id } => match get_results(state, &session_id).await {
      Ok(Some(results)) => ServerWsMessage::Results { results },
      Ok(None) => ServerWsMessage::Error { message: Rejection::NotCompleted.to_string() },
      Err(e) => store_err(e),
    },

    ClientWsMessage::CloseQuiz { session_id } => match close_quiz(state, &session_id).await {
      Ok(()) => {
        owned.retain(|id| id != &session_id);
        ServerWsMessage::Closed { session_id }
      }
      Err(e) => store_err(e),
    },
  };
  Some(reply)
}
