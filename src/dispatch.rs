//! Single-writer command queue for live sessions.
//!
//! Every session is owned by one task. Intents arrive over an mpsc channel and are applied in
//! order. A `check` does not block the queue: the oracle call runs on its own task and its
//! result comes back through the same channel as a `Resolve` command. The verification task
//! only holds a weak sender, so once the session is dropped a late result has nowhere to go
//! and is discarded.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::Feedback;
use crate::error::{OracleError, StoreError};
use crate::session::{CheckRequest, Session};
use crate::verifier::AnswerVerifier;
use crate::views::{results_view, snapshot, ResultsView, SessionSnapshot};

pub const CHECK_FAILED_NOTICE: &str = "Could not check your answer, please try again.";

/// User intents accepted by a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
  Select { position: usize, letter: char },
  Check { position: usize },
  Advance,
  Complete,
  Retake,
}

impl Intent {
  fn name(&self) -> &'static str {
    match self {
      Intent::Select { .. } => "select",
      Intent::Check { .. } => "check",
      Intent::Advance => "advance",
      Intent::Complete => "complete",
      Intent::Retake => "retake",
    }
  }
}

/// Reply to one intent: whether it was applied, an advisory notice if not, and the state after.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentOutcome {
  pub accepted: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notice: Option<String>,
  pub snapshot: SessionSnapshot,
}

enum Command {
  Intent { intent: Intent, reply: oneshot::Sender<IntentOutcome> },
  Snapshot { reply: oneshot::Sender<SessionSnapshot> },
  Results { reply: oneshot::Sender<Option<ResultsView>> },
  Resolve {
    position: usize,
    letter: char,
    outcome: Result<Feedback, OracleError>,
    reply: oneshot::Sender<IntentOutcome>,
  },
}

#[derive(Clone, Debug)]
pub struct SessionHandle {
  id: Uuid,
  tx: mpsc::Sender<Command>,
}

impl SessionHandle {
  /// Spawn the owning task for `session`.
  pub fn spawn(id: Uuid, session: Session, verifier: AnswerVerifier, queue_depth: usize) -> Self {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let worker = Worker { id, session, verifier, tx: tx.downgrade() };
    tokio::spawn(worker.run(rx));
    Self { id, tx }
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub async fn intent(&self, intent: Intent) -> Result<IntentOutcome, StoreError> {
    let (reply, rx) = oneshot::channel();
    self.request(Command::Intent { intent, reply }, rx).await
  }

  pub async fn snapshot(&self) -> Result<SessionSnapshot, StoreError> {
    let (reply, rx) = oneshot::channel();
    self.request(Command::Snapshot { reply }, rx).await
  }

  /// `None` until the session is completed.
  pub async fn results(&self) -> Result<Option<ResultsView>, StoreError> {
    let (reply, rx) = oneshot::channel();
    self.request(Command::Results { reply }, rx).await
  }

  async fn request<T>(&self, cmd: Command, rx: oneshot::Receiver<T>) -> Result<T, StoreError> {
    let closed = || StoreError::SessionClosed(self.id.to_string());
    self.tx.send(cmd).await.map_err(|_| closed())?;
    rx.await.map_err(|_| closed())
  }
}

struct Worker {
  id: Uuid,
  session: Session,
  verifier: AnswerVerifier,
  tx: mpsc::WeakSender<Command>,
}

impl Worker {
  #[instrument(level = "debug", name = "session_worker", skip_all, fields(session = %self.id))]
  async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
    debug!(target: "quiz_session", "Session worker started");
    while let Some(cmd) = rx.recv().await {
      match cmd {
        Command::Intent { intent, reply } => self.apply(intent, reply),
        Command::Snapshot { reply } => {
          let _ = reply.send(snapshot(&self.session));
        }
        Command::Results { reply } => {
          let _ = reply.send(results_view(&self.session));
        }
        Command::Resolve { position, letter, outcome, reply } => {
          let applied = self.session.resolve_check(position, letter, &outcome);
          let notice = match (&outcome, applied) {
            (_, false) => Some("This check is no longer relevant.".to_string()),
            (Err(_), true) => Some(CHECK_FAILED_NOTICE.to_string()),
            (Ok(_), true) => None,
          };
          info!(target: "quiz_session", session = %self.id, position, applied, ok = outcome.is_ok(), "Check resolved");
          let _ = reply.send(IntentOutcome {
            accepted: applied && outcome.is_ok(),
            notice,
            snapshot: snapshot(&self.session),
          });
        }
      }
    }
    debug!(target: "quiz_session", session = %self.id, "Session worker stopped");
  }

  fn apply(&mut self, intent: Intent, reply: oneshot::Sender<IntentOutcome>) {
    let name = intent.name();
    let res = match intent {
      Intent::Select { position, letter } => self.session.select(position, letter),
      Intent::Advance => self.session.advance(),
      Intent::Complete => self.session.complete(),
      Intent::Retake => self.session.retake(),
      Intent::Check { position } => match self.session.begin_check(position) {
        Ok(req) => {
          // Answered once the verification comes back.
          self.spawn_check(req, reply);
          return;
        }
        Err(e) => Err(e),
      },
    };
    let notice = match &res {
      Ok(()) => {
        info!(target: "quiz_session", session = %self.id, intent = name, "Intent applied");
        None
      }
      Err(rejection) => {
        info!(target: "quiz_session", session = %self.id, intent = name, %rejection, "Intent rejected");
        Some(rejection.to_string())
      }
    };
    let _ = reply.send(IntentOutcome { accepted: res.is_ok(), notice, snapshot: snapshot(&self.session) });
  }

  fn spawn_check(&self, req: CheckRequest, reply: oneshot::Sender<IntentOutcome>) {
    let verifier = self.verifier.clone();
    let tx = self.tx.clone();
    let id = self.id;
    tokio::spawn(async move {
      let outcome = verifier.verify(&req.question, req.letter, &req.source).await;
      let Some(tx) = tx.upgrade() else {
        warn!(target: "quiz_session", session = %id, position = req.position, "Session gone; verification result discarded");
        return;
      };
      let cmd = Command::Resolve { position: req.position, letter: req.letter, outcome, reply };
      if tx.send(cmd).await.is_err() {
        warn!(target: "quiz_session", session = %id, position = req.position, "Session gone; verification result discarded");
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;

  use crate::config::Prompts;
  use crate::domain::Grade;
  use crate::oracle::tests::{GatedOracle, ScriptedOracle};
  use crate::oracle::Oracle;
  use crate::parser::parse;

  const QUIZ: &str = "**Question 1:** 2 + 2?\n- A. 4\n- B. 5\n- C. 6\n- D. 7\n\n\
**Question 2:** Largest ocean?\n- A. Atlantic\n- B. Indian\n- C. Arctic\n- D. Pacific\n";

  fn handle_with(oracle: Arc<dyn Oracle>) -> SessionHandle {
    let session = Session::new(QUIZ, parse(QUIZ)).unwrap();
    let verifier = AnswerVerifier::new(oracle, &Prompts::default());
    SessionHandle::spawn(Uuid::new_v4(), session, verifier, 8)
  }

  #[tokio::test]
  async fn end_to_end_two_questions() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
      Ok("**Is Correct:** Yes, 2 + 2 = 4.".into()),
      Ok("**Is Correct:** No, the answer is D (Pacific).".into()),
    ]));
    let h = handle_with(oracle.clone());

    assert_eq!(h.snapshot().await.unwrap().total, 2);
    assert!(h.intent(Intent::Select { position: 0, letter: 'A' }).await.unwrap().accepted);
    let out = h.intent(Intent::Check { position: 0 }).await.unwrap();
    assert!(out.accepted);
    assert!(out.snapshot.feedback.unwrap().is_correct);
    assert!(h.intent(Intent::Advance).await.unwrap().accepted);
    assert!(h.intent(Intent::Select { position: 1, letter: 'C' }).await.unwrap().accepted);
    let out = h.intent(Intent::Check { position: 1 }).await.unwrap();
    assert!(out.accepted);
    assert!(!out.snapshot.feedback.unwrap().is_correct);
    let out = h.intent(Intent::Complete).await.unwrap();
    assert!(out.accepted);

    let results = h.results().await.unwrap().unwrap().result;
    assert_eq!(results.total_questions, 2);
    assert_eq!(results.correct_count, 1);
    assert_eq!(results.percentage, 50);
    assert_eq!(results.grade, Grade::F);

    let prompts = oracle.prompts.lock().unwrap();
    assert!(prompts[1].contains("**Selected Answer:** C"));
    assert!(prompts[1].contains("Largest ocean?"));
  }

  #[tokio::test]
  async fn rejections_carry_notices_and_leave_state() {
    let h = handle_with(Arc::new(ScriptedOracle::new(vec![])));
    let out = h.intent(Intent::Check { position: 0 }).await.unwrap();
    assert!(!out.accepted);
    assert_eq!(out.notice.as_deref(), Some("Please select an answer before checking."));
    let out = h.intent(Intent::Advance).await.unwrap();
    assert!(!out.accepted);
    assert_eq!(out.snapshot.position, 0);
    let out = h.intent(Intent::Complete).await.unwrap();
    assert_eq!(out.notice.as_deref(), Some("Please answer all questions! 2 remaining."));
    assert!(h.results().await.unwrap().is_none());
  }

  #[tokio::test]
  async fn failed_check_reverts_and_can_be_retried() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
      Err(OracleError::Status { status: 500, message: "boom".into() }),
      Ok("Yes that is correct".into()),
    ]));
    let h = handle_with(oracle);
    h.intent(Intent::Select { position: 0, letter: 'A' }).await.unwrap();
    let out = h.intent(Intent::Check { position: 0 }).await.unwrap();
    assert!(!out.accepted);
    assert_eq!(out.notice.as_deref(), Some(CHECK_FAILED_NOTICE));
    assert!(out.snapshot.can_check);
    assert!(out.snapshot.feedback.is_none());
    let out = h.intent(Intent::Check { position: 0 }).await.unwrap();
    assert!(out.accepted);
    assert!(out.snapshot.feedback.unwrap().is_correct);
  }

  #[tokio::test]
  async fn in_flight_check_blocks_its_position_only() {
    let oracle = Arc::new(GatedOracle::default());
    let h = handle_with(oracle.clone());
    h.intent(Intent::Select { position: 0, letter: 'A' }).await.unwrap();

    let pending = {
      let h = h.clone();
      tokio::spawn(async move { h.intent(Intent::Check { position: 0 }).await })
    };
    // Wait until the worker has entered the checking state.
    let mut snap = h.snapshot().await.unwrap();
    for _ in 0..50 {
      if snap.checking { break; }
      tokio::time::sleep(Duration::from_millis(5)).await;
      snap = h.snapshot().await.unwrap();
    }
    assert!(snap.checking);

    let out = h.intent(Intent::Select { position: 0, letter: 'B' }).await.unwrap();
    assert_eq!(out.notice.as_deref(), Some("This answer is still being checked."));
    let out = h.intent(Intent::Check { position: 0 }).await.unwrap();
    assert!(!out.accepted);
    // Another position is still free.
    assert!(h.intent(Intent::Select { position: 1, letter: 'D' }).await.unwrap().accepted);

    oracle.gate.notify_one();
    let out = pending.await.unwrap().unwrap();
    assert!(out.accepted);
    assert_eq!(out.snapshot.progress.correct_positions.len(), 1);
  }

  #[tokio::test]
  async fn retake_after_completion_restarts() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
      Ok("**Is Correct:** Yes".into()),
      Ok("**Is Correct:** Yes".into()),
    ]));
    let h = handle_with(oracle);
    for pos in 0..2 {
      h.intent(Intent::Select { position: pos, letter: 'A' }).await.unwrap();
      h.intent(Intent::Check { position: pos }).await.unwrap();
      if pos == 0 {
        h.intent(Intent::Advance).await.unwrap();
      }
    }
    assert!(h.intent(Intent::Complete).await.unwrap().accepted);
    assert_eq!(h.results().await.unwrap().unwrap().result.grade, Grade::A);
    let out = h.intent(Intent::Retake).await.unwrap();
    assert!(out.accepted);
    assert_eq!(out.snapshot.position, 0);
    assert!(out.snapshot.progress.answered_positions.is_empty());
    assert_eq!(out.snapshot.total, 2);
  }
}
