//! Read-only snapshots of a session for the host surface (progress, options, feedback, results).

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::QuizResult;
use crate::score::aggregate;
use crate::session::{PositionState, Session};

/// Number of accent colors the option list cycles through.
pub const OPTION_ACCENTS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
  pub current_index: usize,
  pub total: usize,
  pub answered_positions: BTreeSet<usize>,
  pub correct_positions: BTreeSet<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
  pub letter: char,
  pub text: String,
  pub is_selected: bool,
  pub is_checked: bool,
  pub is_correct: Option<bool>,
  /// Option index modulo `OPTION_ACCENTS`.
  pub accent: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
  pub is_correct: bool,
  pub headline: &'static str,
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
  pub result: QuizResult,
  pub can_retake: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
  pub number: u32,
  pub prompt: String,
}

/// Everything a quiz surface needs to render the current state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
  pub position: usize,
  pub total: usize,
  pub completed: bool,
  pub is_last: bool,
  pub checking: bool,
  pub can_check: bool,
  pub can_advance: bool,
  pub can_complete: bool,
  pub question: QuestionView,
  pub options: Vec<OptionView>,
  pub feedback: Option<FeedbackView>,
  pub progress: ProgressView,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub results: Option<ResultsView>,
}

pub fn progress_view(s: &Session) -> ProgressView {
  ProgressView {
    current_index: s.position(),
    total: s.len(),
    answered_positions: s.selections().keys().copied().collect(),
    correct_positions: s
      .feedback_map()
      .iter()
      .filter(|(_, f)| f.is_correct)
      .map(|(i, _)| *i)
      .collect(),
  }
}

pub fn option_views(s: &Session, position: usize) -> Vec<OptionView> {
  let Some(q) = s.questions().get(position) else { return vec![] };
  let selected = s.selection(position);
  let fb = s.feedback(position);
  q.options
    .iter()
    .enumerate()
    .map(|(i, o)| OptionView {
      letter: o.letter,
      text: o.text.clone(),
      is_selected: selected == Some(o.letter),
      is_checked: fb.is_some(),
      is_correct: fb.map(|f| f.is_correct),
      accent: i % OPTION_ACCENTS,
    })
    .collect()
}

pub fn feedback_view(s: &Session, position: usize) -> Option<FeedbackView> {
  s.feedback(position).map(|f| FeedbackView {
    is_correct: f.is_correct,
    headline: if f.is_correct { "Correct!" } else { "Incorrect" },
    explanation: f.explanation.clone(),
  })
}

pub fn results_view(s: &Session) -> Option<ResultsView> {
  s.is_completed().then(|| ResultsView { result: aggregate(s), can_retake: true })
}

pub fn snapshot(s: &Session) -> SessionSnapshot {
  let pos = s.position();
  let state = s.position_state(pos);
  let current = s.current();
  let open = !s.is_completed();
  let all_checked = (0..s.len()).all(|i| s.feedback(i).is_some());
  SessionSnapshot {
    position: pos,
    total: s.len(),
    completed: s.is_completed(),
    is_last: s.is_last(),
    checking: state == PositionState::Checking,
    can_check: open && state == PositionState::Selected,
    can_advance: open && state == PositionState::Checked && !s.is_last(),
    can_complete: open && s.is_last() && all_checked,
    question: QuestionView { number: current.number, prompt: current.prompt.clone() },
    options: option_views(s, pos),
    feedback: feedback_view(s, pos),
    progress: progress_view(s),
    results: results_view(s),
  }
}
