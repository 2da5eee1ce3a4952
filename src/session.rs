//! Session state machine for one quiz.
//!
//! Per position: `Unanswered -> Selected -> (Checking) -> Checked`. Re-selecting a checked
//! position drops its feedback. `advance` and `complete` require verified answers, so a
//! quiz can never be finished with unchecked selections. Once completed the session is
//! frozen until `retake`.
//!
//! This type is a plain reducer: every method either mutates or returns a `Rejection`
//! and leaves the session unchanged. Serialized access is provided by `dispatch`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::domain::{Feedback, Question};
use crate::error::{OracleError, Rejection};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionState {
  Unanswered,
  Selected,
  Checking,
  Checked,
}

/// Everything the verifier needs for one in-flight check.
#[derive(Clone, Debug)]
pub struct CheckRequest {
  pub position: usize,
  pub question: Question,
  pub letter: char,
  pub source: Arc<str>,
}

#[derive(Debug, Clone)]
pub struct Session {
  source: Arc<str>,
  questions: Arc<[Question]>,
  position: usize,
  selections: BTreeMap<usize, char>,
  feedback: BTreeMap<usize, Feedback>,
  checking: BTreeSet<usize>,
  completed: bool,
}

impl Session {
  /// Returns `None` when `questions` is empty (the text is not a quiz).
  pub fn new(source: impl Into<Arc<str>>, questions: Vec<Question>) -> Option<Self> {
    if questions.is_empty() {
      return None;
    }
    Some(Self {
      source: source.into(),
      questions: questions.into(),
      position: 0,
      selections: BTreeMap::new(),
      feedback: BTreeMap::new(),
      checking: BTreeSet::new(),
      completed: false,
    })
  }

  pub fn questions(&self) -> &Arc<[Question]> { &self.questions }
  pub fn position(&self) -> usize { self.position }
  pub fn len(&self) -> usize { self.questions.len() }
  pub fn is_completed(&self) -> bool { self.completed }
  pub fn is_last(&self) -> bool { self.position + 1 == self.questions.len() }
  pub fn selection(&self, position: usize) -> Option<char> { self.selections.get(&position).copied() }
  pub fn feedback(&self, position: usize) -> Option<&Feedback> { self.feedback.get(&position) }
  pub fn selections(&self) -> &BTreeMap<usize, char> { &self.selections }
  pub fn feedback_map(&self) -> &BTreeMap<usize, Feedback> { &self.feedback }

  pub fn current(&self) -> &Question {
    &self.questions[self.position]
  }

  pub fn position_state(&self, position: usize) -> PositionState {
    if self.checking.contains(&position) {
      PositionState::Checking
    } else if self.feedback.contains_key(&position) {
      PositionState::Checked
    } else if self.selections.contains_key(&position) {
      PositionState::Selected
    } else {
      PositionState::Unanswered
    }
  }

  fn ensure_open(&self) -> Result<(), Rejection> {
    if self.completed { Err(Rejection::AlreadyCompleted) } else { Ok(()) }
  }

  fn ensure_in_range(&self, position: usize) -> Result<(), Rejection> {
    if position < self.questions.len() {
      Ok(())
    } else {
      Err(Rejection::PositionOutOfRange { position, total: self.questions.len() })
    }
  }

  /// Record (or overwrite) the chosen letter. Clears existing feedback for the position.
  pub fn select(&mut self, position: usize, letter: char) -> Result<(), Rejection> {
    self.ensure_open()?;
    self.ensure_in_range(position)?;
    if self.checking.contains(&position) {
      return Err(Rejection::CheckInFlight);
    }
    if !self.questions[position].has_option(letter) {
      return Err(Rejection::UnknownOption { letter });
    }
    self.selections.insert(position, letter);
    self.feedback.remove(&position);
    Ok(())
  }

  /// Move a `Selected` position into `Checking` and hand back what the verifier needs.
  pub fn begin_check(&mut self, position: usize) -> Result<CheckRequest, Rejection> {
    self.ensure_open()?;
    self.ensure_in_range(position)?;
    match self.position_state(position) {
      PositionState::Unanswered => return Err(Rejection::NoSelection),
      PositionState::Checking => return Err(Rejection::CheckInFlight),
      PositionState::Checked => return Err(Rejection::AlreadyChecked),
      PositionState::Selected => {}
    }
    let letter = self.selections[&position];
    self.checking.insert(position);
    Ok(CheckRequest {
      position,
      question: self.questions[position].clone(),
      letter,
      source: self.source.clone(),
    })
  }

  /// Apply a verification outcome. Success writes feedback (`Checked`); failure leaves the
  /// position `Selected` so the user can retry. Returns `false` when the outcome was
  /// discarded because the position was no longer being checked.
  pub fn resolve_check(
    &mut self,
    position: usize,
    letter: char,
    outcome: &Result<Feedback, OracleError>,
  ) -> bool {
    if !self.checking.remove(&position) {
      return false;
    }
    if self.selections.get(&position) != Some(&letter) {
      return false;
    }
    if let Ok(fb) = outcome {
      self.feedback.insert(position, fb.clone());
    }
    true
  }

  pub fn advance(&mut self) -> Result<(), Rejection> {
    self.ensure_open()?;
    if !self.feedback.contains_key(&self.position) {
      return Err(Rejection::NotChecked);
    }
    if self.is_last() {
      return Err(Rejection::NoNextQuestion);
    }
    self.position += 1;
    Ok(())
  }

  pub fn complete(&mut self) -> Result<(), Rejection> {
    self.ensure_open()?;
    let total = self.questions.len();
    let unanswered = (0..total).filter(|i| !self.selections.contains_key(i)).count();
    if unanswered > 0 {
      return Err(Rejection::Unanswered { count: unanswered });
    }
    let unchecked = (0..total).filter(|i| !self.feedback.contains_key(i)).count();
    if unchecked > 0 {
      return Err(Rejection::Unchecked { count: unchecked });
    }
    self.completed = true;
    Ok(())
  }

  /// Start over on the same questions.
  pub fn retake(&mut self) -> Result<(), Rejection> {
    if !self.completed {
      return Err(Rejection::NotCompleted);
    }
    self.position = 0;
    self.selections.clear();
    self.feedback.clear();
    self.checking.clear();
    self.completed = false;
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::domain::QuizOption;

  pub(crate) fn question(number: u32, letters: &str) -> Question {
    Question {
      number,
      prompt: format!("Prompt {number}?"),
      options: letters
        .chars()
        .map(|letter| QuizOption { letter, text: format!("option {letter}") })
        .collect(),
    }
  }

  pub(crate) fn session(n: usize) -> Session {
    let qs = (1..=n as u32).map(|i| question(i, "ABCD")).collect();
    Session::new("quiz text", qs).unwrap()
  }

  fn fb(ok: bool) -> Result<Feedback, OracleError> {
    Ok(Feedback { is_correct: ok, explanation: if ok { "yes" } else { "no" }.into() })
  }

  fn check_ok(s: &mut Session, pos: usize, ok: bool) {
    let req = s.begin_check(pos).unwrap();
    assert!(s.resolve_check(req.position, req.letter, &fb(ok)));
  }

  #[test]
  fn empty_question_list_is_not_a_session() {
    assert!(Session::new("narrative", vec![]).is_none());
  }

  #[test]
  fn starts_at_first_position_unanswered() {
    let s = session(3);
    assert_eq!(s.position(), 0);
    assert!((0..3).all(|i| s.position_state(i) == PositionState::Unanswered));
    assert!(!s.is_completed());
  }

  #[test]
  fn check_requires_selection() {
    let mut s = session(2);
    assert_eq!(s.begin_check(0).unwrap_err(), Rejection::NoSelection);
  }

  #[test]
  fn select_overwrites_previous_choice() {
    let mut s = session(1);
    s.select(0, 'A').unwrap();
    s.select(0, 'C').unwrap();
    assert_eq!(s.selection(0), Some('C'));
    assert_eq!(s.selections().len(), 1);
  }

  #[test]
  fn select_rejects_unknown_letters_and_positions() {
    let mut s = session(1);
    assert_eq!(s.select(0, 'Z').unwrap_err(), Rejection::UnknownOption { letter: 'Z' });
    assert_eq!(
      s.select(4, 'A').unwrap_err(),
      Rejection::PositionOutOfRange { position: 4, total: 1 }
    );
    assert_eq!(s.selection(0), None);
  }

  #[test]
  fn checking_blocks_select_and_recheck() {
    let mut s = session(2);
    s.select(0, 'A').unwrap();
    s.begin_check(0).unwrap();
    assert_eq!(s.position_state(0), PositionState::Checking);
    assert_eq!(s.select(0, 'B').unwrap_err(), Rejection::CheckInFlight);
    assert_eq!(s.begin_check(0).unwrap_err(), Rejection::CheckInFlight);
    // Other positions stay usable.
    s.select(1, 'B').unwrap();
    s.begin_check(1).unwrap();
    assert_eq!(s.position_state(1), PositionState::Checking);
  }

  #[test]
  fn successful_check_marks_checked() {
    let mut s = session(1);
    s.select(0, 'B').unwrap();
    check_ok(&mut s, 0, true);
    assert_eq!(s.position_state(0), PositionState::Checked);
    assert!(s.feedback(0).unwrap().is_correct);
    assert_eq!(s.begin_check(0).unwrap_err(), Rejection::AlreadyChecked);
  }

  #[test]
  fn failed_check_reverts_to_selected() {
    let mut s = session(1);
    s.select(0, 'B').unwrap();
    let req = s.begin_check(0).unwrap();
    assert!(s.resolve_check(req.position, req.letter, &Err(OracleError::Timeout)));
    assert_eq!(s.position_state(0), PositionState::Selected);
    assert!(s.feedback(0).is_none());
    // Retry is allowed.
    assert!(s.begin_check(0).is_ok());
  }

  #[test]
  fn stale_resolution_is_discarded() {
    let mut s = session(1);
    s.select(0, 'A').unwrap();
    assert!(!s.resolve_check(0, 'A', &fb(true)));
    assert!(s.feedback(0).is_none());
  }

  #[test]
  fn reselect_after_check_clears_feedback() {
    let mut s = session(2);
    s.select(0, 'A').unwrap();
    check_ok(&mut s, 0, true);
    s.select(0, 'D').unwrap();
    assert!(s.feedback(0).is_none());
    assert_eq!(s.position_state(0), PositionState::Selected);
    assert_eq!(s.advance().unwrap_err(), Rejection::NotChecked);
  }

  #[test]
  fn advance_requires_check_and_stops_at_last() {
    let mut s = session(2);
    assert_eq!(s.advance().unwrap_err(), Rejection::NotChecked);
    s.select(0, 'A').unwrap();
    assert_eq!(s.advance().unwrap_err(), Rejection::NotChecked);
    check_ok(&mut s, 0, false);
    s.advance().unwrap();
    assert_eq!(s.position(), 1);
    assert!(s.is_last());
    s.select(1, 'A').unwrap();
    check_ok(&mut s, 1, false);
    assert_eq!(s.advance().unwrap_err(), Rejection::NoNextQuestion);
    assert_eq!(s.position(), 1);
  }

  #[test]
  fn complete_reports_unanswered_count_first() {
    let mut s = session(3);
    s.select(0, 'A').unwrap();
    assert_eq!(s.complete().unwrap_err(), Rejection::Unanswered { count: 2 });
    s.select(1, 'A').unwrap();
    s.select(2, 'A').unwrap();
    check_ok(&mut s, 0, true);
    assert_eq!(s.complete().unwrap_err(), Rejection::Unchecked { count: 2 });
    assert!(!s.is_completed());
  }

  #[test]
  fn complete_only_with_feedback_everywhere() {
    let mut s = session(3);
    for i in 0..3 {
      s.select(i, 'B').unwrap();
      check_ok(&mut s, i, i % 2 == 0);
    }
    s.complete().unwrap();
    assert!(s.is_completed());
    assert!((0..3).all(|i| s.feedback(i).is_some()));
  }

  #[test]
  fn completed_session_is_frozen_until_retake() {
    let mut s = session(1);
    s.select(0, 'A').unwrap();
    check_ok(&mut s, 0, true);
    s.complete().unwrap();
    assert_eq!(s.select(0, 'B').unwrap_err(), Rejection::AlreadyCompleted);
    assert_eq!(s.complete().unwrap_err(), Rejection::AlreadyCompleted);
    assert_eq!(s.begin_check(0).unwrap_err(), Rejection::AlreadyCompleted);
  }

  #[test]
  fn retake_resets_but_keeps_questions() {
    let mut s = session(2);
    assert_eq!(s.retake().unwrap_err(), Rejection::NotCompleted);
    let before = s.questions().clone();
    for i in 0..2 {
      s.select(i, 'C').unwrap();
      check_ok(&mut s, i, true);
      if i == 0 {
        s.advance().unwrap();
      }
    }
    s.complete().unwrap();
    s.retake().unwrap();
    assert!(Arc::ptr_eq(&before, s.questions()));
    assert!(s.selections().is_empty());
    assert!(s.feedback_map().is_empty());
    assert_eq!(s.position(), 0);
    assert!(!s.is_completed());
  }
}
