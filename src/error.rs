//! Error types for the quiz engine.
//!
//! `Rejection` is a validation failure of a user intent; its `Display` text is the notice shown
//! to the user. `OracleError` covers verification calls. `StoreError` covers session lookup.

use thiserror::Error;

/// An intent whose precondition is not met. The session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
  #[error("Question position {position} does not exist (the quiz has {total} questions).")]
  PositionOutOfRange { position: usize, total: usize },

  #[error("Option {letter} is not one of this question's choices.")]
  UnknownOption { letter: char },

  #[error("Please select an answer before checking.")]
  NoSelection,

  #[error("This answer has already been checked.")]
  AlreadyChecked,

  #[error("This answer is still being checked.")]
  CheckInFlight,

  #[error("Check your answer before moving on.")]
  NotChecked,

  #[error("This is the last question; complete the quiz instead.")]
  NoNextQuestion,

  #[error("Please answer all questions! {count} remaining.")]
  Unanswered { count: usize },

  #[error("Please check all your answers before completing!")]
  Unchecked { count: usize },

  #[error("The quiz is already completed; retake it to answer again.")]
  AlreadyCompleted,

  #[error("The quiz is not completed yet.")]
  NotCompleted,
}

/// Failure talking to the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
  #[error("no oracle configured")]
  Unavailable,

  #[error("oracle request timed out")]
  Timeout,

  #[error("oracle transport error: {0}")]
  Transport(String),

  #[error("oracle HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("oracle reply could not be decoded: {0}")]
  Decode(String),
}

impl From<reqwest::Error> for OracleError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      OracleError::Timeout
    } else if e.is_decode() {
      OracleError::Decode(e.to_string())
    } else {
      OracleError::Transport(e.to_string())
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  #[error("Unknown quiz session: {0}")]
  UnknownSession(String),

  #[error("Quiz session {0} is closed")]
  SessionClosed(String),
}
