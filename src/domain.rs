//! Domain models used by the engine: parsed questions, verification feedback, grades and results.

use serde::{Deserialize, Serialize};

/// One answer option of a question, e.g. `B. Paris`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
  pub letter: char,
  pub text: String,
}

/// A question block recognized in assistant text.
/// `number` is copied from the source marker and is neither unique nor sequential;
/// sessions address questions by position in the parsed list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub number: u32,
  pub prompt: String,
  pub options: Vec<QuizOption>,
}

impl Question {
  pub fn has_option(&self, letter: char) -> bool {
    self.options.iter().any(|o| o.letter == letter)
  }
}

/// Outcome of verifying one selected answer. `explanation` is the oracle reply, verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
  pub is_correct: bool,
  pub explanation: String,
}

/// Letter grade bands (inclusive lower bounds 90/80/70/60).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
  A,
  B,
  C,
  D,
  F,
}

impl Grade {
  pub fn from_percentage(pct: u32) -> Self {
    match pct {
      90.. => Grade::A,
      80..=89 => Grade::B,
      70..=79 => Grade::C,
      60..=69 => Grade::D,
      _ => Grade::F,
    }
  }

  /// Short encouragement line shown next to the grade.
  pub fn message(self) -> &'static str {
    match self {
      Grade::A => "Excellent work!",
      Grade::B => "Great job, keep it up!",
      Grade::C => "Good effort, room to grow!",
      Grade::D => "Solid start, practice more!",
      Grade::F => "No worries, let's try again!",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
  pub question_number: u32,
  pub prompt_text: String,
  pub selected_letter: Option<char>,
  pub is_correct: bool,
  pub explanation: String,
}

/// Final report of a completed session. Derived, never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
  pub total_questions: usize,
  pub correct_count: usize,
  pub incorrect_count: usize,
  pub percentage: u32,
  pub grade: Grade,
  pub grade_message: String,
  pub review: Vec<ReviewEntry>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grade_bands_use_inclusive_lower_bounds() {
    assert_eq!(Grade::from_percentage(100), Grade::A);
    assert_eq!(Grade::from_percentage(90), Grade::A);
    assert_eq!(Grade::from_percentage(89), Grade::B);
    assert_eq!(Grade::from_percentage(80), Grade::B);
    assert_eq!(Grade::from_percentage(70), Grade::C);
    assert_eq!(Grade::from_percentage(60), Grade::D);
    assert_eq!(Grade::from_percentage(59), Grade::F);
    assert_eq!(Grade::from_percentage(0), Grade::F);
  }

  #[test]
  fn feedback_serializes_camel_case() {
    let fb = Feedback { is_correct: true, explanation: "ok".into() };
    let json = serde_json::to_value(&fb).unwrap();
    assert_eq!(json["isCorrect"], true);
    assert_eq!(json["explanation"], "ok");
  }
}
