//! Final scoring of a completed session.

use crate::domain::{Grade, QuizResult, ReviewEntry};
use crate::session::Session;

/// Derive the report of a completed session. Pure and idempotent.
///
/// # Panics
/// If the session is not completed. The transition graph never allows that, so it is a
/// programming error rather than a user-facing condition.
pub fn aggregate(session: &Session) -> QuizResult {
  assert!(session.is_completed(), "aggregate called on a session that is not completed");

  let review: Vec<ReviewEntry> = session
    .questions()
    .iter()
    .enumerate()
    .map(|(i, q)| {
      let fb = session.feedback(i);
      ReviewEntry {
        question_number: q.number,
        prompt_text: q.prompt.clone(),
        selected_letter: session.selection(i),
        is_correct: fb.map(|f| f.is_correct).unwrap_or(false),
        explanation: fb.map(|f| f.explanation.clone()).unwrap_or_else(|| "Not checked".into()),
      }
    })
    .collect();

  let total = review.len();
  let correct = review.iter().filter(|r| r.is_correct).count();
  let percentage = percentage(correct, total);
  let grade = Grade::from_percentage(percentage);

  QuizResult {
    total_questions: total,
    correct_count: correct,
    incorrect_count: total - correct,
    percentage,
    grade,
    grade_message: grade.message().to_string(),
    review,
  }
}

/// `round(100 * correct / total)`, halves rounded up.
fn percentage(correct: usize, total: usize) -> u32 {
  if total == 0 {
    return 0;
  }
  ((200 * correct + total) / (2 * total)) as u32
}
