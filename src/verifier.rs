//! Answer verification: compose a check prompt, ask the oracle, classify its prose reply.
//!
//! Classification is a heuristic over free text and lives in `classify_reply` so it can be
//! replaced by a structured-output contract without touching the session logic.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{Feedback, Question};
use crate::error::OracleError;
use crate::oracle::Oracle;
use crate::util::{fill_template, trunc_for_log};

static LABEL_YES: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\*\*is correct:\*\*\s*(yes|correct)").expect("yes pattern"));
static LABEL_NO: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\*\*is correct:\*\*\s*(no|incorrect)").expect("no pattern"));

/// Decide correctness from an oracle reply.
///
/// 1. `**Is Correct:** yes|correct` means correct, unless a `**Is Correct:** no|incorrect`
///    label is also present; the negative label always wins.
/// 2. Without a label: correct if the reply mentions "yes", or mentions "correct" without
///    "incorrect" (case-insensitive).
///
/// Known weakness, kept as is: "this is correct, not incorrect" is classified incorrect, and
/// "**Is Correct:** Not quite" reads as a negative label.
pub fn classify_reply(reply: &str) -> bool {
  let yes = LABEL_YES.is_match(reply);
  let no = LABEL_NO.is_match(reply);
  if no {
    return false;
  }
  if yes {
    return true;
  }
  let lower = reply.to_lowercase();
  lower.contains("yes") || (lower.contains("correct") && !lower.contains("incorrect"))
}

/// Build the verification prompt for one selected answer. The full quiz text is embedded so
/// the oracle can cross-reference other questions.
pub fn compose_prompt(template: &str, question: &Question, letter: char, source: &str) -> String {
  let number = question.number.to_string();
  let selected = letter.to_string();
  fill_template(
    template,
    &[
      ("number", number.as_str()),
      ("prompt", question.prompt.as_str()),
      ("selected", selected.as_str()),
      ("source", source),
    ],
  )
}

#[derive(Clone)]
pub struct AnswerVerifier {
  oracle: Arc<dyn Oracle>,
  template: String,
}

impl AnswerVerifier {
  pub fn new(oracle: Arc<dyn Oracle>, prompts: &Prompts) -> Self {
    Self { oracle, template: prompts.verification_user_template.clone() }
  }

  pub fn oracle_name(&self) -> &'static str {
    self.oracle.name()
  }

  /// One oracle call per invocation; the reply is stored verbatim as the explanation.
  #[instrument(level = "info", skip(self, question, source), fields(number = question.number, %letter, oracle = self.oracle.name()))]
  pub async fn verify(&self, question: &Question, letter: char, source: &str) -> Result<Feedback, OracleError> {
    let prompt = compose_prompt(&self.template, question, letter, source);
    match self.oracle.ask(&prompt).await {
      Ok(reply) => {
        let is_correct = classify_reply(&reply);
        info!(target: "quiz_verify", is_correct, reply = %trunc_for_log(&reply, 120), "Answer verified");
        Ok(Feedback { is_correct, explanation: reply })
      }
      Err(e) => {
        warn!(target: "quiz_verify", error = %e, "Verification failed");
        Err(e)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::oracle::tests::ScriptedOracle;
  use crate::session::tests::question;

  #[test]
  fn labelled_yes_is_correct() {
    assert!(classify_reply("**Is Correct:** Yes, because Paris is the capital."));
  }

  #[test]
  fn labelled_no_is_incorrect() {
    assert!(!classify_reply("**Is Correct:** No, the answer is B"));
  }

  #[test]
  fn negative_label_beats_positive_label() {
    assert!(!classify_reply("**Is Correct:** Yes\n...\n**is correct:** incorrect after all"));
  }

  #[test]
  fn fallback_yes_is_correct() {
    assert!(classify_reply("Yes that is correct"));
  }

  #[test]
  fn fallback_incorrect_is_incorrect() {
    assert!(!classify_reply("That is incorrect, sorry"));
  }

  #[test]
  fn fallback_correct_without_incorrect_is_correct() {
    assert!(classify_reply("Your choice is Correct."));
  }

  #[test]
  fn fallback_keeps_known_misclassification() {
    assert!(!classify_reply("this is correct, not incorrect"));
  }

  #[test]
  fn fallback_yes_anywhere_counts() {
    // "yes" as a substring wins even next to "incorrect".
    assert!(classify_reply("Incorrect. Eyes are not ears."));
  }

  #[test]
  fn labelled_incorrect_word_is_negative() {
    assert!(!classify_reply("**Is Correct:** Incorrect"));
  }

  #[test]
  fn prompt_embeds_question_selection_and_context() {
    let q = question(7, "ABCD");
    let p = compose_prompt(&Prompts::default().verification_user_template, &q, 'C', "FULL QUIZ");
    assert!(p.contains("**Question 7:** Prompt 7?"));
    assert!(p.contains("**Selected Answer:** C"));
    assert!(p.contains("**Is Correct:**"));
    assert!(p.ends_with("Quiz context for accuracy: FULL QUIZ"));
  }

  #[tokio::test]
  async fn verify_stores_reply_verbatim() {
    let reply = "**Is Correct:** No\n\n**Explanation:** It is *B*.";
    let oracle = Arc::new(ScriptedOracle::new(vec![Ok(reply.to_string())]));
    let v = AnswerVerifier::new(oracle.clone(), &Prompts::default());
    let fb = v.verify(&question(1, "AB"), 'A', "src").await.unwrap();
    assert!(!fb.is_correct);
    assert_eq!(fb.explanation, reply);
    assert_eq!(oracle.prompts.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn verify_propagates_oracle_failure() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Err(OracleError::Timeout)]));
    let v = AnswerVerifier::new(oracle, &Prompts::default());
    assert_eq!(v.verify(&question(1, "AB"), 'A', "src").await.unwrap_err(), OracleError::Timeout);
  }
}
