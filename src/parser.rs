//! Question parser: turns one assistant reply into an ordered list of multiple-choice questions.
//!
//! Recognized shape:
//!
//! ```text
//! **Question 1:** What is the capital of France?
//! - A. Berlin
//! - B. Paris
//! ```
//!
//! Blocks run from one `**Question N:**` marker (case-insensitive) to the next marker or the end
//! of the text. A block without a single usable option is narrative, not a question, and is
//! dropped. Output order is block order; marker numbers are kept verbatim and never reordered
//! or deduplicated.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::domain::{Question, QuizOption};

static MARKER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\*\*Question\s+(\d+):\*\*").expect("marker pattern"));

/// Any single uppercase letter counts when collecting options.
static OPTION_LINE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^-?\s*([A-Z])\.(.*)$").expect("option pattern"));

/// Only A-D lines are skipped when looking for the prompt line.
static PROMPT_SKIP: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^-?\s*[A-D]\.").expect("prompt-skip pattern"));

/// Parse `raw` into questions. Never fails: marker-free or option-free text yields `[]`,
/// which callers treat as "not a quiz".
#[instrument(level = "debug", skip(raw), fields(raw_len = raw.len()))]
pub fn parse(raw: &str) -> Vec<Question> {
  let markers: Vec<(usize, usize, &str)> = MARKER
    .captures_iter(raw)
    .filter_map(|c| {
      let whole = c.get(0)?;
      let num = c.get(1)?;
      Some((whole.start(), whole.end(), num.as_str()))
    })
    .collect();

  let mut out = Vec::with_capacity(markers.len());
  for (i, (_, body_start, num)) in markers.iter().enumerate() {
    let body_end = markers.get(i + 1).map(|m| m.0).unwrap_or(raw.len());
    let Ok(number) = num.parse::<u32>() else {
      debug!(target: "quiz_parser", number = %num, "Question number out of range; block dropped");
      continue;
    };
    match parse_block(number, &raw[*body_start..body_end]) {
      Some(q) => out.push(q),
      None => debug!(target: "quiz_parser", number, "Block without options dropped"),
    }
  }
  out
}

fn parse_block(number: u32, body: &str) -> Option<Question> {
  let lines: Vec<&str> = body.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

  let prompt = lines
    .iter()
    .find(|l| !PROMPT_SKIP.is_match(l))
    .map(|l| l.to_string())
    .unwrap_or_default();

  let options: Vec<QuizOption> = lines
    .iter()
    .filter_map(|l| option_from_line(l))
    .collect();

  if options.is_empty() {
    return None;
  }
  Some(Question { number, prompt, options })
}

fn option_from_line(line: &str) -> Option<QuizOption> {
  let caps = OPTION_LINE.captures(line)?;
  let letter = caps.get(1)?.as_str().chars().next()?;
  let text = caps.get(2)?.as_str().trim();
  if text.is_empty() {
    return None;
  }
  Some(QuizOption { letter, text: text.to_string() })
}
