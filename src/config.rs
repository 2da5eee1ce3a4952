//! Loading engine configuration (prompts + oracle settings) from TOML and the environment.
//!
//! Example file (all sections optional):
//!
//! ```toml
//! [prompts]
//! verification_user_template = "..."
//!
//! [oracle]
//! endpoint_url = "http://localhost:8080/api/chat"
//! timeout_secs = 20
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub oracle: OracleCfg,
  #[serde(default)]
  pub sessions: SessionCfg,
}

/// Prompts used when asking the oracle to verify an answer.
/// Template placeholders: `{number}`, `{prompt}`, `{selected}`, `{source}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// Only sent by oracles that take a separate system message (OpenAI).
  pub verification_system: String,
  pub verification_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      verification_system: "You are a precise quiz checker. Answer in concise Markdown.".into(),
      verification_user_template: "Check this single quiz question answer. Provide structured Markdown feedback:\n\n\
**Question {number}:** {prompt}\n\n\
**Selected Answer:** {selected}\n\n\
**Is Correct:** Yes or No (be explicit: start with \"Yes\" or \"No\")\n\n\
**Explanation:** Brief reason why it's correct or incorrect, and what the right answer is if wrong.\n\n\
Quiz context for accuracy: {source}"
        .into(),
    }
  }
}

/// Which oracle to talk to. `endpoint_url` (chat endpoint taking `{message}`) wins over
/// OpenAI when both are set.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OracleCfg {
  pub endpoint_url: Option<String>,
  pub openai_api_key: Option<String>,
  pub openai_base_url: String,
  pub openai_model: String,
  pub timeout_secs: u64,
}

impl Default for OracleCfg {
  fn default() -> Self {
    Self {
      endpoint_url: None,
      openai_api_key: None,
      openai_base_url: "https://api.openai.com/v1".into(),
      openai_model: "gpt-4o-mini".into(),
      timeout_secs: 20,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
  /// Capacity of each session's command queue.
  pub queue_depth: usize,
  /// Sessions untouched for this long are evicted by the sweeper. 0 disables idle eviction.
  pub idle_ttl_secs: u64,
  /// Upper bound on live sessions; starting one more evicts the least recently used.
  pub max_sessions: usize,
}

impl Default for SessionCfg {
  fn default() -> Self {
    Self { queue_depth: 32, idle_ttl_secs: 30 * 60, max_sessions: 1024 }
  }
}

impl SessionCfg {
  pub fn idle_ttl(&self) -> Option<Duration> {
    (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
  }
}

impl EngineConfig {
  /// File config (if any) with environment overrides applied on top.
  pub fn load() -> Self {
    let mut cfg = load_config_from_env().unwrap_or_default();
    cfg.apply_env(|k| std::env::var(k).ok());
    cfg
  }

  fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("ORACLE_URL").filter(|s| !s.is_empty()) {
      self.oracle.endpoint_url = Some(url);
    }
    if let Some(secs) = var("ORACLE_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
      self.oracle.timeout_secs = secs;
    }
    if let Some(key) = var("OPENAI_API_KEY").filter(|s| !s.is_empty()) {
      self.oracle.openai_api_key = Some(key);
    }
    if let Some(base) = var("OPENAI_BASE_URL") {
      self.oracle.openai_base_url = base;
    }
    if let Some(model) = var("OPENAI_MODEL") {
      self.oracle.openai_model = model;
    }
    if let Some(secs) = var("SESSION_IDLE_TTL_SECS").and_then(|s| s.parse::<u64>().ok()) {
      self.sessions.idle_ttl_secs = secs;
    }
    if let Some(max) = var("MAX_SESSIONS").and_then(|s| s.parse::<usize>().ok()) {
      self.sessions.max_sessions = max;
    }
  }
}

/// Attempt to load `EngineConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<EngineConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<EngineConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quiz_engine", %path, "Loaded engine config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quiz_engine", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quiz_engine", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: EngineConfig = toml::from_str(
      "[oracle]\nendpoint_url = \"http://127.0.0.1:9/api/chat\"\n",
    )
    .unwrap();
    assert_eq!(cfg.oracle.endpoint_url.as_deref(), Some("http://127.0.0.1:9/api/chat"));
    assert_eq!(cfg.oracle.timeout_secs, 20);
    assert!(cfg.prompts.verification_user_template.contains("**Is Correct:**"));
    assert_eq!(cfg.sessions.queue_depth, 32);
  }

  #[test]
  fn env_overrides_file_values() {
    let env: HashMap<&str, &str> = [
      ("ORACLE_URL", "http://oracle/api/chat"),
      ("ORACLE_TIMEOUT_SECS", "5"),
      ("OPENAI_MODEL", "gpt-4o"),
    ]
    .into_iter()
    .collect();
    let mut cfg = EngineConfig::default();
    cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));
    assert_eq!(cfg.oracle.endpoint_url.as_deref(), Some("http://oracle/api/chat"));
    assert_eq!(cfg.oracle.timeout_secs, 5);
    assert_eq!(cfg.oracle.openai_model, "gpt-4o");
    assert!(cfg.oracle.openai_api_key.is_none());
  }

  #[test]
  fn bad_timeout_is_ignored() {
    let mut cfg = EngineConfig::default();
    cfg.apply_env(|k| (k == "ORACLE_TIMEOUT_SECS").then(|| "soon".to_string()));
    assert_eq!(cfg.oracle.timeout_secs, 20);
  }

  #[test]
  fn session_limits_from_toml_and_env() {
    let mut cfg: EngineConfig = toml::from_str("[sessions]\nidle_ttl_secs = 0\n").unwrap();
    assert_eq!(cfg.sessions.idle_ttl(), None);
    assert_eq!(cfg.sessions.max_sessions, 1024);
    cfg.apply_env(|k| match k {
      "SESSION_IDLE_TTL_SECS" => Some("90".into()),
      "MAX_SESSIONS" => Some("8".into()),
      _ => None,
    });
    assert_eq!(cfg.sessions.idle_ttl(), Some(Duration::from_secs(90)));
    assert_eq!(cfg.sessions.max_sessions, 8);
  }
}
