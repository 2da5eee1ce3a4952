//! The oracle: an opaque text-generation service that takes a prompt and returns prose.
//!
//! Implementations:
//!   - `ChatEndpoint`: `POST {"message": ...}` -> `{"reply": ..., "type"?, "action"?}`
//!   - `OpenAi` (see `openai.rs`): chat.completions
//!   - `Unconfigured`: every call fails, so checks surface a retry notice

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::{OracleCfg, Prompts};
use crate::error::OracleError;
use crate::openai::OpenAi;

#[async_trait]
pub trait Oracle: Send + Sync {
  /// Submit one prompt, receive the reply text.
  async fn ask(&self, message: &str) -> Result<String, OracleError>;

  fn name(&self) -> &'static str;
}

/// Pick an oracle from config: chat endpoint, then OpenAI, then none.
pub fn from_config(cfg: &OracleCfg, prompts: &Prompts) -> Arc<dyn Oracle> {
  let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
  if let Some(url) = &cfg.endpoint_url {
    match ChatEndpoint::new(url.clone(), timeout) {
      Ok(ep) => {
        info!(target: "quiz_engine", %url, timeout_secs = cfg.timeout_secs, "Chat endpoint oracle enabled.");
        return Arc::new(ep);
      }
      Err(e) => warn!(target: "quiz_engine", %url, error = %e, "Chat endpoint oracle could not be built"),
    }
  }
  if let Some(key) = &cfg.openai_api_key {
    match OpenAi::new(key.clone(), cfg, prompts.verification_system.clone(), timeout) {
      Ok(oa) => {
        info!(target: "quiz_engine", base_url = %oa.base_url, model = %oa.model, "OpenAI oracle enabled.");
        return Arc::new(oa);
      }
      Err(e) => warn!(target: "quiz_engine", error = %e, "OpenAI oracle could not be built"),
    }
  }
  info!(target: "quiz_engine", "No oracle configured (set ORACLE_URL or OPENAI_API_KEY); checks will fail.");
  Arc::new(Unconfigured)
}

pub struct Unconfigured;

#[async_trait]
impl Oracle for Unconfigured {
  async fn ask(&self, _message: &str) -> Result<String, OracleError> {
    Err(OracleError::Unavailable)
  }

  fn name(&self) -> &'static str { "unconfigured" }
}

/// Chat endpoint of the host application.
#[derive(Clone)]
pub struct ChatEndpoint {
  client: reqwest::Client,
  pub url: String,
}

#[derive(Serialize)]
struct ChatIn<'a> {
  message: &'a str,
}

#[derive(Deserialize)]
struct ChatOut {
  reply: String,
  // Used by the chat surface for rendering/navigation; irrelevant for verification.
  #[serde(default, rename = "type")]
  _kind: Option<String>,
  #[serde(default, rename = "action")]
  _action: Option<String>,
}

impl ChatEndpoint {
  pub fn new(url: String, timeout: Duration) -> Result<Self, OracleError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url })
  }
}

#[async_trait]
impl Oracle for ChatEndpoint {
  #[instrument(level = "info", skip(self, message), fields(url = %self.url, message_len = message.len()))]
  async fn ask(&self, message: &str) -> Result<String, OracleError> {
    let start = std::time::Instant::now();
    let res = self.client.post(&self.url)
      .header(USER_AGENT, "quiz-engine/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&ChatIn { message })
      .send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let message = res.text().await.unwrap_or_default();
      return Err(OracleError::Status { status, message });
    }

    let body: ChatOut = res.json().await.map_err(|e| OracleError::Decode(e.to_string()))?;
    info!(elapsed = ?start.elapsed(), reply_len = body.reply.len(), "Chat endpoint replied");
    Ok(body.reply)
  }

  fn name(&self) -> &'static str { "chat_endpoint" }
}
