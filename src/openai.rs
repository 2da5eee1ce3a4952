//! Minimal OpenAI client used as a verification oracle.
//!
//! We only call chat.completions and request plain text.
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::OracleCfg;
use crate::error::OracleError;
use crate::oracle::Oracle;

#[derive(Clone)]
pub struct OpenAi {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  system: String,
}

impl OpenAi {
  pub fn new(api_key: String, cfg: &OracleCfg, system: String, timeout: Duration) -> Result<Self, OracleError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      api_key,
      base_url: cfg.openai_base_url.trim_end_matches('/').to_string(),
      model: cfg.openai_model.clone(),
      system,
    })
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, user), fields(model = %self.model))]
  async fn chat_plain(&self, user: &str, temperature: f32) -> Result<String, OracleError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: self.system.clone() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "quiz-engine/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(OracleError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| OracleError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    if text.is_empty() {
      return Err(OracleError::Decode("empty completion".into()));
    }
    Ok(text)
  }
}

#[async_trait]
impl Oracle for OpenAi {
  async fn ask(&self, message: &str) -> Result<String, OracleError> {
    self.chat_plain(message, 0.2).await
  }

  fn name(&self) -> &'static str { "openai" }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{http::{HeaderMap, StatusCode}, routing::post, Json, Router};
  use tokio::net::TcpListener;

  async fn serve(app: Router) -> OracleCfg {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    OracleCfg { openai_base_url: format!("http://{addr}/v1/"), ..OracleCfg::default() }
  }

  #[tokio::test]
  async fn sends_system_and_user_messages_with_bearer_key() {
    let app = Router::new().route(
      "/v1/chat/completions",
      post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "is B right?");
        Json(serde_json::json!({
          "choices": [{ "message": { "content": "  **Is Correct:** Yes  " } }],
          "usage": { "prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14 }
        }))
      }),
    );
    let cfg = serve(app).await;
    let oa = OpenAi::new("sk-test".into(), &cfg, "be strict".into(), Duration::from_secs(5)).unwrap();
    assert_eq!(oa.ask("is B right?").await.unwrap(), "**Is Correct:** Yes");
  }

  #[tokio::test]
  async fn surfaces_api_error_message() {
    let app = Router::new().route(
      "/v1/chat/completions",
      post(|| async {
        (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": { "message": "bad key" } })))
      }),
    );
    let cfg = serve(app).await;
    let oa = OpenAi::new("sk-bad".into(), &cfg, String::new(), Duration::from_secs(5)).unwrap();
    assert_eq!(
      oa.ask("x").await.unwrap_err(),
      OracleError::Status { status: 401, message: "bad key".into() }
    );
  }

  #[test]
  fn error_extraction_ignores_non_json() {
    assert_eq!(extract_openai_error("<html>"), None);
  }
}
