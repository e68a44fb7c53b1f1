//! OpenRouter chat-completions client (OpenAI-compatible wire format).
//!
//! Free-tier models behind OpenRouter do not reliably support
//! `response_format`, so the request carries none and the structurer strips
//! code fences from the answer instead. A `models` fallback list lets the
//! router move to another free model when the primary one is saturated.

use super::{check_status, http_client, join_url, status_error};
use crate::error::PlanError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const PROVIDER: &str = "openrouter";
const APP_TITLE: &str = "edgequake-plan2json";

/// Authenticated OpenRouter client.
#[derive(Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, PlanError> {
        Ok(Self {
            http: http_client(PROVIDER, timeout_secs)?,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, PlanError> {
        let response = self
            .http
            .post(join_url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .header("X-Title", APP_TITLE)
            .json(request)
            .send()
            .await
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;

        let body: ChatResponse = check_status(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;

        // Upstream provider failures can arrive as HTTP 200 with an error object.
        if let Some(ref err) = body.error {
            let status = err
                .code
                .and_then(|c| u16::try_from(c).ok())
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let raw = serde_json::json!({ "error": { "message": err.message } }).to_string();
            return Err(status_error(PROVIDER, status, &raw, None));
        }

        Ok(body)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    /// Router fallbacks, tried in order after `model`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// A single user message containing `prompt`.
    pub fn user_prompt(model: &str, fallbacks: &[String], prompt: &str, temperature: Option<f32>) -> Self {
        Self {
            model: model.to_string(),
            models: fallbacks.iter().filter(|m| m.as_str() != model).cloned().collect(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
    pub error: Option<ErrorBody>,
}

impl ChatResponse {
    /// Content of the first choice, if non-empty.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: Option<ChatMessage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_drops_primary_from_fallbacks() {
        let fallbacks = vec!["a:free".to_string(), "b:free".to_string()];
        let req = ChatRequest::user_prompt("a:free", &fallbacks, "hello", None);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "a:free");
        assert_eq!(v["models"], serde_json::json!(["b:free"]));
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "hello");
        assert!(v.get("temperature").is_none());
    }

    #[test]
    fn request_omits_empty_fallbacks() {
        let req = ChatRequest::user_prompt("a:free", &[], "hello", Some(0.0));
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("models").is_none());
        assert_eq!(v["temperature"], 0.0);
    }

    #[test]
    fn response_text_and_usage() {
        let body = r#"{
            "id": "gen-1",
            "model": "meta-llama/llama-3.3-70b-instruct:free",
            "choices": [{"message": {"role": "assistant", "content": "```json\n{}\n```"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 30, "total_tokens": 930}
        }"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.text(), Some("```json\n{}\n```"));
        assert_eq!(resp.usage.unwrap().completion_tokens, Some(30));
    }

    #[test]
    fn blank_content_counts_as_no_text() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "  "}}]}"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(resp.text().is_none());
    }

    #[test]
    fn error_body_parses() {
        let body = r#"{"error": {"message": "Provider returned error", "code": 429}}"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, Some(429));
        assert_eq!(err.message, "Provider returned error");
    }
}
