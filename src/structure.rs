//! Structurer: Markdown handoff file → structured JSON.
//!
//! Two providers answer the same prompt behind [`StructuringBackend`]:
//!
//! | Backend | Key | Response mode |
//! |---------|-----|---------------|
//! | [`GeminiBackend`] | `GOOGLE_API_KEY` | native JSON (`responseMimeType`) |
//! | [`OpenRouterBackend`] | `OPENROUTER_API_KEY` | free text, fences stripped |
//!
//! [`structure_file`] is the whole step: read, prompt, one completion, clean,
//! parse, write. The output is only written once the response has parsed, so
//! a bad answer never replaces a previous `final_data.json`.

use crate::config::{ApiKeys, Provider, StructureConfig};
use crate::error::PlanError;
use crate::output::{write_atomic, StructureReport, StructuredResult};
use crate::pipeline::postprocess::{clean_fenced_json, parse_json};
use crate::prompts::structuring_prompt;
use crate::providers::gemini::{GeminiClient, GenerateContentRequest, GenerationConfig};
use crate::providers::openrouter::{ChatRequest, OpenRouterClient};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How far a backend's text can be trusted to be bare JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// The provider enforces JSON output; parse as-is.
    NativeJson,
    /// The model may wrap its answer in code fences; strip them first.
    FencedText,
}

/// Text and accounting from one completion call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Model that answered, when the provider reports it.
    pub model: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// One prompt in, one answer out.
#[async_trait]
pub trait StructuringBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Model requested from the provider.
    fn model(&self) -> &str;

    fn response_mode(&self) -> ResponseMode;

    async fn complete(&self, prompt: &str) -> Result<Completion, PlanError>;
}

// ── Gemini ───────────────────────────────────────────────────────────────

/// Gemini `generateContent` with `responseMimeType = application/json`.
pub struct GeminiBackend {
    client: GeminiClient,
    model: String,
    temperature: Option<f32>,
}

impl GeminiBackend {
    pub fn new(client: GeminiClient, model: impl Into<String>, temperature: Option<f32>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl StructuringBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn response_mode(&self) -> ResponseMode {
        ResponseMode::NativeJson
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, PlanError> {
        let request = GenerateContentRequest::user_prompt(
            prompt,
            Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                temperature: self.temperature,
            }),
        );
        let response = self.client.generate_content(&self.model, &request).await?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(PlanError::ApiError {
                provider: "gemini",
                status: 200,
                message: format!("prompt blocked: {reason}"),
            });
        }
        if let Some(reason) = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|r| *r != "STOP")
        {
            warn!("Gemini finished with {}; output may be truncated", reason);
        }

        let text = response
            .text()
            .ok_or(PlanError::EmptyResponse { provider: "gemini" })?;
        let usage = response.usage_metadata.as_ref();
        Ok(Completion {
            text,
            model: response.model_version.clone(),
            input_tokens: usage.and_then(|u| u.prompt_token_count),
            output_tokens: usage.and_then(|u| u.candidates_token_count),
        })
    }
}

// ── OpenRouter ───────────────────────────────────────────────────────────

/// OpenRouter chat completions against free-tier models.
pub struct OpenRouterBackend {
    client: OpenRouterClient,
    model: String,
    fallback_models: Vec<String>,
    temperature: Option<f32>,
}

impl OpenRouterBackend {
    pub fn new(
        client: OpenRouterClient,
        model: impl Into<String>,
        fallback_models: Vec<String>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            fallback_models,
            temperature,
        }
    }
}

#[async_trait]
impl StructuringBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn response_mode(&self) -> ResponseMode {
        ResponseMode::FencedText
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, PlanError> {
        let request =
            ChatRequest::user_prompt(&self.model, &self.fallback_models, prompt, self.temperature);
        let response = self.client.chat_completion(&request).await?;

        let text = response
            .text()
            .ok_or(PlanError::EmptyResponse {
                provider: "openrouter",
            })?
            .to_string();
        let usage = response.usage.as_ref();
        Ok(Completion {
            text,
            model: response.model.clone(),
            input_tokens: usage.and_then(|u| u.prompt_tokens),
            output_tokens: usage.and_then(|u| u.completion_tokens),
        })
    }
}

// ── Construction ─────────────────────────────────────────────────────────

/// Build the configured backend.
///
/// Only the selected provider's key is required; a missing key fails here,
/// before any client exists.
pub fn backend_from_keys(
    keys: &ApiKeys,
    config: &StructureConfig,
) -> Result<Arc<dyn StructuringBackend>, PlanError> {
    let model = config.effective_model().to_string();
    match config.provider {
        Provider::Gemini => {
            let mut client = GeminiClient::new(keys.google()?, config.api_timeout_secs)?;
            if let Some(ref url) = config.base_url {
                client = client.with_base_url(url.clone());
            }
            Ok(Arc::new(GeminiBackend::new(client, model, config.temperature)))
        }
        Provider::OpenRouter => {
            let mut client = OpenRouterClient::new(keys.openrouter()?, config.api_timeout_secs)?;
            if let Some(ref url) = config.base_url {
                client = client.with_base_url(url.clone());
            }
            Ok(Arc::new(OpenRouterBackend::new(
                client,
                model,
                config.fallback_models.clone(),
                config.temperature,
            )))
        }
    }
}

// ── Operation ────────────────────────────────────────────────────────────

/// Clean `text` per `mode` and parse it.
pub fn parse_response(text: &str, mode: ResponseMode) -> Result<StructuredResult, PlanError> {
    let value = match mode {
        ResponseMode::NativeJson => parse_json(text)?,
        ResponseMode::FencedText => parse_json(&clean_fenced_json(text))?,
    };
    Ok(StructuredResult(value))
}

/// Run the structuring step end to end.
///
/// # Errors
/// - [`PlanError::MarkdownNotFound`] if the input is missing (no backend call)
/// - any backend error, unchanged
/// - [`PlanError::InvalidJson`] if the answer does not parse (nothing written)
pub async fn structure_file(
    backend: &dyn StructuringBackend,
    config: &StructureConfig,
) -> Result<StructureReport, PlanError> {
    let start = Instant::now();
    let markdown = read_markdown(config).await?;
    debug!("Read {} chars from {}", markdown.len(), config.input_path.display());

    let prompt = structuring_prompt(&markdown);
    info!(
        "Sending {} chars to {} ({})",
        prompt.len(),
        backend.name(),
        backend.model()
    );

    let completion = backend.complete(&prompt).await?;
    let result = parse_response(&completion.text, backend.response_mode())?;

    let json = result.to_pretty_json()?;
    write_atomic(&config.output_path, json).await?;
    info!("Structured data written to {}", config.output_path.display());

    Ok(StructureReport {
        output_path: config.output_path.clone(),
        provider: backend.name().to_string(),
        model: completion
            .model
            .unwrap_or_else(|| backend.model().to_string()),
        preview: result.drawings_preview(config.preview_items),
        result,
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

async fn read_markdown(config: &StructureConfig) -> Result<String, PlanError> {
    match tokio::fs::read_to_string(&config.input_path).await {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PlanError::MarkdownNotFound {
            path: config.input_path.clone(),
        }),
        Err(source) => Err(PlanError::ReadFailed {
            path: config.input_path.clone(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn native_mode_does_not_strip_fences() {
        assert!(parse_response("```json\n{}\n```", ResponseMode::NativeJson).is_err());
        assert!(parse_response("{}", ResponseMode::NativeJson).is_ok());
    }

    #[test]
    fn fenced_mode_strips_fences() {
        let r = parse_response("```json\n{\"summary\": \"x\"}\n```", ResponseMode::FencedText).unwrap();
        assert_eq!(r.summary(), Some("x"));
    }

    #[test]
    fn backend_requires_selected_provider_key_only() {
        let map: HashMap<&str, &str> = [("OPENROUTER_API_KEY", "sk-or-1")].into_iter().collect();
        let keys = ApiKeys::from_lookup(|v| map.get(v).map(|s| s.to_string()));

        let gemini = StructureConfig::default();
        let err = backend_from_keys(&keys, &gemini).err().unwrap();
        assert!(matches!(err, PlanError::MissingApiKey { var: "GOOGLE_API_KEY" }));

        let openrouter = StructureConfig::builder()
            .provider(Provider::OpenRouter)
            .build()
            .unwrap();
        let backend = backend_from_keys(&keys, &openrouter).unwrap();
        assert_eq!(backend.name(), "openrouter");
        assert_eq!(backend.response_mode(), ResponseMode::FencedText);
        assert_eq!(backend.model(), crate::config::DEFAULT_OPENROUTER_MODEL);
    }

    #[test]
    fn openrouter_requires_its_key() {
        let keys = ApiKeys::from_lookup(|_| Some("x".into()));
        let keys_without = ApiKeys::from_lookup(|v| (v != "OPENROUTER_API_KEY").then(|| "x".into()));
        let config = StructureConfig::builder()
            .provider(Provider::OpenRouter)
            .build()
            .unwrap();
        assert!(backend_from_keys(&keys, &config).is_ok());
        let err = backend_from_keys(&keys_without, &config).err().unwrap();
        assert!(matches!(err, PlanError::MissingApiKey { var: "OPENROUTER_API_KEY" }));
    }

    #[test]
    fn gemini_backend_is_native_json() {
        let keys = ApiKeys::from_lookup(|_| Some("g".into()));
        let backend = backend_from_keys(&keys, &StructureConfig::default()).unwrap();
        assert_eq!(backend.response_mode(), ResponseMode::NativeJson);
        assert_eq!(backend.model(), crate::config::DEFAULT_GEMINI_MODEL);
    }
}
