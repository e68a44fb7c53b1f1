//! Model lister: which models can this key use?
//!
//! [`list_models`] fetches descriptors from a [`ModelSource`] and applies a
//! [`ModelFilter`]; [`render_model_list`] formats them for the terminal.
//! The descriptor fields are owned by the provider; nothing here interprets
//! them beyond the capability check.

use crate::config::{ApiKeys, ListConfig, ModelFilter};
use crate::error::PlanError;
use crate::providers::gemini::GeminiClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::info;

/// Capability a model needs for the structuring step.
pub const GENERATE_CONTENT: &str = "generateContent";

/// One model as advertised by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Provider identifier, e.g. `models/gemini-2.0-flash`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token_limit: Option<u64>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelDescriptor {
    pub fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods.iter().any(|m| m == method)
    }

    pub fn supports_content_generation(&self) -> bool {
        self.supports(GENERATE_CONTENT)
    }
}

/// Anything that can enumerate models.
#[async_trait]
pub trait ModelSource: Send + Sync {
    fn name(&self) -> &str;

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, PlanError>;
}

/// Gemini's `GET models` endpoint as a [`ModelSource`].
pub struct GeminiModelSource {
    client: GeminiClient,
    page_size: u32,
}

impl GeminiModelSource {
    /// Fails with [`PlanError::MissingApiKey`] before any client is built
    /// when `GOOGLE_API_KEY` is absent.
    pub fn from_keys(keys: &ApiKeys, config: &ListConfig) -> Result<Self, PlanError> {
        let key = keys.google()?;
        let mut client = GeminiClient::new(key, config.api_timeout_secs)?;
        if let Some(ref url) = config.base_url {
            client = client.with_base_url(url.clone());
        }
        Ok(Self {
            client,
            page_size: config.page_size,
        })
    }
}

#[async_trait]
impl ModelSource for GeminiModelSource {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, PlanError> {
        self.client.list_models(self.page_size).await
    }
}

/// How [`render_model_list`] prints each model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    /// ` - <name>` per line. (default)
    #[default]
    Names,
    /// Name plus display name and token limits.
    Long,
    /// Pretty-printed JSON array of descriptors.
    Json,
}

/// Keep the models that pass `filter`, in provider order.
pub fn select_models(models: Vec<ModelDescriptor>, filter: ModelFilter) -> Vec<ModelDescriptor> {
    match filter {
        ModelFilter::All => models,
        ModelFilter::ContentGeneration => models
            .into_iter()
            .filter(ModelDescriptor::supports_content_generation)
            .collect(),
    }
}

/// Fetch from `source` and apply the configured filter.
pub async fn list_models(source: &dyn ModelSource, config: &ListConfig) -> Result<Vec<ModelDescriptor>, PlanError> {
    let all = source.list_models().await?;
    let total = all.len();
    let selected = select_models(all, config.filter);
    info!(
        "{}: {} models, {} shown with filter {:?}",
        source.name(),
        total,
        selected.len(),
        config.filter
    );
    Ok(selected)
}

/// Format models for stdout.
pub fn render_model_list(models: &[ModelDescriptor], format: ListFormat) -> String {
    match format {
        ListFormat::Json => serde_json::to_string_pretty(models).unwrap_or_else(|_| "[]".to_string()),
        ListFormat::Names => models.iter().fold(String::new(), |mut out, m| {
            let _ = writeln!(out, " - {}", m.name);
            out
        }),
        ListFormat::Long => {
            let width = models.iter().map(|m| m.name.len()).max().unwrap_or(0);
            models.iter().fold(String::new(), |mut out, m| {
                let limits = match (m.input_token_limit, m.output_token_limit) {
                    (Some(i), Some(o)) => format!("  in {i} / out {o}"),
                    _ => String::new(),
                };
                let _ = writeln!(
                    out,
                    " - {:<width$}  {}{}",
                    m.name,
                    m.display_name.as_deref().unwrap_or(""),
                    limits,
                );
                out
            })
        }
    }
}
