//! Configuration types for the three pipeline steps.
//!
//! Each step gets its own config struct built through a builder with
//! documented defaults: [`ListConfig`] for the model lister,
//! [`ExtractConfig`] for PDF extraction and [`StructureConfig`] for the JSON
//! structurer. Credentials live apart from them in [`ApiKeys`] so configs can
//! be logged with `{:?}` without leaking secrets.
//!
//! The defaults reproduce the fixed file-name convention that couples the
//! steps: the extractor writes [`DEFAULT_MARKDOWN_PATH`], the structurer
//! reads it and writes [`DEFAULT_JSON_PATH`].

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ── Environment variables ────────────────────────────────────────────────

/// Google Gemini key: model listing and the Gemini structuring backend.
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
/// LlamaParse key: PDF extraction.
pub const LLAMA_CLOUD_API_KEY: &str = "LLAMA_CLOUD_API_KEY";
/// OpenRouter key: the OpenRouter structuring backend.
pub const OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";

// ── Conventional file names ──────────────────────────────────────────────

pub const DEFAULT_PDF_PATH: &str = "PLN23_116_R1_Plans.pdf";
pub const DEFAULT_MARKDOWN_PATH: &str = "extracted_text.md";
pub const DEFAULT_JSON_PATH: &str = "final_data.json";

// ── Model defaults ───────────────────────────────────────────────────────

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_OPENROUTER_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";

/// Free-tier models OpenRouter may route to when the primary one is
/// unavailable.
pub const DEFAULT_OPENROUTER_FALLBACKS: &[&str] = &[
    "google/gemini-2.0-flash-exp:free",
    "mistralai/mistral-small-3.1-24b-instruct:free",
];

// ── Credentials ──────────────────────────────────────────────────────────

/// API keys resolved from the environment.
///
/// The CLI loads `.env` into the process environment before calling
/// [`ApiKeys::from_env`]. Empty values are treated as absent, so a
/// `GOOGLE_API_KEY=` line in `.env` still halts with the missing-key message.
#[derive(Clone, Default)]
pub struct ApiKeys {
    google: Option<String>,
    llama_cloud: Option<String>,
    openrouter: Option<String>,
}

impl ApiKeys {
    /// Read all keys from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read all keys through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        Self {
            google: get(GOOGLE_API_KEY),
            llama_cloud: get(LLAMA_CLOUD_API_KEY),
            openrouter: get(OPENROUTER_API_KEY),
        }
    }

    pub fn google(&self) -> Result<&str, PlanError> {
        require(&self.google, GOOGLE_API_KEY)
    }

    pub fn llama_cloud(&self) -> Result<&str, PlanError> {
        require(&self.llama_cloud, LLAMA_CLOUD_API_KEY)
    }

    pub fn openrouter(&self) -> Result<&str, PlanError> {
        require(&self.openrouter, OPENROUTER_API_KEY)
    }

    /// Whether the named variable resolved to a non-empty value.
    pub fn is_present(&self, var: &str) -> bool {
        match var {
            GOOGLE_API_KEY => self.google.is_some(),
            LLAMA_CLOUD_API_KEY => self.llama_cloud.is_some(),
            OPENROUTER_API_KEY => self.openrouter.is_some(),
            _ => false,
        }
    }
}

fn require<'a>(key: &'a Option<String>, var: &'static str) -> Result<&'a str, PlanError> {
    key.as_deref().ok_or(PlanError::MissingApiKey { var })
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("ApiKeys")
            .field("google", &redact(&self.google))
            .field("llama_cloud", &redact(&self.llama_cloud))
            .field("openrouter", &redact(&self.openrouter))
            .finish()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which models the lister prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelFilter {
    /// Every identifier the provider returns.
    All,
    /// Only models whose capability set includes `generateContent`. (default)
    #[default]
    ContentGeneration,
}

/// Output format requested from the parsing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultType {
    /// Markdown keeps headings and tables, which LLMs read better. (default)
    #[default]
    Markdown,
    /// Plain text.
    Text,
}

impl ResultType {
    /// Path segment used by the result endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Markdown => "markdown",
            ResultType::Text => "text",
        }
    }
}

/// Structuring backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Provider {
    /// Google Gemini with native JSON response mode. (default)
    #[default]
    Gemini,
    /// OpenRouter free-tier chat models; code fences are stripped.
    OpenRouter,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenRouter => "openrouter",
        }
    }

    /// Model used when the caller does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => DEFAULT_GEMINI_MODEL,
            Provider::OpenRouter => DEFAULT_OPENROUTER_MODEL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(PlanError::InvalidConfig(format!(
                "unknown provider '{other}' (expected gemini or openrouter)"
            ))),
        }
    }
}

// ── Model lister ─────────────────────────────────────────────────────────

/// Configuration for listing models.
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Which models to print. Default: [`ModelFilter::ContentGeneration`].
    pub filter: ModelFilter,
    /// Page size requested per listing call. Range 1–1000. Default: 1000.
    pub page_size: u32,
    /// Endpoint override, e.g. a local proxy. Default: public Gemini API.
    pub base_url: Option<String>,
    /// Per-request timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            filter: ModelFilter::default(),
            page_size: 1000,
            base_url: None,
            api_timeout_secs: 60,
        }
    }
}

impl ListConfig {
    pub fn builder() -> ListConfigBuilder {
        ListConfigBuilder {
            config: Self::default(),
        }
    }
}

#[derive(Debug)]
pub struct ListConfigBuilder {
    config: ListConfig,
}

impl ListConfigBuilder {
    pub fn filter(mut self, filter: ModelFilter) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn page_size(mut self, n: u32) -> Self {
        self.config.page_size = n.clamp(1, 1000);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<ListConfig, PlanError> {
        if self.config.api_timeout_secs == 0 {
            return Err(PlanError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

// ── Extractor ────────────────────────────────────────────────────────────

/// Configuration for PDF → Markdown extraction.
///
/// # Example
/// ```rust
/// use edgequake_plan2json::ExtractConfig;
///
/// let config = ExtractConfig::builder()
///     .input("plans/site.pdf")
///     .output_path("site.md")
///     .build()
///     .unwrap();
/// assert_eq!(config.language, "en");
/// ```
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Local PDF path or HTTP(S) URL. Default: [`DEFAULT_PDF_PATH`].
    pub input: String,

    /// Where the Markdown handoff file is written. Default: [`DEFAULT_MARKDOWN_PATH`].
    pub output_path: PathBuf,

    /// Requested output format. Default: Markdown.
    pub result_type: ResultType,

    /// Document language hint passed to the parser. Default: `"en"`.
    pub language: String,

    /// Delay between job-status polls in milliseconds. Default: 1000.
    pub poll_interval_ms: u64,

    /// Give up on a parse job after this many seconds. Default: 2000.
    ///
    /// Large plan sets with dozens of sheets can take several minutes on the
    /// service side; the bound only protects against a job that never
    /// reaches a terminal status.
    pub max_wait_secs: u64,

    /// Characters of extracted text echoed as a preview. Default: 500.
    pub preview_chars: usize,

    /// Endpoint override. Default: public LlamaParse API.
    pub base_url: Option<String>,

    /// Per-request timeout in seconds (upload, poll, result). Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_PDF_PATH.to_string(),
            output_path: PathBuf::from(DEFAULT_MARKDOWN_PATH),
            result_type: ResultType::default(),
            language: "en".to_string(),
            poll_interval_ms: 1000,
            max_wait_secs: 2000,
            preview_chars: 500,
            base_url: None,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
        }
    }
}

impl ExtractConfig {
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder {
            config: Self::default(),
        }
    }
}

#[derive(Debug)]
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.config.input = input.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn result_type(mut self, result_type: ResultType) -> Self {
        self.config.result_type = result_type;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_wait_secs(mut self, secs: u64) -> Self {
        self.config.max_wait_secs = secs;
        self
    }

    pub fn preview_chars(mut self, n: usize) -> Self {
        self.config.preview_chars = n;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<ExtractConfig, PlanError> {
        let c = &self.config;
        if c.input.trim().is_empty() {
            return Err(PlanError::InvalidConfig("PDF input must not be empty".into()));
        }
        if c.language.trim().is_empty() {
            return Err(PlanError::InvalidConfig("language must not be empty".into()));
        }
        if c.max_wait_secs == 0 {
            return Err(PlanError::InvalidConfig("max wait must be ≥ 1s".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(PlanError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

// ── Structurer ───────────────────────────────────────────────────────────

/// Configuration for Markdown → JSON structuring.
#[derive(Debug, Clone)]
pub struct StructureConfig {
    /// Markdown handoff file to read. Default: [`DEFAULT_MARKDOWN_PATH`].
    pub input_path: PathBuf,

    /// JSON output file. Default: [`DEFAULT_JSON_PATH`].
    pub output_path: PathBuf,

    /// Backend. Default: [`Provider::Gemini`].
    pub provider: Provider,

    /// Model identifier. If None, uses [`Provider::default_model`].
    pub model: Option<String>,

    /// OpenRouter fallback models, tried by the router in order.
    /// Ignored by Gemini. Default: [`DEFAULT_OPENROUTER_FALLBACKS`].
    pub fallback_models: Vec<String>,

    /// Sampling temperature. If None, the provider default applies.
    pub temperature: Option<f32>,

    /// Number of `drawings_list` entries in the preview. Default: 2.
    pub preview_items: usize,

    /// Endpoint override. Default: the provider's public API.
    pub base_url: Option<String>,

    /// Per-request timeout in seconds. Default: 120.
    ///
    /// A full plan index can be a few thousand output tokens; free-tier
    /// models are slow to produce them.
    pub api_timeout_secs: u64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_MARKDOWN_PATH),
            output_path: PathBuf::from(DEFAULT_JSON_PATH),
            provider: Provider::default(),
            model: None,
            fallback_models: DEFAULT_OPENROUTER_FALLBACKS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            temperature: None,
            preview_items: 2,
            base_url: None,
            api_timeout_secs: 120,
        }
    }
}

impl StructureConfig {
    pub fn builder() -> StructureConfigBuilder {
        StructureConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model that will actually be requested.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

#[derive(Debug)]
pub struct StructureConfigBuilder {
    config: StructureConfig,
}

impl StructureConfigBuilder {
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn fallback_models(mut self, models: Vec<String>) -> Self {
        self.config.fallback_models = models;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn preview_items(mut self, n: usize) -> Self {
        self.config.preview_items = n;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<StructureConfig, PlanError> {
        let c = &self.config;
        if c.input_path == c.output_path {
            return Err(PlanError::InvalidConfig(format!(
                "input and output must differ (both are {:?})",
                c.input_path
            )));
        }
        if matches!(c.model.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(PlanError::InvalidConfig("model must not be empty".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(PlanError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}
