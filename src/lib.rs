//! # edgequake-plan2json
//!
//! Turn a PDF construction plan into structured JSON: project information
//! plus the index of drawings.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract    upload to LlamaParse, poll, save Markdown   → extracted_text.md
//!  └─ 2. Structure  fixed prompt + Markdown → LLM → JSON        → final_data.json
//!
//!    (0. Models     list Gemini models usable for step 2)
//! ```
//!
//! The steps never call each other; they agree on file names only, so each
//! can be re-run on its own (e.g. try another model on the same Markdown).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_plan2json::{backend_from_keys, structure_file, ApiKeys, StructureConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let keys = ApiKeys::from_env();
//!     let config = StructureConfig::default();
//!     let backend = backend_from_keys(&keys, &config)?;
//!     let report = structure_file(backend.as_ref(), &config).await?;
//!     println!("{}", report.preview);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `plan2json` binary (clap + anyhow + dotenvy + tracing-subscriber + indicatif) |
//!
//! ## Providers
//!
//! | Step | Provider | Key |
//! |------|----------|-----|
//! | models | Gemini | `GOOGLE_API_KEY` |
//! | extract | LlamaParse | `LLAMA_CLOUD_API_KEY` |
//! | structure | Gemini (native JSON) | `GOOGLE_API_KEY` |
//! | structure | OpenRouter (free tier) | `OPENROUTER_API_KEY` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod structure;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ApiKeys, ExtractConfig, ExtractConfigBuilder, ListConfig, ListConfigBuilder, ModelFilter,
    Provider, ResultType, StructureConfig, StructureConfigBuilder,
};
pub use error::PlanError;
pub use extract::{extract_sync, extract_to_file, key_presence, parser_from_keys, DocumentParser, ParsedDocument};
pub use models::{list_models, render_model_list, GeminiModelSource, ListFormat, ModelDescriptor, ModelSource};
pub use output::{ExtractionReport, StructureReport, StructuredResult};
pub use progress::{NoopProgressCallback, ParseProgressCallback, ProgressCallback};
pub use structure::{
    backend_from_keys, parse_response, structure_file, Completion, ResponseMode, StructuringBackend,
};
