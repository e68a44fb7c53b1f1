//! Extractor: PDF → Markdown handoff file.
//!
//! The heavy lifting happens in a hosted parser behind [`DocumentParser`].
//! This module resolves the input, makes the one parse call, and writes the
//! first returned document verbatim to the handoff file.
//!
//! ## Blocking callers
//!
//! The parser client is async and drives its own polling. Synchronous code
//! uses [`extract_sync`], which runs the whole extraction on a private tokio
//! runtime: one blocking call that returns when the job is done.

use crate::config::{ApiKeys, ExtractConfig, GOOGLE_API_KEY, LLAMA_CLOUD_API_KEY};
use crate::error::PlanError;
use crate::output::{text_preview, write_atomic, ExtractionReport};
use crate::pipeline::input;
use crate::providers::llamaparse::LlamaParseClient;
use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// One document returned by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Service-side job identifier.
    pub job_id: String,
    pub text: String,
}

/// A hosted document parser.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    fn name(&self) -> &str;

    /// Parse the PDF at `pdf`; `file_name` is the name reported to the service.
    async fn parse(&self, pdf: &Path, file_name: &str) -> Result<Vec<ParsedDocument>, PlanError>;
}

/// Build the LlamaParse client, failing before any I/O when
/// `LLAMA_CLOUD_API_KEY` is absent.
pub fn parser_from_keys(keys: &ApiKeys, config: &ExtractConfig) -> Result<LlamaParseClient, PlanError> {
    LlamaParseClient::from_config(keys.llama_cloud()?, config)
}

/// Which of the pipeline's keys are set, for the start-of-run report.
pub fn key_presence(keys: &ApiKeys) -> [(&'static str, bool); 2] {
    [
        (LLAMA_CLOUD_API_KEY, keys.is_present(LLAMA_CLOUD_API_KEY)),
        (GOOGLE_API_KEY, keys.is_present(GOOGLE_API_KEY)),
    ]
}

/// Parse `config.input` and write the first document to `config.output_path`.
///
/// Nothing is written unless the parser returns at least one document.
pub async fn extract_to_file(
    parser: &dyn DocumentParser,
    config: &ExtractConfig,
) -> Result<ExtractionReport, PlanError> {
    let start = Instant::now();
    let pdf = input::resolve_pdf(&config.input, config.download_timeout_secs).await?;
    info!("Processing {} with {}", pdf.path().display(), parser.name());

    let documents = parser.parse(pdf.path(), &pdf.file_name()).await?;
    let document_count = documents.len();
    let first = documents
        .into_iter()
        .next()
        .ok_or(PlanError::EmptyResponse { provider: "parser" })?;

    if document_count > 1 {
        warn!("Parser returned {} documents; keeping the first", document_count);
    }
    if first.text.trim().is_empty() {
        warn!("Parser returned an empty document for {}", pdf.path().display());
    }

    write_atomic(&config.output_path, &first.text).await?;
    info!(
        "Wrote {} chars to {}",
        first.text.chars().count(),
        config.output_path.display()
    );

    Ok(ExtractionReport {
        job_id: first.job_id,
        output_path: config.output_path.clone(),
        document_count,
        chars: first.text.chars().count(),
        preview: text_preview(&first.text, config.preview_chars).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Blocking wrapper around [`extract_to_file`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn extract_sync(
    parser: &dyn DocumentParser,
    config: &ExtractConfig,
) -> Result<ExtractionReport, PlanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PlanError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract_to_file(parser, config))
}
