//! Error type for the edgequake-plan2json library.
//!
//! Every failure falls into one of three groups and the CLI reports all of
//! them the same way (one printed line, normal exit):
//!
//! * **Preconditions**: a required API key or input file is missing, or the
//!   input is not a PDF. These are detected before any network call;
//!   [`PlanError::is_precondition`] returns `true` for them.
//! * **Remote failures**: transport errors, non-success HTTP statuses, a
//!   parse job that failed or never finished.
//! * **Response shape**: the model's text is not valid JSON.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-plan2json library.
#[derive(Debug, Error)]
pub enum PlanError {
    // ── Preconditions ─────────────────────────────────────────────────────
    /// A required API key is absent (or empty) in `.env` and the environment.
    #[error("{var} is not set. Add it to your .env file or export it.")]
    MissingApiKey { var: &'static str },

    /// The PDF to extract does not exist.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    PdfNotFound { path: PathBuf },

    /// The Markdown handoff file does not exist.
    #[error("'{path}' not found. Did you run the extract step first?")]
    MarkdownNotFound { path: PathBuf },

    /// The file exists but does not start with the `%PDF` magic.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Remote failures ───────────────────────────────────────────────────
    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("Request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 401/403: the key was rejected.
    #[error("Authentication error from {provider}: {detail}")]
    AuthError {
        provider: &'static str,
        detail: String,
    },

    /// HTTP 429.
    #[error("Rate limit exceeded for {provider}{}", retry_hint(*.retry_after_secs))]
    RateLimitExceeded {
        provider: &'static str,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success status, or an error object in a 200 body.
    #[error("{provider} API error (HTTP {status}): {message}")]
    ApiError {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// The parse job reached a terminal failure status.
    #[error("Parse job {job_id} finished with status {status}")]
    ParseJobFailed { job_id: String, status: String },

    /// The parse job did not finish within the configured wait.
    #[error("Parse job {job_id} did not finish within {secs}s")]
    ParseJobTimeout { job_id: String, secs: u64 },

    /// The provider answered but returned no usable content.
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },

    /// Downloading a PDF from a URL failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── Response shape ────────────────────────────────────────────────────
    /// The response text could not be parsed as JSON.
    #[error("Model response is not valid JSON: {source}\nResponse starts with: {preview:?}")]
    InvalidJson {
        preview: String,
        #[source]
        source: serde_json::Error,
    },

    // ── I/O ───────────────────────────────────────────────────────────────
    /// Reading an input file failed for a reason other than absence.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlanError {
    /// `true` for failures detected before any remote call is attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PlanError::MissingApiKey { .. }
                | PlanError::PdfNotFound { .. }
                | PlanError::MarkdownNotFound { .. }
                | PlanError::NotAPdf { .. }
                | PlanError::InvalidConfig(_)
        )
    }
}

fn retry_hint(retry_after_secs: Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}
