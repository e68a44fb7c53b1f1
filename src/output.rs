//! Output artefacts: the structured result, run reports, and file writing.
//!
//! Every file the pipeline produces goes through [`write_atomic`]: the bytes
//! land in a sibling `*.tmp` file which is then renamed over the target. A
//! failure at any point before the rename leaves a previous output intact,
//! which is what keeps an unparseable model response from clobbering a good
//! `final_data.json`.

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// The parsed model response.
///
/// Expected to carry `project_info`, `drawings_list` and `summary`, but no
/// field is checked: whatever valid JSON the model returned is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredResult(pub Value);

impl StructuredResult {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Entries of `drawings_list`, or an empty slice if it is missing or not
    /// an array.
    pub fn drawings(&self) -> &[Value] {
        self.0
            .get("drawings_list")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn summary(&self) -> Option<&str> {
        self.0.get("summary").and_then(Value::as_str)
    }

    pub fn project_name(&self) -> Option<&str> {
        self.0
            .get("project_info")
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
    }

    /// The first `n` drawings, pretty-printed with 2-space indent.
    pub fn drawings_preview(&self, n: usize) -> String {
        let drawings = self.drawings();
        let head = &drawings[..n.min(drawings.len())];
        serde_json::to_string_pretty(head).unwrap_or_else(|_| "[]".to_string())
    }

    /// Serialise with 4-space indentation, key order preserved.
    pub fn to_pretty_json(&self) -> Result<String, PlanError> {
        to_pretty_json(&self.0)
    }
}

/// Outcome of a successful extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Service-side job identifier.
    pub job_id: String,
    /// Where the Markdown was written.
    pub output_path: PathBuf,
    /// Number of documents the service returned (only the first is kept).
    pub document_count: usize,
    /// Length of the written text in characters.
    pub chars: usize,
    /// Leading characters of the text.
    pub preview: String,
    pub duration_ms: u64,
}

/// Outcome of a successful structuring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureReport {
    pub output_path: PathBuf,
    pub provider: String,
    /// Model that answered, as reported by the provider when available.
    pub model: String,
    pub result: StructuredResult,
    /// Pretty-printed head of `drawings_list`.
    pub preview: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub duration_ms: u64,
}

/// Serialise `value` with 4-space indentation.
pub fn to_pretty_json(value: &Value) -> Result<String, PlanError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut ser)
        .map_err(|e| PlanError::Internal(format!("JSON serialisation failed: {e}")))?;
    String::from_utf8(buf).map_err(|e| PlanError::Internal(format!("JSON is not UTF-8: {e}")))
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn text_preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Write `contents` to `path` via a temp file and rename.
pub async fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), PlanError> {
    let write_failed = |source| PlanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    Ok(())
}
