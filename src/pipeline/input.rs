//! Input resolution: turn the user-supplied PDF path or URL into a local file.
//!
//! The parsing service takes a multipart upload, so a URL input is downloaded
//! into a `TempDir` first. The directory lives inside [`ResolvedPdf`] and is
//! removed when it is dropped. Both paths check the `%PDF` magic so a wrong
//! file fails here instead of after a paid upload.

use crate::error::PlanError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// A PDF ready for upload.
pub enum ResolvedPdf {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the bytes live in a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedPdf {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedPdf::Local(p) => p,
            ResolvedPdf::Downloaded { path, .. } => path,
        }
    }

    /// File name sent with the upload.
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string())
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local, magic-checked PDF.
pub async fn resolve_pdf(input: &str, download_timeout_secs: u64) -> Result<ResolvedPdf, PlanError> {
    if is_url(input) {
        download_pdf(input, download_timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

fn resolve_local(path: &Path) -> Result<ResolvedPdf, PlanError> {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PlanError::PdfNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(PlanError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(PlanError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedPdf::Local(path.to_path_buf()))
}

async fn download_pdf(url: &str, timeout_secs: u64) -> Result<ResolvedPdf, PlanError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| PlanError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| PlanError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(filename_from_url(url));

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(PlanError::NotAPdf { path, magic });
    }

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| PlanError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to {}", bytes.len(), path.display());
    Ok(ResolvedPdf::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of `url` when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
