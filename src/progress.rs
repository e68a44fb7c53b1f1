//! Progress-callback trait for parse-job events.
//!
//! A LlamaParse job can run for minutes on a large plan set. Inject an
//! [`Arc<dyn ParseProgressCallback>`] via
//! [`crate::providers::llamaparse::LlamaParseClient::with_progress`] to receive events while
//! the client uploads, polls and downloads. The CLI drives an `indicatif`
//! spinner from these; library users can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_plan2json::ParseProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct PollCounter(AtomicUsize);
//!
//! impl ParseProgressCallback for PollCounter {
//!     fn on_poll(&self, _job_id: &str, status: &str, _elapsed_secs: u64) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("still {status}");
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the parse client as a job moves through its lifecycle.
///
/// All methods have default no-op implementations.
pub trait ParseProgressCallback: Send + Sync {
    /// Called before the file upload starts.
    fn on_upload_start(&self, file_name: &str, bytes: u64) {
        let _ = (file_name, bytes);
    }

    /// Called once the service has accepted the upload.
    fn on_job_submitted(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called after every status poll that did not end the job.
    fn on_poll(&self, job_id: &str, status: &str, elapsed_secs: u64) {
        let _ = (job_id, status, elapsed_secs);
    }

    /// Called when the result text has been downloaded.
    fn on_job_complete(&self, job_id: &str, chars: usize) {
        let _ = (job_id, chars);
    }

    /// Called when the job fails or times out.
    fn on_job_error(&self, job_id: &str, error: &str) {
        let _ = (job_id, error);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ParseProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn ParseProgressCallback>;
