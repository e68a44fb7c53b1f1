//! LlamaParse (LlamaCloud) document-parsing client.
//!
//! Parsing is an asynchronous job on the service side:
//!
//! ```text
//! POST parsing/upload ──▶ job id
//! GET  parsing/job/{id}            (poll until SUCCESS / ERROR / CANCELLED)
//! GET  parsing/job/{id}/result/{markdown|text}
//! ```
//!
//! The poll loop is the service's completion protocol, not a retry: an
//! `ERROR` status or a transport failure ends the run immediately. The only
//! bound is `max_wait`.

use super::{check_status, http_client, join_url};
use crate::config::{ExtractConfig, ResultType};
use crate::error::PlanError;
use crate::extract::{DocumentParser, ParsedDocument};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.cloud.llamaindex.ai/api/v1";
const PROVIDER: &str = "llamaparse";

/// Authenticated LlamaParse client with fixed parse options.
#[derive(Clone)]
pub struct LlamaParseClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    result_type: ResultType,
    language: String,
    poll_interval: Duration,
    max_wait: Duration,
    progress: ProgressCallback,
}

impl LlamaParseClient {
    /// Client with Markdown output, English, 1 s polls and a 2000 s bound.
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, PlanError> {
        Ok(Self {
            http: http_client(PROVIDER, timeout_secs)?,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            result_type: ResultType::Markdown,
            language: "en".to_string(),
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(2000),
            progress: Arc::new(NoopProgressCallback),
        })
    }

    /// Client configured from an [`ExtractConfig`].
    pub fn from_config(api_key: impl Into<String>, config: &ExtractConfig) -> Result<Self, PlanError> {
        let mut client = Self::new(api_key, config.api_timeout_secs)?
            .with_options(config.result_type, config.language.clone())
            .with_polling(
                Duration::from_millis(config.poll_interval_ms),
                Duration::from_secs(config.max_wait_secs),
            );
        if let Some(ref url) = config.base_url {
            client = client.with_base_url(url.clone());
        }
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_options(mut self, result_type: ResultType, language: impl Into<String>) -> Self {
        self.result_type = result_type;
        self.language = language.into();
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = interval;
        self.max_wait = max_wait;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Upload a PDF and return the job id.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, PlanError> {
        self.progress.on_upload_start(file_name, bytes.len() as u64);

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;
        let form = Form::new()
            .part("file", part)
            .text("language", self.language.clone());

        let response = self
            .http
            .post(join_url(&self.base_url, "parsing/upload"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;

        let job: JobResponse = check_status(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;

        info!("Started parsing the file under job_id {}", job.id);
        self.progress.on_job_submitted(&job.id);
        Ok(job.id)
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobStatus, PlanError> {
        let response = self
            .http
            .get(join_url(&self.base_url, &format!("parsing/job/{job_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;

        let job: JobResponse = check_status(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;
        Ok(job.status)
    }

    /// Poll until the job reaches a terminal status.
    pub async fn wait_for_job(&self, job_id: &str) -> Result<JobStatus, PlanError> {
        let start = Instant::now();
        loop {
            let status = self.job_status(job_id).await?;
            let elapsed = start.elapsed();
            debug!("Job {}: {:?} after {:.1}s", job_id, status, elapsed.as_secs_f32());

            if status.is_success() {
                if status == JobStatus::PartialSuccess {
                    warn!("Job {} finished with PARTIAL_SUCCESS; some pages may be missing", job_id);
                }
                return Ok(status);
            }
            if status.is_failure() {
                let err = PlanError::ParseJobFailed {
                    job_id: job_id.to_string(),
                    status: status.as_str().to_string(),
                };
                self.progress.on_job_error(job_id, &err.to_string());
                return Err(err);
            }
            if elapsed >= self.max_wait {
                let err = PlanError::ParseJobTimeout {
                    job_id: job_id.to_string(),
                    secs: self.max_wait.as_secs(),
                };
                self.progress.on_job_error(job_id, &err.to_string());
                return Err(err);
            }

            self.progress.on_poll(job_id, status.as_str(), elapsed.as_secs());
            sleep(self.poll_interval).await;
        }
    }

    /// Download the finished job's text in the configured result type.
    pub async fn fetch_result(&self, job_id: &str) -> Result<String, PlanError> {
        let kind = self.result_type.as_str();
        let response = self
            .http
            .get(join_url(&self.base_url, &format!("parsing/job/{job_id}/result/{kind}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;

        let body: ResultResponse = check_status(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|source| PlanError::Http { provider: PROVIDER, source })?;

        body.into_text(self.result_type)
            .ok_or(PlanError::EmptyResponse { provider: PROVIDER })
    }
}

#[async_trait]
impl DocumentParser for LlamaParseClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn parse(&self, pdf: &Path, file_name: &str) -> Result<Vec<ParsedDocument>, PlanError> {
        let bytes = tokio::fs::read(pdf).await.map_err(|source| PlanError::ReadFailed {
            path: pdf.to_path_buf(),
            source,
        })?;

        let job_id = self.upload(file_name, bytes).await?;
        self.wait_for_job(&job_id).await?;
        let text = self.fetch_result(&job_id).await?;
        self.progress.on_job_complete(&job_id, text.chars().count());

        Ok(vec![ParsedDocument { job_id, text }])
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Job status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Success,
    PartialSuccess,
    Error,
    #[serde(alias = "CANCELED")]
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::PartialSuccess)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Success => "SUCCESS",
            JobStatus::PartialSuccess => "PARTIAL_SUCCESS",
            JobStatus::Error => "ERROR",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JobResponse {
    id: String,
    status: JobStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct ResultResponse {
    markdown: Option<String>,
    text: Option<String>,
}

impl ResultResponse {
    fn into_text(self, result_type: ResultType) -> Option<String> {
        match result_type {
            ResultType::Markdown => self.markdown,
            ResultType::Text => self.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_parses_known_and_unknown_values() {
        let job: JobResponse =
            serde_json::from_str(r#"{"id": "j-1", "status": "PENDING"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let s: JobStatus = serde_json::from_str(r#""PARTIAL_SUCCESS""#).unwrap();
        assert!(s.is_success());
        let s: JobStatus = serde_json::from_str(r#""CANCELED""#).unwrap();
        assert!(s.is_failure());
        let s: JobStatus = serde_json::from_str(r#""QUEUED_SOMEWHERE""#).unwrap();
        assert_eq!(s, JobStatus::Unknown);
        assert!(!s.is_success() && !s.is_failure());
    }

    #[test]
    fn result_picks_requested_kind() {
        let body = r##"{"markdown": "# A-101", "job_metadata": {"credits_used": 3.0}}"##;
        let r: ResultResponse = serde_json::from_str(body).unwrap();
        assert_eq!(r.clone().into_text(ResultType::Markdown).as_deref(), Some("# A-101"));
        assert!(r.into_text(ResultType::Text).is_none());
    }

    #[test]
    fn from_config_applies_options() {
        let config = ExtractConfig::builder()
            .language("fr")
            .result_type(ResultType::Text)
            .poll_interval_ms(250)
            .max_wait_secs(30)
            .base_url("http://localhost:9000/api/v1")
            .build()
            .unwrap();
        let client = LlamaParseClient::from_config("llx-test", &config).unwrap();
        assert_eq!(client.language, "fr");
        assert_eq!(client.result_type, ResultType::Text);
        assert_eq!(client.poll_interval, Duration::from_millis(250));
        assert_eq!(client.max_wait, Duration::from_secs(30));
        assert_eq!(client.base_url, "http://localhost:9000/api/v1");
    }
}
