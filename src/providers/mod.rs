//! HTTP clients for the hosted services the pipeline depends on.
//!
//! Each client is a thin typed wrapper over one provider's REST API. They
//! share the status-code mapping in [`check_status`] so a rejected key, a
//! rate limit and a server error read the same regardless of provider. None
//! of them retry.

pub mod gemini;
pub mod llamaparse;
pub mod openrouter;

use crate::error::PlanError;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use std::time::Duration;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Build a client with the given per-request timeout.
pub(crate) fn http_client(provider: &'static str, timeout_secs: u64) -> Result<reqwest::Client, PlanError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("edgequake-plan2json/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| PlanError::Http { provider, source })
}

/// Map a non-success response to a [`PlanError`]; pass success through.
pub(crate) async fn check_status(provider: &'static str, response: Response) -> Result<Response, PlanError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(status_error(provider, status, &body, retry_after_secs))
}

pub(crate) fn status_error(
    provider: &'static str,
    status: StatusCode,
    body: &str,
    retry_after_secs: Option<u64>,
) -> PlanError {
    let detail = error_detail(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlanError::AuthError { provider, detail },
        StatusCode::TOO_MANY_REQUESTS => PlanError::RateLimitExceeded {
            provider,
            retry_after_secs,
        },
        _ => PlanError::ApiError {
            provider,
            status: status.as_u16(),
            message: detail,
        },
    }
}

/// Pull `error.message` (or `detail`) out of a JSON error body; fall back to
/// the raw body, truncated.
fn error_detail(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("detail"))
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    let text = message.unwrap_or_else(|| body.trim().to_string());
    if text.is_empty() {
        return "no response body".to_string();
    }
    crate::output::text_preview(&text, MAX_ERROR_BODY).to_string()
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
