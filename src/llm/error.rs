//! Provider error taxonomy and HTTP status mapping

use thiserror::Error;

use super::retry::{RetryClassification, RetryableError};

/// Errors that can occur while talking to an LLM provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// API key is missing or invalid
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded{}", .retry_after_ms.map(|ms| format!(", retry after {ms}ms")).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    /// Prompt too large for the model
    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// Server error (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Connection, DNS, TLS, or timeout failure
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid request (bad parameters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Provider is missing required settings
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl RetryableError for ProviderError {
    fn classify(&self) -> RetryClassification {
        match self {
            ProviderError::RateLimited { retry_after_ms } => RetryClassification::RateLimited {
                retry_after_ms: *retry_after_ms,
            },
            ProviderError::ServerError(_) | ProviderError::Network(_) => RetryClassification::Retry,
            ProviderError::Authentication(_)
            | ProviderError::ContextLengthExceeded(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::QuotaExceeded(_)
            | ProviderError::NotConfigured(_)
            | ProviderError::Unknown(_) => RetryClassification::NoRetry,
        }
    }
}

impl ProviderError {
    /// Create from HTTP status code and body
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(body.to_string()),
            429 => {
                if body.contains("insufficient_quota") {
                    return ProviderError::QuotaExceeded(body.to_string());
                }
                ProviderError::RateLimited {
                    retry_after_ms: extract_retry_after(body),
                }
            }
            400 => {
                if body.contains("context") || body.contains("too long") || body.contains("token") {
                    ProviderError::ContextLengthExceeded(body.to_string())
                } else {
                    ProviderError::InvalidRequest(body.to_string())
                }
            }
            404 => ProviderError::ModelNotFound(body.to_string()),
            500..=599 => ProviderError::ServerError(body.to_string()),
            _ => ProviderError::Unknown(format!("HTTP {status}: {body}")),
        }
    }

    /// Map a transport failure from reqwest
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Network(format!("request timed out: {err}"))
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Try to extract a retry-after hint (milliseconds) from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(secs) = json
            .get("error")
            .and_then(|e| e.get("retry_after"))
            .and_then(|v| v.as_f64())
    {
        return Some((secs * 1000.0) as u64);
    }

    // "Please try again in 1.5s" / "in 20ms" and similar plain-text hints
    let idx = body.find("retry").or_else(|| body.find("try again"))?;
    let hint = &body[idx..];
    let start = hint.find(|c: char| c.is_ascii_digit())?;
    let rest = &hint[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let value = rest[..end].parse::<f64>().ok()?;

    let unit = rest[end..].trim_start();
    let factor = if unit.starts_with("ms") {
        1.0
    } else if unit.starts_with('m') {
        60_000.0
    } else {
        1000.0
    };
    Some((value * factor) as u64)
}
