//! Completion Service errors

use std::time::Duration;
use thiserror::Error;

/// Why a completion call failed
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Unknown LLM provider: '{0}'. Supported: openai")]
    UnknownProvider(String),

    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    #[error("Rate limited by the Completion Service, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Completion Service returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Malformed response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Worth another attempt with the same request
    ///
    /// Rate limits are excluded: the caller is told how long to wait instead.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => matches!(status, 408 | 500 | 502 | 503 | 504),
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            _ => false,
        }
    }
}
