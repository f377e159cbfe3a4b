//! Provider error types

use panel_core::GenerationError;

/// Failure talking to a completion endpoint
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The configured key variable is unset or empty
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    /// No answer within the configured timeout
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Connection, TLS or body read failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Answer arrived but carries no usable JSON
    #[error("unusable completion: {0}")]
    Content(String),
}

impl ProviderError {
    /// Check if the endpoint throttled the request
    #[inline]
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Status { status: 429, .. })
    }
}

impl From<ProviderError> for GenerationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(duration_secs) => GenerationError::Timeout { duration_secs },
            ProviderError::Content(detail) => GenerationError::MalformedOutput(detail),
            other => GenerationError::Provider(other.to_string()),
        }
    }
}
