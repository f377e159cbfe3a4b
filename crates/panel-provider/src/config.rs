//! Endpoint configuration

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Settings of an OpenAI-compatible endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Endpoint root; `/chat/completions` is appended
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Ask the endpoint for `response_format = json_object`
    pub json_mode: bool,
}

impl ProviderConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With endpoint root
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With model name
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Full completions URL
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API key from the configured variable
    ///
    /// # Errors
    /// `ProviderError::MissingApiKey` if the variable is unset or blank
    pub fn api_key(&self) -> Result<String, ProviderError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey(self.api_key_env.clone()))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
            json_mode: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let config = ProviderConfig::new().with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn missing_key_names_the_variable() {
        let config = ProviderConfig {
            api_key_env: "PANEL_PROVIDER_TEST_UNSET_KEY".to_string(),
            ..ProviderConfig::default()
        };
        let err = config.api_key().unwrap_err();
        assert!(err.to_string().contains("PANEL_PROVIDER_TEST_UNSET_KEY"));
    }

    #[test]
    fn partial_input_keeps_defaults() {
        let config: ProviderConfig = serde_json::from_str(r#"{"model": "local-llama"}"#).unwrap();
        assert_eq!(config.model, "local-llama");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.json_mode);
    }
}
