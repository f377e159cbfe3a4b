//! OpenAI-compatible chat completions
//!
//! Sends one system message (role plus the JSON schema of the expected shape)
//! and one user message (the engine's prompt), then recovers a JSON value from
//! the first choice.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use panel_core::{GenerationError, GenerationRequest, GenerationService, TargetShape};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;

const SYSTEM_ROLE: &str = "You are a research assistant that simulates realistic customer \
                           interview participants. Always answer with a single JSON value and \
                           nothing else.";

/// [`GenerationService`] over an OpenAI-compatible HTTP endpoint
pub struct OpenAiCompatibleService {
    config: ProviderConfig,
    api_key: String,
    client: reqwest::Client,
}

impl fmt::Debug for OpenAiCompatibleService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleService {
    /// Create service with an explicit key
    ///
    /// # Errors
    /// `ProviderError::Transport` if the HTTP client cannot be built
    pub fn new(config: ProviderConfig, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
        })
    }

    /// Create service reading the key from the configured variable
    ///
    /// # Errors
    /// `ProviderError::MissingApiKey` or `ProviderError::Transport`
    pub fn from_config(config: ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key()?;
        Self::new(config, api_key)
    }

    /// Endpoint settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Request body for one generation request
    #[must_use]
    pub fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": [
                {"role": "system", "content": system_message(request.shape)},
                {"role": "user", "content": request.prompt},
            ],
        });
        if self.config.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    async fn send(&self, request: &GenerationRequest) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let content = completion_content(&body)?;
        parse_json_content(&content)
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.config.timeout_secs)
        } else {
            ProviderError::Transport(err)
        }
    }
}

#[async_trait]
impl GenerationService for OpenAiCompatibleService {
    async fn complete(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        tracing::debug!(
            model = %self.config.model,
            shape = request.shape.name(),
            max_tokens = request.max_tokens,
            "sending completion request"
        );
        self.send(&request).await.map_err(|e| {
            if e.is_rate_limited() {
                metrics::counter!("panel_provider_rate_limited_total").increment(1);
            }
            tracing::warn!(shape = request.shape.name(), "completion failed: {}", e);
            GenerationError::from(e)
        })
    }
}

fn system_message(shape: TargetShape) -> String {
    let expectation = match shape {
        TargetShape::PersonaList { count } => {
            format!("Produce exactly {count} personas.")
        }
        TargetShape::Interview { questions } => {
            format!("Produce exactly {questions} responses, one per question, in order.")
        }
    };
    format!(
        "{SYSTEM_ROLE}\n{expectation}\nThe JSON must match this schema:\n{}",
        shape.json_schema()
    )
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Text of the first choice
fn completion_content(body: &str) -> Result<String, ProviderError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| ProviderError::Content(format!("invalid completion envelope: {e}")))?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ProviderError::Content("completion has no content".to_string()))
}

/// Remove a surrounding markdown code fence, if any
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the model's text as JSON
///
/// # Errors
/// `ProviderError::Content` if no JSON value can be read
pub fn parse_json_content(content: &str) -> Result<Value, ProviderError> {
    let text = strip_code_fences(content);
    serde_json::from_str(text).or_else(|first_err| {
        // models sometimes wrap the value in prose
        let start = text.find(['{', '[']);
        let end = text.rfind(['}', ']']);
        match (start, end) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&text[start..=end])
                .map_err(|e| ProviderError::Content(format!("not JSON: {e}"))),
            _ => Err(ProviderError::Content(format!("not JSON: {first_err}"))),
        }
    })
}
