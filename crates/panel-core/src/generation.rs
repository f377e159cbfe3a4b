//! Generation service boundary
//!
//! The engine talks to the external completion capability through the
//! [`GenerationService`] trait. Raw values coming back are normalized exactly
//! once, in [`GenerationClient`], into the canonical [`PersonaDraft`] and
//! [`InterviewDraft`] shapes. Code past this module never inspects raw JSON.

use crate::error::GenerationError;
use crate::types::Sentiment;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Shape the caller expects the service to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetShape {
    /// A list of `count` persona objects
    PersonaList { count: usize },
    /// One interview covering `questions` questions
    Interview { questions: usize },
}

impl TargetShape {
    /// Short label used in logs and metrics
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PersonaList { .. } => "persona_list",
            Self::Interview { .. } => "interview",
        }
    }

    /// JSON schema of the expected output
    #[must_use]
    pub fn json_schema(&self) -> Value {
        let schema = match self {
            Self::PersonaList { .. } => schemars::schema_for!(PersonaListDraft),
            Self::Interview { .. } => schemars::schema_for!(InterviewDraft),
        };
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }
}

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub shape: TargetShape,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// External completion capability
///
/// Implementations are stateless from the engine's point of view and may be
/// called concurrently. Each call may block for a long time; timeouts are the
/// implementation's responsibility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produce a parsed object for the request
    async fn complete(&self, request: GenerationRequest) -> Result<Value, GenerationError>;
}

/// Canonical persona as returned by the service, before id assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonaDraft {
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub motivations: Vec<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub communication_style: String,
    #[serde(default)]
    pub demographic_details: Map<String, Value>,
}

/// Wrapper shape advertised for persona batches
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PersonaListDraft {
    pub personas: Vec<PersonaDraft>,
}

/// Canonical answer to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseDraft {
    /// Absent when the service omitted the question text
    #[serde(default)]
    pub question: Option<String>,
    #[serde(alias = "response", alias = "answer")]
    pub response_text: String,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// Canonical interview, before identity and duration are stamped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InterviewDraft {
    pub responses: Vec<ResponseDraft>,
    #[serde(default)]
    pub overall_sentiment: Option<Sentiment>,
}

/// Normalizing front of a [`GenerationService`]
#[derive(Clone)]
pub struct GenerationClient {
    service: Arc<dyn GenerationService>,
}

impl fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationClient").finish_non_exhaustive()
    }
}

impl GenerationClient {
    /// Wrap a service
    #[inline]
    #[must_use]
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    /// Request a persona batch
    ///
    /// # Errors
    /// Service failures pass through; unusable output is `MalformedOutput`
    pub async fn personas(
        &self,
        prompt: String,
        count: usize,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Vec<PersonaDraft>, GenerationError> {
        let raw = self
            .call(GenerationRequest {
                prompt,
                shape: TargetShape::PersonaList { count },
                temperature,
                max_tokens,
            })
            .await?;
        normalize_personas(raw)
    }

    /// Request one interview
    ///
    /// # Errors
    /// Service failures pass through; unusable output is `MalformedOutput`
    pub async fn interview(
        &self,
        prompt: String,
        questions: usize,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<InterviewDraft, GenerationError> {
        let raw = self
            .call(GenerationRequest {
                prompt,
                shape: TargetShape::Interview { questions },
                temperature,
                max_tokens,
            })
            .await?;
        normalize_interview(raw)
    }

    async fn call(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        let shape = request.shape.name();
        metrics::counter!("panel_generation_calls_total", "shape" => shape).increment(1);
        let result = self.service.complete(request).await;
        if let Err(e) = &result {
            metrics::counter!("panel_generation_failures_total", "shape" => shape).increment(1);
            tracing::debug!(shape, error = %e, "generation call failed");
        }
        result
    }
}

/// Turn whatever the service returned into a persona list
///
/// Accepts a bare array, an object wrapping the array under a common key, or a
/// single persona object.
///
/// # Errors
/// `MalformedOutput` if no persona list can be recovered
pub fn normalize_personas(raw: Value) -> Result<Vec<PersonaDraft>, GenerationError> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(mut obj) => match take_list(&mut obj, &["personas", "items", "data", "results"]) {
            Some(items) => items,
            None if obj.contains_key("name") => vec![Value::Object(obj)],
            None => {
                return Err(GenerationError::malformed(
                    "object without a persona list or persona fields",
                ))
            }
        },
        other => {
            return Err(GenerationError::malformed(format!(
                "expected persona list, got {}",
                kind_of(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let Value::Object(mut obj) = item else {
                return Err(GenerationError::malformed(format!(
                    "persona {idx} is not an object"
                )));
            };
            coerce_u32(&mut obj, "age");
            for key in ["motivations", "pain_points"] {
                coerce_string_list(&mut obj, key);
            }
            if !obj.get("demographic_details").is_some_and(Value::is_object) {
                obj.remove("demographic_details");
            }
            let draft: PersonaDraft = serde_json::from_value(Value::Object(obj))
                .map_err(|e| GenerationError::malformed(format!("persona {idx}: {e}")))?;
            if draft.name.trim().is_empty() {
                return Err(GenerationError::malformed(format!("persona {idx} has no name")));
            }
            Ok(draft)
        })
        .collect()
}

/// Turn whatever the service returned into an interview
///
/// # Errors
/// `MalformedOutput` if no non-empty response list can be recovered
pub fn normalize_interview(raw: Value) -> Result<InterviewDraft, GenerationError> {
    let mut obj = match raw {
        Value::Object(mut obj) => match obj.remove("interview") {
            Some(Value::Object(inner)) => inner,
            Some(other) => {
                obj.insert("interview".to_string(), other);
                obj
            }
            None => obj,
        },
        Value::Array(items) => {
            let mut obj = Map::new();
            obj.insert("responses".to_string(), Value::Array(items));
            obj
        }
        other => {
            return Err(GenerationError::malformed(format!(
                "expected interview object, got {}",
                kind_of(&other)
            )))
        }
    };

    let Some(responses) = take_list(&mut obj, &["responses", "answers", "exchanges"]) else {
        return Err(GenerationError::malformed("interview has no response list"));
    };
    if responses.is_empty() {
        return Err(GenerationError::malformed("interview has no responses"));
    }

    let responses = responses
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let Value::Object(mut resp) = item else {
                return Err(GenerationError::malformed(format!(
                    "response {idx} is not an object"
                )));
            };
            coerce_sentiment(&mut resp, "sentiment");
            for key in ["key_insights", "follow_up_questions"] {
                coerce_string_list(&mut resp, key);
            }
            serde_json::from_value::<ResponseDraft>(Value::Object(resp))
                .map_err(|e| GenerationError::malformed(format!("response {idx}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    coerce_sentiment(&mut obj, "overall_sentiment");
    let overall_sentiment = obj
        .remove("overall_sentiment")
        .and_then(|v| serde_json::from_value(v).ok());

    Ok(InterviewDraft {
        responses,
        overall_sentiment,
    })
}

fn take_list(obj: &mut Map<String, Value>, keys: &[&str]) -> Option<Vec<Value>> {
    keys.iter().find_map(|key| match obj.remove(*key) {
        Some(Value::Array(items)) => Some(items),
        Some(other) => {
            obj.insert((*key).to_string(), other);
            None
        }
        None => None,
    })
}

fn coerce_u32(obj: &mut Map<String, Value>, key: &str) {
    let coerced = match obj.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Some(Value::String(s)) => s
            .trim()
            .split(|c: char| !c.is_ascii_digit())
            .find(|part| !part.is_empty())
            .and_then(|digits| digits.parse().ok()),
        _ => None,
    };
    match coerced.and_then(|n| u32::try_from(n).ok()) {
        Some(n) => {
            obj.insert(key.to_string(), Value::from(n));
        }
        None => {
            obj.remove(key);
        }
    }
}

fn coerce_string_list(obj: &mut Map<String, Value>, key: &str) {
    let coerced: Vec<Value> = match obj.remove(key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(Value::String(s)),
                Value::String(_) | Value::Null => None,
                other => Some(Value::String(other.to_string())),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![Value::String(s)],
        _ => Vec::new(),
    };
    obj.insert(key.to_string(), Value::Array(coerced));
}

fn coerce_sentiment(obj: &mut Map<String, Value>, key: &str) {
    let parsed = obj
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Sentiment>().ok());
    match parsed {
        Some(sentiment) => {
            obj.insert(key.to_string(), Value::String(sentiment.to_string()));
        }
        None => {
            obj.remove(key);
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn personas_from_bare_array() {
        let drafts = normalize_personas(json!([
            {"name": "Ada Park", "age": 41, "motivations": ["save time"]},
            {"name": "Ben Ode", "age": "29 years", "pain_points": "slow onboarding"}
        ]))
        .unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].age, 29);
        assert_eq!(drafts[1].pain_points, vec!["slow onboarding".to_string()]);
    }

    #[test]
    fn personas_from_wrapped_object() {
        let drafts = normalize_personas(json!({"personas": [{"name": "Cy"}]})).unwrap();
        assert_eq!(drafts[0].name, "Cy");
        assert_eq!(drafts[0].age, 0);
    }

    #[test]
    fn single_persona_object_is_accepted() {
        let drafts = normalize_personas(json!({"name": "Dee", "background": "nurse"})).unwrap();
        assert_eq!(drafts.len(), 1);
    }

    #[test]
    fn persona_without_name_is_malformed() {
        let err = normalize_personas(json!([{"age": 30}])).unwrap_err();
        assert!(err.is_malformed());

        let err = normalize_personas(json!("just text")).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn interview_accepts_aliases_and_nesting() {
        let draft = normalize_interview(json!({
            "interview": {
                "responses": [
                    {"question": "Q1", "answer": "Sure.", "sentiment": "Positive"},
                    {"response": "Not really.", "sentiment": "grumpy"}
                ],
                "overall_sentiment": "MIXED"
            }
        }))
        .unwrap();

        assert_eq!(draft.responses.len(), 2);
        assert_eq!(draft.responses[0].sentiment, Sentiment::Positive);
        assert_eq!(draft.responses[1].sentiment, Sentiment::Neutral);
        assert_eq!(draft.responses[1].question, None);
        assert_eq!(draft.overall_sentiment, Some(Sentiment::Mixed));
    }

    #[test]
    fn empty_interview_is_malformed() {
        assert!(normalize_interview(json!({"responses": []}))
            .unwrap_err()
            .is_malformed());
        assert!(normalize_interview(json!(42)).unwrap_err().is_malformed());
    }

    #[test]
    fn target_shape_schema_names_fields() {
        let schema = TargetShape::Interview { questions: 3 }.json_schema();
        let text = schema.to_string();
        assert!(text.contains("responses"));
        assert!(text.contains("response_text"));
    }

    #[tokio::test]
    async fn client_normalizes_service_output() {
        let mut service = MockGenerationService::new();
        service
            .expect_complete()
            .withf(|req| matches!(req.shape, TargetShape::PersonaList { count: 2 }))
            .times(1)
            .returning(|_| Ok(json!({"items": [{"name": "Eve"}, {"name": "Fay"}]})));

        let client = GenerationClient::new(Arc::new(service));
        let drafts = client.personas("prompt".to_string(), 2, 0.3, 500).await.unwrap();
        assert_eq!(drafts.len(), 2);
    }
}
