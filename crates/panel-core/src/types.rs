//! Core data model
//!
//! Defines the values flowing through a simulation run:
//! - Business context and stakeholder groups (caller input)
//! - Personas and simulated interviews (generated corpus)
//! - The run record with its status state machine and error lists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Unique run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Unique persona identifier, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonaId(pub Ulid);

impl PersonaId {
    /// Generate new persona ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PersonaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The business being researched
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BusinessContext {
    /// One-line description of the idea
    pub business_idea: String,
    /// Who the business wants to sell to
    #[serde(default)]
    pub target_customer: String,
    /// Problem the business claims to solve
    #[serde(default)]
    pub problem: String,
    /// Industry or market segment
    #[serde(default)]
    pub industry: String,
}

impl BusinessContext {
    /// Create context from an idea
    #[inline]
    #[must_use]
    pub fn new(business_idea: impl Into<String>) -> Self {
        Self {
            business_idea: business_idea.into(),
            ..Self::default()
        }
    }

    /// With target customer
    #[inline]
    #[must_use]
    pub fn with_target_customer(mut self, target_customer: impl Into<String>) -> Self {
        self.target_customer = target_customer.into();
        self
    }

    /// With problem statement
    #[inline]
    #[must_use]
    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.problem = problem.into();
        self
    }

    /// With industry
    #[inline]
    #[must_use]
    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = industry.into();
        self
    }
}

/// Named category of interview subjects with its question list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StakeholderGroup {
    /// Caller-supplied identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Who belongs to this group
    #[serde(default)]
    pub description: String,
    /// Ordered interview questions
    #[serde(default)]
    pub questions: Vec<String>,
}

impl StakeholderGroup {
    /// Create new group
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            questions: Vec::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With question appended
    #[inline]
    #[must_use]
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.questions.push(question.into());
        self
    }

    /// With questions replaced
    #[inline]
    #[must_use]
    pub fn with_questions<I, S>(mut self, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.questions = questions.into_iter().map(Into::into).collect();
        self
    }

    /// Drop questions that are empty or whitespace only
    #[must_use]
    pub fn without_blank_questions(mut self) -> Self {
        self.questions.retain(|q| !q.trim().is_empty());
        self
    }
}

/// Synthesized interview subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub name: String,
    pub age: u32,
    pub background: String,
    pub motivations: Vec<String>,
    pub pain_points: Vec<String>,
    pub communication_style: String,
    pub demographic_details: serde_json::Map<String, serde_json::Value>,
    pub stakeholder_group_id: String,
}

/// Tone of one answer or a whole interview
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
    Mixed,
}

impl Sentiment {
    /// Fold a sequence of sentiments into one
    ///
    /// Unanimous sequences keep their value, anything else is `Mixed`,
    /// and an empty sequence is `Neutral`.
    #[must_use]
    pub fn aggregate<I: IntoIterator<Item = Sentiment>>(items: I) -> Self {
        let mut iter = items.into_iter();
        let Some(first) = iter.next() else {
            return Self::Neutral;
        };
        if iter.all(|s| s == first) {
            first
        } else {
            Self::Mixed
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            "mixed" => Ok(Self::Mixed),
            other => Err(format!("unknown sentiment '{other}'")),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewResponse {
    pub question: String,
    pub response_text: String,
    pub sentiment: Sentiment,
    pub key_insights: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

impl InterviewResponse {
    /// Whitespace-separated word count of the answer
    #[inline]
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.response_text.split_whitespace().count()
    }
}

/// Structured interview of one persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedInterview {
    pub persona_id: PersonaId,
    pub stakeholder_group_id: String,
    pub responses: Vec<InterviewResponse>,
    /// Derived from the responses, never taken from the service
    pub duration_minutes: u32,
    pub overall_sentiment: Sentiment,
}

/// Run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Statuses reachable in one step
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [RunStatus] {
        use RunStatus::{Cancelled, Completed, Failed, Pending, Running};
        match self {
            Pending => &[Running],
            Running => &[Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => &[],
        }
    }

    /// Check a single transition
    #[inline]
    #[must_use]
    pub fn can_transition_to(self, to: RunStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// No exit from a terminal status
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Run-level error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    Validation,
    Aggregate,
    Internal,
}

/// Error recorded on a run at the granularity it occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RunError {
    /// A group's persona batch failed; it contributes zero personas
    Group {
        group_id: String,
        group_name: String,
        message: String,
    },
    /// One interview failed; the batch continued
    Interview {
        persona_id: PersonaId,
        group_id: String,
        message: String,
    },
    /// Failure of the run as a whole
    Run { kind: RunErrorKind, message: String },
}

/// One end-to-end execution of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRun {
    pub id: RunId,
    pub status: RunStatus,
    pub business_context: BusinessContext,
    pub stakeholder_groups: Vec<StakeholderGroup>,
    pub personas: Vec<Persona>,
    pub interviews: Vec<SimulatedInterview>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub errors: Vec<RunError>,
    /// Non-fatal observations (count mismatches, name collisions)
    pub warnings: Vec<String>,
}

impl SimulationRun {
    /// Create pending run
    #[must_use]
    pub fn new(
        id: RunId,
        business_context: BusinessContext,
        stakeholder_groups: Vec<StakeholderGroup>,
    ) -> Self {
        Self {
            id,
            status: RunStatus::Pending,
            business_context,
            stakeholder_groups,
            personas: Vec::new(),
            interviews: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Personas generated for one group, in service order
    pub fn personas_in_group<'a>(&'a self, group_id: &'a str) -> impl Iterator<Item = &'a Persona> {
        self.personas
            .iter()
            .filter(move |p| p.stakeholder_group_id == group_id)
    }

    /// Ids of groups whose persona batch failed
    #[must_use]
    pub fn failed_groups(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter_map(|e| match e {
                RunError::Group { group_id, .. } => Some(group_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Failed-interview markers
    pub fn interview_errors(&self) -> impl Iterator<Item = &RunError> {
        self.errors
            .iter()
            .filter(|e| matches!(e, RunError::Interview { .. }))
    }

    /// Check whether an interview's persona belongs to this run
    #[must_use]
    pub fn owns_persona(&self, persona_id: PersonaId) -> bool {
        self.personas.iter().any(|p| p.id == persona_id)
    }
}
