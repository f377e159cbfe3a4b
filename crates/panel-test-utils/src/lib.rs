//! Testing utilities for the synthetic panel workspace
//!
//! Shared test helpers, fixtures, and a scripted generation service.

#![allow(missing_docs)]

use async_trait::async_trait;
use panel_core::prompts::USED_NAMES_PREFIX;
use panel_core::{
    BusinessContext, EngineConfig, GenerationError, GenerationRequest, GenerationService,
    SimulationOrchestrator, StakeholderGroup, TargetShape,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Names handed out by [`ScriptedService`], in order
pub const NAME_POOL: &[&str] = &[
    "Avery Quinn",
    "Blake Moreno",
    "Casey Lindqvist",
    "Dana Okafor",
    "Emery Castillo",
    "Finley Brandt",
    "Gray Nakamura",
    "Harper Osei",
    "Indy Varga",
    "Jules Petrov",
    "Kai Mensah",
    "Logan Ferreira",
];

const ANSWERS: &[(&str, &str)] = &[
    ("positive", "Honestly that would save me a few hours every week, so I would try it."),
    ("negative", "I have been burned by tools like this before and the setup cost worries me."),
    ("neutral", "It depends on the price and on whether my team would actually use it."),
];

/// Closed gate that holds persona calls until opened
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    /// Let `n` waiting or future calls through
    pub fn open(&self, n: usize) {
        self.permits.add_permits(n);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

/// Deterministic [`GenerationService`] for tests
///
/// Persona batches draw names from [`NAME_POOL`], skipping names the prompt
/// lists as taken unless `ignore_used_names` is set. Interviews answer every
/// question with a canned line.
#[derive(Debug, Default)]
pub struct ScriptedService {
    failing_groups: HashSet<String>,
    failing_personas: HashSet<String>,
    panicking_personas: HashSet<String>,
    ignore_used_names: bool,
    persona_gate: Option<Gate>,
    interview_delay: Duration,
    persona_calls: AtomicUsize,
    interview_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: parking_lot::Mutex<Vec<GenerationRequest>>,
}

impl ScriptedService {
    /// Create cooperative service
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every persona batch of the named group with a provider error
    #[must_use]
    pub fn failing_group(mut self, group_name: impl Into<String>) -> Self {
        self.failing_groups.insert(group_name.into());
        self
    }

    /// Time out every interview of the named persona
    #[must_use]
    pub fn failing_persona(mut self, persona_name: impl Into<String>) -> Self {
        self.failing_personas.insert(persona_name.into());
        self
    }

    /// Panic inside every interview of the named persona
    #[must_use]
    pub fn panicking_persona(mut self, persona_name: impl Into<String>) -> Self {
        self.panicking_personas.insert(persona_name.into());
        self
    }

    /// Always start from the top of the name pool
    #[must_use]
    pub fn ignoring_used_names(mut self) -> Self {
        self.ignore_used_names = true;
        self
    }

    /// Hold persona calls behind a gate; the gate starts closed
    #[must_use]
    pub fn with_persona_gate(mut self) -> (Self, Gate) {
        let gate = Gate {
            permits: Arc::new(Semaphore::new(0)),
        };
        self.persona_gate = Some(gate.clone());
        (self, gate)
    }

    /// Delay every interview answer
    #[must_use]
    pub fn with_interview_delay(mut self, delay: Duration) -> Self {
        self.interview_delay = delay;
        self
    }

    /// Persona batch calls made so far
    pub fn persona_calls(&self) -> usize {
        self.persona_calls.load(Ordering::SeqCst)
    }

    /// Interview calls made so far
    pub fn interview_calls(&self) -> usize {
        self.interview_calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous interview calls
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    fn personas(&self, prompt: &str, count: usize) -> Result<Value, GenerationError> {
        if self
            .failing_groups
            .iter()
            .any(|group| prompt.contains(&format!("\"{group}\"")))
        {
            return Err(GenerationError::Provider("scripted group failure".to_string()));
        }

        let taken: HashSet<&str> = if self.ignore_used_names {
            HashSet::new()
        } else {
            prompt
                .lines()
                .find_map(|line| line.strip_prefix(USED_NAMES_PREFIX))
                .map(|rest| rest.split(", ").collect())
                .unwrap_or_default()
        };

        let personas: Vec<Value> = NAME_POOL
            .iter()
            .filter(|name| !taken.contains(*name))
            .take(count)
            .enumerate()
            .map(|(idx, name)| {
                json!({
                    "name": name,
                    "age": 28 + idx * 7,
                    "background": format!("{name} has worked in the field for {} years.", 3 + idx),
                    "motivations": ["Save time", "Keep costs predictable"],
                    "pain_points": "Too many manual steps",
                    "communication_style": "Plain-spoken",
                    "demographic_details": {"location": "Leeds", "household": "two adults"}
                })
            })
            .collect();

        Ok(json!({ "personas": personas }))
    }

    async fn interview(&self, prompt: &str, questions: usize) -> Result<Value, GenerationError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.interview_delay.is_zero() {
            tokio::time::sleep(self.interview_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(name) = self
            .panicking_personas
            .iter()
            .find(|name| prompt.starts_with(&format!("You are {name},")))
        {
            panic!("scripted panic interviewing {name}");
        }
        if self
            .failing_personas
            .iter()
            .any(|name| prompt.starts_with(&format!("You are {name},")))
        {
            return Err(GenerationError::Timeout { duration_secs: 30 });
        }

        let responses: Vec<Value> = (0..questions)
            .map(|idx| {
                let (sentiment, text) = ANSWERS[idx % ANSWERS.len()];
                json!({
                    "response_text": text,
                    "sentiment": sentiment,
                    "key_insights": [format!("insight {}", idx + 1)],
                    "follow_up_questions": []
                })
            })
            .collect();
        Ok(json!({ "responses": responses }))
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn complete(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        self.requests.lock().push(request.clone());
        match request.shape {
            TargetShape::PersonaList { count } => {
                self.persona_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(gate) = &self.persona_gate {
                    gate.pass().await;
                }
                self.personas(&request.prompt, count)
            }
            TargetShape::Interview { questions } => {
                self.interview_calls.fetch_add(1, Ordering::SeqCst);
                self.interview(&request.prompt, questions).await
            }
        }
    }
}

pub fn business_context() -> BusinessContext {
    BusinessContext::new("Shared cold-storage lockers for farmers' markets")
        .with_target_customer("Small producers selling at weekly markets")
        .with_problem("Unsold produce spoils between market days")
        .with_industry("Food logistics")
}

pub fn group(id: &str, name: &str) -> StakeholderGroup {
    StakeholderGroup::new(id, name)
        .with_description(format!("{name} at regional markets"))
        .with_questions([
            "What happens to produce you do not sell?",
            "How do you store stock today?",
            "What would you pay per week for a locker?",
        ])
}

pub fn setup_orchestrator(service: Arc<ScriptedService>) -> SimulationOrchestrator {
    SimulationOrchestrator::new(service, EngineConfig::default())
}

pub fn setup_orchestrator_with(
    service: Arc<ScriptedService>,
    config: EngineConfig,
) -> SimulationOrchestrator {
    SimulationOrchestrator::new(service, config)
}

/// Route engine logs to the test harness; safe to call repeatedly
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
