//! Simulation orchestrator
//!
//! Owns every run of one engine instance:
//! - `start()` registers a run and spawns its coordinating task
//! - The task walks the run state machine (personas, then interviews)
//! - Queries read progress and results concurrently with the task
//! - Terminal runs are reaped once the retention window has passed
//!
//! Cancellation is cooperative. `cancel()` only raises a flag that the run
//! task checks between persona groups and before each interview dispatch.

use crate::cache::{CacheStats, InterviewCache};
use crate::config::{EngineConfig, SimulationConfig};
use crate::error::{panic_message, SimulationError};
use crate::executor::{ConcurrencyExecutor, ExecutionMode, InterviewTask, TaskOutcome};
use crate::generation::{GenerationClient, GenerationService};
use crate::interview::InterviewSimulator;
use crate::persona::PersonaGenerator;
use crate::progress::{ProgressSnapshot, ProgressTracker, Stage};
use crate::registry::{NameRegistry, NameScope};
use crate::types::{
    BusinessContext, RunError, RunErrorKind, RunId, RunStatus, SimulationRun, StakeholderGroup,
};
use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Check a run request before any generation happens
///
/// # Errors
/// `SimulationError::Validation` naming the first problem found
pub fn validate_request(
    context: &BusinessContext,
    groups: &[StakeholderGroup],
    config: &SimulationConfig,
) -> Result<(), SimulationError> {
    if context.business_idea.trim().is_empty() {
        return Err(SimulationError::Validation(
            "business_idea must not be empty".to_string(),
        ));
    }
    if groups.is_empty() {
        return Err(SimulationError::Validation(
            "at least one stakeholder group is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for group in groups {
        if group.id.trim().is_empty() {
            return Err(SimulationError::Validation(format!(
                "stakeholder group '{}' has an empty id",
                group.name
            )));
        }
        if !seen.insert(group.id.as_str()) {
            return Err(SimulationError::Validation(format!(
                "duplicate stakeholder group id '{}'",
                group.id
            )));
        }
        if group.questions.iter().all(|q| q.trim().is_empty()) {
            return Err(SimulationError::Validation(format!(
                "stakeholder group '{}' has no questions",
                group.id
            )));
        }
    }

    config.validate()
}

/// Terminal status picked by the run task, with the error that caused it
struct Conclusion {
    status: RunStatus,
    current_task: String,
    error: Option<RunError>,
}

/// Shared state of one run
struct RunRecord {
    id: RunId,
    run: parking_lot::RwLock<SimulationRun>,
    progress: ProgressTracker,
    /// Flips to `true` exactly once, on the terminal transition
    done: watch::Sender<bool>,
    finished_at: parking_lot::Mutex<Option<Instant>>,
}

impl RunRecord {
    fn new(run: SimulationRun, expected_personas: usize) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id: run.id,
            run: parking_lot::RwLock::new(run),
            progress: ProgressTracker::new(expected_personas),
            done,
            finished_at: parking_lot::Mutex::new(None),
        }
    }

    fn status(&self) -> RunStatus {
        self.run.read().status
    }

    fn snapshot(&self) -> SimulationRun {
        self.run.read().clone()
    }

    /// Apply a status change allowed by the state machine
    fn transition(&self, to: RunStatus) -> Result<(), SimulationError> {
        let mut run = self.run.write();
        let from = run.status;
        if !from.can_transition_to(to) {
            return Err(SimulationError::IllegalTransition { from, to });
        }
        run.status = to;
        if to.is_terminal() {
            run.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mutate the run record unless it is already terminal
    fn mutate(&self, f: impl FnOnce(&mut SimulationRun)) -> bool {
        let mut run = self.run.write();
        if run.status.is_terminal() {
            tracing::debug!(run_id = %self.id, status = %run.status, "mutation rejected on terminal run");
            return false;
        }
        f(&mut run);
        true
    }

    /// Enter a terminal status and wake waiters
    fn finish(&self, to: RunStatus, current_task: impl Into<String>) -> bool {
        let current_task = current_task.into();
        self.finish_with(|| Conclusion {
            status: to,
            current_task,
            error: None,
        })
    }

    /// Enter the terminal status chosen by `pick` while the record is locked
    ///
    /// A concurrent `cancel()` either lands before `pick` runs and is seen by
    /// it, or finds the run already terminal.
    fn finish_with(&self, pick: impl FnOnce() -> Conclusion) -> bool {
        let (to, current_task) = {
            let mut run = self.run.write();
            let from = run.status;
            let Conclusion {
                status,
                current_task,
                error,
            } = pick();
            if !status.is_terminal() || !from.can_transition_to(status) {
                let e = SimulationError::IllegalTransition { from, to: status };
                tracing::warn!(run_id = %self.id, "{}", e);
                return false;
            }
            run.status = status;
            run.completed_at = Some(Utc::now());
            run.errors.extend(error);
            (status, current_task)
        };

        let stage = match to {
            RunStatus::Completed => Stage::Completed,
            RunStatus::Cancelled => Stage::Cancelled,
            _ => Stage::Failed,
        };
        self.progress.set_stage(stage, current_task);
        *self.finished_at.lock() = Some(Instant::now());
        self.done.send_replace(true);

        metrics::counter!("panel_runs_finished_total", "status" => to.to_string()).increment(1);
        tracing::info!(run_id = %self.id, elapsed_ms = self.progress.elapsed().as_millis() as u64, "run {}", to);
        true
    }

    /// Raise the cancel flag unless the run is already terminal
    fn request_cancel(&self) -> bool {
        // Held so the run cannot reach a terminal status in between
        let run = self.run.read();
        if run.status.is_terminal() {
            return false;
        }
        if self.progress.request_cancel() {
            tracing::info!(run_id = %self.id, "cancellation requested");
        }
        true
    }

    /// Record a run-level error and fail the run
    fn fail(&self, kind: RunErrorKind, message: String) {
        if self.status() == RunStatus::Pending {
            let _ = self.transition(RunStatus::Running);
        }
        self.finish_with(|| Conclusion {
            status: RunStatus::Failed,
            error: Some(RunError::Run {
                kind,
                message: message.clone(),
            }),
            current_task: message,
        });
    }

    fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        self.finished_at
            .lock()
            .is_some_and(|at| now.saturating_duration_since(at) >= retention)
    }
}

struct Inner {
    client: GenerationClient,
    config: EngineConfig,
    cache: Option<InterviewCache>,
    runs: DashMap<RunId, Arc<RunRecord>>,
}

/// Entry point of the engine
///
/// Cheap to clone; clones share runs and the interview cache.
#[derive(Clone)]
pub struct SimulationOrchestrator {
    inner: Arc<Inner>,
}

impl fmt::Debug for SimulationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationOrchestrator")
            .field("config", &self.inner.config)
            .field("runs", &self.inner.runs.len())
            .finish_non_exhaustive()
    }
}

impl SimulationOrchestrator {
    /// Create orchestrator over a generation service
    #[must_use]
    pub fn new(service: Arc<dyn GenerationService>, config: EngineConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| InterviewCache::new(config.cache_capacity));
        Self {
            inner: Arc::new(Inner {
                client: GenerationClient::new(service),
                config,
                cache,
                runs: DashMap::new(),
            }),
        }
    }

    /// Engine settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Start a run in the background
    ///
    /// Input is validated by the run task itself; a bad request yields a run
    /// that ends `failed` with a validation error. Must be called from within
    /// a tokio runtime.
    pub fn start(
        &self,
        context: BusinessContext,
        groups: Vec<StakeholderGroup>,
        config: SimulationConfig,
    ) -> RunId {
        self.spawn_run(context, groups, config).id
    }

    fn spawn_run(
        &self,
        context: BusinessContext,
        groups: Vec<StakeholderGroup>,
        config: SimulationConfig,
    ) -> Arc<RunRecord> {
        self.reap_expired();

        let groups: Vec<StakeholderGroup> = groups
            .into_iter()
            .map(StakeholderGroup::without_blank_questions)
            .collect();
        // Out-of-range sizes are rejected by the run task, not here
        let expected = groups.len().saturating_mul(config.people_per_stakeholder);
        let run = SimulationRun::new(RunId::new(), context, groups);
        let record = Arc::new(RunRecord::new(run, expected));
        self.inner.runs.insert(record.id, Arc::clone(&record));

        metrics::counter!("panel_runs_started_total").increment(1);
        tracing::info!(run_id = %record.id, "run registered");

        let inner = Arc::clone(&self.inner);
        let task_record = Arc::clone(&record);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(drive(&inner, &task_record, config))
                .catch_unwind()
                .await;
            if let Err(payload) = outcome {
                let message = panic_message(&*payload);
                tracing::error!(run_id = %task_record.id, "run task panicked: {}", message);
                task_record.fail(RunErrorKind::Internal, format!("run task panicked: {message}"));
            }
        });

        record
    }

    /// Run to completion and return the final record
    ///
    /// # Errors
    /// `SimulationError::Aborted` if the run task vanished without finishing
    pub async fn execute(
        &self,
        context: BusinessContext,
        groups: Vec<StakeholderGroup>,
        config: SimulationConfig,
    ) -> Result<SimulationRun, SimulationError> {
        let record = self.spawn_run(context, groups, config);
        wait_terminal(&record).await
    }

    /// Wait for a run to reach a terminal status
    ///
    /// # Errors
    /// `SimulationError::RunNotFound` for unknown or reaped runs
    pub async fn wait(&self, run_id: RunId) -> Result<SimulationRun, SimulationError> {
        let record = self.record(run_id)?;
        wait_terminal(&record).await
    }

    /// Progress snapshot of a run
    ///
    /// # Errors
    /// `SimulationError::RunNotFound` for unknown or reaped runs
    pub fn get_progress(&self, run_id: RunId) -> Result<ProgressSnapshot, SimulationError> {
        self.reap_expired();
        Ok(self.record(run_id)?.progress.snapshot())
    }

    /// Request cooperative cancellation
    ///
    /// Returns `false` if the run is unknown or already terminal. A `true`
    /// return means the run ends `cancelled` unless it fails first.
    pub fn cancel(&self, run_id: RunId) -> bool {
        self.record(run_id)
            .is_ok_and(|record| record.request_cancel())
    }

    /// Current run record, partial while the run is in flight
    ///
    /// # Errors
    /// `SimulationError::RunNotFound` for unknown or reaped runs
    pub fn get_result(&self, run_id: RunId) -> Result<SimulationRun, SimulationError> {
        self.reap_expired();
        Ok(self.record(run_id)?.snapshot())
    }

    /// Statistics of the shared interview cache
    pub async fn cache_stats(&self) -> CacheStats {
        match &self.inner.cache {
            Some(cache) => cache.stats().await,
            None => CacheStats::default(),
        }
    }

    /// Drop all cached interviews
    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.clear().await;
        }
    }

    /// Number of runs currently held
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.inner.runs.len()
    }

    /// Remove terminal runs older than the retention window
    ///
    /// Returns the number of runs removed.
    pub fn reap_expired(&self) -> usize {
        let retention = self.inner.config.retention();
        let now = Instant::now();
        let before = self.inner.runs.len();
        self.inner
            .runs
            .retain(|_, record| !record.is_expired(now, retention));
        let reaped = before.saturating_sub(self.inner.runs.len());
        if reaped > 0 {
            tracing::debug!(reaped, "reaped expired runs");
        }
        reaped
    }

    fn record(&self, run_id: RunId) -> Result<Arc<RunRecord>, SimulationError> {
        self.inner
            .runs
            .get(&run_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SimulationError::RunNotFound(run_id))
    }
}

async fn wait_terminal(record: &RunRecord) -> Result<SimulationRun, SimulationError> {
    let mut done = record.done.subscribe();
    done.wait_for(|finished| *finished)
        .await
        .map_err(|_| SimulationError::Aborted(format!("run {} lost its task", record.id)))?;
    Ok(record.snapshot())
}

/// Body of the coordinating task
#[tracing::instrument(name = "run", skip_all, fields(run_id = %record.id))]
async fn drive(inner: &Inner, record: &RunRecord, config: SimulationConfig) {
    if let Err(e) = record.transition(RunStatus::Running) {
        tracing::warn!("run not started: {}", e);
        return;
    }

    let (context, groups) = {
        let run = record.run.read();
        (run.business_context.clone(), run.stakeholder_groups.clone())
    };

    if let Err(e) = validate_request(&context, &groups, &config) {
        tracing::warn!("rejecting run: {}", e);
        record.fail(RunErrorKind::Validation, e.to_string());
        return;
    }

    let tasks = generate_personas(inner, record, &context, &groups, &config).await;

    if tasks.is_empty() || record.progress.is_cancel_requested() {
        record.finish_with(|| {
            if record.progress.is_cancel_requested() {
                return Conclusion {
                    status: RunStatus::Cancelled,
                    current_task: "cancelled before interviews".to_string(),
                    error: None,
                };
            }
            let message = SimulationError::Aggregate {
                groups: groups.len(),
            }
            .to_string();
            tracing::error!("{}", message);
            Conclusion {
                status: RunStatus::Failed,
                error: Some(RunError::Run {
                    kind: RunErrorKind::Aggregate,
                    message: message.clone(),
                }),
                current_task: message,
            }
        });
        return;
    }

    simulate_interviews(inner, record, &context, tasks, &config).await;

    record.finish_with(|| {
        let (status, current_task) = if record.progress.is_cancel_requested() {
            (RunStatus::Cancelled, "cancelled during interviews")
        } else {
            (RunStatus::Completed, "done")
        };
        Conclusion {
            status,
            current_task: current_task.to_string(),
            error: None,
        }
    });
}

/// Persona phase, one group at a time in input order
async fn generate_personas(
    inner: &Inner,
    record: &RunRecord,
    context: &BusinessContext,
    groups: &[StakeholderGroup],
    config: &SimulationConfig,
) -> Vec<InterviewTask> {
    let generator = PersonaGenerator::new(
        inner.client.clone(),
        inner.config.persona_temperature,
        inner.config.persona_max_tokens,
    );
    let mut registry = NameRegistry::new(NameScope::from_flag(config.global_name_uniqueness));
    let requested = config.people_per_stakeholder;
    let mut tasks = Vec::with_capacity(groups.len() * requested);

    for (idx, group) in groups.iter().enumerate() {
        if record.progress.is_cancel_requested() {
            tracing::info!(remaining = groups.len() - idx, "persona phase stopped by cancellation");
            break;
        }
        record.progress.set_stage(
            Stage::GeneratingPersonas,
            format!(
                "generating personas for '{}' ({}/{})",
                group.name,
                idx + 1,
                groups.len()
            ),
        );

        let group = Arc::new(group.clone());
        let generated = AssertUnwindSafe(generator.generate(context, &group, requested, &mut registry))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(SimulationError::Internal(format!(
                    "persona task panicked: {}",
                    panic_message(&*payload)
                )))
            });
        match generated {
            Ok(batch) => {
                record
                    .progress
                    .record_group_batch(requested, batch.personas.len());
                tasks.extend(batch.personas.iter().map(|persona| InterviewTask {
                    persona: persona.clone(),
                    group: Arc::clone(&group),
                }));
                record.mutate(|run| {
                    run.personas.extend(batch.personas);
                    run.warnings.extend(batch.warnings);
                });
            }
            Err(e) => {
                tracing::warn!(group = %group.id, "group contributes no personas: {}", e);
                record.progress.record_group_batch(requested, 0);
                record.mutate(|run| {
                    run.errors.push(RunError::Group {
                        group_id: group.id.clone(),
                        group_name: group.name.clone(),
                        message: e.to_string(),
                    });
                });
            }
        }
    }

    tracing::info!(personas = tasks.len(), "persona phase finished");
    tasks
}

/// Interview phase through the executor
async fn simulate_interviews(
    inner: &Inner,
    record: &RunRecord,
    context: &BusinessContext,
    tasks: Vec<InterviewTask>,
    config: &SimulationConfig,
) {
    let total = tasks.len();
    record.progress.set_total_interviews(total);
    record.progress.set_stage(
        Stage::SimulatingInterviews,
        format!("simulating {total} interviews"),
    );

    let simulator = InterviewSimulator::new(
        inner.client.clone(),
        config.response_style,
        config.depth,
        config.temperature,
    );
    let mut executor = ConcurrencyExecutor::new(
        simulator,
        ExecutionMode::from_options(config.parallel, config.max_concurrent),
    );
    if let Some(cache) = &inner.cache {
        executor = executor.with_cache(cache.clone());
    }

    let progress = &record.progress;
    let mut skipped = 0usize;
    executor
        .run(
            context,
            tasks,
            || progress.is_cancel_requested(),
            |outcome| match outcome {
                TaskOutcome::Completed { interview, .. } => {
                    record.mutate(|run| run.interviews.push(interview.clone()));
                    progress.record_interview();
                }
                TaskOutcome::Failed {
                    persona_id,
                    group_id,
                    error,
                } => {
                    record.mutate(|run| {
                        run.errors.push(RunError::Interview {
                            persona_id: *persona_id,
                            group_id: group_id.clone(),
                            message: error.to_string(),
                        });
                    });
                    progress.record_interview();
                }
                TaskOutcome::Skipped { .. } => skipped += 1,
            },
        )
        .await;

    tracing::info!(total, skipped, "interview phase finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Depth;
    use crate::error::GenerationError;
    use crate::generation::{GenerationRequest, TargetShape};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Produces numbered personas and one-line answers
    #[derive(Default)]
    struct EchoService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationService for EchoService {
        async fn complete(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match request.shape {
                TargetShape::PersonaList { count } => Ok(Value::Array(
                    (0..count)
                        .map(|i| json!({"name": format!("Person {n}-{i}"), "age": 40}))
                        .collect(),
                )),
                TargetShape::Interview { questions } => Ok(json!({
                    "responses": (0..questions)
                        .map(|_| json!({"response_text": "It depends."}))
                        .collect::<Vec<_>>()
                })),
            }
        }
    }

    /// Panics while interviewing "Boom" and while staffing the "Broken" group
    struct PanickingService;

    #[async_trait]
    impl GenerationService for PanickingService {
        async fn complete(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
            match request.shape {
                TargetShape::PersonaList { .. } if request.prompt.contains("\"Broken\"") => {
                    panic!("persona backend exploded")
                }
                TargetShape::PersonaList { .. } => {
                    Ok(json!([{"name": "Ivy"}, {"name": "Boom"}, {"name": "Jo"}]))
                }
                TargetShape::Interview { .. } if request.prompt.starts_with("You are Boom,") => {
                    panic!("interview backend exploded")
                }
                TargetShape::Interview { questions } => Ok(json!({
                    "responses": (0..questions)
                        .map(|_| json!({"response_text": "Fine."}))
                        .collect::<Vec<_>>()
                })),
            }
        }
    }

    fn groups() -> Vec<StakeholderGroup> {
        vec![StakeholderGroup::new("fleet", "Fleet managers").with_question("How do you plan routes?")]
    }

    fn config() -> SimulationConfig {
        SimulationConfig::new()
            .with_depth(Depth::Quick)
            .with_people_per_stakeholder(2)
            .sequential()
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let ctx = BusinessContext::new("Route planner");
        assert!(validate_request(&ctx, &groups(), &config()).is_ok());
        assert!(validate_request(&BusinessContext::new("  "), &groups(), &config()).is_err());
        assert!(validate_request(&ctx, &[], &config()).is_err());

        let no_questions = vec![StakeholderGroup::new("x", "X")];
        assert!(validate_request(&ctx, &no_questions, &config()).is_err());

        let dupes = vec![groups().remove(0), groups().remove(0)];
        assert!(validate_request(&ctx, &dupes, &config()).is_err());
    }

    #[test]
    fn terminal_record_rejects_further_changes() {
        let run = SimulationRun::new(RunId::new(), BusinessContext::new("idea"), groups());
        let record = RunRecord::new(run, 1);

        assert!(matches!(
            record.transition(RunStatus::Completed),
            Err(SimulationError::IllegalTransition { .. })
        ));
        record.transition(RunStatus::Running).unwrap();
        assert!(record.finish(RunStatus::Completed, "done"));

        assert!(!record.finish(RunStatus::Failed, "late"));
        assert!(!record.mutate(|run| run.warnings.push("late".to_string())));
        let run = record.snapshot();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.warnings.is_empty());
        assert!(run.completed_at.is_some());
    }

    #[tokio::test]
    async fn execute_runs_to_completion() {
        let orchestrator =
            SimulationOrchestrator::new(Arc::new(EchoService::default()), EngineConfig::default());

        let run = orchestrator
            .execute(BusinessContext::new("Route planner"), groups(), config())
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.personas.len(), 2);
        assert_eq!(run.interviews.len(), 2);

        let progress = orchestrator.get_progress(run.id).unwrap();
        assert_eq!(progress.stage, Stage::Completed);
        assert_eq!(progress.percentage, 100.0);
    }

    #[tokio::test]
    async fn invalid_request_fails_the_run() {
        let orchestrator =
            SimulationOrchestrator::new(Arc::new(EchoService::default()), EngineConfig::default());

        let run = orchestrator
            .execute(BusinessContext::new(""), groups(), config())
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert!(matches!(
            run.errors[0],
            RunError::Run {
                kind: RunErrorKind::Validation,
                ..
            }
        ));
        assert!(run.personas.is_empty());
    }

    #[tokio::test]
    async fn panicking_interview_is_recorded_on_that_interview() {
        let orchestrator =
            SimulationOrchestrator::new(Arc::new(PanickingService), EngineConfig::default());

        let run = orchestrator
            .execute(
                BusinessContext::new("idea"),
                groups(),
                config().with_people_per_stakeholder(3),
            )
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.personas.len(), 3);
        assert_eq!(run.interviews.len(), 2);
        assert!(matches!(
            &run.errors[..],
            [RunError::Interview { message, .. }] if message.contains("interview backend exploded")
        ));
    }

    #[tokio::test]
    async fn panicking_group_is_recorded_on_that_group() {
        let orchestrator =
            SimulationOrchestrator::new(Arc::new(PanickingService), EngineConfig::default());
        let mut groups = groups();
        groups.insert(0, StakeholderGroup::new("broken", "Broken").with_question("Why?"));

        let run = orchestrator
            .execute(BusinessContext::new("idea"), groups, config())
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.failed_groups(), vec!["broken"]);
        assert!(run.personas.iter().all(|p| p.stakeholder_group_id == "fleet"));
    }

    #[test]
    fn accepted_cancel_decides_the_terminal_status() {
        let conclude = |record: &RunRecord| {
            record.finish_with(|| Conclusion {
                status: if record.progress.is_cancel_requested() {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Completed
                },
                current_task: String::new(),
                error: None,
            })
        };

        let run = SimulationRun::new(RunId::new(), BusinessContext::new("idea"), groups());
        let record = RunRecord::new(run, 1);
        record.transition(RunStatus::Running).unwrap();
        assert!(record.request_cancel());
        assert!(conclude(&record));
        assert_eq!(record.status(), RunStatus::Cancelled);

        let run = SimulationRun::new(RunId::new(), BusinessContext::new("idea"), groups());
        let record = RunRecord::new(run, 1);
        record.transition(RunStatus::Running).unwrap();
        assert!(conclude(&record));
        assert!(!record.request_cancel());
        assert_eq!(record.status(), RunStatus::Completed);
    }

    #[test]
    fn run_level_failure_records_one_error() {
        let run = SimulationRun::new(RunId::new(), BusinessContext::new("idea"), groups());
        let record = RunRecord::new(run, 1);

        record.fail(RunErrorKind::Internal, "boom".to_string());
        record.fail(RunErrorKind::Internal, "again".to_string());

        let run = record.snapshot();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.errors.len(), 1);
        assert_eq!(record.progress.stage(), Stage::Failed);
    }

    #[tokio::test]
    async fn unknown_run_is_reported() {
        let orchestrator =
            SimulationOrchestrator::new(Arc::new(EchoService::default()), EngineConfig::default());
        let id = RunId::new();

        assert!(matches!(
            orchestrator.get_progress(id),
            Err(SimulationError::RunNotFound(_))
        ));
        assert!(orchestrator.get_result(id).is_err());
        assert!(!orchestrator.cancel(id));
    }

    #[tokio::test]
    async fn cancel_after_terminal_is_refused() {
        let orchestrator =
            SimulationOrchestrator::new(Arc::new(EchoService::default()), EngineConfig::default());
        let id = orchestrator.start(BusinessContext::new("idea"), groups(), config());
        let run = orchestrator.wait(id).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);

        assert!(!orchestrator.cancel(id));
        assert_eq!(orchestrator.get_result(id).unwrap().status, RunStatus::Completed);
    }
}
