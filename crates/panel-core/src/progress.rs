//! Per-run progress tracking
//!
//! Updated by the run task at coarse milestones and read concurrently by
//! `get_progress`. Counters are atomics so interview completions can be
//! recorded in any order.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Share of the bar covered by persona generation
const PERSONA_PHASE_PERCENT: f64 = 30.0;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    GeneratingPersonas,
    SimulatingInterviews,
    Completed,
    Failed,
    Cancelled,
}

impl Stage {
    /// Check if the stage ends the run
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Read-only view of a run's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub stage: Stage,
    /// 0.0..=100.0
    pub percentage: f64,
    pub current_task: String,
    pub completed_personas: usize,
    pub total_personas: usize,
    pub completed_interviews: usize,
    pub total_interviews: usize,
    /// Linear extrapolation, advisory only
    pub estimated_time_remaining: Option<Duration>,
}

#[derive(Debug)]
struct Milestone {
    stage: Stage,
    current_task: String,
}

/// Mutable progress record of one run
#[derive(Debug)]
pub struct ProgressTracker {
    milestone: parking_lot::RwLock<Milestone>,
    completed_personas: AtomicUsize,
    total_personas: AtomicUsize,
    completed_interviews: AtomicUsize,
    total_interviews: AtomicUsize,
    cancel_requested: AtomicBool,
    started: Instant,
}

impl ProgressTracker {
    /// Create tracker expecting `total_personas`
    #[must_use]
    pub fn new(total_personas: usize) -> Self {
        Self {
            milestone: parking_lot::RwLock::new(Milestone {
                stage: Stage::Pending,
                current_task: "queued".to_string(),
            }),
            completed_personas: AtomicUsize::new(0),
            total_personas: AtomicUsize::new(total_personas),
            completed_interviews: AtomicUsize::new(0),
            total_interviews: AtomicUsize::new(0),
            cancel_requested: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    /// Move to a stage
    pub fn set_stage(&self, stage: Stage, current_task: impl Into<String>) {
        let mut milestone = self.milestone.write();
        milestone.stage = stage;
        milestone.current_task = current_task.into();
    }

    /// Current stage
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.milestone.read().stage
    }

    /// Record a finished group batch
    ///
    /// `requested` was counted in the persona total up front; the total is
    /// corrected to what the group actually produced (zero for a failed group).
    pub fn record_group_batch(&self, requested: usize, produced: usize) {
        let _ = self
            .total_personas
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |total| {
                Some(total.saturating_sub(requested) + produced)
            });
        self.completed_personas.fetch_add(produced, Ordering::SeqCst);
    }

    /// Fix the interview total once the task list is built
    pub fn set_total_interviews(&self, total: usize) {
        self.total_interviews.store(total, Ordering::SeqCst);
    }

    /// Record one finished interview, successful or not
    pub fn record_interview(&self) {
        let total = self.total_interviews.load(Ordering::SeqCst);
        let _ = self
            .completed_interviews
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |done| {
                (done < total).then_some(done + 1)
            });
    }

    /// Ask the run to stop at its next safe point
    ///
    /// Returns `true` if this call set the flag.
    pub fn request_cancel(&self) -> bool {
        !self.cancel_requested.swap(true, Ordering::SeqCst)
    }

    /// Check the cancellation flag
    #[inline]
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Time since the tracker was created
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Take a snapshot
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let (stage, current_task) = {
            let milestone = self.milestone.read();
            (milestone.stage, milestone.current_task.clone())
        };
        let completed_personas = self.completed_personas.load(Ordering::SeqCst);
        let total_personas = self.total_personas.load(Ordering::SeqCst);
        let completed_interviews = self.completed_interviews.load(Ordering::SeqCst);
        let total_interviews = self.total_interviews.load(Ordering::SeqCst);

        let percentage = percentage(
            stage,
            completed_personas,
            total_personas,
            completed_interviews,
            total_interviews,
        );

        ProgressSnapshot {
            stage,
            percentage,
            current_task,
            completed_personas,
            total_personas,
            completed_interviews,
            total_interviews,
            estimated_time_remaining: estimate_remaining(stage, percentage, self.elapsed()),
        }
    }
}

fn ratio(done: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (done.min(total) as f64) / (total as f64)
    }
}

fn percentage(
    stage: Stage,
    completed_personas: usize,
    total_personas: usize,
    completed_interviews: usize,
    total_interviews: usize,
) -> f64 {
    match stage {
        Stage::Pending => 0.0,
        Stage::Completed => 100.0,
        Stage::GeneratingPersonas => {
            PERSONA_PHASE_PERCENT * ratio(completed_personas, total_personas)
        }
        Stage::SimulatingInterviews | Stage::Failed | Stage::Cancelled => {
            let persona_part = if stage == Stage::SimulatingInterviews || total_interviews > 0 {
                PERSONA_PHASE_PERCENT
            } else {
                PERSONA_PHASE_PERCENT * ratio(completed_personas, total_personas)
            };
            persona_part
                + (100.0 - PERSONA_PHASE_PERCENT) * ratio(completed_interviews, total_interviews)
        }
    }
}

fn estimate_remaining(stage: Stage, percentage: f64, elapsed: Duration) -> Option<Duration> {
    if stage.is_terminal() {
        return Some(Duration::ZERO);
    }
    let done = percentage / 100.0;
    if done <= 0.0 {
        return None;
    }
    Some(elapsed.mul_f64((1.0 - done) / done))
}
