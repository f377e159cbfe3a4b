//! Interview fan-out
//!
//! Runs independent interview simulations either one at a time or with a
//! bounded number in flight. Each dispatch first checks the stop predicate,
//! then the cache, and only then calls the simulator.

use crate::cache::{CacheKey, CacheStats, InterviewCache};
use crate::error::{panic_message, SimulationError};
use crate::interview::InterviewSimulator;
use crate::types::{BusinessContext, Persona, PersonaId, SimulatedInterview, StakeholderGroup};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Default fan-out bound in parallel mode
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// How interviews are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel { max_concurrent: usize },
}

impl ExecutionMode {
    /// Select mode from run options
    #[inline]
    #[must_use]
    pub fn from_options(parallel: bool, max_concurrent: usize) -> Self {
        if parallel {
            Self::Parallel {
                max_concurrent: max_concurrent.max(1),
            }
        } else {
            Self::Sequential
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Parallel {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// One persona to interview
#[derive(Debug, Clone)]
pub struct InterviewTask {
    pub persona: Persona,
    pub group: Arc<StakeholderGroup>,
}

/// Result of one dispatch
#[derive(Debug)]
pub enum TaskOutcome {
    /// Interview produced, possibly from the cache
    Completed {
        interview: SimulatedInterview,
        cached: bool,
    },
    /// Simulator failed or panicked for this persona
    Failed {
        persona_id: PersonaId,
        group_id: String,
        error: SimulationError,
    },
    /// Not dispatched because a stop was requested
    Skipped {
        persona_id: PersonaId,
        group_id: String,
    },
}

impl TaskOutcome {
    /// Check if an interview was produced
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Interview executor with optional result cache
#[derive(Debug, Clone)]
pub struct ConcurrencyExecutor {
    simulator: InterviewSimulator,
    mode: ExecutionMode,
    cache: Option<InterviewCache>,
}

impl ConcurrencyExecutor {
    /// Create executor without a cache
    #[inline]
    #[must_use]
    pub fn new(simulator: InterviewSimulator, mode: ExecutionMode) -> Self {
        Self {
            simulator,
            mode,
            cache: None,
        }
    }

    /// With result cache
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, cache: InterviewCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Scheduling mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Run all tasks
    ///
    /// `should_stop` is polled before each dispatch; once it returns `true`
    /// the remaining tasks come back as [`TaskOutcome::Skipped`]. In-flight
    /// simulations are never interrupted. `on_outcome` sees each outcome as it
    /// completes, which under parallel mode is not submission order.
    pub async fn run<S, F>(
        &self,
        context: &BusinessContext,
        tasks: Vec<InterviewTask>,
        should_stop: S,
        mut on_outcome: F,
    ) -> Vec<TaskOutcome>
    where
        S: Fn() -> bool + Sync,
        F: FnMut(&TaskOutcome),
    {
        let mut outcomes = Vec::with_capacity(tasks.len());
        let should_stop = &should_stop;

        match self.mode {
            ExecutionMode::Sequential => {
                for task in tasks {
                    let outcome = self.dispatch(context, task, should_stop).await;
                    on_outcome(&outcome);
                    outcomes.push(outcome);
                }
            }
            ExecutionMode::Parallel { max_concurrent } => {
                let mut in_flight = stream::iter(tasks)
                    .map(|task| self.dispatch(context, task, should_stop))
                    .buffer_unordered(max_concurrent.max(1));
                while let Some(outcome) = in_flight.next().await {
                    on_outcome(&outcome);
                    outcomes.push(outcome);
                }
            }
        }

        outcomes
    }

    async fn dispatch<S>(&self, context: &BusinessContext, task: InterviewTask, should_stop: &S) -> TaskOutcome
    where
        S: Fn() -> bool + Sync,
    {
        let InterviewTask { persona, group } = task;

        if should_stop() {
            return TaskOutcome::Skipped {
                persona_id: persona.id,
                group_id: group.id.clone(),
            };
        }

        let key = self.cache.as_ref().map(|_| {
            CacheKey::derive(
                &persona,
                &group,
                context,
                self.simulator.style(),
                self.simulator.depth(),
            )
        });

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(interview) = cache.get(key, &persona).await {
                tracing::debug!(persona = %persona.id, key = %key.short(), "interview served from cache");
                return TaskOutcome::Completed {
                    interview,
                    cached: true,
                };
            }
        }

        let simulated = AssertUnwindSafe(self.simulator.simulate(&persona, &group, context))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(SimulationError::Internal(format!(
                    "interview task panicked: {}",
                    panic_message(&*payload)
                )))
            });

        match simulated {
            Ok(interview) => {
                if let (Some(cache), Some(key)) = (&self.cache, key) {
                    cache.insert(key, interview.clone()).await;
                }
                TaskOutcome::Completed {
                    interview,
                    cached: false,
                }
            }
            Err(error) => {
                tracing::warn!(persona = %persona.id, group = %group.id, "interview failed: {}", error);
                TaskOutcome::Failed {
                    persona_id: persona.id,
                    group_id: group.id.clone(),
                    error,
                }
            }
        }
    }

    /// Cache statistics; `enabled` is false when no cache is attached
    pub async fn get_cache_stats(&self) -> CacheStats {
        match &self.cache {
            Some(cache) => cache.stats().await,
            None => CacheStats::default(),
        }
    }

    /// Drop every cached interview
    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }
}
