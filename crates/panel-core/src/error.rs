//! Error types for the panel engine
//!
//! Covers the run's failure taxonomy:
//! - Validation of `start()` input
//! - Generation failures scoped to one group or one interview
//! - Aggregate failure when no group produced a persona
//!
//! Cancellation is a terminal state, not an error, and has no variant here.

use crate::types::{PersonaId, RunId, RunStatus};

/// Failure reported by a [`GenerationService`](crate::generation::GenerationService)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Service answered, but not in the requested shape
    #[error("malformed output: {0}")]
    MalformedOutput(String),

    /// Service did not answer in time
    #[error("generation timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Transport or provider-side failure
    #[error("provider error: {0}")]
    Provider(String),
}

impl GenerationError {
    /// Check if a simplified prompt could plausibly fix this failure
    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedOutput(_))
    }

    /// Create malformed-output error
    #[inline]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedOutput(detail.into())
    }
}

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Bad `start()` input or configuration
    #[error("validation failed: {0}")]
    Validation(String),

    /// Persona generation exhausted its attempts for one group
    #[error("persona generation failed for group '{group_id}' after {attempts} attempt(s): {source}")]
    PersonaGeneration {
        /// Group whose batch failed
        group_id: String,
        /// Number of service calls made
        attempts: usize,
        /// Last failure seen
        #[source]
        source: GenerationError,
    },

    /// One interview could not be simulated
    #[error("interview simulation failed for persona {persona_id}: {source}")]
    InterviewSimulation {
        /// Interviewed persona
        persona_id: PersonaId,
        /// Underlying failure
        #[source]
        source: GenerationError,
    },

    /// No persona was produced across all groups
    #[error("no personas generated across {groups} stakeholder group(s)")]
    Aggregate { groups: usize },

    /// Unknown or reaped run
    #[error("run not found: {0}")]
    RunNotFound(RunId),

    /// Status change outside the run state machine
    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition { from: RunStatus, to: RunStatus },

    /// The run task ended abnormally
    #[error("run task aborted: {0}")]
    Aborted(String),

    /// Engine bug caught at the scope where it surfaced
    #[error("internal error: {0}")]
    Internal(String),
}

impl SimulationError {
    /// Check if the error only affects one group or one interview
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::PersonaGeneration { .. } | Self::InterviewSimulation { .. }
        )
    }

    /// Check if the error drives a run to `failed`
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Aggregate { .. } | Self::Aborted(_)
        )
    }

    /// Underlying generation failure, if any
    #[must_use]
    pub fn generation_error(&self) -> Option<&GenerationError> {
        match self {
            Self::PersonaGeneration { source, .. } | Self::InterviewSimulation { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
