//! Panel Core - synthetic customer-research panels
//!
//! Turns a business context and a list of stakeholder groups into a corpus of
//! synthetic interviews:
//! - Generates personas per stakeholder group, avoiding reused names
//! - Simulates one structured interview per persona
//! - Fans interviews out with bounded concurrency and an optional cache
//! - Tracks progress, supports cooperative cancellation
//! - Keeps partial results when individual groups or interviews fail
//!
//! The language model behind it all is abstracted as a [`GenerationService`].
//!
//! # Example
//!
//! ```rust,ignore
//! use panel_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(service: Arc<dyn GenerationService>) -> Result<(), SimulationError> {
//! let orchestrator = SimulationOrchestrator::new(service, EngineConfig::default());
//!
//! let context = BusinessContext::new("Meal kits for night-shift nurses");
//! let groups = vec![StakeholderGroup::new("nurses", "Night-shift nurses")
//!     .with_question("What do you eat during a shift?")];
//!
//! let run = orchestrator
//!     .execute(context, groups, SimulationConfig::default())
//!     .await?;
//! println!("{} interviews, status {}", run.interviews.len(), run.status);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod generation;
pub mod interview;
pub mod orchestrator;
pub mod persona;
pub mod progress;
pub mod prompts;
pub mod registry;
pub mod types;

// Re-exports for convenience
pub use cache::{CacheKey, CacheStats, InterviewCache};
pub use config::{Depth, EngineConfig, ResponseStyle, SimulationConfig};
pub use error::{GenerationError, SimulationError};
pub use executor::{ConcurrencyExecutor, ExecutionMode, InterviewTask, TaskOutcome};
pub use generation::{
    GenerationClient, GenerationRequest, GenerationService, InterviewDraft, PersonaDraft,
    TargetShape,
};
pub use interview::InterviewSimulator;
pub use orchestrator::{validate_request, SimulationOrchestrator};
pub use persona::{PersonaBatch, PersonaGenerator};
pub use progress::{ProgressSnapshot, ProgressTracker, Stage};
pub use registry::{NameRegistry, NameScope};
pub use types::{
    BusinessContext, InterviewResponse, Persona, PersonaId, RunError, RunErrorKind, RunId,
    RunStatus, Sentiment, SimulatedInterview, SimulationRun, StakeholderGroup,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Panel Core
    pub use crate::{
        BusinessContext, Depth, EngineConfig, GenerationError, GenerationRequest,
        GenerationService, ProgressSnapshot, ResponseStyle, RunId, RunStatus, SimulationConfig,
        SimulationError, SimulationOrchestrator, SimulationRun, StakeholderGroup, TargetShape,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
