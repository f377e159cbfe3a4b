//! Run and engine configuration
//!
//! [`SimulationConfig`] holds the per-run options a caller passes to
//! `start()`. [`EngineConfig`] holds settings of the orchestrator instance
//! itself (cache, retention, persona generation budget).

use crate::error::SimulationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How deep each simulated interview goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Quick,
    #[default]
    Detailed,
    Comprehensive,
}

impl Depth {
    /// Token budget for one interview
    #[inline]
    #[must_use]
    pub fn max_tokens(self) -> u32 {
        match self {
            Depth::Quick => 1_500,
            Depth::Detailed => 3_000,
            Depth::Comprehensive => 5_000,
        }
    }

    /// Expected answer length, phrased for the prompt
    #[inline]
    #[must_use]
    pub fn answer_guidance(self) -> &'static str {
        match self {
            Depth::Quick => "Answer each question in 1-2 sentences.",
            Depth::Detailed => "Answer each question in a short paragraph with one concrete example.",
            Depth::Comprehensive => {
                "Answer each question thoroughly, with anecdotes, numbers and trade-offs where relevant."
            }
        }
    }
}

/// Attitude the simulated interviewees lean towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    #[default]
    Realistic,
    Optimistic,
    Critical,
    Mixed,
}

impl ResponseStyle {
    /// Style instruction, phrased for the prompt
    #[inline]
    #[must_use]
    pub fn guidance(self) -> &'static str {
        match self {
            ResponseStyle::Realistic => {
                "Respond as this person realistically would, including doubts and indifference."
            }
            ResponseStyle::Optimistic => {
                "Lean towards openness and enthusiasm while staying in character."
            }
            ResponseStyle::Critical => {
                "Lean towards skepticism; challenge assumptions and point out risks."
            }
            ResponseStyle::Mixed => {
                "Vary between enthusiasm and skepticism across questions, as real people do."
            }
        }
    }
}

/// Per-run options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub depth: Depth,
    /// Personas generated per stakeholder group, 1..=5
    pub people_per_stakeholder: usize,
    pub response_style: ResponseStyle,
    /// Interview temperature, 0.0..=1.0
    pub temperature: f32,
    pub parallel: bool,
    /// Fan-out bound when `parallel` is set
    pub max_concurrent: usize,
    /// One name scope for the whole run instead of one per group
    pub global_name_uniqueness: bool,
}

impl SimulationConfig {
    /// Allowed range of `people_per_stakeholder`
    pub const PEOPLE_RANGE: std::ops::RangeInclusive<usize> = 1..=5;

    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With depth
    #[inline]
    #[must_use]
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    /// With personas per group
    #[inline]
    #[must_use]
    pub fn with_people_per_stakeholder(mut self, people: usize) -> Self {
        self.people_per_stakeholder = people;
        self
    }

    /// With response style
    #[inline]
    #[must_use]
    pub fn with_response_style(mut self, style: ResponseStyle) -> Self {
        self.response_style = style;
        self
    }

    /// With interview temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Run interviews one at a time
    #[inline]
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Run interviews with bounded fan-out
    #[inline]
    #[must_use]
    pub fn with_parallelism(mut self, max_concurrent: usize) -> Self {
        self.parallel = true;
        self.max_concurrent = max_concurrent;
        self
    }

    /// With name scope mode
    #[inline]
    #[must_use]
    pub fn with_global_name_uniqueness(mut self, global: bool) -> Self {
        self.global_name_uniqueness = global;
        self
    }

    /// Check option ranges
    ///
    /// # Errors
    /// `SimulationError::Validation` naming the first offending option
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !Self::PEOPLE_RANGE.contains(&self.people_per_stakeholder) {
            return Err(SimulationError::Validation(format!(
                "people_per_stakeholder must be within 1..=5, got {}",
                self.people_per_stakeholder
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(SimulationError::Validation(format!(
                "temperature must be within 0.0..=1.0, got {}",
                self.temperature
            )));
        }
        if self.parallel && self.max_concurrent == 0 {
            return Err(SimulationError::Validation(
                "max_concurrent must be at least 1 in parallel mode".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective fan-out bound
    #[inline]
    #[must_use]
    pub fn concurrency(&self) -> usize {
        if self.parallel {
            self.max_concurrent.max(1)
        } else {
            1
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            depth: Depth::Detailed,
            people_per_stakeholder: 3,
            response_style: ResponseStyle::Realistic,
            temperature: 0.7,
            parallel: true,
            max_concurrent: 3,
            global_name_uniqueness: true,
        }
    }
}

/// Orchestrator instance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds a terminal run stays queryable before it is reaped
    pub retention_secs: u64,
    pub cache_enabled: bool,
    /// Maximum cached interviews
    pub cache_capacity: u64,
    /// Near-deterministic temperature for persona batches
    pub persona_temperature: f32,
    pub persona_max_tokens: u32,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retention window
    #[inline]
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_secs = retention.as_secs();
        self
    }

    /// With interview cache switched on or off
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// With cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Retention window
    #[inline]
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3_600,
            cache_enabled: true,
            cache_capacity: 256,
            persona_temperature: 0.3,
            persona_max_tokens: 2_500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency(), 3);
    }

    #[test]
    fn people_out_of_range_rejected() {
        let config = SimulationConfig::new().with_people_per_stakeholder(6);
        assert!(matches!(config.validate(), Err(SimulationError::Validation(_))));

        let config = SimulationConfig::new().with_people_per_stakeholder(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        let config = SimulationConfig::new().with_temperature(1.5);
        assert!(config.validate().is_err());
        let config = SimulationConfig::new().with_temperature(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn sequential_ignores_max_concurrent() {
        let config = SimulationConfig::new().with_parallelism(8).sequential();
        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"depth": "quick", "parallel": false}"#).unwrap();
        assert_eq!(config.depth, Depth::Quick);
        assert!(!config.parallel);
        assert_eq!(config.people_per_stakeholder, 3);
    }

    #[test]
    fn depth_scales_token_budget() {
        assert!(Depth::Quick.max_tokens() < Depth::Detailed.max_tokens());
        assert!(Depth::Detailed.max_tokens() < Depth::Comprehensive.max_tokens());
    }
}
