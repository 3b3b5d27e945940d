//! Per-session optimization configuration.

use crate::error::{OproError, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of candidates the proposer may be asked for in one step.
pub const MAX_CANDIDATES_PER_STEP: u8 = 16;

/// Temperature range accepted by the supported chat-completion backends.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Immutable per-session configuration for the optimization loop.
///
/// Validated once at the creation boundary via [`OproConfig::validate`];
/// the core does not re-validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OproConfig {
    /// Number of candidate instructions requested per step (1..=16)
    pub k: u8,
    /// Number of top-scoring distinct-text candidates shown to the proposer
    pub top_x: usize,
    /// Proposer model identifier
    pub optimizer_model: String,
    /// Proposer sampling temperature
    pub optimizer_temperature: f32,
    /// Grader model identifier
    pub scorer_model: String,
    /// Grader sampling temperature
    pub scorer_temperature: f32,
}

impl Default for OproConfig {
    fn default() -> Self {
        Self {
            k: 8,
            top_x: 20,
            optimizer_model: "gpt-4o".to_string(),
            optimizer_temperature: 1.0,
            scorer_model: "gpt-4o-mini".to_string(),
            scorer_temperature: 0.0,
        }
    }
}

impl OproConfig {
    /// Validates the configuration at the session-creation boundary.
    ///
    /// # Errors
    ///
    /// Returns `OproError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.k < 1 || self.k > MAX_CANDIDATES_PER_STEP {
            return Err(OproError::config(format!(
                "k must be between 1 and {}, got {}",
                MAX_CANDIDATES_PER_STEP, self.k
            )));
        }
        if self.top_x < 1 {
            return Err(OproError::config("top_x must be at least 1"));
        }
        if self.optimizer_model.trim().is_empty() {
            return Err(OproError::config("optimizer model must not be empty"));
        }
        if self.scorer_model.trim().is_empty() {
            return Err(OproError::config("scorer model must not be empty"));
        }
        if !TEMPERATURE_RANGE.contains(&self.optimizer_temperature) {
            return Err(OproError::config(format!(
                "optimizer temperature {} outside accepted range {:?}",
                self.optimizer_temperature, TEMPERATURE_RANGE
            )));
        }
        if !TEMPERATURE_RANGE.contains(&self.scorer_temperature) {
            return Err(OproError::config(format!(
                "scorer temperature {} outside accepted range {:?}",
                self.scorer_temperature, TEMPERATURE_RANGE
            )));
        }
        Ok(())
    }
}
