//! Engine configuration
//!
//! The original pipeline kept its similarity-threshold table and backend
//! tunables as module-level constants. Here they are an explicit value
//! passed into the engine at construction, so two engines in one process
//! can run with different tables.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use shared_types::ThresholdLabel;

/// Candidate-pool size above which the approximate backend is preferred
/// when the caller does not pick one explicitly.
pub const DEFAULT_APPROXIMATE_CUTOFF: usize = 400;

/// Named cosine-similarity cut-offs exposed to end users.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    /// Broad match.
    pub low: f32,
    /// Balanced relevance.
    pub medium: f32,
    /// Very high relevance.
    pub high: f32,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            low: 0.5,
            medium: 0.6,
            high: 0.75,
        }
    }
}

impl ThresholdTable {
    /// Resolve a named threshold to its value.
    ///
    /// Returns `None` for [`ThresholdLabel::Custom`], which carries its
    /// value alongside the label rather than in the table.
    pub fn value(&self, label: ThresholdLabel) -> Option<f32> {
        match label {
            ThresholdLabel::Low => Some(self.low),
            ThresholdLabel::Medium => Some(self.medium),
            ThresholdLabel::High => Some(self.high),
            ThresholdLabel::Custom => None,
        }
    }
}

/// Configuration for one [`RecommendationEngine`](crate::RecommendationEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Label-to-value threshold table.
    pub thresholds: ThresholdTable,
    /// Candidate-pool size above which index building defaults to the
    /// approximate backend. Callers can always override the backend per run.
    pub approximate_cutoff: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            approximate_cutoff: DEFAULT_APPROXIMATE_CUTOFF,
        }
    }
}

impl MatchConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// Expected variables:
    /// - MATCHER_THRESHOLD_LOW / MATCHER_THRESHOLD_MEDIUM / MATCHER_THRESHOLD_HIGH
    /// - MATCHER_APPROX_CUTOFF
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("MATCHER_THRESHOLD_LOW") {
            config.thresholds.low = parse_threshold("MATCHER_THRESHOLD_LOW", &raw)?;
        }
        if let Ok(raw) = std::env::var("MATCHER_THRESHOLD_MEDIUM") {
            config.thresholds.medium = parse_threshold("MATCHER_THRESHOLD_MEDIUM", &raw)?;
        }
        if let Ok(raw) = std::env::var("MATCHER_THRESHOLD_HIGH") {
            config.thresholds.high = parse_threshold("MATCHER_THRESHOLD_HIGH", &raw)?;
        }
        if let Ok(raw) = std::env::var("MATCHER_APPROX_CUTOFF") {
            config.approximate_cutoff = raw
                .parse()
                .map_err(|_| anyhow!("MATCHER_APPROX_CUTOFF is not a valid size: {}", raw))?;
        }

        Ok(config)
    }
}

fn parse_threshold(name: &str, raw: &str) -> Result<f32> {
    let value: f32 = raw
        .parse()
        .map_err(|_| anyhow!("{} is not a valid threshold: {}", name, raw))?;
    if !(-1.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [-1, 1], got {}", name, value));
    }
    Ok(value)
}
