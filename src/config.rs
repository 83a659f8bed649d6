//! Pipeline configuration
//!
//! All tunables for the feature engine, the model lifecycle, and the
//! isolation forest live here so a whole run is reproducible from one value.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Standard deviation estimator for the rolling window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdEstimator {
    /// Divide by n
    Population,
    /// Divide by n - 1 (Bessel's correction), requires window_size >= 2
    Sample,
}

/// When to refit the model once it is ready
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainPolicy {
    /// Refit after this many ingested vectors since the last fit
    Count(usize),
    /// Refit once the last fit is older than this many seconds of
    /// tick time (wall clock is never consulted, so replays stay
    /// deterministic)
    ElapsedSecs(i64),
}

/// Configuration for the isolation forest
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub trees: usize,
    /// Maximum number of samples drawn per tree
    pub max_tree_samples: usize,
    /// Random seed for tree building
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            max_tree_samples: 256,
            seed: 42,
        }
    }
}

/// Configuration for one instrument's pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Trailing window length for rolling statistics
    pub window_size: usize,
    /// Minimum buffered vectors before the first fit
    pub min_training_samples: usize,
    /// Retrain cadence once the model is ready
    pub retrain: RetrainPolicy,
    /// Training buffer retention cap (oldest evicted beyond this)
    pub buffer_retention_cap: usize,
    /// Score cutoff above which a vector is flagged anomalous
    pub anomaly_threshold: f64,
    /// Rolling standard deviation estimator
    pub std_estimator: StdEstimator,
    /// Scoring model parameters
    pub forest: ForestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            min_training_samples: 50,
            retrain: RetrainPolicy::Count(50),
            buffer_retention_cap: 500,
            anomaly_threshold: 0.6,
            std_estimator: StdEstimator::Sample,
            forest: ForestConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Check that the configuration is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(PipelineError::Config("window_size must be > 0".into()));
        }
        if self.std_estimator == StdEstimator::Sample && self.window_size < 2 {
            return Err(PipelineError::Config(
                "sample std estimator requires window_size >= 2".into(),
            ));
        }
        if self.min_training_samples <= self.window_size {
            return Err(PipelineError::Config(format!(
                "min_training_samples ({}) must exceed window_size ({})",
                self.min_training_samples, self.window_size
            )));
        }
        if self.buffer_retention_cap < self.min_training_samples {
            return Err(PipelineError::Config(format!(
                "buffer_retention_cap ({}) must be >= min_training_samples ({})",
                self.buffer_retention_cap, self.min_training_samples
            )));
        }
        if !(self.anomaly_threshold > 0.0 && self.anomaly_threshold < 1.0) {
            return Err(PipelineError::Config(
                "anomaly_threshold must lie in (0, 1)".into(),
            ));
        }
        match self.retrain {
            RetrainPolicy::Count(0) => {
                return Err(PipelineError::Config("retrain count must be > 0".into()))
            }
            RetrainPolicy::ElapsedSecs(s) if s <= 0 => {
                return Err(PipelineError::Config("retrain staleness must be > 0s".into()))
            }
            _ => {}
        }
        if self.forest.trees == 0 || self.forest.max_tree_samples < 2 {
            return Err(PipelineError::Config(
                "forest needs at least one tree and max_tree_samples >= 2".into(),
            ));
        }
        Ok(())
    }
}
