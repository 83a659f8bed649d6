//! Anomaly model
//!
//! The scoring algorithm sits behind a fit/score seam so any unsupervised
//! model producing a continuous outlier score can be substituted. The
//! default backend is an isolation forest.

mod forest;
mod lifecycle;

pub use forest::*;
pub use lifecycle::*;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::FeatureVector;

/// Lifecycle state of the anomaly model
///
/// The fit itself is transient inside one `ingest` call, so only the two
/// resting states are observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Accumulating vectors, nothing fitted yet
    Cold,
    /// A fitted model is active
    Ready,
}

/// A fitted scoring model
///
/// Scores are in (0, 1] with HIGHER = MORE ANOMALOUS; ~0.5 is typical for
/// unremarkable points under the isolation-forest convention.
pub trait OutlierScorer {
    /// Score one feature row (columns per [`crate::features::MODEL_COLUMNS`])
    fn score(&self, row: &[f64]) -> f64;
}

/// Factory seam for the scoring algorithm: fit a training matrix, get back
/// an immutable fitted model
pub trait OutlierBackend {
    /// Fit a fresh model on the training matrix (rows = vectors).
    ///
    /// Fails with `TrainingFailed` on a degenerate set; the caller keeps
    /// whatever model it had.
    fn fit(&self, samples: ArrayView2<'_, f64>) -> Result<Box<dyn OutlierScorer>>;

    /// Name of the backend, for logs
    fn name(&self) -> &'static str;
}

/// Verdict for one feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub features: FeatureVector,
    /// True when the score exceeds the configured threshold
    pub is_anomaly: bool,
    /// Outlier score, higher = more anomalous; `None` means "not yet
    /// scored" (model still cold or vector still warming up)
    pub score: Option<f64>,
    /// Fit counter at scoring time; 0 until the first successful fit
    pub model_version: u64,
}

impl AnomalyResult {
    /// True once a real model produced the score
    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }
}
