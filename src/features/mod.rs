//! Feature engineering
//!
//! Turns raw ticks into the numeric record the scoring model consumes.

mod engine;

pub use engine::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the columns produced by [`FeatureVector::model_row`]
pub const MODEL_COLUMNS: [&str; 4] = ["pct_change", "z_score", "mean_spread", "rel_std"];

/// Derived record computed from one tick and recent history
///
/// `None` fields mean "undefined": not enough history yet, or a degenerate
/// window (zero std). Zero is never used as a stand-in, since a zero delta
/// or z-score is a real observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// Price minus previous accepted price
    pub delta: Option<f64>,
    /// Delta divided by previous accepted price
    pub pct_change: Option<f64>,
    /// Mean of the trailing window (defined once the window is full)
    pub rolling_mean: Option<f64>,
    /// Std of the trailing window (defined once the window is full)
    pub rolling_std: Option<f64>,
    /// (price - rolling_mean) / rolling_std, defined only for nonzero std
    pub z_score: Option<f64>,
}

impl FeatureVector {
    /// True once every statistical field is defined
    pub fn is_complete(&self) -> bool {
        self.delta.is_some()
            && self.pct_change.is_some()
            && self.rolling_mean.is_some()
            && self.rolling_std.is_some()
            && self.z_score.is_some()
    }

    /// Numeric row for model training and scoring, in [`MODEL_COLUMNS`]
    /// order. `None` while any field is undefined.
    pub fn model_row(&self) -> Option<Vec<f64>> {
        let pct_change = self.pct_change?;
        let z_score = self.z_score?;
        let mean = self.rolling_mean?;
        let std = self.rolling_std?;

        let mean_spread = (self.price - mean) / mean;
        let rel_std = std / mean;

        Some(vec![pct_change, z_score, mean_spread, rel_std])
    }
}
