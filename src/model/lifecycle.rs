//! Model lifecycle
//!
//! Accumulate fully-defined feature vectors, fit once enough are buffered,
//! score everything after that, and refit on the configured cadence. A
//! failed fit is reported and retried; it never stops ingestion.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use ndarray::Array2;

use crate::config::{PipelineConfig, RetrainPolicy};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureVector, MODEL_COLUMNS};

use super::{AnomalyResult, ModelState, OutlierBackend, OutlierScorer};

/// Owns the scoring model's train-then-predict lifecycle for one instrument
pub struct AnomalyModel {
    min_training_samples: usize,
    retention_cap: usize,
    retrain: RetrainPolicy,
    threshold: f64,
    backend: Box<dyn OutlierBackend>,
    /// Rolling training history, oldest evicted at the retention cap
    buffer: VecDeque<Vec<f64>>,
    /// Active fitted model; replaced wholesale on each successful fit
    fitted: Option<Box<dyn OutlierScorer>>,
    version: u64,
    ingests_since_fit: usize,
    /// Tick time of the last successful fit (wall clock is never used)
    last_fit_at: Option<DateTime<Utc>>,
    fit_failures: u64,
    last_fit_error: Option<String>,
}

impl AnomalyModel {
    /// Create a model with the default isolation-forest backend
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_backend(config, Box::new(config.forest.clone()))
    }

    /// Create a model with a substitute scoring backend
    pub fn with_backend(config: &PipelineConfig, backend: Box<dyn OutlierBackend>) -> Self {
        Self {
            min_training_samples: config.min_training_samples,
            retention_cap: config.buffer_retention_cap,
            retrain: config.retrain,
            threshold: config.anomaly_threshold,
            backend,
            buffer: VecDeque::with_capacity(config.buffer_retention_cap.min(4096)),
            fitted: None,
            version: 0,
            ingests_since_fit: 0,
            last_fit_at: None,
            fit_failures: 0,
            last_fit_error: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModelState {
        if self.fitted.is_some() {
            ModelState::Ready
        } else {
            ModelState::Cold
        }
    }

    /// Fit counter; increments by one on each successful fit
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of vectors currently buffered for training
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of failed fit attempts so far
    pub fn fit_failures(&self) -> u64 {
        self.fit_failures
    }

    /// Message of the most recent failed fit, if any
    pub fn last_fit_error(&self) -> Option<&str> {
        self.last_fit_error.as_deref()
    }

    /// Ingest one fully-defined feature vector and produce a verdict.
    ///
    /// Fails only when handed a vector with undefined fields; the
    /// orchestrator filters those out before they get here. A failed fit
    /// is recorded and logged, never returned as an error.
    pub fn ingest(&mut self, features: &FeatureVector) -> Result<AnomalyResult> {
        let row = features.model_row().ok_or_else(|| {
            PipelineError::InvalidInput(
                "feature vector with undefined fields reached the model".into(),
            )
        })?;
        debug_assert_eq!(row.len(), MODEL_COLUMNS.len());

        if self.buffer.len() == self.retention_cap {
            self.buffer.pop_front();
        }
        self.buffer.push_back(row.clone());
        self.ingests_since_fit += 1;

        // Cold: attempt the first fit once the buffer is large enough. On
        // success the triggering vector is scored by the new model below.
        if self.fitted.is_none() && self.buffer.len() >= self.min_training_samples {
            let _ = self.refit(features.timestamp);
        }

        let result = match &self.fitted {
            None => AnomalyResult {
                features: features.clone(),
                is_anomaly: false,
                score: None,
                model_version: self.version,
            },
            Some(model) => {
                let score = model.score(&row);
                AnomalyResult {
                    features: features.clone(),
                    is_anomaly: score > self.threshold,
                    score: Some(score),
                    model_version: self.version,
                }
            }
        };

        // Ready: refit on cadence, after the verdict was produced with the
        // current model. A failed refit leaves that model active, and the
        // still-elapsed cadence retries on the next ingest.
        if self.fitted.is_some() && self.retrain_due(features.timestamp) {
            let _ = self.refit(features.timestamp);
        }

        Ok(result)
    }

    fn retrain_due(&self, now: DateTime<Utc>) -> bool {
        match self.retrain {
            RetrainPolicy::Count(n) => self.ingests_since_fit >= n,
            RetrainPolicy::ElapsedSecs(s) => self
                .last_fit_at
                .map_or(false, |at| now - at >= Duration::seconds(s)),
        }
    }

    /// Fit a fresh model on the whole buffer and swap it in on success.
    ///
    /// The swap is a plain assignment of a fully built model, so no reader
    /// ever sees a partially fitted state.
    fn refit(&mut self, now: DateTime<Utc>) -> Result<()> {
        let rows = self.buffer.len();
        let cols = MODEL_COLUMNS.len();
        let mut matrix = Array2::zeros((rows, cols));
        for (i, row) in self.buffer.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }

        match self.backend.fit(matrix.view()) {
            Ok(model) => {
                self.fitted = Some(model);
                self.version += 1;
                self.ingests_since_fit = 0;
                self.last_fit_at = Some(now);
                log::info!(
                    "{} fit v{} on {} vectors",
                    self.backend.name(),
                    self.version,
                    rows
                );
                Ok(())
            }
            Err(e) => {
                self.fit_failures += 1;
                self.last_fit_error = Some(e.to_string());
                log::warn!(
                    "{} fit failed on {} vectors (keeping v{}): {}",
                    self.backend.name(),
                    rows,
                    self.version,
                    e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(min_train: usize) -> PipelineConfig {
        PipelineConfig {
            window_size: 3,
            min_training_samples: min_train,
            retrain: RetrainPolicy::Count(10),
            buffer_retention_cap: 100,
            ..Default::default()
        }
    }

    /// Complete vector with mild per-index variation so fits succeed
    fn varied_vector(i: usize) -> FeatureVector {
        let wobble = ((i % 7) as f64 - 3.0) / 10.0;
        FeatureVector {
            timestamp: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .unwrap()
                + Duration::seconds(60 * i as i64),
            price: 100.0 + wobble,
            delta: Some(wobble),
            pct_change: Some(wobble / 100.0),
            rolling_mean: Some(100.0),
            rolling_std: Some(0.5),
            z_score: Some(wobble * 2.0),
        }
    }

    /// Bit-identical vector, for degenerate training sets
    fn constant_vector(i: usize) -> FeatureVector {
        FeatureVector {
            timestamp: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .unwrap()
                + Duration::seconds(60 * i as i64),
            price: 100.0,
            delta: Some(0.0),
            pct_change: Some(0.0),
            rolling_mean: Some(100.0),
            rolling_std: Some(1.0),
            z_score: Some(0.0),
        }
    }

    #[test]
    fn test_cold_results_carry_sentinel() {
        let mut model = AnomalyModel::from_config(&config(50));

        for i in 0..49 {
            let result = model.ingest(&varied_vector(i)).unwrap();
            assert!(!result.is_scored());
            assert!(!result.is_anomaly);
            assert_eq!(result.model_version, 0);
        }
        assert_eq!(model.state(), ModelState::Cold);
        assert_eq!(model.buffered(), 49);
    }

    #[test]
    fn test_min_samples_triggers_fit_and_scores_trigger_vector() {
        let mut model = AnomalyModel::from_config(&config(50));

        for i in 0..49 {
            model.ingest(&varied_vector(i)).unwrap();
        }
        let result = model.ingest(&varied_vector(49)).unwrap();

        assert_eq!(model.state(), ModelState::Ready);
        assert_eq!(result.model_version, 1);
        assert!(result.is_scored());
    }

    #[test]
    fn test_version_increments_only_on_successful_fit() {
        let mut model = AnomalyModel::from_config(&PipelineConfig {
            retrain: RetrainPolicy::Count(20),
            ..config(50)
        });

        for i in 0..50 {
            model.ingest(&varied_vector(i)).unwrap();
        }
        assert_eq!(model.version(), 1);

        // 20 more ingests trigger exactly one retrain
        let mut versions = Vec::new();
        for i in 50..70 {
            versions.push(model.ingest(&varied_vector(i)).unwrap().model_version);
        }
        assert_eq!(model.version(), 2);
        // Every verdict was produced before its retrain fired
        assert!(versions.iter().all(|&v| v == 1));
    }

    #[test]
    fn test_degenerate_training_set_keeps_model_cold() {
        // Long cadence so no retrain fires after the recovery fit
        let mut model = AnomalyModel::from_config(&PipelineConfig {
            retrain: RetrainPolicy::Count(1000),
            ..config(50)
        });

        for i in 0..60 {
            let result = model.ingest(&constant_vector(i)).unwrap();
            assert!(!result.is_scored());
        }

        assert_eq!(model.state(), ModelState::Cold);
        assert_eq!(model.version(), 0);
        assert!(model.fit_failures() > 0);
        assert!(model.last_fit_error().unwrap().contains("zero variance"));

        // Varied data arriving later lets a fit succeed
        for i in 60..120 {
            model.ingest(&varied_vector(i)).unwrap();
        }
        assert_eq!(model.state(), ModelState::Ready);
        assert_eq!(model.version(), 1);
    }

    #[test]
    fn test_failed_retrain_keeps_previous_model() {
        let mut model = AnomalyModel::from_config(&PipelineConfig {
            retrain: RetrainPolicy::Count(70),
            buffer_retention_cap: 60,
            ..config(50)
        });

        for i in 0..50 {
            model.ingest(&varied_vector(i)).unwrap();
        }
        assert_eq!(model.version(), 1);
        let failures_before = model.fit_failures();

        // 70 constant vectors push every varied row out of the bounded
        // buffer before the cadence fires; the refit fails on the
        // degenerate set and the v1 model keeps scoring
        for i in 50..120 {
            let result = model.ingest(&constant_vector(i)).unwrap();
            assert!(result.is_scored());
            assert_eq!(result.model_version, 1);
        }
        assert_eq!(model.state(), ModelState::Ready);
        assert_eq!(model.version(), 1);
        assert!(model.fit_failures() > failures_before);
    }

    #[test]
    fn test_buffer_respects_retention_cap() {
        let mut model = AnomalyModel::from_config(&PipelineConfig {
            buffer_retention_cap: 55,
            ..config(50)
        });

        for i in 0..200 {
            model.ingest(&varied_vector(i)).unwrap();
        }
        assert_eq!(model.buffered(), 55);
    }

    #[test]
    fn test_elapsed_retrain_uses_tick_time() {
        let mut model = AnomalyModel::from_config(&PipelineConfig {
            retrain: RetrainPolicy::ElapsedSecs(600),
            ..config(50)
        });

        // Vectors arrive one minute apart; the fit at i=49 goes stale after
        // ten more minutes of tick time
        for i in 0..59 {
            model.ingest(&varied_vector(i)).unwrap();
        }
        assert_eq!(model.version(), 1);

        model.ingest(&varied_vector(59)).unwrap();
        assert_eq!(model.version(), 2);
    }

    #[test]
    fn test_incomplete_vector_is_rejected() {
        let mut model = AnomalyModel::from_config(&config(50));
        let mut incomplete = varied_vector(0);
        incomplete.z_score = None;

        let err = model.ingest(&incomplete).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(model.buffered(), 0);
    }
}
