//! Streaming feature engine
//!
//! One engine per instrument. Each accepted tick updates the trailing
//! window and yields a [`FeatureVector`]; rejected ticks leave the
//! window untouched.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::config::{PipelineConfig, StdEstimator};
use crate::data::Tick;
use crate::error::{PipelineError, Result};

use super::FeatureVector;

/// Stateful tick-to-features transform
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    window_size: usize,
    estimator: StdEstimator,
    /// Last W accepted prices, oldest first
    window: VecDeque<f64>,
    last_price: Option<f64>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl FeatureEngine {
    /// Create an engine with the given window length and estimator.
    ///
    /// The caller is expected to have validated the combination via
    /// [`PipelineConfig::validate`] (sample std needs `window_size >= 2`).
    pub fn new(window_size: usize, estimator: StdEstimator) -> Self {
        Self {
            window_size,
            estimator,
            window: VecDeque::with_capacity(window_size),
            last_price: None,
            last_timestamp: None,
        }
    }

    /// Create an engine from a pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.window_size, config.std_estimator)
    }

    /// Number of prices currently in the trailing window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// True once the window holds a full `window_size` prices
    pub fn is_warmed_up(&self) -> bool {
        self.window.len() == self.window_size
    }

    /// Timestamp of the last accepted tick
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Drop all accumulated state
    pub fn reset(&mut self) {
        self.window.clear();
        self.last_price = None;
        self.last_timestamp = None;
    }

    /// Consume one tick and produce its feature vector.
    ///
    /// Fails with `InvalidInput` for a non-finite or non-positive price and
    /// with `OutOfOrderInput` for a timestamp not strictly greater than the
    /// last accepted one. Neither failure mutates the window.
    pub fn observe(&mut self, tick: &Tick) -> Result<FeatureVector> {
        if !tick.price.is_finite() || tick.price <= 0.0 {
            return Err(PipelineError::InvalidInput(format!(
                "price must be a positive finite number, got {}",
                tick.price
            )));
        }

        if let Some(previous) = self.last_timestamp {
            if tick.timestamp <= previous {
                return Err(PipelineError::OutOfOrderInput {
                    previous,
                    received: tick.timestamp,
                });
            }
        }

        let delta = self.last_price.map(|prev| tick.price - prev);
        let pct_change = self.last_price.and_then(|prev| {
            if prev == 0.0 {
                None
            } else {
                Some((tick.price - prev) / prev)
            }
        });

        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(tick.price);

        let (rolling_mean, rolling_std) = if self.window.len() == self.window_size {
            let (mean, std) = self.window_stats();
            (Some(mean), std)
        } else {
            (None, None)
        };

        let z_score = match (rolling_mean, rolling_std) {
            (Some(mean), Some(std)) if std > 0.0 => Some((tick.price - mean) / std),
            _ => None,
        };

        self.last_price = Some(tick.price);
        self.last_timestamp = Some(tick.timestamp);

        Ok(FeatureVector {
            timestamp: tick.timestamp,
            price: tick.price,
            delta,
            pct_change,
            rolling_mean,
            rolling_std,
            z_score,
        })
    }

    /// Mean and std over the current window contents.
    ///
    /// Std is `None` when the estimator cannot produce a value (sample
    /// estimator over a single observation).
    fn window_stats(&self) -> (f64, Option<f64>) {
        let n = self.window.len() as f64;
        let mean = self.window.iter().sum::<f64>() / n;
        let sum_sq: f64 = self.window.iter().map(|p| (p - mean).powi(2)).sum();

        let std = match self.estimator {
            StdEstimator::Population => Some((sum_sq / n).sqrt()),
            StdEstimator::Sample if self.window.len() >= 2 => {
                Some((sum_sq / (n - 1.0)).sqrt())
            }
            StdEstimator::Sample => None,
        };

        (mean, std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tick(minute: u32, price: f64) -> Tick {
        let timestamp = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, minute, 0)
            .unwrap();
        Tick::new(timestamp, price)
    }

    fn engine(window: usize) -> FeatureEngine {
        FeatureEngine::new(window, StdEstimator::Sample)
    }

    #[test]
    fn test_first_tick_has_undefined_fields() {
        let mut engine = engine(3);
        let fv = engine.observe(&tick(0, 100.0)).unwrap();

        assert_eq!(fv.price, 100.0);
        assert!(fv.delta.is_none());
        assert!(fv.pct_change.is_none());
        assert!(fv.rolling_mean.is_none());
        assert!(fv.rolling_std.is_none());
        assert!(fv.z_score.is_none());
    }

    #[test]
    fn test_delta_relative_to_previous_accepted_price() {
        let mut engine = engine(3);
        engine.observe(&tick(0, 100.0)).unwrap();
        let fv = engine.observe(&tick(1, 102.0)).unwrap();

        assert_eq!(fv.delta, Some(2.0));
        assert!((fv.pct_change.unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_stats_defined_once_window_full() {
        let mut engine = engine(3);
        let prices = [10.0, 11.0, 9.0];

        let fv1 = engine.observe(&tick(0, prices[0])).unwrap();
        let fv2 = engine.observe(&tick(1, prices[1])).unwrap();
        let fv3 = engine.observe(&tick(2, prices[2])).unwrap();

        assert!(fv1.rolling_mean.is_none());
        assert!(fv2.rolling_mean.is_none());
        assert_eq!(fv3.rolling_mean, Some(10.0));
        assert!(fv3.rolling_std.unwrap() > 0.0);
        assert_eq!(fv3.delta, Some(-2.0));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut engine = engine(2);
        engine.observe(&tick(0, 10.0)).unwrap();
        engine.observe(&tick(1, 20.0)).unwrap();
        // Window is now [10, 20]; next tick evicts 10
        let fv = engine.observe(&tick(2, 30.0)).unwrap();

        assert_eq!(engine.window_len(), 2);
        assert_eq!(fv.rolling_mean, Some(25.0));
    }

    #[test]
    fn test_rejects_non_positive_and_non_finite_prices() {
        let mut engine = engine(3);
        engine.observe(&tick(0, 100.0)).unwrap();

        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = engine.observe(&tick(1, bad)).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)));
        }

        // Window untouched by the rejected ticks
        assert_eq!(engine.window_len(), 1);
    }

    #[test]
    fn test_rejects_out_of_order_without_mutation() {
        let mut engine = engine(3);
        engine.observe(&tick(0, 100.0)).unwrap();
        engine.observe(&tick(2, 101.0)).unwrap();

        // Same timestamp and earlier timestamp both rejected
        for minute in [2, 1] {
            let err = engine.observe(&tick(minute, 102.0)).unwrap_err();
            assert!(matches!(err, PipelineError::OutOfOrderInput { .. }));
        }

        assert_eq!(engine.window_len(), 2);

        // Stream resumes with a later timestamp, delta from last ACCEPTED price
        let fv = engine.observe(&tick(3, 103.0)).unwrap();
        assert_eq!(fv.delta, Some(2.0));
    }

    #[test]
    fn test_z_score_undefined_for_flat_window() {
        let mut engine = engine(3);
        for minute in 0..3 {
            engine.observe(&tick(minute, 50.0)).unwrap();
        }
        let fv = engine.observe(&tick(3, 50.0)).unwrap();

        assert_eq!(fv.rolling_std, Some(0.0));
        assert!(fv.z_score.is_none());
        assert_eq!(fv.delta, Some(0.0));
    }

    #[test]
    fn test_sample_vs_population_std() {
        let prices = [10.0, 12.0, 14.0];

        let mut sample = FeatureEngine::new(3, StdEstimator::Sample);
        let mut population = FeatureEngine::new(3, StdEstimator::Population);

        let mut last_sample = None;
        let mut last_population = None;
        for (minute, &p) in prices.iter().enumerate() {
            last_sample = Some(sample.observe(&tick(minute as u32, p)).unwrap());
            last_population = Some(population.observe(&tick(minute as u32, p)).unwrap());
        }

        let s = last_sample.unwrap().rolling_std.unwrap();
        let p = last_population.unwrap().rolling_std.unwrap();

        assert!((s - 2.0).abs() < 1e-12); // sqrt(8/2)
        assert!((p - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(s > p);
    }

    #[test]
    fn test_spike_stands_out_from_window_mean() {
        let mut engine = engine(3);
        let prices = [10.0, 11.0, 9.0, 15.0, 10.5];
        let vectors: Vec<FeatureVector> = prices
            .iter()
            .enumerate()
            .map(|(minute, &p)| engine.observe(&tick(minute as u32, p)).unwrap())
            .collect();

        assert!(vectors[0].rolling_mean.is_none());
        assert!(vectors[1].rolling_mean.is_none());

        assert_eq!(vectors[2].rolling_mean, Some(10.0));
        assert_eq!(vectors[2].delta, Some(-2.0));
        assert!((vectors[2].pct_change.unwrap() - (-2.0 / 11.0)).abs() < 1e-12);

        // The 15.0 spike stands much farther from its window mean than 10.5
        let z4 = vectors[3].z_score.unwrap();
        let z5 = vectors[4].z_score.unwrap();
        assert!(z4.abs() > 2.0 * z5.abs(), "z4={z4}, z5={z5}");
    }
}
