//! Stream orchestration
//!
//! Drives tick → features → verdict for one instrument, lazily and in
//! input order. A bad tick is dropped, counted, and logged; the stream
//! never stops because one observation was malformed.

use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::data::Tick;
use crate::error::{PipelineError, Result};
use crate::features::FeatureEngine;
use crate::model::{AnomalyModel, AnomalyResult, ModelState};

/// Per-stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Ticks accepted by the feature engine
    pub accepted: u64,
    /// Ticks dropped for a malformed price
    pub dropped_invalid: u64,
    /// Ticks dropped for a non-increasing timestamp
    pub dropped_out_of_order: u64,
    /// Accepted ticks whose vector was still incomplete and therefore
    /// never reached the model
    pub warmup_skipped: u64,
    /// Vectors scored by a fitted model
    pub scored: u64,
    /// Scored vectors flagged anomalous
    pub anomalies: u64,
}

impl StreamStats {
    /// Total ticks dropped for either validation reason
    pub fn dropped(&self) -> u64 {
        self.dropped_invalid + self.dropped_out_of_order
    }
}

/// One instrument's pipeline: feature engine + anomaly model
pub struct StreamOrchestrator {
    engine: FeatureEngine,
    model: AnomalyModel,
    stats: StreamStats,
}

impl StreamOrchestrator {
    /// Build a pipeline from a validated configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: FeatureEngine::from_config(config),
            model: AnomalyModel::from_config(config),
            stats: StreamStats::default(),
        })
    }

    /// Counters so far
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Current model lifecycle state
    pub fn model_state(&self) -> ModelState {
        self.model.state()
    }

    /// Current model version
    pub fn model_version(&self) -> u64 {
        self.model.version()
    }

    /// Number of failed fit attempts so far
    pub fn fit_failures(&self) -> u64 {
        self.model.fit_failures()
    }

    /// Process one tick.
    ///
    /// Returns `None` when the tick was dropped by input validation.
    /// Accepted ticks always yield a result: a scored verdict once the
    /// model is ready, otherwise a pass-through result carrying the
    /// "not yet scored" sentinel. Vectors with undefined fields are never
    /// forwarded to the model, so warm-up placeholders stay out of the
    /// training buffer.
    pub fn process(&mut self, tick: &Tick) -> Option<AnomalyResult> {
        let features = match self.engine.observe(tick) {
            Ok(features) => features,
            Err(e) => {
                match e {
                    PipelineError::InvalidInput(_) => self.stats.dropped_invalid += 1,
                    PipelineError::OutOfOrderInput { .. } => {
                        self.stats.dropped_out_of_order += 1
                    }
                    _ => {}
                }
                log::warn!("dropping tick at {}: {}", tick.timestamp, e);
                return None;
            }
        };
        self.stats.accepted += 1;

        if !features.is_complete() {
            self.stats.warmup_skipped += 1;
            return Some(AnomalyResult {
                features,
                is_anomaly: false,
                score: None,
                model_version: self.model.version(),
            });
        }

        match self.model.ingest(&features) {
            Ok(result) => {
                if result.is_scored() {
                    self.stats.scored += 1;
                }
                if result.is_anomaly {
                    self.stats.anomalies += 1;
                    log::info!(
                        "anomaly at {}: price {:.4}, score {:.4}",
                        result.features.timestamp,
                        result.features.price,
                        result.score.unwrap_or(0.0)
                    );
                }
                Some(result)
            }
            Err(e) => {
                // Only reachable if a complete vector was rejected, which
                // would be a bug; surface it like a dropped tick
                log::warn!("model rejected vector at {}: {}", features.timestamp, e);
                self.stats.dropped_invalid += 1;
                None
            }
        }
    }

    /// Run the pipeline over a tick source, yielding one result per
    /// accepted tick, lazily and in input order
    pub fn run<I>(&mut self, ticks: I) -> StreamResults<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Tick>,
    {
        StreamResults {
            orchestrator: self,
            ticks: ticks.into_iter(),
        }
    }
}

/// Lazy iterator over pipeline results
pub struct StreamResults<'a, I> {
    orchestrator: &'a mut StreamOrchestrator,
    ticks: I,
}

impl<'a, I> Iterator for StreamResults<'a, I>
where
    I: Iterator<Item = Tick>,
{
    type Item = AnomalyResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let tick = self.ticks.next()?;
            if let Some(result) = self.orchestrator.process(&tick) {
                return Some(result);
            }
            // Dropped tick: keep pulling
        }
    }
}

/// Routes ticks to one independent pipeline per symbol
///
/// Streams share nothing but the configuration template, so one
/// instrument's window or model never sees another's data.
pub struct SymbolRouter {
    config: PipelineConfig,
    streams: HashMap<String, StreamOrchestrator>,
}

impl SymbolRouter {
    /// Create a router; the configuration is validated once up front
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            streams: HashMap::new(),
        })
    }

    /// Process one tick for the given symbol, creating its pipeline on
    /// first sight
    pub fn process(&mut self, symbol: &str, tick: &Tick) -> Option<AnomalyResult> {
        if !self.streams.contains_key(symbol) {
            // Config was validated in new(), so this cannot fail
            match StreamOrchestrator::from_config(&self.config) {
                Ok(stream) => {
                    self.streams.insert(symbol.to_string(), stream);
                }
                Err(e) => {
                    log::error!("cannot create pipeline for {symbol}: {e}");
                    return None;
                }
            }
        }
        self.streams.get_mut(symbol)?.process(tick)
    }

    /// Symbols seen so far
    pub fn symbols(&self) -> Vec<&str> {
        self.streams.keys().map(String::as_str).collect()
    }

    /// Counters for one symbol's stream
    pub fn stats(&self, symbol: &str) -> Option<StreamStats> {
        self.streams.get(symbol).map(|s| s.stats())
    }
}
