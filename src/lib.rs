//! Streaming Price Anomaly Detection
//!
//! This library ingests a stream of raw price ticks, turns each tick into
//! a rolling-statistics feature vector, and flags observations that
//! deviate from recently learned behavior using an isolation forest that
//! is refit on a bounded rolling history.
//!
//! # Modules
//!
//! - `config`: Pipeline tunables (window, training sizes, retrain cadence)
//! - `data`: Tick records, CSV series, synthetic walk generation
//! - `features`: Streaming feature engineering
//! - `model`: Model lifecycle and the isolation-forest scorer
//! - `stream`: Per-instrument orchestration and multi-symbol routing
//!
//! # Example
//!
//! ```no_run
//! use rust_stream_anomaly::config::PipelineConfig;
//! use rust_stream_anomaly::data::{random_walk, WalkConfig};
//! use rust_stream_anomaly::stream::StreamOrchestrator;
//!
//! let config = PipelineConfig::default();
//! let mut stream = StreamOrchestrator::from_config(&config).unwrap();
//!
//! let ticks = random_walk("BTCUSD", 500, &WalkConfig::default());
//! for result in stream.run(ticks.data) {
//!     if result.is_anomaly {
//!         println!("{}: score {:.3}", result.features.timestamp, result.score.unwrap());
//!     }
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod model;
pub mod stream;

pub use config::*;
pub use data::*;
pub use error::*;
pub use features::*;
pub use model::*;
pub use stream::*;
