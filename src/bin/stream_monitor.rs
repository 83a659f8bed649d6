//! Stream ticks through the anomaly pipeline
//!
//! Usage: cargo run --bin stream_monitor -- --csv ticks.csv --symbol BTCUSD
//!        cargo run --bin stream_monitor -- --count 2000 --shock-every 250

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;

use rust_stream_anomaly::config::{PipelineConfig, RetrainPolicy, StdEstimator};
use rust_stream_anomaly::data::{random_walk, TickSeries, WalkConfig};
use rust_stream_anomaly::stream::StreamOrchestrator;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream ticks through the anomaly pipeline")]
struct Args {
    /// Tick CSV to replay (timestamp,price); omit to generate a synthetic walk
    #[arg(long)]
    csv: Option<String>,

    /// Instrument symbol (display and logging only)
    #[arg(short, long, default_value = "SYNTH")]
    symbol: String,

    /// Number of synthetic ticks when no CSV is given
    #[arg(short, long, default_value_t = 2000)]
    count: usize,

    /// Synthetic walk volatility (fractional per-step return std)
    #[arg(long, default_value_t = 0.002)]
    volatility: f64,

    /// Inject a synthetic shock every N ticks
    #[arg(long)]
    shock_every: Option<usize>,

    /// Random seed for the synthetic walk
    #[arg(long, default_value_t = 7)]
    walk_seed: u64,

    /// Trailing window length for rolling statistics
    #[arg(short, long, default_value_t = 20)]
    window: usize,

    /// Minimum buffered vectors before the first fit
    #[arg(long, default_value_t = 50)]
    min_train: usize,

    /// Refit every N ingested vectors
    #[arg(long, default_value_t = 50)]
    retrain_every: usize,

    /// Refit on tick-time staleness (seconds) instead of a count
    #[arg(long, conflicts_with = "retrain_every")]
    staleness_secs: Option<i64>,

    /// Training buffer retention cap
    #[arg(long, default_value_t = 500)]
    cap: usize,

    /// Anomaly score cutoff in (0, 1)
    #[arg(short, long, default_value_t = 0.6)]
    threshold: f64,

    /// Use the population std estimator instead of sample
    #[arg(long)]
    population_std: bool,

    /// Number of trees in the isolation forest
    #[arg(long, default_value_t = 100)]
    trees: usize,

    /// Random seed for model fitting
    #[arg(long, default_value_t = 42)]
    model_seed: u64,

    /// Append flagged anomalies to this JSONL file
    #[arg(long)]
    anomaly_log: Option<String>,

    /// Only print anomalies and the final summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let config = PipelineConfig {
        window_size: args.window,
        min_training_samples: args.min_train,
        retrain: match args.staleness_secs {
            Some(secs) => RetrainPolicy::ElapsedSecs(secs),
            None => RetrainPolicy::Count(args.retrain_every),
        },
        buffer_retention_cap: args.cap,
        anomaly_threshold: args.threshold,
        std_estimator: if args.population_std {
            StdEstimator::Population
        } else {
            StdEstimator::Sample
        },
        forest: rust_stream_anomaly::config::ForestConfig {
            trees: args.trees,
            seed: args.model_seed,
            ..Default::default()
        },
    };

    let series = match &args.csv {
        Some(path) => TickSeries::from_csv(path, &args.symbol)
            .with_context(|| format!("loading ticks from {path}"))?,
        None => {
            let walk = WalkConfig {
                start_at: Utc::now() - Duration::seconds(60 * args.count as i64),
                volatility: args.volatility,
                seed: args.walk_seed,
                shock_every: args.shock_every,
                ..Default::default()
            };
            random_walk(&args.symbol, args.count, &walk)
        }
    };

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║               Streaming Anomaly Monitor                  ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!(
        "║ Symbol: {:10} | Window: {:4} | Threshold: {:.2}       ║",
        args.symbol, args.window, args.threshold
    );
    println!("╚══════════════════════════════════════════════════════════╝");
    println!("Replaying {} ticks...\n", series.len());

    let mut anomaly_log = args
        .anomaly_log
        .as_ref()
        .map(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening anomaly log {path}"))
        })
        .transpose()?;

    let mut stream = StreamOrchestrator::from_config(&config)?;

    for result in stream.run(series.data) {
        let status_icon = if result.is_anomaly {
            "🚨"
        } else if result.score.map_or(false, |s| s > args.threshold * 0.9) {
            "⚡"
        } else {
            "✓ "
        };

        if !args.quiet || result.is_anomaly {
            let score_text = match result.score {
                Some(s) => format!("{s:.3}"),
                None => "  -  ".to_string(),
            };
            println!(
                "[{}] {} {} | Price: {:.4} ({:+.3}%) | Score: {} | v{}",
                result.features.timestamp.format("%H:%M:%S"),
                status_icon,
                args.symbol,
                result.features.price,
                result.features.pct_change.unwrap_or(0.0) * 100.0,
                score_text,
                result.model_version,
            );
        }

        if result.is_anomaly {
            if let Some(log_file) = anomaly_log.as_mut() {
                let line = serde_json::to_string(&result)?;
                writeln!(log_file, "{line}")?;
            }
        }
    }

    let stats = stream.stats();
    println!("\n═══════════════════════════════════════");
    println!("Stream summary:");
    println!("  Accepted ticks:    {}", stats.accepted);
    println!(
        "  Dropped ticks:     {} ({} invalid, {} out of order)",
        stats.dropped(),
        stats.dropped_invalid,
        stats.dropped_out_of_order
    );
    println!("  Warmup skipped:    {}", stats.warmup_skipped);
    println!("  Scored:            {}", stats.scored);
    println!("  Anomalies:         {}", stats.anomalies);
    println!("  Model version:     {}", stream.model_version());
    println!("  Fit failures:      {}", stream.fit_failures());
    println!("═══════════════════════════════════════");

    if let Some(path) = &args.anomaly_log {
        println!("Anomalies appended to {path}");
    }

    Ok(())
}
