//! Generate a synthetic tick CSV for pipeline replays
//!
//! Usage: cargo run --bin gen_ticks -- --count 5000 --output ticks.csv

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;

use rust_stream_anomaly::data::{random_walk, WalkConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a synthetic tick CSV")]
struct Args {
    /// Instrument symbol
    #[arg(short, long, default_value = "SYNTH")]
    symbol: String,

    /// Number of ticks to generate
    #[arg(short, long, default_value_t = 5000)]
    count: usize,

    /// Starting price
    #[arg(long, default_value_t = 100.0)]
    start_price: f64,

    /// Per-step drift (fractional)
    #[arg(long, default_value_t = 0.0)]
    drift: f64,

    /// Per-step volatility (fractional return std)
    #[arg(long, default_value_t = 0.002)]
    volatility: f64,

    /// Seconds between ticks
    #[arg(long, default_value_t = 60)]
    step_secs: i64,

    /// Random seed
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Inject a shock every N ticks
    #[arg(long)]
    shock_every: Option<usize>,

    /// Shock magnitude as a multiple of volatility
    #[arg(long, default_value_t = 8.0)]
    shock_scale: f64,

    /// Output file path (CSV)
    #[arg(short, long)]
    output: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    println!("Synthetic Tick Generator");
    println!("========================");
    println!("Symbol: {}", args.symbol);
    println!("Count: {}", args.count);
    println!("Volatility: {:.4}", args.volatility);
    if let Some(every) = args.shock_every {
        println!("Shocks: every {} ticks, x{:.1} volatility", every, args.shock_scale);
    }

    let config = WalkConfig {
        start_at: Utc::now() - Duration::seconds(args.step_secs * args.count as i64),
        step_secs: args.step_secs,
        start_price: args.start_price,
        drift: args.drift,
        volatility: args.volatility,
        seed: args.seed,
        shock_every: args.shock_every,
        shock_scale: args.shock_scale,
    };
    let series = random_walk(&args.symbol, args.count, &config);

    println!("\nGenerated {} ticks", series.len());

    if let (Some(first), Some(last)) = (series.data.first(), series.data.last()) {
        println!("Time range: {} to {}", first.timestamp, last.timestamp);

        let prices = series.prices();
        println!(
            "Price range: {:.4} - {:.4}",
            prices.iter().cloned().fold(f64::INFINITY, f64::min),
            prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        );

        let returns = series.returns();
        if !returns.is_empty() {
            let mean_return: f64 = returns.iter().sum::<f64>() / returns.len() as f64;
            let variance: f64 = returns
                .iter()
                .map(|r| (r - mean_return).powi(2))
                .sum::<f64>()
                / returns.len() as f64;

            println!("\nStatistics:");
            println!("  Mean return: {:.4}%", mean_return * 100.0);
            println!("  Realized volatility: {:.4}%", variance.sqrt() * 100.0);
            println!("  Final price: {:.4}", last.price);
        }
    }

    if let Some(output_path) = args.output {
        series.to_csv(&output_path)?;
        println!("\nSaved to: {output_path}");
    } else {
        println!("\nTip: Use --output <file.csv> to save the series");
    }

    Ok(())
}
