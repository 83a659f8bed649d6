//! Synthetic tick generation
//!
//! Seeded geometric random walk with optional injected shocks, for demos
//! and tests that need a price stream without a live feed.

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_distr::Normal;

use super::{Tick, TickSeries};

/// Parameters for the synthetic walk
#[derive(Clone, Debug)]
pub struct WalkConfig {
    /// First tick timestamp
    pub start_at: DateTime<Utc>,
    /// Seconds between ticks
    pub step_secs: i64,
    /// Starting price
    pub start_price: f64,
    /// Per-step drift (fractional)
    pub drift: f64,
    /// Per-step volatility (fractional std of returns)
    pub volatility: f64,
    /// Random seed
    pub seed: u64,
    /// Inject a shock every n ticks (None = no shocks)
    pub shock_every: Option<usize>,
    /// Shock magnitude as a multiple of volatility
    pub shock_scale: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            start_at: DateTime::UNIX_EPOCH,
            step_secs: 60,
            start_price: 100.0,
            drift: 0.0,
            volatility: 0.002,
            seed: 7,
            shock_every: None,
            shock_scale: 8.0,
        }
    }
}

/// Generate a seeded random-walk tick series
pub fn random_walk(symbol: &str, n: usize, config: &WalkConfig) -> TickSeries {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let step = Normal::new(config.drift, config.volatility).expect("finite walk parameters");

    let mut data = Vec::with_capacity(n);
    let mut price = config.start_price;

    for i in 0..n {
        let mut ret: f64 = step.sample(&mut rng);

        if let Some(every) = config.shock_every {
            if i > 0 && i % every == 0 {
                let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                ret += direction * config.shock_scale * config.volatility;
            }
        }

        price = (price * (1.0 + ret)).max(f64::MIN_POSITIVE);
        let timestamp = config.start_at + Duration::seconds(config.step_secs * i as i64);
        data.push(Tick::new(timestamp, price));
    }

    TickSeries::with_data(symbol.to_string(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_is_deterministic() {
        let config = WalkConfig::default();
        let a = random_walk("TEST", 200, &config);
        let b = random_walk("TEST", 200, &config);

        assert_eq!(a.prices(), b.prices());
        assert_eq!(a.timestamps(), b.timestamps());
    }

    #[test]
    fn test_walk_prices_stay_positive() {
        let config = WalkConfig {
            volatility: 0.05,
            ..Default::default()
        };
        let series = random_walk("TEST", 500, &config);

        assert_eq!(series.len(), 500);
        assert!(series.prices().iter().all(|&p| p > 0.0 && p.is_finite()));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let series = random_walk("TEST", 100, &WalkConfig::default());
        let timestamps = series.timestamps();

        assert!(timestamps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_shocks_produce_outlier_returns() {
        let config = WalkConfig {
            shock_every: Some(50),
            shock_scale: 10.0,
            ..Default::default()
        };
        let series = random_walk("TEST", 200, &config);
        let returns = series.returns();

        let max_abs = returns.iter().fold(0.0f64, |m, r| m.max(r.abs()));
        assert!(
            max_abs > 5.0 * config.volatility,
            "expected at least one shocked return, max |r| = {max_abs}"
        );
    }
}
