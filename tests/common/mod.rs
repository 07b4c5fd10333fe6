//! Synthetic market data shared by the integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use goal_planner::prices::DailySeries;
use goal_planner::{InMemoryProvider, PlannerConfig};
use goal_planner::universe::UniverseSelection;

/// `days` daily closes ending yesterday, from i.i.d. normal log returns.
pub fn synthetic_prices(days: usize, mean: f64, std: f64, seed: u64) -> Vec<(NaiveDate, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(mean, std).unwrap();
    let end = Utc::now().date_naive() - Duration::days(1);
    let mut log_price = 100f64.ln();
    (0..days)
        .map(|i| {
            log_price += dist.sample(&mut rng);
            (end - Duration::days((days - 1 - i) as i64), log_price.exp())
        })
        .collect()
}

pub fn synthetic_series(symbol: &str, days: usize, mean: f64, std: f64, seed: u64) -> DailySeries {
    DailySeries::new(symbol, synthetic_prices(days, mean, std, seed))
}

/// Three instruments with distinct return profiles; only AAA has a display name.
pub fn provider() -> InMemoryProvider {
    InMemoryProvider::new()
        .with_series("AAA", synthetic_prices(300, 0.0008, 0.012, 1))
        .with_series("BBB", synthetic_prices(300, 0.0004, 0.007, 2))
        .with_series("CCC", synthetic_prices(300, 0.0002, 0.015, 3))
        .with_name("AAA", "Alpha Holdings plc")
}

/// Small, seeded config over the given extra tickers only.
pub fn config(tickers: &[&str]) -> PlannerConfig {
    PlannerConfig {
        lookback_years: 2,
        max_assets: 3,
        tries: 500,
        runs: 400,
        seed: Some(17),
        universe: UniverseSelection::none(),
        extra_tickers: tickers.iter().map(|s| s.to_string()).collect(),
        ..PlannerConfig::default()
    }
}
