//! Monte Carlo projection of portfolio value towards a goal.
//!
//! Monthly returns are drawn i.i.d. from a normal distribution with mean
//! `mu / 12` and standard deviation `sigma / sqrt(12)`, where `mu` and
//! `sigma` are the portfolio's annualised moments. This ignores serial
//! correlation and the compounding effect on variance. Balances are not
//! floored at zero.

use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{PlannerError, Result};
use crate::metrics::MetricsBundle;
use crate::optimizer::WeightVector;
use crate::rng::{chunks, SeedSequence};

const MONTHS_PER_YEAR: u32 = 12;
const RUN_CHUNK: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub years: u32,
    pub start_capital: f64,
    pub monthly_contrib: f64,
    pub runs: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    /// Terminal value of each trajectory, in run order.
    pub outcomes: Vec<f64>,
    pub expected_return: f64,
    pub volatility: f64,
}

/// Simulate `params.runs` trajectories of the weighted portfolio.
///
/// Only the weighted instruments are looked up in `metrics`; instruments the
/// bundle does not know are ignored.
pub fn simulate_goal(
    weights: &WeightVector,
    metrics: &MetricsBundle,
    params: &SimulationParams,
) -> Result<SimulationOutcome> {
    let held = metrics.restrict(&weights.symbols());
    let w: Vec<f64> = held
        .symbols()
        .iter()
        .filter_map(|s| weights.get(s))
        .collect();

    let mu_port = held.portfolio_return(&w);
    let var_port = held.portfolio_variance(&w).max(0.0);
    let vol_port = var_port.sqrt();

    let mu_m = mu_port / MONTHS_PER_YEAR as f64;
    let vol_m = vol_port / (MONTHS_PER_YEAR as f64).sqrt();
    let monthly = Normal::new(mu_m, vol_m).map_err(|e| {
        PlannerError::InvalidRequest(format!(
            "cannot simulate portfolio with mean {} and std {}: {}",
            mu_m, vol_m, e
        ))
    })?;

    let months = params.years.checked_mul(MONTHS_PER_YEAR).ok_or_else(|| {
        PlannerError::InvalidRequest(format!(
            "horizon of {} years is too long to simulate",
            params.years
        ))
    })?;
    let seeds = SeedSequence::from_option(params.seed);

    let outcomes: Vec<f64> = chunks(params.runs, RUN_CHUNK)
        .into_par_iter()
        .map(|(chunk, _, len)| {
            let mut rng = seeds.stream(chunk);
            (0..len)
                .map(|_| {
                    let mut v = params.start_capital;
                    for _ in 0..months {
                        v *= 1.0 + monthly.sample(&mut rng);
                        v += params.monthly_contrib;
                    }
                    v
                })
                .collect::<Vec<f64>>()
        })
        .collect::<Vec<Vec<f64>>>()
        .concat();

    Ok(SimulationOutcome {
        outcomes,
        expected_return: mu_port,
        volatility: vol_port,
    })
}

/// Percentile with linear interpolation between closest ranks. `sorted` must be ascending.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Goal probability and spread of an outcome distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeSummary {
    pub prob_reach_goal: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
}

impl OutcomeSummary {
    /// Empty distributions summarise to all zeros.
    pub fn from_outcomes(outcomes: &[f64], goal: f64) -> Self {
        if outcomes.is_empty() {
            return Self {
                prob_reach_goal: 0.0,
                p5: 0.0,
                p50: 0.0,
                p95: 0.0,
            };
        }
        let n = outcomes.len() as f64;
        let mut sorted = outcomes.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Self {
            prob_reach_goal: outcomes.iter().filter(|v| **v >= goal).count() as f64 / n,
            p5: percentile(&sorted, 5.0),
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
        }
    }
}
