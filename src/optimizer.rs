//! Weight search over the shortlist.
//!
//! The objective trades expected return against distance from a
//! risk-specific target volatility:
//!
//! `score = -expected_return + penalty * |volatility - target_volatility|`
//!
//! Lower is better. The objective is not smooth, so the default strategy is
//! a seeded random search over the simplex ([`RandomSearch`]). It is a
//! heuristic: the result is the best of the sampled candidates, not a proven
//! optimum, and it is reproducible only when a seed is supplied. Other
//! solvers plug in through [`AllocationStrategy`].

use log::debug;
use rand::Rng;
use rayon::prelude::*;

use crate::error::{PlannerError, Result};
use crate::investor::RiskLevel;
use crate::metrics::MetricsBundle;
use crate::rng::{chunks, SeedSequence};

/// Tries evaluated per work chunk; fixed so results do not depend on thread count.
const TRY_CHUNK: usize = 1024;

/// Non-negative weights over a subset of the shortlist, summing to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    entries: Vec<(String, f64)>,
}

impl WeightVector {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(s, w)| (s.as_str(), *w))
    }

    pub fn symbols(&self) -> Vec<String> {
        self.entries.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, w)| *w).collect()
    }
}

/// Target volatility and penalty for one risk tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub target_volatility: f64,
    pub penalty: f64,
}

impl Objective {
    pub fn for_risk(risk: RiskLevel) -> Self {
        Self {
            target_volatility: risk.target_volatility(),
            penalty: risk.penalty(),
        }
    }

    pub fn score(&self, expected_return: f64, volatility: f64) -> f64 {
        -expected_return + self.penalty * (volatility - self.target_volatility).abs()
    }
}

/// Chosen weights and the portfolio moments they imply.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub weights: WeightVector,
    pub expected_return: f64,
    pub volatility: f64,
}

/// A way of choosing weights for every instrument in `metrics`.
pub trait AllocationStrategy: Send + Sync {
    fn allocate(&self, metrics: &MetricsBundle, objective: &Objective) -> Result<Allocation>;
}

/// Expected return and volatility of `weights` (bundle order).
pub fn evaluate(metrics: &MetricsBundle, weights: &[f64]) -> (f64, f64) {
    let exp_ret = metrics.portfolio_return(weights);
    let vol = metrics.portfolio_variance(weights).max(0.0).sqrt();
    (exp_ret, vol)
}

/// Uniform draws normalised to sum to 1. `None` if every draw was zero.
fn propose<R: Rng>(rng: &mut R, n: usize) -> Option<Vec<f64>> {
    let raw: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return None;
    }
    Some(raw.into_iter().map(|w| w / total).collect())
}

#[derive(Debug, Clone)]
struct Candidate {
    iteration: usize,
    score: f64,
    weights: Vec<f64>,
    expected_return: f64,
    volatility: f64,
}

// Lower score wins; on a tie the earlier iteration wins.
fn better(a: Candidate, b: Candidate) -> Candidate {
    if b.score < a.score || (b.score == a.score && b.iteration < a.iteration) {
        b
    } else {
        a
    }
}

/// Seeded random search: `tries` independent proposals, keep the lowest score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomSearch {
    pub tries: usize,
    pub seed: Option<u64>,
}

impl RandomSearch {
    pub fn new(tries: usize, seed: Option<u64>) -> Self {
        Self { tries, seed }
    }
}

impl AllocationStrategy for RandomSearch {
    fn allocate(&self, metrics: &MetricsBundle, objective: &Objective) -> Result<Allocation> {
        if self.tries == 0 {
            return Err(PlannerError::OptimizationFailed(
                "search budget is zero tries".to_string(),
            ));
        }
        if metrics.is_empty() {
            return Err(PlannerError::OptimizationFailed(
                "no assets to allocate".to_string(),
            ));
        }

        let n = metrics.len();
        let seeds = SeedSequence::from_option(self.seed);
        let best = chunks(self.tries, TRY_CHUNK)
            .into_par_iter()
            .filter_map(|(chunk, start, len)| {
                let mut rng = seeds.stream(chunk);
                let mut best: Option<Candidate> = None;
                let mut best_score = f64::INFINITY;
                for k in 0..len {
                    let Some(weights) = propose(&mut rng, n) else {
                        continue;
                    };
                    let (expected_return, volatility) = evaluate(metrics, &weights);
                    let score = objective.score(expected_return, volatility);
                    if score < best_score {
                        best_score = score;
                        best = Some(Candidate {
                            iteration: start + k,
                            score,
                            weights,
                            expected_return,
                            volatility,
                        });
                    }
                }
                best
            })
            .reduce_with(better)
            .ok_or_else(|| {
                PlannerError::OptimizationFailed("no candidate produced a finite score".to_string())
            })?;

        debug!(
            "Best of {} tries: score={:.6} (iteration {}), return={:.4}, vol={:.4}",
            self.tries, best.score, best.iteration, best.expected_return, best.volatility
        );

        let entries = metrics
            .symbols()
            .iter()
            .cloned()
            .zip(best.weights)
            .collect();
        Ok(Allocation {
            weights: WeightVector::new(entries),
            expected_return: best.expected_return,
            volatility: best.volatility,
        })
    }
}

/// Allocate over the first `max_assets` instruments of a ranked shortlist.
pub fn optimize_portfolio(
    shortlist: &MetricsBundle,
    risk: RiskLevel,
    max_assets: usize,
    strategy: &dyn AllocationStrategy,
) -> Result<Allocation> {
    let assets: Vec<String> = shortlist.symbols().iter().take(max_assets).cloned().collect();
    let chosen = shortlist.restrict(&assets);
    strategy.allocate(&chosen, &Objective::for_risk(risk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_assets() -> MetricsBundle {
        MetricsBundle::new(
            vec!["A".into(), "B".into()],
            vec![0.15, 0.10],
            vec![vec![0.04, 0.01], vec![0.01, 0.03]],
        )
        .unwrap()
    }

    #[test]
    fn test_returns_valid_weights() {
        let search = RandomSearch::new(500, Some(42));
        let alloc = optimize_portfolio(&two_assets(), RiskLevel::Balanced, 2, &search).unwrap();

        assert_eq!(alloc.weights.symbols(), vec!["A".to_string(), "B".to_string()]);
        assert_abs_diff_eq!(alloc.weights.sum(), 1.0, epsilon = 1e-6);
        assert!(alloc.weights.iter().all(|(_, w)| w >= 0.0));
        assert!(alloc.expected_return.is_finite());
        assert!(alloc.volatility.is_finite());
    }

    #[test]
    fn test_reported_moments_match_weights() {
        let m = two_assets();
        let alloc = RandomSearch::new(300, Some(5))
            .allocate(&m, &Objective::for_risk(RiskLevel::Conservative))
            .unwrap();
        let (r, v) = evaluate(&m, &alloc.weights.weights());
        assert_abs_diff_eq!(alloc.expected_return, r, epsilon = 1e-12);
        assert_abs_diff_eq!(alloc.volatility, v, epsilon = 1e-12);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let m = two_assets();
        let search = RandomSearch::new(5000, Some(7));
        let a = optimize_portfolio(&m, RiskLevel::Aggressive, 2, &search).unwrap();
        let b = optimize_portfolio(&m, RiskLevel::Aggressive, 2, &search).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncates_to_max_assets() {
        let m = MetricsBundle::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![0.1, 0.2, 0.3],
            vec![
                vec![0.04, 0.0, 0.0],
                vec![0.0, 0.04, 0.0],
                vec![0.0, 0.0, 0.04],
            ],
        )
        .unwrap();
        let alloc = optimize_portfolio(&m, RiskLevel::Balanced, 2, &RandomSearch::new(100, Some(1))).unwrap();
        assert_eq!(alloc.weights.symbols(), vec!["A".to_string(), "B".to_string()]);
        assert!(alloc.weights.get("C").is_none());
    }

    #[test]
    fn test_prefers_dominant_asset() {
        // same risk, A returns far more; A alone sits on the aggressive target
        let m = MetricsBundle::new(
            vec!["A".into(), "B".into()],
            vec![0.30, 0.02],
            vec![vec![0.0784, 0.0], vec![0.0, 0.0784]],
        )
        .unwrap();
        let alloc = optimize_portfolio(&m, RiskLevel::Aggressive, 2, &RandomSearch::new(5000, Some(3))).unwrap();
        assert!(alloc.weights.get("A").unwrap() > 0.95);
    }

    #[test]
    fn test_zero_tries_fails() {
        let err = optimize_portfolio(&two_assets(), RiskLevel::Balanced, 2, &RandomSearch::new(0, Some(1)))
            .unwrap_err();
        assert!(matches!(err, PlannerError::OptimizationFailed(_)));
    }

    #[test]
    fn test_no_assets_fails() {
        let err = optimize_portfolio(&two_assets(), RiskLevel::Balanced, 0, &RandomSearch::new(10, Some(1)))
            .unwrap_err();
        assert!(matches!(err, PlannerError::OptimizationFailed(_)));
    }

    #[test]
    fn test_objective_score() {
        let o = Objective::for_risk(RiskLevel::Conservative);
        assert_abs_diff_eq!(o.score(0.08, 0.10), -0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(o.score(0.08, 0.15), -0.08 + 10.0 * 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_tie_break_keeps_first() {
        let mk = |iteration, score| Candidate {
            iteration,
            score,
            weights: vec![],
            expected_return: 0.0,
            volatility: 0.0,
        };
        assert_eq!(better(mk(5, 1.0), mk(2, 1.0)).iteration, 2);
        assert_eq!(better(mk(2, 1.0), mk(5, 1.0)).iteration, 2);
        assert_eq!(better(mk(2, 1.0), mk(5, 0.5)).iteration, 5);
    }
}
