//! Risk-adjusted ranking of instruments into a shortlist.

use crate::error::{PlannerError, Result};
use crate::investor::RiskLevel;
use crate::metrics::MetricsBundle;

/// Score given to instruments whose ratio is undefined (zero volatility) or non-finite.
///
/// Zero-volatility instruments therefore always sort last, even if they look
/// risk-free.
pub const UNDEFINED_SCORE: f64 = -1e9;

/// Blend of return-to-volatility ratio and raw volatility for a risk tolerance.
pub fn score(expected_return: f64, volatility: f64, risk: RiskLevel) -> f64 {
    let sharpe = if volatility == 0.0 {
        f64::NAN
    } else {
        expected_return / volatility
    };
    let s = match risk {
        RiskLevel::Conservative => 0.6 * sharpe - 0.4 * volatility,
        RiskLevel::Balanced => 0.8 * sharpe - 0.2 * volatility,
        RiskLevel::Aggressive | RiskLevel::Unspecified => sharpe,
    };
    if s.is_finite() {
        s
    } else {
        UNDEFINED_SCORE
    }
}

/// Top `max_candidates` symbols by descending score. Ties keep bundle order.
pub fn rank_candidates(
    metrics: &MetricsBundle,
    risk: RiskLevel,
    max_candidates: usize,
) -> Result<Vec<String>> {
    if metrics.is_empty() {
        return Err(PlannerError::InsufficientData { available: 0 });
    }

    let mut scored: Vec<(usize, f64)> = metrics
        .expected_returns()
        .iter()
        .zip(metrics.volatilities())
        .map(|(mu, vol)| score(*mu, *vol, risk))
        .enumerate()
        .collect();
    // stable, so equal scores keep bundle order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(scored
        .into_iter()
        .take(max_candidates)
        .map(|(i, _)| metrics.symbols()[i].clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn bundle(mu: &[f64], vol: &[f64]) -> MetricsBundle {
        let n = mu.len();
        let symbols = (0..n).map(|i| format!("S{}", i)).collect();
        let cov = (0..n)
            .map(|i| (0..n).map(|j| if i == j { vol[i] * vol[i] } else { 0.0 }).collect())
            .collect();
        MetricsBundle::new(symbols, mu.to_vec(), cov).unwrap()
    }

    #[test]
    fn test_prefers_higher_sharpe() {
        let m = MetricsBundle::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![0.2, 0.1, 0.05],
            vec![
                vec![0.01, 0.0, 0.0],
                vec![0.0, 0.01, 0.0],
                vec![0.0, 0.0, 0.01],
            ],
        )
        .unwrap();
        let top = rank_candidates(&m, RiskLevel::Aggressive, 2).unwrap();
        assert_eq!(top, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_score_formulas() {
        assert_eq!(score(0.2, 0.1, RiskLevel::Aggressive), 2.0);
        assert!((score(0.2, 0.1, RiskLevel::Balanced) - (0.8 * 2.0 - 0.2 * 0.1)).abs() < 1e-12);
        assert!((score(0.2, 0.1, RiskLevel::Conservative) - (0.6 * 2.0 - 0.4 * 0.1)).abs() < 1e-12);
        assert_eq!(score(0.2, 0.1, RiskLevel::Unspecified), 2.0);
    }

    #[test]
    fn test_zero_volatility_sorts_last() {
        assert_eq!(score(0.05, 0.0, RiskLevel::Balanced), UNDEFINED_SCORE);
        let m = bundle(&[0.05, -0.5, 0.01], &[0.0, 0.3, 0.2]);
        let ranked = rank_candidates(&m, RiskLevel::Conservative, 10).unwrap();
        assert_eq!(ranked.last().unwrap(), "S0");
    }

    #[test]
    fn test_ties_keep_original_order() {
        let m = bundle(&[0.1, 0.1, 0.1], &[0.2, 0.2, 0.2]);
        let ranked = rank_candidates(&m, RiskLevel::Balanced, 3).unwrap();
        assert_eq!(ranked, vec!["S0", "S1", "S2"]);
    }

    #[test]
    fn test_length_order_and_uniqueness_for_all_tags() {
        let mu = [0.12, -0.03, 0.3, 0.07, 0.0, 0.22];
        let vol = [0.2, 0.15, 0.45, 0.0, 0.1, 0.25];
        let m = bundle(&mu, &vol);
        for risk in [
            RiskLevel::Conservative,
            RiskLevel::Balanced,
            RiskLevel::Aggressive,
            RiskLevel::Unspecified,
        ] {
            for max in [1, 4, 6, 20] {
                let ranked = rank_candidates(&m, risk, max).unwrap();
                assert_eq!(ranked.len(), max.min(m.len()));
                let unique: HashSet<&String> = ranked.iter().collect();
                assert_eq!(unique.len(), ranked.len());
                let scores: Vec<f64> = ranked
                    .iter()
                    .map(|s| {
                        let i = m.index_of(s).unwrap();
                        score(m.expected_returns()[i], m.volatilities()[i], risk)
                    })
                    .collect();
                assert!(scores.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn test_empty_bundle() {
        let m = MetricsBundle::new(vec![], vec![], vec![]).unwrap();
        assert!(rank_candidates(&m, RiskLevel::Balanced, 5).is_err());
    }
}
