//! Annualised return, volatility and covariance estimates from daily prices.

use log::warn;

use crate::error::{PlannerError, Result};
use crate::prices::PriceTable;

/// Trading days per year used for annualisation.
pub const TRADING_DAYS: f64 = 252.0;

/// Daily log returns per instrument. Rows missing for every instrument are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub symbols: Vec<String>,
    pub columns: Vec<Vec<Option<f64>>>,
}

/// Per-instrument annualised statistics. Built once per run, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsBundle {
    symbols: Vec<String>,
    expected_returns: Vec<f64>,
    volatilities: Vec<f64>,
    covariance: Vec<Vec<f64>>,
}

impl MetricsBundle {
    /// Build from annualised means and covariance. Volatility is the root of the diagonal.
    pub fn new(symbols: Vec<String>, expected_returns: Vec<f64>, covariance: Vec<Vec<f64>>) -> Result<Self> {
        let n = symbols.len();
        if expected_returns.len() != n
            || covariance.len() != n
            || covariance.iter().any(|row| row.len() != n)
        {
            return Err(PlannerError::InvalidRequest(format!(
                "metrics dimension mismatch: {} symbols, {} returns, {}x? covariance",
                n,
                expected_returns.len(),
                covariance.len()
            )));
        }
        let volatilities = (0..n).map(|i| covariance[i][i].max(0.0).sqrt()).collect();
        Ok(Self {
            symbols,
            expected_returns,
            volatilities,
            covariance,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn expected_returns(&self) -> &[f64] {
        &self.expected_returns
    }

    pub fn volatilities(&self) -> &[f64] {
        &self.volatilities
    }

    pub fn covariance(&self) -> &[Vec<f64>] {
        &self.covariance
    }

    pub fn expected_return(&self, symbol: &str) -> Option<f64> {
        self.index_of(symbol).map(|i| self.expected_returns[i])
    }

    pub fn volatility(&self, symbol: &str) -> Option<f64> {
        self.index_of(symbol).map(|i| self.volatilities[i])
    }

    pub fn covariance_of(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.covariance[self.index_of(a)?][self.index_of(b)?])
    }

    /// Sub-bundle over `keep`, in that order. Unknown symbols are skipped.
    pub fn restrict(&self, keep: &[String]) -> Self {
        let idx: Vec<usize> = keep.iter().filter_map(|s| self.index_of(s)).collect();
        Self {
            symbols: idx.iter().map(|&i| self.symbols[i].clone()).collect(),
            expected_returns: idx.iter().map(|&i| self.expected_returns[i]).collect(),
            volatilities: idx.iter().map(|&i| self.volatilities[i]).collect(),
            covariance: idx
                .iter()
                .map(|&i| idx.iter().map(|&j| self.covariance[i][j]).collect())
                .collect(),
        }
    }

    /// `w · mu`, with `weights` in bundle order.
    pub fn portfolio_return(&self, weights: &[f64]) -> f64 {
        weights
            .iter()
            .zip(&self.expected_returns)
            .map(|(w, m)| w * m)
            .sum()
    }

    /// `w · cov · w`, with `weights` in bundle order.
    pub fn portfolio_variance(&self, weights: &[f64]) -> f64 {
        let mut var = 0.0;
        for (i, wi) in weights.iter().enumerate() {
            for (j, wj) in weights.iter().enumerate() {
                var += wi * wj * self.covariance[i][j];
            }
        }
        var
    }
}

/// Day-over-day log returns on the table's calendar.
pub fn log_returns(table: &PriceTable) -> ReturnSeries {
    let steps = table.len().saturating_sub(1);
    let raw: Vec<Vec<Option<f64>>> = table
        .columns()
        .iter()
        .map(|col| {
            (1..=steps)
                .map(|t| match (col[t - 1], col[t]) {
                    (Some(prev), Some(cur)) if prev > 0.0 && cur > 0.0 => Some((cur / prev).ln()),
                    _ => None,
                })
                .collect()
        })
        .collect();

    let keep: Vec<usize> = (0..steps)
        .filter(|&t| raw.iter().any(|col| col[t].is_some()))
        .collect();
    let columns = raw
        .into_iter()
        .map(|col| keep.iter().map(|&t| col[t]).collect())
        .collect();

    ReturnSeries {
        symbols: table.symbols().to_vec(),
        columns,
    }
}

fn mean(values: &[Option<f64>]) -> f64 {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return f64::NAN;
    }
    present.iter().sum::<f64>() / present.len() as f64
}

/// Sample covariance over rows where both series are present.
fn pairwise_covariance(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    pairs.iter().map(|(x, y)| (x - mx) * (y - my)).sum::<f64>() / (n - 1.0)
}

/// Annualised metrics for every instrument with finite return statistics.
///
/// Instruments whose mean or variance is undefined are dropped. Fails when
/// fewer than two time points or fewer than two instruments remain.
pub fn compute_metrics(table: &PriceTable) -> Result<MetricsBundle> {
    if table.len() < 2 {
        return Err(PlannerError::InsufficientHistory {
            points: table.len(),
        });
    }
    let returns = log_returns(table);

    let mut valid = Vec::new();
    let mut means = Vec::new();
    for (i, col) in returns.columns.iter().enumerate() {
        let mu = mean(col);
        let var = pairwise_covariance(col, col);
        if mu.is_finite() && var.is_finite() {
            valid.push(i);
            means.push(mu);
        } else {
            warn!(
                "Dropping {}: not enough return observations",
                returns.symbols[i]
            );
        }
    }

    if valid.len() < 2 {
        return Err(PlannerError::InsufficientData {
            available: valid.len(),
        });
    }

    let mut covariance = vec![vec![0.0; valid.len()]; valid.len()];
    for (a, &i) in valid.iter().enumerate() {
        for (b, &j) in valid.iter().enumerate().skip(a) {
            let mut c = pairwise_covariance(&returns.columns[i], &returns.columns[j]);
            if !c.is_finite() {
                warn!(
                    "No overlapping returns for {} and {}, assuming zero covariance",
                    returns.symbols[i], returns.symbols[j]
                );
                c = 0.0;
            }
            covariance[a][b] = c * TRADING_DAYS;
            covariance[b][a] = c * TRADING_DAYS;
        }
    }

    let symbols = valid.iter().map(|&i| returns.symbols[i].clone()).collect();
    let expected_returns = means.iter().map(|m| m * TRADING_DAYS).collect();
    MetricsBundle::new(symbols, expected_returns, covariance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::DailySeries;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn series(symbol: &str, prices: &[f64]) -> DailySeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DailySeries::new(
            symbol,
            prices
                .iter()
                .enumerate()
                .map(|(i, p)| (start + chrono::Duration::days(i as i64), *p))
                .collect(),
        )
    }

    fn small_table() -> PriceTable {
        PriceTable::from_series(vec![
            series("A", &[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]),
            series("B", &[50.0, 50.5, 51.0, 51.5, 52.0, 52.5]),
            series("C", &[200.0, 198.0, 199.0, 201.0, 202.0, 204.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_shapes_and_finite_values() {
        let m = compute_metrics(&small_table()).unwrap();
        assert_eq!(m.symbols(), &["A".to_string(), "B".to_string(), "C".to_string()]);
        assert_eq!(m.covariance().len(), 3);
        assert!(m.expected_returns().iter().all(|v| v.is_finite()));
        assert!(m.volatilities().iter().all(|v| v.is_finite()));
        assert!(m.covariance().iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_annualisation() {
        let m = compute_metrics(&small_table()).unwrap();
        // A: mean daily log return is ln(105/100)/5
        assert_relative_eq!(m.expected_return("A").unwrap(), (1.05f64).ln() / 5.0 * 252.0, epsilon = 1e-12);
        // volatility is sqrt of the annualised variance
        let var_a = m.covariance_of("A", "A").unwrap();
        assert_relative_eq!(m.volatility("A").unwrap(), var_a.sqrt(), epsilon = 1e-12);
        // symmetric
        assert_eq!(m.covariance_of("A", "C"), m.covariance_of("C", "A"));
    }

    #[test]
    fn test_known_covariance() {
        let returns_a = [0.01, -0.01, 0.02];
        let returns_b = [0.0, 0.01, 0.0];
        let mut pa = vec![100.0];
        let mut pb = vec![100.0];
        for (ra, rb) in returns_a.iter().zip(&returns_b) {
            pa.push(pa.last().unwrap() * f64::exp(*ra));
            pb.push(pb.last().unwrap() * f64::exp(*rb));
        }
        let table = PriceTable::from_series(vec![series("A", &pa), series("B", &pb)]).unwrap();
        let m = compute_metrics(&table).unwrap();

        // sample covariance with n - 1 = 2
        let ma = 0.02 / 3.0;
        let mb = 0.01 / 3.0;
        let cov_ab: f64 = returns_a
            .iter()
            .zip(&returns_b)
            .map(|(a, b)| (a - ma) * (b - mb))
            .sum::<f64>()
            / 2.0;
        assert_relative_eq!(m.covariance_of("A", "B").unwrap(), cov_ab * 252.0, epsilon = 1e-12);
    }

    #[test]
    fn test_short_history_instrument_dropped() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let late = DailySeries::new("LATE", vec![(start + chrono::Duration::days(5), 10.0)]);
        let table = PriceTable::from_series(vec![
            series("A", &[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]),
            series("B", &[50.0, 50.5, 51.0, 51.5, 52.0, 52.5]),
            late,
        ])
        .unwrap();
        let m = compute_metrics(&table).unwrap();
        assert_eq!(m.len(), 2);
        assert!(m.index_of("LATE").is_none());
    }

    #[test]
    fn test_insufficient_data() {
        let one = PriceTable::from_series(vec![series("A", &[1.0, 2.0, 3.0])]).unwrap();
        assert!(matches!(
            compute_metrics(&one),
            Err(PlannerError::InsufficientData { available: 1 })
        ));

        let single_day = PriceTable::from_series(vec![series("A", &[1.0]), series("B", &[2.0])]).unwrap();
        let err = compute_metrics(&single_day).unwrap_err();
        assert!(matches!(err, PlannerError::InsufficientHistory { points: 1 }));
        assert!(err.to_string().contains("price dates"));
    }

    #[test]
    fn test_restrict_and_portfolio_moments() {
        let m = MetricsBundle::new(
            vec!["A".into(), "B".into()],
            vec![0.15, 0.10],
            vec![vec![0.04, 0.01], vec![0.01, 0.03]],
        )
        .unwrap();
        let r = m.restrict(&["B".to_string()]);
        assert_eq!(r.symbols(), &["B".to_string()]);
        assert_eq!(r.covariance(), &[vec![0.03]]);

        let w = [0.6, 0.4];
        assert_relative_eq!(m.portfolio_return(&w), 0.13, epsilon = 1e-12);
        let var = 0.36 * 0.04 + 2.0 * 0.24 * 0.01 + 0.16 * 0.03;
        assert_relative_eq!(m.portfolio_variance(&w), var, epsilon = 1e-12);
    }

    #[test]
    fn test_new_rejects_mismatched_dimensions() {
        let bad = MetricsBundle::new(vec!["A".into()], vec![0.1, 0.2], vec![vec![0.1]]);
        assert!(bad.is_err());
    }
}
