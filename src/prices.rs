//! Daily price table aligned on a common calendar.

use chrono::NaiveDate;
use log::warn;
use std::collections::BTreeSet;

use crate::error::{PlannerError, Result};

/// Raw daily closes for one instrument as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub symbol: String,
    pub points: Vec<(NaiveDate, f64)>,
}

impl DailySeries {
    pub fn new(symbol: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Self {
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Prices per instrument on the union calendar of all inputs.
///
/// Gaps are forward-filled, so a value is only missing before an
/// instrument's first observation. Every column holds at least one price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

fn usable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

impl PriceTable {
    /// Align series on their combined calendar, forward-fill, and drop empty columns.
    pub fn from_series(series: Vec<DailySeries>) -> Result<Self> {
        let calendar: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|s| s.points.iter().map(|(d, _)| *d))
            .collect();
        let dates: Vec<NaiveDate> = calendar.into_iter().collect();

        let mut symbols = Vec::new();
        let mut columns = Vec::new();

        for s in series {
            if symbols.contains(&s.symbol) {
                warn!("Duplicate price series for {} ignored", s.symbol);
                continue;
            }
            let mut column: Vec<Option<f64>> = vec![None; dates.len()];
            for (date, price) in &s.points {
                if !usable(*price) {
                    continue;
                }
                if let Ok(idx) = dates.binary_search(date) {
                    column[idx] = Some(*price);
                }
            }

            let mut last = None;
            for slot in column.iter_mut() {
                match slot {
                    Some(p) => last = Some(*p),
                    None => *slot = last,
                }
            }

            if column.iter().all(|v| v.is_none()) {
                warn!("No usable prices for {}, dropping", s.symbol);
                continue;
            }
            symbols.push(s.symbol);
            columns.push(column);
        }

        if symbols.is_empty() {
            return Err(PlannerError::NoUsableData);
        }

        Ok(Self {
            dates,
            symbols,
            columns,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.columns[i].as_slice())
    }

    pub(crate) fn columns(&self) -> &[Vec<Option<f64>>] {
        &self.columns
    }

    /// Most recent available price, or 0.0 when the instrument has none.
    pub fn last_price(&self, symbol: &str) -> f64 {
        self.column(symbol)
            .and_then(|col| col.iter().rev().find_map(|v| *v))
            .unwrap_or(0.0)
    }
}
