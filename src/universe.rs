//! Candidate universe: static index membership lists, merged and deduplicated.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{PlannerError, Result};

pub const SP500: &[&str] = &[
    "AAPL", "MSFT", "AMZN", "GOOGL", "GOOG", "META", "NVDA", "TSLA", "BRK-B", "UNH", "JNJ", "V",
    "PG", "XOM", "JPM", "MA", "HD", "CVX", "LLY", "ABBV", "PEP", "KO", "MRK", "PFE", "BAC",
    "AVGO", "COST", "WMT", "MCD", "DIS", "ADBE", "CSCO", "ACN", "TMO", "NFLX", "TXN", "ABT",
    "CMCSA", "VZ", "ORCL", "CRM", "INTC", "AMD", "QCOM", "HON", "LOW", "LIN", "AMT", "CAT",
    "NKE", "UPS",
];

pub const NASDAQ100: &[&str] = &[
    "AAPL", "MSFT", "AMZN", "NVDA", "GOOG", "GOOGL", "META", "TSLA", "PEP", "AVGO", "COST",
    "ADBE", "NFLX", "INTC", "CSCO", "AMD", "TXN", "QCOM", "AMAT", "INTU", "ISRG", "PYPL", "MU",
    "LRCX", "ADI", "REGN", "VRTX", "MELI", "CRWD", "PANW", "SHOP", "WDAY", "MRVL", "KLAC",
    "CDNS", "SNPS", "ORLY", "MAR", "ADSK", "TEAM", "ZS",
];

pub const FTSE100: &[&str] = &[
    "BP.L", "SHEL.L", "HSBA.L", "ULVR.L", "AZN.L", "GSK.L", "RIO.L", "GLEN.L", "BATS.L", "DGE.L",
    "VOD.L", "LLOY.L", "BARC.L", "RKT.L", "IMB.L", "NG.L", "BT-A.L", "RR.L", "BA.L", "TSCO.L",
    "SPX.L", "AAL.L", "STAN.L", "REL.L", "ABF.L", "AUTO.L", "CNA.L", "CCEP.L", "SMIN.L", "INF.L",
    "SGRO.L", "EXPN.L", "HIK.L", "HLMA.L", "JD.L", "PRU.L", "SSE.L", "ENT.L", "MNDI.L", "LAND.L",
];

// Letters/digits with optional class suffix and exchange suffix, e.g. BRK-B, BT-A.L, ^GSPC
static TICKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\^?[A-Z0-9]{1,10}(?:[-=][A-Z0-9]{1,4})?(?:\.[A-Z]{1,4})?$")
        .expect("ticker pattern is valid")
});

/// Which static membership lists to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseSelection {
    pub sp500: bool,
    pub ftse100: bool,
    pub nasdaq100: bool,
}

impl Default for UniverseSelection {
    fn default() -> Self {
        Self {
            sp500: true,
            ftse100: true,
            nasdaq100: true,
        }
    }
}

impl UniverseSelection {
    pub fn none() -> Self {
        Self {
            sp500: false,
            ftse100: false,
            nasdaq100: false,
        }
    }
}

/// Ordered, duplicate-free list of instrument identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    symbols: Vec<String>,
}

impl Universe {
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|s| s.as_str())
    }
}

/// Check a user-supplied identifier. Returns the normalised form if it looks like a ticker.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let t = raw.trim().to_uppercase();
    if TICKER_RE.is_match(&t) {
        Some(t)
    } else {
        None
    }
}

/// Union of the selected lists in S&P 500, FTSE 100, NASDAQ-100 order, then `extra`.
/// First occurrence wins.
pub fn build_universe(selection: &UniverseSelection, extra: &[String]) -> Result<Universe> {
    let mut candidates: Vec<String> = Vec::new();
    if selection.sp500 {
        candidates.extend(SP500.iter().map(|s| s.to_string()));
    }
    if selection.ftse100 {
        candidates.extend(FTSE100.iter().map(|s| s.to_string()));
    }
    if selection.nasdaq100 {
        candidates.extend(NASDAQ100.iter().map(|s| s.to_string()));
    }
    for raw in extra {
        match normalize_ticker(raw) {
            Some(t) => candidates.push(t),
            None => warn!("Ignoring invalid ticker '{}'", raw),
        }
    }

    let mut seen = HashSet::new();
    let symbols: Vec<String> = candidates
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect();

    if symbols.is_empty() {
        return Err(PlannerError::EmptyUniverse);
    }
    Ok(Universe { symbols })
}
