//! Market data retrieval
//!
//! This module handles:
//! - Fetching daily price history per instrument from Yahoo Finance
//! - Looking up display names for instruments
//! - Loading a price snapshot from a JSON file for offline runs
//!
//! Retrieval failures are per-instrument and never abort a run: every
//! symbol yields a [`FetchOutcome`], and the caller decides what to keep.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{FetchError, PlannerError, Result};
use crate::prices::DailySeries;

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const YAHOO_QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; goal-planner/0.1)";

/// Supplies daily closing prices for one instrument from `start` until today.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    async fn daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
    ) -> std::result::Result<DailySeries, FetchError>;
}

/// Supplies a human-readable name for an instrument.
#[async_trait]
pub trait DisplayNameProvider: Send + Sync {
    async fn display_name(&self, symbol: &str) -> std::result::Result<String, FetchError>;
}

/// Result of retrieving one instrument.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(DailySeries),
    Failed { symbol: String, reason: FetchError },
}

impl FetchOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            FetchOutcome::Fetched(s) => &s.symbol,
            FetchOutcome::Failed { symbol, .. } => symbol,
        }
    }
}

/// Start of the lookback window: `years` of 365.25 days before `today`.
/// Saturates at the earliest representable date.
pub fn lookback_start(today: NaiveDate, years: u32) -> NaiveDate {
    let days = (365.25 * years as f64) as i64;
    today
        .checked_sub_signed(ChronoDuration::days(days))
        .unwrap_or(NaiveDate::MIN)
}

/// Fetch every symbol, at most `concurrency` requests in flight.
/// Outcomes come back in the same order as `symbols`.
pub async fn fetch_all<P>(
    provider: &P,
    symbols: &[String],
    start: NaiveDate,
    concurrency: usize,
) -> Vec<FetchOutcome>
where
    P: PriceHistoryProvider + ?Sized,
{
    let total = symbols.len();
    stream::iter(symbols.iter().cloned().enumerate())
        .map(|(i, symbol)| async move {
            debug!("Downloading {} ({}/{})", symbol, i + 1, total);
            match provider.daily_closes(&symbol, start).await {
                Ok(series) if series.is_empty() => FetchOutcome::Failed {
                    symbol,
                    reason: FetchError::NoData,
                },
                Ok(series) => FetchOutcome::Fetched(series),
                Err(reason) => FetchOutcome::Failed { symbol, reason },
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Split outcomes into usable series and logged failures.
pub fn summarize_outcomes(
    outcomes: Vec<FetchOutcome>,
) -> (Vec<DailySeries>, Vec<(String, FetchError)>) {
    let mut fetched = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome {
            FetchOutcome::Fetched(series) => fetched.push(series),
            FetchOutcome::Failed { symbol, reason } => {
                warn!("{} failed: {}", symbol, reason);
                failed.push((symbol, reason));
            }
        }
    }
    info!(
        "Fetch complete: {} success, {} failed",
        fetched.len(),
        failed.len()
    );
    (fetched, failed)
}

/// Display names for `symbols`, falling back to the identifier itself.
pub async fn resolve_names<P>(provider: &P, symbols: &[String]) -> HashMap<String, String>
where
    P: DisplayNameProvider + ?Sized,
{
    let mut names = HashMap::new();
    for symbol in symbols {
        let name = match provider.display_name(symbol).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => symbol.clone(),
            Err(e) => {
                debug!("No display name for {}: {}", symbol, e);
                symbol.clone()
            }
        };
        names.insert(symbol.clone(), name);
    }
    names
}

/// Yahoo Finance chart and quote endpoints.
pub struct YahooFinance {
    client: reqwest::Client,
}

impl YahooFinance {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn get_json(&self, url: &str) -> std::result::Result<Value, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooFinance {
    async fn daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
    ) -> std::result::Result<DailySeries, FetchError> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        let period2 = chrono::Utc::now().timestamp();
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            YAHOO_CHART_URL, symbol, period1, period2
        );

        let json = self.get_json(&url).await?;
        let points = extract_daily_closes(&json)?;
        Ok(DailySeries::new(symbol, points))
    }
}

#[async_trait]
impl DisplayNameProvider for YahooFinance {
    async fn display_name(&self, symbol: &str) -> std::result::Result<String, FetchError> {
        let url = format!("{}?symbols={}", YAHOO_QUOTE_URL, symbol);
        let json = self.get_json(&url).await?;
        extract_long_name(&json).ok_or(FetchError::NoData)
    }
}

/// Extract (date, close) pairs from a chart response.
///
/// Prefers adjusted closes and falls back to raw closes. Dates are taken in
/// the exchange's local time using the reported GMT offset. Null entries are
/// skipped.
fn extract_daily_closes(
    json: &Value,
) -> std::result::Result<Vec<(NaiveDate, f64)>, FetchError> {
    if let Some(desc) = json["chart"]["error"]["description"].as_str() {
        return Err(FetchError::Decode(desc.to_string()));
    }
    let result = json["chart"]["result"]
        .as_array()
        .and_then(|r| r.first())
        .ok_or(FetchError::NoData)?;
    let timestamps = result["timestamp"].as_array().ok_or(FetchError::NoData)?;
    let offset = result["meta"]["gmtoffset"].as_i64().unwrap_or(0);

    let closes = result["indicators"]["adjclose"]
        .as_array()
        .and_then(|a| a.first())
        .and_then(|a| a["adjclose"].as_array())
        .or_else(|| {
            result["indicators"]["quote"]
                .as_array()
                .and_then(|q| q.first())
                .and_then(|q| q["close"].as_array())
        })
        .ok_or_else(|| FetchError::Decode("missing close prices".to_string()))?;

    let points: Vec<(NaiveDate, f64)> = timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(ts.as_i64()? + offset, 0)?.date_naive();
            Some((date, close.as_f64()?))
        })
        .collect();

    if points.is_empty() {
        return Err(FetchError::NoData);
    }
    Ok(points)
}

fn extract_long_name(json: &Value) -> Option<String> {
    let item = json["quoteResponse"]["result"].as_array()?.first()?;
    item["longName"]
        .as_str()
        .or_else(|| item["shortName"].as_str())
        .map(|s| s.to_string())
}

#[derive(Debug, Clone, Deserialize)]
struct SnapshotEntry {
    #[serde(default)]
    name: Option<String>,
    prices: Vec<(NaiveDate, f64)>,
}

/// Prices and names held in memory, typically loaded from a JSON snapshot:
///
/// `{"AAPL": {"name": "Apple Inc.", "prices": [["2024-01-02", 185.6], ...]}}`
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<String, Vec<(NaiveDate, f64)>>,
    names: HashMap<String, String>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, points: Vec<(NaiveDate, f64)>) -> Self {
        self.series.insert(symbol.to_string(), points);
        self
    }

    pub fn with_name(mut self, symbol: &str, name: &str) -> Self {
        self.names.insert(symbol.to_string(), name.to_string());
        self
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.series.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let entries: HashMap<String, SnapshotEntry> = serde_json::from_str(contents)?;
        if entries.is_empty() {
            return Err(PlannerError::NoUsableData);
        }
        let mut provider = Self::new();
        for (symbol, entry) in entries {
            if let Some(name) = entry.name {
                provider.names.insert(symbol.clone(), name);
            }
            provider.series.insert(symbol, entry.prices);
        }
        Ok(provider)
    }
}

#[async_trait]
impl PriceHistoryProvider for InMemoryProvider {
    async fn daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
    ) -> std::result::Result<DailySeries, FetchError> {
        let points = self.series.get(symbol).ok_or(FetchError::NoData)?;
        let points: Vec<(NaiveDate, f64)> =
            points.iter().filter(|(d, _)| *d >= start).copied().collect();
        Ok(DailySeries::new(symbol, points))
    }
}

#[async_trait]
impl DisplayNameProvider for InMemoryProvider {
    async fn display_name(&self, symbol: &str) -> std::result::Result<String, FetchError> {
        self.names.get(symbol).cloned().ok_or(FetchError::NoData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_lookback_start() {
        assert_eq!(lookback_start(d(2024, 1, 1), 1), d(2023, 1, 1));
        assert_eq!(lookback_start(d(2024, 1, 1), 5), d(2019, 1, 1));
        assert_eq!(lookback_start(d(2024, 1, 1), u32::MAX), NaiveDate::MIN);
    }

    #[test]
    fn test_extract_prefers_adjclose_and_skips_nulls() {
        let json = json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 0},
                    "timestamp": [1704240000, 1704326400, 1704412800],
                    "indicators": {
                        "quote": [{"close": [10.0, 11.0, 12.0]}],
                        "adjclose": [{"adjclose": [9.5, null, 11.5]}]
                    }
                }],
                "error": null
            }
        });
        let points = extract_daily_closes(&json).unwrap();
        assert_eq!(points, vec![(d(2024, 1, 3), 9.5), (d(2024, 1, 5), 11.5)]);
    }

    #[test]
    fn test_extract_falls_back_to_close() {
        let json = json!({
            "chart": {"result": [{
                "timestamp": [1704240000],
                "indicators": {"quote": [{"close": [10.0]}]}
            }]}
        });
        assert_eq!(extract_daily_closes(&json).unwrap(), vec![(d(2024, 1, 3), 10.0)]);
    }

    #[test]
    fn test_extract_reports_provider_error() {
        let json = json!({"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}});
        assert!(matches!(extract_daily_closes(&json), Err(FetchError::Decode(_))));
        assert_eq!(extract_daily_closes(&json!({})), Err(FetchError::NoData));
    }

    #[test]
    fn test_extract_long_name() {
        let json = json!({"quoteResponse": {"result": [{"symbol": "AAPL", "shortName": "Apple"}]}});
        assert_eq!(extract_long_name(&json).as_deref(), Some("Apple"));
        let json = json!({"quoteResponse": {"result": []}});
        assert_eq!(extract_long_name(&json), None);
    }

    #[tokio::test]
    async fn test_fetch_all_tags_failures_and_keeps_order() {
        let provider = InMemoryProvider::new()
            .with_series("A", vec![(d(2024, 1, 2), 1.0)])
            .with_series("EMPTY", vec![])
            .with_series("B", vec![(d(2024, 1, 2), 2.0)]);
        let symbols: Vec<String> = ["B", "MISSING", "EMPTY", "A"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let outcomes = fetch_all(&provider, &symbols, d(2024, 1, 1), 3).await;
        let order: Vec<&str> = outcomes.iter().map(|o| o.symbol()).collect();
        assert_eq!(order, vec!["B", "MISSING", "EMPTY", "A"]);
        assert!(matches!(outcomes[0], FetchOutcome::Fetched(_)));
        assert_eq!(
            outcomes[1],
            FetchOutcome::Failed {
                symbol: "MISSING".to_string(),
                reason: FetchError::NoData
            }
        );
        assert!(matches!(outcomes[2], FetchOutcome::Failed { .. }));

        let (fetched, failed) = summarize_outcomes(outcomes);
        assert_eq!(fetched.len(), 2);
        assert_eq!(failed.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_names_falls_back_to_symbol() {
        let provider = InMemoryProvider::new().with_name("A", "Alpha plc");
        let names = resolve_names(&provider, &["A".to_string(), "B".to_string()]).await;
        assert_eq!(names["A"], "Alpha plc");
        assert_eq!(names["B"], "B");
    }

    #[test]
    fn test_snapshot_json() {
        let provider = InMemoryProvider::from_json_str(
            r#"{"AAPL": {"name": "Apple Inc.", "prices": [["2024-01-02", 185.6], ["2024-01-03", 184.2]]}}"#,
        )
        .unwrap();
        assert_eq!(provider.symbols(), vec!["AAPL".to_string()]);
        assert!(InMemoryProvider::from_json_str("{}").is_err());
    }
}
