//! Planner tuning knobs, loadable from a JSON file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{PlannerError, Result};
use crate::universe::UniverseSelection;

/// Longest price history window that may be requested.
pub const MAX_LOOKBACK_YEARS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Years of daily history used for metrics.
    pub lookback_years: u32,
    /// Shortlist size after ranking.
    pub max_candidates: usize,
    /// Instruments handed to the optimizer.
    pub max_assets: usize,
    /// Random-search proposals.
    pub tries: usize,
    /// Monte Carlo trajectories.
    pub runs: usize,
    /// Shared by optimizer and simulator; `None` draws fresh entropy per plan.
    pub seed: Option<u64>,
    pub universe: UniverseSelection,
    pub extra_tickers: Vec<String>,
    /// Price downloads in flight at once.
    pub fetch_concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            lookback_years: 5,
            max_candidates: 25,
            max_assets: 10,
            tries: 15_000,
            runs: 10_000,
            seed: None,
            universe: UniverseSelection::default(),
            extra_tickers: Vec::new(),
            fetch_concurrency: 4,
            request_timeout_secs: 10,
        }
    }
}

impl PlannerConfig {
    /// Read a config file; `None` gives the defaults. Absent keys take their default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("lookback_years", self.lookback_years as usize),
            ("max_candidates", self.max_candidates),
            ("max_assets", self.max_assets),
            ("runs", self.runs),
            ("fetch_concurrency", self.fetch_concurrency),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(PlannerError::InvalidConfig(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        if self.lookback_years > MAX_LOOKBACK_YEARS {
            return Err(PlannerError::InvalidConfig(format!(
                "lookback_years must be at most {}, got {}",
                MAX_LOOKBACK_YEARS, self.lookback_years
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
