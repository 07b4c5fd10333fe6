//! End-to-end planning pipeline.
//!
//! ```text
//! universe -> fetch -> price table -> metrics -> rank -> optimize -> simulate -> assemble
//! ```
//!
//! Retrieval is async and tolerant of per-instrument failures. Everything from
//! metrics to simulation is the synchronous numeric core
//! ([`compute_allocation`]), which runs on the blocking pool.

use chrono::Utc;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PlannerConfig;
use crate::error::Result;
use crate::investor::PlanRequest;
use crate::metrics::compute_metrics;
use crate::optimizer::{optimize_portfolio, Allocation, RandomSearch};
use crate::portfolio::{assemble_plan, PlanResult};
use crate::prices::PriceTable;
use crate::ranking::rank_candidates;
use crate::simulation::{simulate_goal, SimulationOutcome, SimulationParams};
use crate::stocks::{
    fetch_all, lookback_start, resolve_names, summarize_outcomes, DisplayNameProvider,
    PriceHistoryProvider,
};
use crate::universe::build_universe;

/// Result of the numeric core, before prices and names are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreOutput {
    /// Ranked shortlist, best first.
    pub shortlist: Vec<String>,
    pub allocation: Allocation,
    pub simulation: SimulationOutcome,
    /// Seed actually used by both optimizer and simulator.
    pub seed: u64,
}

/// Metrics, ranking, optimization and simulation over an already-built price table.
pub fn compute_allocation(
    table: &PriceTable,
    request: &PlanRequest,
    config: &PlannerConfig,
) -> Result<CoreOutput> {
    let metrics = compute_metrics(table)?;
    info!("Metrics computed for {} instruments", metrics.len());

    let shortlist = rank_candidates(&metrics, request.risk, config.max_candidates)?;
    info!(
        "Shortlisted {} candidates for {} risk",
        shortlist.len(),
        request.risk
    );

    let seed = config.seed.unwrap_or_else(rand::random);
    let search = RandomSearch::new(config.tries, Some(seed));
    let allocation = optimize_portfolio(
        &metrics.restrict(&shortlist),
        request.risk,
        config.max_assets,
        &search,
    )?;
    info!(
        "Allocation over {} instruments: return={:.2}%, vol={:.2}%",
        allocation.weights.len(),
        allocation.expected_return * 100.0,
        allocation.volatility * 100.0
    );

    let params = SimulationParams {
        years: request.years,
        start_capital: request.start_capital,
        monthly_contrib: request.monthly_contrib,
        runs: config.runs,
        seed: Some(seed),
    };
    let simulation = simulate_goal(&allocation.weights, &metrics, &params)?;

    Ok(CoreOutput {
        shortlist,
        allocation,
        simulation,
        seed,
    })
}

/// Plans goals against a shared market-data provider.
pub struct GoalPlanner<P> {
    provider: Arc<P>,
    config: PlannerConfig,
}

impl<P> GoalPlanner<P>
where
    P: PriceHistoryProvider + DisplayNameProvider + 'static,
{
    pub fn new(provider: P, config: PlannerConfig) -> Self {
        Self::with_shared(Arc::new(provider), config)
    }

    pub fn with_shared(provider: Arc<P>, config: PlannerConfig) -> Self {
        Self { provider, config }
    }

    pub async fn plan(&self, request: &PlanRequest) -> Result<PlanResult> {
        request.validate()?;
        self.config.validate()?;

        let universe = build_universe(&self.config.universe, &self.config.extra_tickers)?;
        info!("Universe: {} instruments", universe.len());

        let start = lookback_start(Utc::now().date_naive(), self.config.lookback_years);
        let outcomes = fetch_all(
            self.provider.as_ref(),
            universe.symbols(),
            start,
            self.config.fetch_concurrency,
        )
        .await;
        let (series, _) = summarize_outcomes(outcomes);
        let table = PriceTable::from_series(series)?;

        let req = request.clone();
        let config = self.config.clone();
        let (core, table) = tokio::task::spawn_blocking(move || {
            compute_allocation(&table, &req, &config).map(|core| (core, table))
        })
        .await??;

        let held = core.allocation.weights.symbols();
        let prices: HashMap<String, f64> = held
            .iter()
            .map(|s| (s.clone(), table.last_price(s)))
            .collect();
        let names = resolve_names(self.provider.as_ref(), &held).await;

        Ok(assemble_plan(
            &core.allocation.weights,
            &core.simulation,
            request.goal,
            &prices,
            &names,
            request.start_capital,
        ))
    }
}
