//! Turns an allocation and its simulated outcomes into a purchase plan.
//!
//! Every edge case resolves to 0.0: no starting capital means nothing to buy
//! now, and an instrument without a usable price gets zero shares.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::optimizer::WeightVector;
use crate::simulation::{OutcomeSummary, SimulationOutcome};

/// One instrument of the plan and what to buy of it today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPosition {
    pub ticker: String,
    pub company_name: String,
    pub weight: f64,
    pub current_price: f64,
    pub initial_allocation_gbp: f64,
    pub shares_to_buy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub weights: Vec<PlannedPosition>,
    pub expected_return: f64,
    pub volatility: f64,
    pub prob_reach_goal: f64,
    /// Median simulated terminal value.
    pub expected_final_value: f64,
    /// 5th percentile.
    pub low_estimate: f64,
    /// 95th percentile.
    pub high_estimate: f64,
    pub initial_capital: f64,
}

/// Amount of starting capital put into a position of `weight`.
pub fn initial_allocation(weight: f64, start_capital: f64) -> f64 {
    if start_capital > 0.0 {
        weight * start_capital
    } else {
        0.0
    }
}

/// Fractional share count for `allocation` at `price`.
pub fn shares_for(allocation: f64, price: f64) -> f64 {
    if price > 0.0 && allocation > 0.0 {
        allocation / price
    } else {
        0.0
    }
}

/// Build the plan. Missing prices count as 0.0 and missing names fall back to the ticker.
pub fn assemble_plan(
    weights: &WeightVector,
    simulation: &SimulationOutcome,
    goal: f64,
    prices: &HashMap<String, f64>,
    names: &HashMap<String, String>,
    start_capital: f64,
) -> PlanResult {
    let positions = weights
        .iter()
        .map(|(ticker, weight)| {
            let current_price = prices.get(ticker).copied().unwrap_or(0.0);
            let alloc = initial_allocation(weight, start_capital);
            PlannedPosition {
                ticker: ticker.to_string(),
                company_name: names
                    .get(ticker)
                    .cloned()
                    .unwrap_or_else(|| ticker.to_string()),
                weight,
                current_price,
                initial_allocation_gbp: alloc,
                shares_to_buy: shares_for(alloc, current_price),
            }
        })
        .collect();

    let summary = OutcomeSummary::from_outcomes(&simulation.outcomes, goal);

    PlanResult {
        weights: positions,
        expected_return: simulation.expected_return,
        volatility: simulation.volatility,
        prob_reach_goal: summary.prob_reach_goal,
        expected_final_value: summary.p50,
        low_estimate: summary.p5,
        high_estimate: summary.p95,
        initial_capital: start_capital,
    }
}
