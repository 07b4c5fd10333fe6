//! Goal-based investment planning.
//!
//! Given a monetary goal, a horizon and a risk tolerance, the planner builds
//! an instrument universe, downloads price history, ranks instruments on
//! risk-adjusted return, searches for portfolio weights and projects the
//! result with a Monte Carlo simulation. [`planner::GoalPlanner`] runs the
//! whole pipeline; [`planner::compute_allocation`] is the offline numeric core.

pub mod cli;
pub mod config;
pub mod error;
pub mod investor;
pub mod metrics;
pub mod optimizer;
pub mod planner;
pub mod portfolio;
pub mod prices;
pub mod ranking;
pub mod rng;
pub mod server;
pub mod simulation;
pub mod stocks;
pub mod universe;

pub use config::PlannerConfig;
pub use error::{FetchError, PlannerError, Result};
pub use investor::{PlanRequest, RiskLevel};
pub use planner::{compute_allocation, CoreOutput, GoalPlanner};
pub use portfolio::{PlanResult, PlannedPosition};
pub use stocks::{DisplayNameProvider, InMemoryProvider, PriceHistoryProvider, YahooFinance};
