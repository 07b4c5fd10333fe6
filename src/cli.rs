//! Command-line front end: one-off plans and the HTTP server.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::PlannerConfig;
use crate::investor::{PlanRequest, RiskLevel};
use crate::planner::GoalPlanner;
use crate::portfolio::PlanResult;
use crate::server;
use crate::stocks::{DisplayNameProvider, InMemoryProvider, PriceHistoryProvider, YahooFinance};
use crate::universe::UniverseSelection;

#[derive(Parser, Debug)]
#[command(name = "goal_planner", version, about = "Goal-based investment planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a plan and print it
    Plan(PlanArgs),
    /// Run the HTTP API
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct TuningArgs {
    /// JSON config file; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Offline price snapshot; the universe becomes its instruments plus --ticker
    #[arg(long)]
    pub prices_file: Option<PathBuf>,
    #[arg(long)]
    pub lookback_years: Option<u32>,
    #[arg(long)]
    pub max_candidates: Option<usize>,
    #[arg(long)]
    pub max_assets: Option<usize>,
    #[arg(long)]
    pub tries: Option<usize>,
    #[arg(long)]
    pub runs: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub no_sp500: bool,
    #[arg(long)]
    pub no_ftse100: bool,
    #[arg(long)]
    pub no_nasdaq100: bool,
    /// Extra instrument to consider (repeatable)
    #[arg(long = "ticker")]
    pub tickers: Vec<String>,
}

impl TuningArgs {
    /// Load the config file (if any) and apply flag overrides.
    pub fn resolve_config(&self) -> anyhow::Result<PlannerConfig> {
        let mut config = match &self.config {
            Some(path) => PlannerConfig::load(Some(path.as_path()))
                .with_context(|| format!("cannot load config {}", path.display()))?,
            None => PlannerConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut PlannerConfig) {
        if let Some(v) = self.lookback_years {
            config.lookback_years = v;
        }
        if let Some(v) = self.max_candidates {
            config.max_candidates = v;
        }
        if let Some(v) = self.max_assets {
            config.max_assets = v;
        }
        if let Some(v) = self.tries {
            config.tries = v;
        }
        if let Some(v) = self.runs {
            config.runs = v;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.no_sp500 {
            config.universe.sp500 = false;
        }
        if self.no_ftse100 {
            config.universe.ftse100 = false;
        }
        if self.no_nasdaq100 {
            config.universe.nasdaq100 = false;
        }
        config.extra_tickers.extend(self.tickers.iter().cloned());
    }
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long)]
    pub goal: f64,
    #[arg(long)]
    pub years: u32,
    #[arg(long, default_value = "balanced", value_parser = ["conservative", "balanced", "aggressive"])]
    pub risk: String,
    #[arg(long, default_value_t = 0.0)]
    pub start_capital: f64,
    #[arg(long, default_value_t = 0.0)]
    pub monthly_contrib: f64,
    /// Print the plan as JSON instead of the report
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub tuning: TuningArgs,
}

impl PlanArgs {
    pub fn request(&self) -> PlanRequest {
        let risk: RiskLevel = self.risk.parse().unwrap_or_default();
        PlanRequest::new(self.goal, self.years, risk)
            .with_start_capital(self.start_capital)
            .with_monthly_contrib(self.monthly_contrib)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,
    #[command(flatten)]
    pub tuning: TuningArgs,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Plan(args) => run_plan(args).await,
        Commands::Serve(args) => run_serve(args).await,
    }
}

async fn run_plan(args: PlanArgs) -> anyhow::Result<()> {
    let mut config = args.tuning.resolve_config()?;
    let request = args.request();

    let plan = match &args.tuning.prices_file {
        Some(path) => {
            let provider = load_snapshot(path, &mut config)?;
            GoalPlanner::new(provider, config).plan(&request).await?
        }
        None => {
            let provider = YahooFinance::new(config.request_timeout())?;
            GoalPlanner::new(provider, config).plan(&request).await?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render_plan(&plan));
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = args.tuning.resolve_config()?;
    match &args.tuning.prices_file {
        Some(path) => {
            let provider = load_snapshot(path, &mut config)?;
            serve_with(args.bind, provider, config).await
        }
        None => {
            let provider = YahooFinance::new(config.request_timeout())?;
            serve_with(args.bind, provider, config).await
        }
    }
}

async fn serve_with<P>(addr: SocketAddr, provider: P, config: PlannerConfig) -> anyhow::Result<()>
where
    P: PriceHistoryProvider + DisplayNameProvider + 'static,
{
    let planner = Arc::new(GoalPlanner::new(provider, config));
    server::serve(addr, planner).await?;
    Ok(())
}

/// Load a snapshot and narrow the universe to what it holds.
fn load_snapshot(path: &Path, config: &mut PlannerConfig) -> anyhow::Result<InMemoryProvider> {
    let provider = InMemoryProvider::from_json_file(path)
        .with_context(|| format!("cannot load price snapshot {}", path.display()))?;
    info!(
        "Using price snapshot {} ({} instruments)",
        path.display(),
        provider.symbols().len()
    );
    config.universe = UniverseSelection::none();
    let mut extra = provider.symbols();
    extra.append(&mut config.extra_tickers);
    config.extra_tickers = extra;
    Ok(provider)
}

/// `1234567.8` -> `1,234,568`
pub fn group_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Human-readable report of a plan.
pub fn render_plan(plan: &PlanResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== Goal-based Investment Plan ===");
    let _ = writeln!(out, "Expected return : {:5.2}%", plan.expected_return * 100.0);
    let _ = writeln!(out, "Volatility      : {:5.2}%", plan.volatility * 100.0);
    let _ = writeln!(out, "Prob reach goal : {:5.1}%", plan.prob_reach_goal * 100.0);
    let _ = writeln!(
        out,
        "Median final value : £{}",
        group_thousands(plan.expected_final_value)
    );
    let _ = writeln!(
        out,
        "Range (5%-95%)     : £{} - £{}",
        group_thousands(plan.low_estimate),
        group_thousands(plan.high_estimate)
    );
    let _ = writeln!(out, "\nImmediate purchase allocations (from starting capital only):");
    for p in &plan.weights {
        let _ = writeln!(
            out,
            "{:<8} {:<30} {:5.1}%  £{}  ~{:.1} shares",
            p.ticker,
            p.company_name,
            p.weight * 100.0,
            group_thousands(p.initial_allocation_gbp),
            p.shares_to_buy
        );
    }
    out
}
