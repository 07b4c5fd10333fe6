use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{PlannerError, Result};

/// Risk tolerance tag supplied with a plan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RiskLevel {
    Conservative, // low target vol, heavy penalty
    #[default]
    Balanced,
    Aggressive,   // high target vol, light penalty
    /// Any unrecognised tag. Ranks on sharpe alone and uses the balanced objective.
    Unspecified,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Conservative => "conservative",
            RiskLevel::Balanced => "balanced",
            RiskLevel::Aggressive => "aggressive",
            RiskLevel::Unspecified => "unspecified",
        }
    }

    /// Desired annualised portfolio volatility for this tolerance.
    pub fn target_volatility(&self) -> f64 {
        match self {
            RiskLevel::Conservative => 0.10,
            RiskLevel::Balanced => 0.18,
            RiskLevel::Aggressive => 0.28,
            RiskLevel::Unspecified => 0.18,
        }
    }

    /// Weight on the distance from the target volatility in the optimizer score.
    pub fn penalty(&self) -> f64 {
        match self {
            RiskLevel::Conservative => 10.0,
            RiskLevel::Balanced => 6.0,
            RiskLevel::Aggressive => 3.0,
            RiskLevel::Unspecified => 6.0,
        }
    }
}

impl FromStr for RiskLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "conservative" => RiskLevel::Conservative,
            "balanced" => RiskLevel::Balanced,
            "aggressive" => RiskLevel::Aggressive,
            _ => RiskLevel::Unspecified,
        })
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // FromStr is infallible
        Ok(raw.parse().unwrap_or_default())
    }
}

// Helper so `null` capital/contribution behave like an omitted field.
fn zero_if_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Longest horizon a plan may ask for.
pub const MAX_YEARS: u32 = 100;

/// What the investor wants: reach `goal` within `years`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: f64,
    pub years: u32,
    pub risk: RiskLevel,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub start_capital: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub monthly_contrib: f64,
}

impl PlanRequest {
    pub fn new(goal: f64, years: u32, risk: RiskLevel) -> Self {
        Self {
            goal,
            years,
            risk,
            start_capital: 0.0,
            monthly_contrib: 0.0,
        }
    }

    pub fn with_start_capital(mut self, start_capital: f64) -> Self {
        self.start_capital = start_capital;
        self
    }

    pub fn with_monthly_contrib(mut self, monthly_contrib: f64) -> Self {
        self.monthly_contrib = monthly_contrib;
        self
    }

    /// Reject values no simulation can work with.
    pub fn validate(&self) -> Result<()> {
        if self.years > MAX_YEARS {
            return Err(PlannerError::InvalidRequest(format!(
                "years must be at most {}, got {}",
                MAX_YEARS, self.years
            )));
        }
        let fields = [
            ("goal", self.goal),
            ("start_capital", self.start_capital),
            ("monthly_contrib", self.monthly_contrib),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(PlannerError::InvalidRequest(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
