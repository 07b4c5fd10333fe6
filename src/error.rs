//! Error types for the goal planner.
//!
//! Pipeline-level failures are fatal and surface as [`PlannerError`].
//! Per-instrument retrieval failures are recovered locally and travel as
//! [`FetchError`] inside a tagged fetch outcome instead.

use thiserror::Error;

/// Result alias for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Error, Debug)]
pub enum PlannerError {
    /// No instrument list selected, or every selected list was empty.
    #[error("Universe is empty: enable at least one instrument list")]
    EmptyUniverse,

    /// Every instrument failed to yield usable prices.
    #[error("Failed to retrieve usable prices for any instrument")]
    NoUsableData,

    /// Fewer than two instruments survived metrics computation.
    #[error("Insufficient data: need at least 2 usable instruments, got {available}")]
    InsufficientData { available: usize },

    /// The price table spans fewer than two dates, so no return can be computed.
    #[error("Insufficient history: need at least 2 price dates, got {points}")]
    InsufficientHistory { points: usize },

    /// The weight search never evaluated a candidate.
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The blocking computation task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PlannerError {
    /// HTTP status used by the request/response shim.
    pub fn status_code(&self) -> u16 {
        match self {
            PlannerError::InvalidRequest(_) | PlannerError::InvalidConfig(_) => 400,
            PlannerError::EmptyUniverse
            | PlannerError::NoUsableData
            | PlannerError::InsufficientData { .. }
            | PlannerError::InsufficientHistory { .. }
            | PlannerError::OptimizationFailed(_) => 422,
            PlannerError::Http(_) => 502,
            PlannerError::Io(_) | PlannerError::Json(_) | PlannerError::Task(_) => 500,
        }
    }
}

/// Why a single instrument could not be retrieved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("no data returned")]
    NoData,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e.to_string())
    }
}
