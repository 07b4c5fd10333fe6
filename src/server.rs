//! HTTP front end.
//!
//! - `GET /health` answers `{"status": "ok"}`
//! - `POST /plan` takes a [`PlanRequest`] and returns a [`PlanResult`]
//!
//! Failures come back as `{"error": "<reason>"}` with the status from
//! [`PlannerError::status_code`].

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

use crate::error::{PlannerError, Result};
use crate::investor::PlanRequest;
use crate::planner::GoalPlanner;
use crate::portfolio::PlanResult;
use crate::stocks::{DisplayNameProvider, PriceHistoryProvider};

pub const FRONTEND_ORIGIN: &str = "http://localhost:3000";

impl IntoResponse for PlannerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Plan failed: {}", self);
        } else {
            warn!("Plan rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(HeaderValue::from_static(FRONTEND_ORIGIN))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn router<P>(planner: Arc<GoalPlanner<P>>) -> Router
where
    P: PriceHistoryProvider + DisplayNameProvider + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/plan", post(create_plan::<P>))
        .layer(cors())
        .with_state(planner)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_plan<P>(
    State(planner): State<Arc<GoalPlanner<P>>>,
    payload: std::result::Result<Json<PlanRequest>, JsonRejection>,
) -> std::result::Result<Json<PlanResult>, PlannerError>
where
    P: PriceHistoryProvider + DisplayNameProvider + 'static,
{
    let Json(request) = payload.map_err(|e| PlannerError::InvalidRequest(e.body_text()))?;
    info!(
        "Plan request: goal={}, years={}, risk={}",
        request.goal, request.years, request.risk
    );
    let plan = planner.plan(&request).await?;
    Ok(Json(plan))
}

/// Serve until the process is stopped.
pub async fn serve<P>(addr: SocketAddr, planner: Arc<GoalPlanner<P>>) -> Result<()>
where
    P: PriceHistoryProvider + DisplayNameProvider + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Planner API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(planner)).await?;
    Ok(())
}
