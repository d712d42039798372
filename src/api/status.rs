use std::time::Instant;

use axum::extract::State;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::{AppState, CycleReport, Trigger},
};

/// GET /api/v1/status - latest evaluation snapshot
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<ApiResponse<CycleReport>, ApiError> {
    let report = state.controller.latest().ok_or_else(|| {
        ApiError::ServiceUnavailable("no evaluation cycle has completed yet".to_string())
    })?;
    let cycle = report.cycle;
    Ok(ApiResponse::success(report).with_cycle(cycle))
}

/// POST /api/v1/cycle - run one evaluation now
pub async fn trigger_cycle(
    State(state): State<AppState>,
) -> Result<ApiResponse<CycleReport>, ApiError> {
    let start = Instant::now();
    let report = state
        .controller
        .trigger(Trigger::Manual)
        .await
        .ok_or_else(|| ApiError::Conflict("an evaluation cycle is already running".to_string()))?;
    let cycle = report.cycle;
    Ok(ApiResponse::success(report)
        .with_cycle(cycle)
        .with_duration(start.elapsed().as_millis() as u64))
}
