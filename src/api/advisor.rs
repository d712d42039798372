use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    advisor::{CommandOutcome, TelemetrySummary},
    api::{error::ApiError, response::ApiResponse},
    controller::AppState,
};

#[derive(Debug, Serialize)]
pub struct InsightResponse {
    pub insight: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u64>,
}

/// GET /api/v1/advisor/insight
///
/// Served from cache when fresh; before the first cycle only the cached text
/// (or placeholder) is returned.
pub async fn get_insight(State(state): State<AppState>) -> ApiResponse<InsightResponse> {
    let Some(report) = state.controller.latest() else {
        return ApiResponse::success(InsightResponse {
            insight: state.insight.current(),
            cycle: None,
        });
    };
    let insight = state
        .insight
        .insight(&TelemetrySummary::from(&report))
        .await;
    ApiResponse::success(InsightResponse {
        insight,
        cycle: Some(report.cycle),
    })
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

/// POST /api/v1/advisor/command
pub async fn post_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<ApiResponse<CommandOutcome>, ApiError> {
    let command = req.command.trim();
    if command.is_empty() {
        return Err(ApiError::BadRequest("command must not be empty".to_string()));
    }

    let latest = state.controller.latest();
    let telemetry = latest.as_ref().map(|r| &r.state);
    let forecast = latest
        .as_ref()
        .map(|r| r.weather.forecast.as_str())
        .unwrap_or_default();

    Ok(ApiResponse::success(
        state.commands.execute(command, telemetry, forecast).await,
    ))
}
