use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::AppState,
    settings::{ChangeOrigin, Settings, SettingsError, SettingsSection},
};

/// GET /api/v1/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResponse<Settings> {
    ApiResponse::success(state.settings.snapshot())
}

/// PATCH /api/v1/settings/:section - shallow merge into one section
pub async fn patch_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
    Json(patch): Json<Value>,
) -> Result<ApiResponse<Settings>, ApiError> {
    let section: SettingsSection = section
        .parse()
        .map_err(|_| SettingsError::UnknownSection(section.clone()))?;
    let updated = state
        .settings
        .update_section(section, &patch, ChangeOrigin::User)?;
    Ok(ApiResponse::success(updated))
}
