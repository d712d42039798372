use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{
    api::{advisor, settings, status},
    controller::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status::get_status))
        .route("/cycle", post(status::trigger_cycle))
        .route("/settings", get(settings::get_settings))
        .route("/settings/:section", patch(settings::patch_section))
        .route("/advisor/insight", get(advisor::get_insight))
        .route("/advisor/command", post(advisor::post_command))
        .with_state(state)
}
