use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::{controller::AppState, forecast::WeatherSource};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    controller: ComponentHealth,
    weather: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            detail: None,
        }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            detail: Some(detail.into()),
        }
    }
}

/// GET /health
///
/// Always 200 while the process serves requests; a missing first cycle or an
/// offline weather feed only marks the response as degraded.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let latest = state.controller.latest();
    let controller = match &latest {
        Some(_) => ComponentHealth::healthy(),
        None => ComponentHealth::degraded("no evaluation cycle completed yet"),
    };
    let weather = match latest.map(|r| r.weather.source) {
        _ if !state.controller.weather().is_live() => {
            ComponentHealth::degraded("weather provider not configured")
        }
        Some(WeatherSource::Live) => ComponentHealth::healthy(),
        Some(source) => ComponentHealth::degraded(format!("weather source {source}")),
        None => ComponentHealth::degraded("weather not fetched yet"),
    };

    let all_healthy = controller.status == "healthy" && weather.status == "healthy";
    let response = HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks {
            controller,
            weather,
        },
    };

    (StatusCode::OK, Json(response))
}
