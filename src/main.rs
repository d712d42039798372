use anyhow::Result;
use tasman_energy::{api, config, controller, telemetry};
use config::{is_configured_key, Config};
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    if !is_configured_key(&cfg.weather.api_key) {
        warn!("weather API key not configured, using fallback environment");
    }
    if !is_configured_key(&cfg.advisor.api_key) {
        warn!("advisor API key not configured, insights will show the placeholder");
    }

    let app_state = controller::AppState::new(cfg.clone()).await?;
    let app = api::router(app_state.clone(), &cfg);

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0, the API has no authentication");
    }

    info!(%addr, timezone = %app_state.clock.timezone(), "starting Tasman Logic");

    controller::spawn_controller_tasks(app_state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
