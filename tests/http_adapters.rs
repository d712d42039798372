//! HTTP adapters against mocked upstream services.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::json;
use tasman_energy::advisor::{AdvisorError, CandidateChain, GeminiBackend, TextGenerator};
use tasman_energy::config::{AdvisorConfig, TimeSyncConfig, WeatherConfig};
use tasman_energy::forecast::{OpenWeatherClient, WeatherProvider, WeatherService, WeatherSource};
use tasman_energy::time_sync::{NetworkClock, TimeProvider, WorldTimeClient};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn weather_config(server: &MockServer) -> WeatherConfig {
    WeatherConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        ..WeatherConfig::default()
    }
}

async fn mount_weather(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "main": { "temp": 7.5 },
            "clouds": { "all": 50 },
            "weather": [{ "main": "Rain" }]
        })))
        .mount(server)
        .await;

    let list: Vec<_> = (0..10)
        .map(|i| {
            json!({
                "dt": 1_720_000_800 + i * 3 * 3600,
                "main": { "temp": 6 + i },
                "weather": [{ "main": "Clouds" }]
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "list": list })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_openweather_current_and_forecast() {
    let server = MockServer::start().await;
    mount_weather(&server).await;

    let client = OpenWeatherClient::new(&weather_config(&server), chrono_tz::UTC).unwrap();
    let reading = client.current().await.unwrap();
    assert_eq!(reading.outdoor_temp_c, 7.5);
    assert_eq!(reading.irradiance_w_m2, 600.0);
    assert_eq!(reading.condition, "Rain");

    let summary = client.forecast_summary().await.unwrap();
    let entries: Vec<&str> = summary.split("; ").collect();
    assert_eq!(entries.len(), 8);
    assert!(entries.iter().all(|e| e.contains("Clouds")));
    assert!(entries[0].ends_with(", 6°C"));
}

#[tokio::test]
async fn test_weather_service_falls_back_to_last_known() {
    let server = MockServer::start().await;
    mount_weather(&server).await;

    let client = OpenWeatherClient::new(&weather_config(&server), chrono_tz::UTC).unwrap();
    let service = WeatherService::new(Some(Arc::new(client) as Arc<dyn WeatherProvider>));

    let live = service.fetch().await;
    assert_eq!(live.source, WeatherSource::Live);

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let stale = service.fetch().await;
    assert_eq!(stale.source, WeatherSource::LastKnown);
    assert_eq!(stale.reading, live.reading);
    assert_eq!(stale.forecast, live.forecast);
}

#[tokio::test]
async fn test_world_time_offset() {
    let server = MockServer::start().await;
    let ahead = Utc::now() + Duration::hours(1);
    Mock::given(method("GET"))
        .and(path("/Australia/Hobart"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "datetime": ahead.to_rfc3339() })),
        )
        .mount(&server)
        .await;

    let cfg = TimeSyncConfig {
        base_url: server.uri(),
        ..TimeSyncConfig::default()
    };
    let clock = WorldTimeClient::new(&cfg, chrono_tz::Australia::Hobart).unwrap();
    let offset = clock.fetch_offset().await.unwrap();
    assert!((offset - Duration::hours(1)).num_seconds().abs() <= 5);

    let provider = TimeProvider::default();
    provider.sync_with(&clock).await.unwrap();
    assert!((provider.offset() - Duration::hours(1)).num_seconds().abs() <= 5);
}

#[tokio::test]
async fn test_world_time_failure_keeps_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cfg = TimeSyncConfig {
        base_url: server.uri(),
        ..TimeSyncConfig::default()
    };
    let clock = WorldTimeClient::new(&cfg, chrono_tz::Australia::Hobart).unwrap();
    let provider = TimeProvider::default();
    provider.set_offset(Duration::milliseconds(250));
    assert!(provider.sync_with(&clock).await.is_err());
    assert_eq!(provider.offset(), Duration::milliseconds(250));
}

fn advisor_config(server: &MockServer) -> AdvisorConfig {
    AdvisorConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        ..AdvisorConfig::default()
    }
}

fn backend(cfg: &AdvisorConfig, version: &str, model: &str) -> Arc<dyn TextGenerator> {
    Arc::new(GeminiBackend::new(Client::new(), cfg, version, model))
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
}

#[tokio::test]
async fn test_gemini_chain_falls_through_missing_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash-latest:generateContent"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-pro:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Battery is healthy.")))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = advisor_config(&server);
    let chain = CandidateChain::new(vec![
        backend(&cfg, "v1beta", "gemini-1.5-flash-latest"),
        backend(&cfg, "v1", "gemini-pro"),
    ]);
    assert_eq!(chain.generate("status?").await.unwrap(), "Battery is healthy.");
}

#[tokio::test]
async fn test_gemini_auth_failure_stops_chain() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("unreachable")))
        .expect(0)
        .mount(&server)
        .await;

    let cfg = advisor_config(&server);
    let chain = CandidateChain::new(vec![
        backend(&cfg, "v1beta", "gemini-1.5-flash"),
        backend(&cfg, "v1", "gemini-pro"),
    ]);
    assert!(matches!(
        chain.generate("hi").await,
        Err(AdvisorError::Auth(_))
    ));
}

#[tokio::test]
async fn test_gemini_chain_exhausted_returns_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cfg = advisor_config(&server);
    let chain = CandidateChain::new(vec![
        backend(&cfg, "v1beta", "gemini-1.5-flash"),
        backend(&cfg, "v1", "gemini-pro"),
    ]);
    match chain.generate("hi").await {
        Err(AdvisorError::ServiceUnavailable(msg)) => {
            assert!(msg.contains("gemini-pro"));
            assert!(!msg.contains("test-key"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
