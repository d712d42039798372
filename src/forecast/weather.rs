//! Weather integration (OpenWeatherMap)
//!
//! Provides outdoor temperature, an irradiance proxy derived from cloud cover
//! and a short textual forecast. The evaluation cycle never waits on a failed
//! fetch: [`WeatherService`] falls back to the last known reading, then to a
//! fixed clear-sky default.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use parking_lot::Mutex;
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client,
};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{is_configured_key, WeatherConfig};

pub const FALLBACK_IRRADIANCE_W_M2: f64 = 800.0;
pub const FALLBACK_OUTDOOR_TEMP_C: f64 = 14.5;
pub const FALLBACK_CONDITION: &str = "clear";
/// 8 three-hour entries cover the next 24 hours
pub const FORECAST_ENTRIES: usize = 8;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Http(reqwest::Error),
    #[error("weather API returned HTTP {0}")]
    Status(u16),
    #[error("weather response missing `{0}`")]
    Incomplete(&'static str),
}

// The URL carries credentials for some providers; never keep it in the error
impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub irradiance_w_m2: f64,
    pub outdoor_temp_c: f64,
    pub condition: String,
}

impl WeatherReading {
    pub fn fallback() -> Self {
        Self {
            irradiance_w_m2: FALLBACK_IRRADIANCE_W_M2,
            outdoor_temp_c: FALLBACK_OUTDOOR_TEMP_C,
            condition: FALLBACK_CONDITION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherSource {
    Live,
    LastKnown,
    Default,
}

/// Environment handed to the evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub reading: WeatherReading,
    pub forecast: String,
    pub source: WeatherSource,
}

impl WeatherSnapshot {
    pub fn fallback() -> Self {
        Self {
            reading: WeatherReading::fallback(),
            forecast: FALLBACK_CONDITION.to_string(),
            source: WeatherSource::Default,
        }
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self) -> Result<WeatherReading, WeatherError>;
    async fn forecast_summary(&self) -> Result<String, WeatherError>;
}

/// Clear sky is 1000 W/m²; every cloud-cover percent removes 8, floored at 100
pub fn irradiance_from_clouds(cloud_percent: f64) -> f64 {
    (1000.0 - cloud_percent * 8.0).max(100.0)
}

/// OpenWeatherMap current-conditions and 5-day/3-hour forecast client
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    latitude: f64,
    longitude: f64,
    timezone: Tz,
}

impl OpenWeatherClient {
    pub fn new(cfg: &WeatherConfig, timezone: Tz) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("tasman-energy/0.1"));
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            latitude: cfg.latitude,
            longitude: cfg.longitude,
            timezone,
        })
    }

    /// `None` when no usable API key is configured
    pub fn from_config(cfg: &WeatherConfig, timezone: Tz) -> anyhow::Result<Option<Self>> {
        if !is_configured_key(&cfg.api_key) {
            info!("weather API key not configured, using default conditions");
            return Ok(None);
        }
        Self::new(cfg, timezone).map(Some)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, WeatherError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "fetching weather");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self) -> Result<WeatherReading, WeatherError> {
        let raw: OwCurrent = self.get_json("weather").await?;
        let main = raw.main.ok_or(WeatherError::Incomplete("main"))?;
        let clouds = raw.clouds.map(|c| c.all).unwrap_or(0.0);
        Ok(WeatherReading {
            irradiance_w_m2: irradiance_from_clouds(clouds),
            outdoor_temp_c: main.temp,
            condition: raw
                .weather
                .first()
                .map(|w| w.main.clone())
                .unwrap_or_else(|| "Clear".to_string()),
        })
    }

    async fn forecast_summary(&self) -> Result<String, WeatherError> {
        let raw: OwForecast = self.get_json("forecast").await?;
        Ok(format_forecast(&raw.list, self.timezone))
    }
}

fn format_forecast(entries: &[OwForecastEntry], timezone: Tz) -> String {
    entries
        .iter()
        .take(FORECAST_ENTRIES)
        .map(|e| {
            let hour = DateTime::from_timestamp(e.dt, 0)
                .map(|t| t.with_timezone(&timezone).hour())
                .unwrap_or(0);
            let condition = e.weather.first().map(|w| w.main.as_str()).unwrap_or("Clear");
            format!("{hour}h: {condition}, {}°C", e.main.temp)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Weather with last-known and default fallbacks; never fails
pub struct WeatherService {
    provider: Option<Arc<dyn WeatherProvider>>,
    last_known: Mutex<Option<(WeatherReading, String)>>,
}

impl WeatherService {
    pub fn new(provider: Option<Arc<dyn WeatherProvider>>) -> Self {
        Self {
            provider,
            last_known: Mutex::new(None),
        }
    }

    pub fn offline() -> Self {
        Self::new(None)
    }

    pub fn is_live(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn fetch(&self) -> WeatherSnapshot {
        let Some(provider) = &self.provider else {
            return self.fallback();
        };

        let reading = match provider.current().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "weather fetch failed, using fallback");
                return self.fallback();
            }
        };

        let forecast = match provider.forecast_summary().await {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "forecast fetch failed");
                self.last_known
                    .lock()
                    .as_ref()
                    .map(|(_, f)| f.clone())
                    .unwrap_or_else(|| FALLBACK_CONDITION.to_string())
            }
        };

        info!(
            outdoor_temp_c = reading.outdoor_temp_c,
            irradiance_w_m2 = reading.irradiance_w_m2,
            condition = %reading.condition,
            "weather synced"
        );
        *self.last_known.lock() = Some((reading.clone(), forecast.clone()));
        WeatherSnapshot {
            reading,
            forecast,
            source: WeatherSource::Live,
        }
    }

    fn fallback(&self) -> WeatherSnapshot {
        match self.last_known.lock().as_ref() {
            Some((reading, forecast)) => WeatherSnapshot {
                reading: reading.clone(),
                forecast: forecast.clone(),
                source: WeatherSource::LastKnown,
            },
            None => WeatherSnapshot::fallback(),
        }
    }
}

// OpenWeatherMap response structures
#[derive(Debug, Deserialize)]
struct OwCurrent {
    main: Option<OwMain>,
    clouds: Option<OwClouds>,
    #[serde(default)]
    weather: Vec<OwCondition>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwForecast {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwCondition>,
}
