use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub governance: GovernanceConfig,
    pub tariff: TariffConfig,
    pub weather: WeatherConfig,
    pub time_sync: TimeSyncConfig,
    pub advisor: AdvisorConfig,
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Permissive CORS for a dashboard served from another origin
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub poll_interval_seconds: u64,
    /// Simulated duration of one step; decoupled from the polling cadence
    pub step_seconds: u64,
    pub time_sync_interval_minutes: u64,
    pub timezone: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 60,
            step_seconds: 60,
            time_sync_interval_minutes: 60,
            timezone: "Australia/Hobart".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_secs(self.step_seconds.max(1))
    }

    pub fn time_sync_interval(&self) -> Duration {
        Duration::from_secs(self.time_sync_interval_minutes.max(1) * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Safety ceiling for total electrical load (kW)
    pub redline_kw: f64,
    /// Load above which a breach is predicted (kW)
    pub warning_kw: f64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            redline_kw: 8.5,
            warning_kw: 7.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffConfig {
    pub peak_price: f64,
    pub shoulder_price: f64,
    pub offpeak_price: f64,
    pub lookahead_minutes: i64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            peak_price: 0.38,
            shoulder_price: 0.22,
            offpeak_price: 0.15,
            lookahead_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timeout_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            api_key: String::new(),
            // Hobart
            latitude: -42.8821,
            longitude: 147.3272,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSyncConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            base_url: "https://worldtimeapi.org/api/timezone".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub base_url: String,
    pub api_key: String,
    pub insight_refresh_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            insight_refresh_seconds: 45,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub snapshot_path: Option<PathBuf>,
}

/// True when `key` holds a real credential rather than nothing or a template placeholder
pub fn is_configured_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && !key.contains("YOUR_")
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::figment()
            .extract()
            .context("failed to load configuration")
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("TASMAN__").split("__"))
    }
}
