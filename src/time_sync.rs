//! Local wall clock for the villa's time zone, corrected by a network time offset.

use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TimeSyncConfig;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Australia::Hobart;

#[derive(Debug, Error)]
pub enum TimeSyncError {
    #[error("time request failed: {0}")]
    Http(reqwest::Error),
    #[error("time API returned HTTP {0}")]
    Status(u16),
    #[error("unparseable time `{0}`")]
    Parse(String),
}

impl From<reqwest::Error> for TimeSyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

#[async_trait]
pub trait NetworkClock: Send + Sync {
    /// Network time minus local system time
    async fn fetch_offset(&self) -> Result<chrono::Duration, TimeSyncError>;
}

pub struct TimeProvider {
    timezone: Tz,
    offset_ms: AtomicI64,
}

impl Default for TimeProvider {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl TimeProvider {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            offset_ms: AtomicI64::new(0),
        }
    }

    /// IANA zone name; unknown names fall back to Australia/Hobart
    pub fn from_name(name: &str) -> Self {
        let timezone = name.parse::<Tz>().unwrap_or_else(|e| {
            warn!(timezone = name, error = %e, "unknown timezone, using Australia/Hobart");
            DEFAULT_TIMEZONE
        });
        Self::new(timezone)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn offset(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.offset_ms.load(Ordering::Relaxed))
    }

    pub fn set_offset(&self, offset: chrono::Duration) {
        self.offset_ms.store(offset.num_milliseconds(), Ordering::Relaxed);
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        Utc::now() + self.offset()
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.now_utc().with_timezone(&self.timezone)
    }

    pub fn now_local(&self) -> NaiveDateTime {
        self.now().naive_local()
    }

    /// Refresh the offset; on failure the previous offset is kept
    pub async fn sync_with(
        &self,
        clock: &dyn NetworkClock,
    ) -> Result<chrono::Duration, TimeSyncError> {
        match clock.fetch_offset().await {
            Ok(offset) => {
                self.set_offset(offset);
                info!(offset_ms = offset.num_milliseconds(), "time offset synced");
                Ok(offset)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    offset_ms = self.offset().num_milliseconds(),
                    "time sync failed, keeping previous offset"
                );
                Err(e)
            }
        }
    }
}

/// worldtimeapi.org style `GET {base}/{zone}` returning `{"datetime": RFC 3339}`
pub struct WorldTimeClient {
    client: Client,
    url: String,
}

impl WorldTimeClient {
    pub fn new(cfg: &TimeSyncConfig, timezone: Tz) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/{}", cfg.base_url.trim_end_matches('/'), timezone.name()),
        })
    }
}

#[async_trait]
impl NetworkClock for WorldTimeClient {
    async fn fetch_offset(&self) -> Result<chrono::Duration, TimeSyncError> {
        let start = Instant::now();
        debug!(url = %self.url, "fetching network time");
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(TimeSyncError::Status(response.status().as_u16()));
        }
        let body: WorldTimeResponse = response.json().await?;
        let latency = start.elapsed();

        let network = DateTime::parse_from_rfc3339(&body.datetime)
            .map_err(|_| TimeSyncError::Parse(body.datetime.clone()))?
            .with_timezone(&Utc);
        let half_latency =
            chrono::Duration::from_std(latency / 2).unwrap_or_else(|_| chrono::Duration::zero());
        Ok(network + half_latency - Utc::now())
    }
}

#[derive(Debug, Deserialize)]
struct WorldTimeResponse {
    datetime: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(Option<chrono::Duration>);

    #[async_trait]
    impl NetworkClock for FixedClock {
        async fn fetch_offset(&self) -> Result<chrono::Duration, TimeSyncError> {
            self.0.ok_or(TimeSyncError::Status(500))
        }
    }

    #[test]
    fn test_unknown_zone_falls_back() {
        assert_eq!(TimeProvider::from_name("Mars/Olympus").timezone(), DEFAULT_TIMEZONE);
        assert_eq!(TimeProvider::from_name("UTC").timezone(), chrono_tz::UTC);
    }

    #[test]
    fn test_offset_shifts_clock() {
        let provider = TimeProvider::new(chrono_tz::UTC);
        let before = provider.now_utc();
        provider.set_offset(chrono::Duration::hours(2));
        let shifted = provider.now_utc();
        let diff = shifted - before;
        assert!(diff >= chrono::Duration::hours(2));
        assert!(diff < chrono::Duration::hours(2) + chrono::Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_offset() {
        let provider = TimeProvider::default();
        provider
            .sync_with(&FixedClock(Some(chrono::Duration::milliseconds(1500))))
            .await
            .unwrap();
        assert_eq!(provider.offset().num_milliseconds(), 1500);

        assert!(provider.sync_with(&FixedClock(None)).await.is_err());
        assert_eq!(provider.offset().num_milliseconds(), 1500);
    }
}
