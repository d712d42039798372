use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chrono::{NaiveDateTime, Timelike};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use super::TextGenerator;
use crate::controller::CycleReport;
use crate::domain::TariffPeriod;

pub const INSIGHT_PLACEHOLDER: &str = "Awaiting neural synchronization...";

/// Telemetry digest sent to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySummary {
    pub local_time: NaiveDateTime,
    pub solar_pv_kw: f64,
    pub daily_pv_kwh: f64,
    pub battery_soc_percent: f64,
    pub total_load_kw: f64,
    pub period: TariffPeriod,
    pub forecast: String,
    pub outdoor_temp_c: f64,
}

impl From<&CycleReport> for TelemetrySummary {
    fn from(report: &CycleReport) -> Self {
        Self {
            local_time: report.local_time,
            solar_pv_kw: report.state.solar_pv_kw,
            daily_pv_kwh: report.state.daily_pv_kwh,
            battery_soc_percent: report.state.battery_soc_percent,
            total_load_kw: report.state.total_load_kw,
            period: report.strategy.period,
            forecast: report.weather.forecast.clone(),
            outdoor_temp_c: report.outdoor_temp_c,
        }
    }
}

impl TelemetrySummary {
    pub fn prompt(&self) -> String {
        format!(
            "You are AURA, an advanced governance AI. Analyze the telemetry and 24h forecast \
             below to provide a 2-sentence Neural Insight. Focus on predictive advice based on \
             the forecast trends (e.g. rain prep, thermal buffering). No greetings.\n\
             Time: {:02}:{:02} (Hobart)\n\
             Solar: {:.2} kW (Today: {:.1} kWh)\n\
             Battery: {:.1}%\n\
             Total Load: {:.2} kW\n\
             Grid Tariff: {}\n\
             Environment: {} (Temp: {:.1}°C)",
            self.local_time.hour(),
            self.local_time.minute(),
            self.solar_pv_kw,
            self.daily_pv_kwh,
            self.battery_soc_percent,
            self.total_load_kw,
            self.period,
            self.forecast,
            self.outdoor_temp_c,
        )
    }
}

#[derive(Default)]
struct InsightCache {
    text: Option<String>,
    fresh_until: Option<Instant>,
}

/// Cached two-sentence insight with at most one model request in flight
pub struct InsightAdvisor {
    generator: Arc<dyn TextGenerator>,
    refresh: Duration,
    cache: Mutex<InsightCache>,
    thinking: AtomicBool,
}

struct ThinkingGuard<'a>(&'a AtomicBool);

impl Drop for ThinkingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InsightAdvisor {
    pub fn new(generator: Arc<dyn TextGenerator>, refresh: Duration) -> Self {
        Self {
            generator,
            refresh,
            cache: Mutex::new(InsightCache::default()),
            thinking: AtomicBool::new(false),
        }
    }

    /// Last insight, or the placeholder before the first success
    pub fn current(&self) -> String {
        self.cache
            .lock()
            .text
            .clone()
            .unwrap_or_else(|| INSIGHT_PLACEHOLDER.to_string())
    }

    pub async fn insight(&self, summary: &TelemetrySummary) -> String {
        {
            let cache = self.cache.lock();
            if let (Some(text), Some(until)) = (&cache.text, cache.fresh_until) {
                if Instant::now() < until {
                    return text.clone();
                }
            }
        }

        if self.thinking.swap(true, Ordering::AcqRel) {
            debug!("insight request already in flight");
            return self.current();
        }
        let _guard = ThinkingGuard(&self.thinking);

        let result = self.generator.generate(&summary.prompt()).await;
        let mut cache = self.cache.lock();
        match result {
            Ok(text) => {
                cache.text = Some(text.trim().to_string());
                cache.fresh_until = Some(Instant::now() + self.refresh);
            }
            Err(e) => {
                warn!(error = %e, "insight generation failed");
                if cache.text.is_none() {
                    cache.text = Some(INSIGHT_PLACEHOLDER.to_string());
                }
            }
        }
        cache
            .text
            .clone()
            .unwrap_or_else(|| INSIGHT_PLACEHOLDER.to_string())
    }
}
