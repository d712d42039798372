//! Multi-cycle runs of the evaluation engine and the controller around it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use tasman_energy::controller::{CycleEngine, EnergyController, Trigger};
use tasman_energy::domain::{DispatchReason, StrategyGoal, TariffPeriod};
use tasman_energy::forecast::{
    WeatherError, WeatherProvider, WeatherReading, WeatherService, WeatherSnapshot, WeatherSource,
};
use tasman_energy::settings::{ChangeOrigin, ConfigStore, Settings, SettingsSection};
use tasman_energy::time_sync::TimeProvider;

fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn winter_night() -> WeatherSnapshot {
    WeatherSnapshot {
        reading: WeatherReading {
            irradiance_w_m2: 0.0,
            outdoor_temp_c: 2.0,
            condition: "Clear".to_string(),
        },
        forecast: "3h: Clear, 1°C".to_string(),
        source: WeatherSource::Live,
    }
}

#[test]
fn test_overnight_run_drains_battery_and_resets_at_midnight() {
    let mut engine = CycleEngine::default().with_seed(11);
    let mut settings = Settings::default();
    settings.field.autopilot = false;
    settings.field.base_load_kw = 1.5;

    let mut last_soc = engine.state().battery_soc_percent;
    let mut last_load_kwh = engine.state().daily_load_kwh;
    let mut resets = Vec::new();
    // 22:00 on day 1 through 01:59 on day 2, one cycle per simulated minute
    for minute in 0..240 {
        let now = at(1, 22, 0) + chrono::Duration::minutes(minute);
        let outcome = engine.run(&settings, &winter_night(), now);
        let report = outcome.report;

        assert!(report.state.battery_soc_percent <= last_soc);
        assert!(report.state.soc_in_bounds());
        assert_eq!(report.state.solar_pv_kw, 0.0);
        assert_eq!(report.strategy.period, TariffPeriod::Offpeak);
        if report.daily_reset {
            resets.push(now);
            assert!(report.state.daily_load_kwh < last_load_kwh);
        } else {
            assert!(report.state.daily_load_kwh > last_load_kwh);
        }
        last_soc = report.state.battery_soc_percent;
        last_load_kwh = report.state.daily_load_kwh;

        // the live temperature differs from the stored 14.5 °C every cycle
        assert_eq!(
            outcome.delta.get(SettingsSection::Space, "outdoor_temp"),
            Some(&json!(2.0))
        );
    }

    assert_eq!(resets, vec![at(2, 0, 0)]);
    assert_eq!(engine.cycles(), 240);
}

#[test]
fn test_morning_peak_sequence() {
    let mut engine = CycleEngine::default().with_seed(5);
    let settings = Settings::default();
    let env = WeatherSnapshot::fallback();

    let goals: Vec<StrategyGoal> = [at(1, 6, 45), at(1, 8, 0), at(1, 12, 0), at(1, 22, 0)]
        .into_iter()
        .map(|now| engine.run(&settings, &env, now).report.strategy.goal)
        .collect();

    assert_eq!(
        goals,
        vec![
            StrategyGoal::PreCharge,
            StrategyGoal::PeakShaving,
            StrategyGoal::BalancedFlux,
            StrategyGoal::ReserveMode,
        ]
    );
}

#[test]
fn test_bitter_cold_triggers_redline_on_small_tier() {
    let mut engine = CycleEngine::default().with_seed(1);
    let mut settings = Settings::default();
    settings.space.manual_override = true;
    settings.space.outdoor_temp = -8.0;
    settings.space.indoor_target = 24.0;
    settings.field.autopilot = false;
    settings.field.base_load_kw = 3.0;

    let report = engine.run(&settings, &winter_night(), at(1, 18, 0)).report;
    assert!(report.state.buh_active);
    assert!(report.governance.has_reason(DispatchReason::RedlineProtection));
    // peak shaving is suppressed once stress is high
    assert!(!report
        .governance
        .has_reason(DispatchReason::EconomicOptimization));
}

struct SlowWeather;

#[async_trait]
impl WeatherProvider for SlowWeather {
    async fn current(&self) -> Result<WeatherReading, WeatherError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(WeatherReading::fallback())
    }

    async fn forecast_summary(&self) -> Result<String, WeatherError> {
        Ok("0h: Clear, 14°C".to_string())
    }
}

fn controller(weather: WeatherService) -> Arc<EnergyController> {
    Arc::new(EnergyController::new(
        CycleEngine::default().with_seed(9),
        Arc::new(ConfigStore::default()),
        Arc::new(weather),
        Arc::new(TimeProvider::default()),
    ))
}

#[tokio::test]
async fn test_concurrent_triggers_run_one_cycle() {
    let provider: Arc<dyn WeatherProvider> = Arc::new(SlowWeather);
    let c = controller(WeatherService::new(Some(provider)));

    let (a, b) = tokio::join!(c.trigger(Trigger::Timer), c.trigger(Trigger::Manual));
    assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
    assert_eq!(c.latest().map(|r| r.cycle), Some(1));
    assert!(!c.is_busy());

    assert_eq!(c.trigger(Trigger::Timer).await.map(|r| r.cycle), Some(2));
}

#[tokio::test]
async fn test_user_change_triggers_cycle_but_engine_write_back_does_not() {
    let store = Arc::new(ConfigStore::default());
    let c = Arc::new(EnergyController::new(
        CycleEngine::default().with_seed(2),
        store.clone(),
        Arc::new(WeatherService::offline()),
        Arc::new(TimeProvider::default()),
    ));

    let listener = {
        let c = c.clone();
        let rx = store.subscribe();
        tokio::spawn(async move { c.run_settings_listener(rx).await })
    };

    store
        .update_section(
            SettingsSection::Space,
            &json!({ "indoor_target": 21.0 }),
            ChangeOrigin::User,
        )
        .unwrap();

    let mut waited = 0;
    while c.latest().is_none() && waited < 100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
    }
    let first = c.latest().expect("user change should trigger a cycle");
    assert_eq!(first.cycle, 1);
    assert_eq!(first.indoor_target_c, 21.0);

    // the cycle's own write-back (autopilot load) must not start another one
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(c.latest().map(|r| r.cycle), Some(1));

    listener.abort();
}
