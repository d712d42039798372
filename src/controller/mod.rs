pub mod cycle;
pub mod governance;

pub use cycle::*;
pub use governance::*;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use strum::Display;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::advisor::{default_chain, CommandInterpreter, InsightAdvisor, TextGenerator};
use crate::config::Config;
use crate::forecast::{OpenWeatherClient, PricingStrategist, WeatherProvider, WeatherService};
use crate::settings::{ChangeOrigin, ConfigStore, SettingsChange};
use crate::simulation::HardwareCatalog;
use crate::time_sync::{NetworkClock, TimeProvider, WorldTimeClient};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub settings: Arc<ConfigStore>,
    pub controller: Arc<EnergyController>,
    pub clock: Arc<TimeProvider>,
    pub network_clock: Arc<dyn NetworkClock>,
    pub insight: Arc<InsightAdvisor>,
    pub commands: Arc<CommandInterpreter>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let clock = Arc::new(TimeProvider::from_name(&cfg.controller.timezone));
        let tz = clock.timezone();

        let settings = Arc::new(match &cfg.settings.snapshot_path {
            Some(path) => ConfigStore::open(path),
            None => ConfigStore::default(),
        });

        let provider = OpenWeatherClient::from_config(&cfg.weather, tz)?
            .map(|c| Arc::new(c) as Arc<dyn WeatherProvider>);
        let weather = Arc::new(WeatherService::new(provider));

        let network_clock: Arc<dyn NetworkClock> =
            Arc::new(WorldTimeClient::new(&cfg.time_sync, tz)?);
        let generator: Arc<dyn TextGenerator> = Arc::new(default_chain(&cfg.advisor)?);

        Ok(Self::assemble(
            cfg,
            settings,
            weather,
            clock,
            network_clock,
            generator,
        ))
    }

    /// Wire the components around already-built collaborators
    pub fn assemble(
        cfg: Config,
        settings: Arc<ConfigStore>,
        weather: Arc<WeatherService>,
        clock: Arc<TimeProvider>,
        network_clock: Arc<dyn NetworkClock>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let engine = CycleEngine::new(
            HardwareCatalog::default(),
            PricingStrategist::from_config(&cfg.tariff),
            GovernanceArbiter::new(cfg.governance.clone()),
            cfg.controller.step_duration(),
        );
        let controller = Arc::new(EnergyController::new(
            engine,
            settings.clone(),
            weather,
            clock.clone(),
        ));
        let insight = Arc::new(InsightAdvisor::new(
            generator.clone(),
            Duration::from_secs(cfg.advisor.insight_refresh_seconds),
        ));
        let commands = Arc::new(CommandInterpreter::new(generator, settings.clone()));

        Self {
            cfg,
            settings,
            controller,
            clock,
            network_clock,
            insight,
            commands,
        }
    }
}

pub fn spawn_controller_tasks(state: AppState) {
    let controller = state.controller.clone();
    let poll = state.cfg.controller.poll_interval();
    tokio::spawn(async move {
        controller.run_polling(poll).await;
    });

    let controller2 = state.controller.clone();
    let changes = state.settings.subscribe();
    tokio::spawn(async move {
        controller2.run_settings_listener(changes).await;
    });

    let clock = state.clock.clone();
    let network = state.network_clock.clone();
    let every = state.cfg.controller.time_sync_interval();
    tokio::spawn(async move {
        time_sync_loop(clock, network, every).await;
    });
}

pub async fn time_sync_loop(
    clock: Arc<TimeProvider>,
    network: Arc<dyn NetworkClock>,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        // failures are logged inside and keep the previous offset
        let _ = clock.sync_with(network.as_ref()).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Trigger {
    Timer,
    SettingsChange,
    Manual,
}

/// Held while an evaluation runs; releases the flag on drop
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs evaluation cycles against the shared settings and environment.
///
/// At most one cycle runs at a time; triggers that arrive while one is in
/// flight are dropped, not queued.
pub struct EnergyController {
    engine: Mutex<CycleEngine>,
    in_flight: AtomicBool,
    latest: RwLock<Option<CycleReport>>,
    settings: Arc<ConfigStore>,
    weather: Arc<WeatherService>,
    clock: Arc<TimeProvider>,
}

impl EnergyController {
    pub fn new(
        engine: CycleEngine,
        settings: Arc<ConfigStore>,
        weather: Arc<WeatherService>,
        clock: Arc<TimeProvider>,
    ) -> Self {
        Self {
            engine: Mutex::new(engine),
            in_flight: AtomicBool::new(false),
            latest: RwLock::new(None),
            settings,
            weather,
            clock,
        }
    }

    pub fn latest(&self) -> Option<CycleReport> {
        self.latest.read().clone()
    }

    pub fn weather(&self) -> &WeatherService {
        &self.weather
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle. `None` when another cycle is already in flight.
    pub async fn trigger(&self, source: Trigger) -> Option<CycleReport> {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            debug!(%source, "evaluation already in flight, dropping trigger");
            return None;
        };

        let settings = self.settings.snapshot();
        let weather = self.weather.fetch().await;
        let now = self.clock.now_local();

        let outcome = self.engine.lock().run(&settings, &weather, now);

        if !outcome.delta.is_empty() {
            if let Err(e) = self.settings.apply_delta(&outcome.delta, ChangeOrigin::Engine) {
                warn!(error = %e, "failed to write back derived settings");
            }
        }

        *self.latest.write() = Some(outcome.report.clone());
        Some(outcome.report)
    }

    pub async fn run_polling(&self, every: Duration) {
        let mut interval = tokio::time::interval(every);
        info!(interval_secs = every.as_secs(), "evaluation loop started");
        loop {
            interval.tick().await;
            self.trigger(Trigger::Timer).await;
        }
    }

    /// Re-evaluate on user changes; engine write-backs are ignored
    pub async fn run_settings_listener(&self, mut changes: broadcast::Receiver<SettingsChange>) {
        loop {
            match changes.recv().await {
                Ok(change) if change.origin == ChangeOrigin::User => {
                    debug!(sections = ?change.sections, "user settings changed");
                    self.trigger(Trigger::SettingsChange).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "settings listener lagged");
                    self.trigger(Trigger::SettingsChange).await;
                }
                Err(RecvError::Closed) => {
                    info!("settings channel closed, listener stopping");
                    break;
                }
            }
        }
    }
}
