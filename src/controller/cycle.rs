//! One evaluation cycle: behavior → simulate → price → govern.
//!
//! The engine is synchronous and owns the only mutable simulation state.
//! Settings and environment come in as explicit arguments; any values the
//! cycle derives for the settings store are returned as a [`SettingsDelta`]
//! instead of being written directly.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::info;

use super::governance::GovernanceArbiter;
use crate::domain::{ForceVector, GovernanceResult, LoadAlert, SimulationState, StrategyResult};
use crate::forecast::{PricingStrategist, WeatherSnapshot, WeatherSource};
use crate::settings::{Settings, SettingsDelta, SettingsSection};
use crate::simulation::{
    default_appliances, drift_fingerprint, Appliance, AutopilotLoad, BehaviorProfile,
    HardwareCatalog, ProcessSimulator, StepInputs, NOMINAL_STEP,
};

/// Reference PV panel efficiency; irradiance is scaled by `pv_efficiency / this`
pub const REFERENCE_PV_EFFICIENCY: f64 = 0.18;
/// Autopilot write-back threshold (kW)
pub const LOAD_WRITE_BACK_KW: f64 = 0.01;
/// Outdoor temperature write-back threshold (°C)
pub const TEMP_WRITE_BACK_C: f64 = 0.05;

/// Detects local calendar-day changes between cycles
#[derive(Debug, Clone, Default)]
pub struct DayBoundary {
    last: Option<NaiveDate>,
}

impl DayBoundary {
    /// True when `date` differs from the previously observed date. The first observation never is.
    pub fn observe(&mut self, date: NaiveDate) -> bool {
        let crossed = matches!(self.last, Some(prev) if prev != date);
        self.last = Some(date);
        crossed
    }
}

/// Everything one cycle produced, as immutable snapshots
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub local_time: NaiveDateTime,
    pub tier_id: String,
    pub inputs: StepInputs,
    pub outdoor_temp_c: f64,
    pub indoor_target_c: f64,
    pub weather: WeatherSnapshot,
    pub autopilot: Option<AutopilotLoad>,
    pub state: SimulationState,
    pub strategy: StrategyResult,
    pub governance: GovernanceResult,
    pub force_vector: ForceVector,
    pub load_alert: LoadAlert,
    pub daily_reset: bool,
}

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub report: CycleReport,
    /// Derived values to write back to the settings store
    pub delta: SettingsDelta,
}

pub struct CycleEngine {
    simulator: ProcessSimulator,
    behavior: BehaviorProfile,
    appliances: Vec<Appliance>,
    strategist: PricingStrategist,
    arbiter: GovernanceArbiter,
    day: DayBoundary,
    step: Duration,
    cycles: u64,
    rng: StdRng,
}

impl Default for CycleEngine {
    fn default() -> Self {
        Self::new(
            HardwareCatalog::default(),
            PricingStrategist::default(),
            GovernanceArbiter::default(),
            NOMINAL_STEP,
        )
    }
}

impl CycleEngine {
    pub fn new(
        catalog: HardwareCatalog,
        strategist: PricingStrategist,
        arbiter: GovernanceArbiter,
        step: Duration,
    ) -> Self {
        Self {
            simulator: ProcessSimulator::new(catalog),
            behavior: BehaviorProfile::home_office(),
            appliances: default_appliances(),
            strategist,
            arbiter,
            day: DayBoundary::default(),
            step,
            cycles: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic fingerprint drift
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_simulator(mut self, simulator: ProcessSimulator) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn state(&self) -> &SimulationState {
        self.simulator.state()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn run(
        &mut self,
        settings: &Settings,
        weather: &WeatherSnapshot,
        now: NaiveDateTime,
    ) -> CycleOutcome {
        let mut delta = SettingsDelta::new();

        let daily_reset = self.day.observe(now.date());
        if daily_reset {
            self.simulator.reset_daily();
        }

        let mut base_load_kw = settings.field.base_load_kw;
        let autopilot = settings.field.autopilot.then(|| {
            let load = self.behavior.autopilot_load(now.hour(), &self.appliances);
            if (settings.field.base_load_kw - load.total_kw).abs() > LOAD_WRITE_BACK_KW {
                delta.set(SettingsSection::Field, "base_load_kw", load.total_kw);
            }
            if (settings.field.background_flux - load.background_kw).abs() > LOAD_WRITE_BACK_KW {
                delta.set(SettingsSection::Field, "background_flux", load.background_kw);
            }
            base_load_kw = load.total_kw;
            load
        });

        let outdoor_temp_c = if settings.space.manual_override {
            settings.space.outdoor_temp
        } else {
            let live = weather.reading.outdoor_temp_c;
            if weather.source == WeatherSource::Live
                && (settings.space.outdoor_temp - live).abs() > TEMP_WRITE_BACK_C
            {
                delta.set(SettingsSection::Space, "outdoor_temp", live);
            }
            live
        };

        let thermal_coefficient = if settings.energy.thermal_type.is_learned() {
            let learned = drift_fingerprint(settings.energy.fingerprint_val, &mut self.rng);
            delta.set(SettingsSection::Energy, "fingerprint_val", learned);
            delta.set(SettingsSection::Energy, "thermal_coefficient", learned);
            learned
        } else {
            settings.energy.thermal_coefficient
        };

        let indoor_target_c = settings.space.indoor_target;
        let inputs = StepInputs {
            irradiance_w_m2: weather.reading.irradiance_w_m2
                * (settings.energy.pv_efficiency / REFERENCE_PV_EFFICIENCY),
            delta_temp_c: (indoor_target_c - outdoor_temp_c).max(0.0),
            base_load_kw,
            tier_id: settings.energy.midea_tier.clone(),
            battery_modules: settings.energy.battery_modules,
            thermal_coefficient,
            dhw_target_c: settings.energy.dhw_target,
            dhw_tank_liters: settings.energy.dhw_tank_volume,
        };

        let state = self.simulator.step(&inputs, self.step);
        let strategy = self
            .strategist
            .with_prices(Some(settings.time.peak_price), Some(settings.time.offpeak_price))
            .evaluate(now);
        let governance = self.arbiter.govern(&state, &strategy);
        let force_vector = self
            .arbiter
            .force_vector(&state, &strategy, outdoor_temp_c, indoor_target_c);
        let load_alert = self.arbiter.assess_load(&state, &strategy);

        self.cycles += 1;
        info!(
            cycle = self.cycles,
            soc_percent = state.battery_soc_percent,
            total_load_kw = state.total_load_kw,
            solar_kw = state.solar_pv_kw,
            stress_index = governance.stress_index,
            period = %strategy.period,
            goal = %strategy.goal,
            weather = %weather.source,
            "evaluation cycle"
        );

        let tier_id = self.simulator.catalog().lookup(&inputs.tier_id).id.clone();
        CycleOutcome {
            report: CycleReport {
                cycle: self.cycles,
                local_time: now,
                tier_id,
                inputs,
                outdoor_temp_c,
                indoor_target_c,
                weather: weather.clone(),
                autopilot,
                state,
                strategy,
                governance,
                force_vector,
                load_alert,
                daily_reset,
            },
            delta,
        }
    }
}
