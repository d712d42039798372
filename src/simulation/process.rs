//! # Process Simulator
//!
//! Advances the villa's physical state by one explicit time step:
//!
//! 1. Solar output, capped by the tier's PV ceiling
//! 2. Heat-pump COP and electrical draw
//! 3. Backup heater (BUH) switching
//! 4. Hot-water (DHW) tank standing loss and reheating
//! 5. Battery dispatch and state of charge
//! 6. Load totals and daily energy counters
//!
//! The nominal step is one minute. All rates are integrated over the actual
//! `dt` passed to [`ProcessSimulator::step`], so a one-minute step reproduces
//! the reference per-minute behavior exactly.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{
    DeviceTier, SimulationState, BATTERY_MODULE_KW, MAX_SOC_PERCENT,
    MIN_SOC_PERCENT,
};

use super::catalog::HardwareCatalog;

/// Fixed PV system derate
pub const PV_DERATE: f64 = 0.85;
pub const COP_NOMINAL: f64 = 5.0;
pub const COP_SLOPE_PER_C: f64 = 0.12;
pub const COP_FLOOR: f64 = 1.8;
pub const HEAT_PUMP_MIN_KW: f64 = 0.4;
/// Temperature difference above which the backup heater engages
pub const BUH_THRESHOLD_C: f64 = 15.0;
/// Tank standing loss per minute
pub const DHW_LOSS_C_PER_MIN: f64 = 0.05;
/// Reheat starts once the tank is this far below target
pub const DHW_HYSTERESIS_C: f64 = 5.0;
/// Share of the heat pump rating routed to the tank while reheating
pub const DHW_HEATING_FACTOR: f64 = 1.2;
/// Volumetric heat capacity of water, Wh/(L·°C)
pub const WATER_WH_PER_L_C: f64 = 1.16;

pub const NOMINAL_STEP: Duration = Duration::from_secs(60);

/// External conditions and user settings for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInputs {
    pub irradiance_w_m2: f64,
    /// Indoor target minus outdoor temperature, clamped to >= 0
    pub delta_temp_c: f64,
    pub base_load_kw: f64,
    pub tier_id: String,
    pub battery_modules: u32,
    /// Scales heat-pump draw (> 0)
    pub thermal_coefficient: f64,
    pub dhw_target_c: f64,
    pub dhw_tank_liters: f64,
}

impl Default for StepInputs {
    fn default() -> Self {
        Self {
            irradiance_w_m2: 800.0,
            delta_temp_c: 7.5,
            base_load_kw: 0.85,
            tier_id: super::catalog::DEFAULT_TIER_ID.to_string(),
            battery_modules: 3,
            thermal_coefficient: 1.0,
            dhw_target_c: 55.0,
            dhw_tank_liters: 200.0,
        }
    }
}

pub struct ProcessSimulator {
    catalog: HardwareCatalog,
    state: SimulationState,
}

impl Default for ProcessSimulator {
    fn default() -> Self {
        Self::new(HardwareCatalog::default())
    }
}

impl ProcessSimulator {
    pub fn new(catalog: HardwareCatalog) -> Self {
        Self::with_state(catalog, SimulationState::default())
    }

    pub fn with_state(catalog: HardwareCatalog, state: SimulationState) -> Self {
        Self { catalog, state }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn catalog(&self) -> &HardwareCatalog {
        &self.catalog
    }

    /// Zero the daily energy counters. Called on a local-day boundary.
    pub fn reset_daily(&mut self) {
        info!(
            daily_pv_kwh = self.state.daily_pv_kwh,
            daily_load_kwh = self.state.daily_load_kwh,
            "resetting daily energy counters"
        );
        self.state.daily_pv_kwh = 0.0;
        self.state.daily_load_kwh = 0.0;
    }

    /// Advance the simulation by `dt` and return a snapshot of the new state
    pub fn step(&mut self, inputs: &StepInputs, dt: Duration) -> SimulationState {
        let spec = self.catalog.lookup(&inputs.tier_id).clone();
        let dt_hours = dt.as_secs_f64() / 3600.0;
        let dt_minutes = dt.as_secs_f64() / 60.0;
        let delta_temp = inputs.delta_temp_c.max(0.0);
        let modules = inputs.battery_modules.max(1);

        let s = &mut self.state;
        s.base_load_kw = inputs.base_load_kw;

        s.solar_pv_kw = solar_output_kw(inputs.irradiance_w_m2, &spec);

        s.cop_ratio = cop_for_delta(delta_temp);
        s.heat_pump_kw =
            heat_pump_draw_kw(delta_temp, s.cop_ratio, inputs.thermal_coefficient, &spec);

        let was_active = s.buh_active;
        if delta_temp > BUH_THRESHOLD_C {
            s.buh_active = true;
            s.buh_kw = spec.backup_heater_kw;
        } else {
            s.buh_active = false;
            s.buh_kw = 0.0;
        }
        if s.buh_active && !was_active {
            info!(delta_temp_c = delta_temp, buh_kw = s.buh_kw, "backup heater engaged");
        }

        s.dhw_temp_c -= DHW_LOSS_C_PER_MIN * dt_minutes;
        if s.dhw_temp_c < inputs.dhw_target_c - DHW_HYSTERESIS_C {
            s.dhw_energy_kw = spec.heat_pump_rated_kw * DHW_HEATING_FACTOR;
            s.dhw_temp_c +=
                (s.dhw_energy_kw * 1000.0 * dt_hours) / (inputs.dhw_tank_liters * WATER_WH_PER_L_C);
        } else {
            s.dhw_energy_kw = 0.0;
        }
        s.dhw_temp_c = s.dhw_temp_c.min(inputs.dhw_target_c);

        let consumption = s.heat_pump_kw + s.base_load_kw + s.dhw_energy_kw + s.buh_kw;
        let net_power = s.solar_pv_kw - consumption;
        let max_batt_kw = spec.max_inverter_kw.min(modules as f64 * BATTERY_MODULE_KW);

        s.battery_power_kw = if net_power > 0.0 {
            -max_batt_kw.min(net_power)
        } else {
            max_batt_kw.min(net_power.abs())
        };

        let energy_kwh = s.battery_power_kw * dt_hours;
        let soc_delta = energy_kwh / DeviceTier::battery_capacity_kwh(modules) * 100.0;
        s.battery_soc_percent =
            (s.battery_soc_percent - soc_delta).clamp(MIN_SOC_PERCENT, MAX_SOC_PERCENT);

        s.total_load_kw = consumption;
        s.daily_pv_kwh += s.solar_pv_kw * dt_hours;
        s.daily_load_kwh += s.total_load_kw * dt_hours;

        debug!(
            solar_kw = s.solar_pv_kw,
            heat_pump_kw = s.heat_pump_kw,
            battery_kw = s.battery_power_kw,
            soc_percent = s.battery_soc_percent,
            dhw_temp_c = s.dhw_temp_c,
            "process step"
        );

        s.clone()
    }
}

/// PV output for an irradiance, never above the tier ceiling (also caps irradiance > 1000 W/m²)
pub fn solar_output_kw(irradiance_w_m2: f64, spec: &DeviceTier) -> f64 {
    let potential = (irradiance_w_m2 / 1000.0) * (spec.max_pv_kw / PV_DERATE) * PV_DERATE;
    spec.max_pv_kw.min(potential)
}

/// COP degrades linearly with the temperature difference, floored at 1.8
pub fn cop_for_delta(delta_temp_c: f64) -> f64 {
    COP_FLOOR.max(COP_NOMINAL - delta_temp_c * COP_SLOPE_PER_C)
}

/// Heat-pump electrical input, clamped to [0.4, max input]
pub fn heat_pump_draw_kw(
    delta_temp_c: f64,
    cop: f64,
    thermal_coefficient: f64,
    spec: &DeviceTier,
) -> f64 {
    let raw = (delta_temp_c / cop) * spec.heat_pump_rated_kw;
    (raw * thermal_coefficient)
        .min(spec.heat_pump_max_input_kw)
        .max(HEAT_PUMP_MIN_KW)
}
