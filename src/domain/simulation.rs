use serde::{Deserialize, Serialize};

use super::{MAX_SOC_PERCENT, MIN_SOC_PERCENT};

/// Physical state of the villa, owned and mutated by the process simulator.
///
/// # Sign convention
/// - `battery_power_kw < 0`: charging
/// - `battery_power_kw > 0`: discharging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub solar_pv_kw: f64,
    /// Battery state of charge, kept within [10, 100]
    pub battery_soc_percent: f64,
    pub battery_power_kw: f64,
    /// Heat pump electrical draw
    pub heat_pump_kw: f64,
    /// Backup heater engaged
    pub buh_active: bool,
    pub buh_kw: f64,
    /// Coefficient of performance, never below 1.8
    pub cop_ratio: f64,
    pub base_load_kw: f64,
    /// heat pump + base + DHW + BUH
    pub total_load_kw: f64,
    pub dhw_temp_c: f64,
    /// Power routed to the hot water tank this step
    pub dhw_energy_kw: f64,
    pub daily_pv_kwh: f64,
    pub daily_load_kwh: f64,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            solar_pv_kw: 0.0,
            battery_soc_percent: 72.0,
            battery_power_kw: 0.0,
            heat_pump_kw: 1.5,
            buh_active: false,
            buh_kw: 0.0,
            cop_ratio: 4.2,
            base_load_kw: 0.85,
            total_load_kw: 2.35,
            dhw_temp_c: 48.0,
            dhw_energy_kw: 0.0,
            // Plausible mid-morning accumulation so the dashboard never starts at zero
            daily_pv_kwh: 12.8,
            daily_load_kwh: 15.4,
        }
    }
}

impl SimulationState {
    /// Electrical consumption of every load in the house
    pub fn consumption_kw(&self) -> f64 {
        self.heat_pump_kw + self.base_load_kw + self.dhw_energy_kw + self.buh_kw
    }

    /// Load left after solar, never negative
    pub fn net_load_kw(&self) -> f64 {
        (self.total_load_kw - self.solar_pv_kw).max(0.0)
    }

    pub fn is_charging(&self) -> bool {
        self.battery_power_kw < 0.0
    }

    pub fn soc_in_bounds(&self) -> bool {
        (MIN_SOC_PERCENT..=MAX_SOC_PERCENT).contains(&self.battery_soc_percent)
    }
}
