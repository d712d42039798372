use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Capability class of a hardware tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum TierClass {
    Standard,
    HighCapacity,
}

/// Immutable hardware capability bundle (inverter, PV, heat pump, backup heater).
///
/// All ratings are positive and `heat_pump_max_input_kw >= heat_pump_rated_kw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTier {
    /// Catalog key, e.g. `ARCTIC_12`
    pub id: String,
    pub class: TierClass,
    /// Human readable name
    pub name: String,
    pub max_inverter_kw: f64,
    pub max_pv_kw: f64,
    /// Average electrical input of the heat pump
    pub heat_pump_rated_kw: f64,
    pub heat_pump_max_input_kw: f64,
    pub backup_heater_kw: f64,
    /// Battery modules shipped with the tier (5.12 kWh each)
    pub default_battery_modules: u32,
    pub tank_volume_liters: f64,
}

impl DeviceTier {
    /// True when every rating is positive and the heat pump envelope is consistent
    pub fn is_consistent(&self) -> bool {
        self.max_inverter_kw > 0.0
            && self.max_pv_kw > 0.0
            && self.heat_pump_rated_kw > 0.0
            && self.heat_pump_max_input_kw >= self.heat_pump_rated_kw
            && self.backup_heater_kw > 0.0
            && self.default_battery_modules > 0
            && self.tank_volume_liters > 0.0
    }

    /// Usable battery capacity for a given module count
    pub fn battery_capacity_kwh(modules: u32) -> f64 {
        modules as f64 * super::BATTERY_MODULE_KWH
    }
}
