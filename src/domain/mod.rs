pub mod governance;
pub mod simulation;
pub mod strategy;
pub mod tier;

pub use governance::*;
pub use simulation::*;
pub use strategy::*;
pub use tier::*;

/// Energy per battery module (kWh)
pub const BATTERY_MODULE_KWH: f64 = 5.12;
/// Charge/discharge bandwidth per battery module (kW)
pub const BATTERY_MODULE_KW: f64 = 2.5;
pub const MIN_SOC_PERCENT: f64 = 10.0;
pub const MAX_SOC_PERCENT: f64 = 100.0;
