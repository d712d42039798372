//! # Behavior Profile
//!
//! Maps the local hour to how a home-office household typically uses the villa:
//! a background load level plus the appliances that are usually running.
//!
//! Used by autopilot to estimate the base load instead of taking it from the user.

use serde::{Deserialize, Serialize};

/// One contiguous, half-open `[start_hour, end_hour)` slot of the day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorSlot {
    pub start_hour: u32,
    pub end_hour: u32,
    /// Background load not attributed to any appliance (kW)
    pub background_flux_kw: f64,
    pub active_appliances: &'static [&'static str],
}

impl BehaviorSlot {
    const fn new(
        start_hour: u32,
        end_hour: u32,
        background_flux_kw: f64,
        active_appliances: &'static [&'static str],
    ) -> Self {
        Self {
            start_hour,
            end_hour,
            background_flux_kw,
            active_appliances,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }

    pub fn is_active(&self, appliance_key: &str) -> bool {
        self.active_appliances.contains(&appliance_key)
    }
}

/// A household appliance and its rated draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appliance {
    pub key: String,
    pub rated_power_kw: f64,
    /// Always on, regardless of the hour
    pub is_baseline: bool,
}

impl Appliance {
    pub fn new(key: &str, rated_power_kw: f64, is_baseline: bool) -> Self {
        Self {
            key: key.to_string(),
            rated_power_kw,
            is_baseline,
        }
    }
}

/// Appliance roster of the reference villa
pub fn default_appliances() -> Vec<Appliance> {
    vec![
        Appliance::new("fridge", 0.15, true),
        Appliance::new("router", 0.02, true),
        Appliance::new("security_cam", 0.04, true),
        Appliance::new("nas_server", 0.06, true),
        Appliance::new("smart_hub", 0.01, true),
        Appliance::new("tv", 0.12, false),
        Appliance::new("washing_machine", 1.20, false),
        Appliance::new("dishwasher", 1.80, false),
        Appliance::new("microwave", 1.10, false),
        Appliance::new("kettle", 2.20, false),
        Appliance::new("hair_dryer", 1.50, false),
    ]
}

/// Base load estimate for one hour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutopilotLoad {
    pub total_kw: f64,
    pub background_kw: f64,
    pub active_keys: Vec<String>,
}

const HOME_OFFICE: &[BehaviorSlot] = &[
    BehaviorSlot::new(0, 6, 0.12, &[]),
    BehaviorSlot::new(6, 7, 0.25, &[]),
    BehaviorSlot::new(7, 8, 0.45, &["kettle", "microwave"]),
    BehaviorSlot::new(8, 9, 0.60, &["hair_dryer"]),
    BehaviorSlot::new(9, 12, 0.80, &["tv"]),
    BehaviorSlot::new(12, 13, 1.10, &["microwave"]),
    BehaviorSlot::new(13, 17, 0.75, &[]),
    BehaviorSlot::new(17, 18, 0.40, &[]),
    BehaviorSlot::new(18, 20, 1.30, &["kettle", "microwave", "tv"]),
    BehaviorSlot::new(20, 22, 0.90, &["dishwasher", "tv"]),
    BehaviorSlot::new(22, 23, 0.35, &[]),
    BehaviorSlot::new(23, 24, 0.15, &[]),
];

#[derive(Debug, Clone)]
pub struct BehaviorProfile {
    habit: String,
    slots: &'static [BehaviorSlot],
}

impl Default for BehaviorProfile {
    fn default() -> Self {
        Self::home_office()
    }
}

impl BehaviorProfile {
    pub fn home_office() -> Self {
        Self {
            habit: "HOME_OFFICE".to_string(),
            slots: HOME_OFFICE,
        }
    }

    pub fn habit(&self) -> &str {
        &self.habit
    }

    pub fn slots(&self) -> &[BehaviorSlot] {
        self.slots
    }

    /// Slot covering `hour` (0..=23). Falls back to the first slot if none matches.
    pub fn behavior_for(&self, hour: u32) -> &BehaviorSlot {
        self.slots
            .iter()
            .find(|s| s.contains(hour))
            .unwrap_or(&self.slots[0])
    }

    /// Background flux plus every baseline appliance and every appliance active in this hour
    pub fn autopilot_load(&self, hour: u32, appliances: &[Appliance]) -> AutopilotLoad {
        let slot = self.behavior_for(hour);
        let appliance_kw: f64 = appliances
            .iter()
            .filter(|a| a.is_baseline || slot.is_active(&a.key))
            .map(|a| a.rated_power_kw)
            .sum();

        AutopilotLoad {
            total_kw: slot.background_flux_kw + appliance_kw,
            background_kw: slot.background_flux_kw,
            active_keys: slot.active_appliances.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// True when the slots partition 0..24 with no gap or overlap
    pub fn covers_full_day(&self) -> bool {
        (0..24).all(|h| self.slots.iter().filter(|s| s.contains(h)).count() == 1)
    }
}
