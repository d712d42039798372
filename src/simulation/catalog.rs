//! # Hardware Catalog
//!
//! Static table of Midea Villa tiers. Values are vendor ratings, not computed.
//!
//! Lookups never fail: an unknown tier id resolves to the default (standard) tier.

use tracing::debug;

use crate::domain::{DeviceTier, TierClass};

pub const DEFAULT_TIER_ID: &str = "ARCTIC_12";

#[derive(Debug, Clone)]
pub struct HardwareCatalog {
    tiers: Vec<DeviceTier>,
    default_index: usize,
}

impl Default for HardwareCatalog {
    fn default() -> Self {
        Self::midea_villa()
    }
}

impl HardwareCatalog {
    /// Arctic 12 kW (standard) and Arctic 14 kW (high capacity) bundles
    pub fn midea_villa() -> Self {
        let tiers = vec![
            DeviceTier {
                id: "ARCTIC_12".to_string(),
                class: TierClass::Standard,
                name: "Arctic 12kW".to_string(),
                max_inverter_kw: 8.0,
                max_pv_kw: 10.0,
                heat_pump_rated_kw: 3.5,
                heat_pump_max_input_kw: 4.2,
                backup_heater_kw: 3.0,
                default_battery_modules: 3,
                tank_volume_liters: 240.0,
            },
            DeviceTier {
                id: "ARCTIC_14".to_string(),
                class: TierClass::HighCapacity,
                name: "Arctic 14kW".to_string(),
                max_inverter_kw: 10.0,
                max_pv_kw: 15.0,
                heat_pump_rated_kw: 4.2,
                heat_pump_max_input_kw: 5.5,
                backup_heater_kw: 6.0,
                default_battery_modules: 4,
                tank_volume_liters: 300.0,
            },
        ];
        Self {
            tiers,
            default_index: 0,
        }
    }

    /// Resolve a tier by catalog id (`ARCTIC_14`) or class name (`high_capacity`).
    ///
    /// Unknown ids fall back to the default tier.
    pub fn lookup(&self, tier_id: &str) -> &DeviceTier {
        let wanted = tier_id.trim();
        let class = wanted.parse::<TierClass>().ok();
        self.tiers
            .iter()
            .find(|t| t.id.eq_ignore_ascii_case(wanted) || Some(t.class) == class)
            .unwrap_or_else(|| {
                debug!(tier_id = wanted, "unknown tier, using default");
                self.default_tier()
            })
    }

    pub fn default_tier(&self) -> &DeviceTier {
        &self.tiers[self.default_index]
    }

    pub fn tiers(&self) -> &[DeviceTier] {
        &self.tiers
    }

    pub fn contains(&self, tier_id: &str) -> bool {
        self.tiers.iter().any(|t| t.id.eq_ignore_ascii_case(tier_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_all_tiers_consistent() {
        let catalog = HardwareCatalog::default();
        assert!(catalog.tiers().len() >= 2);
        for tier in catalog.tiers() {
            assert!(tier.is_consistent(), "{} is inconsistent", tier.id);
        }
    }

    #[test]
    fn test_tiers_have_distinct_envelopes() {
        let catalog = HardwareCatalog::default();
        let standard = catalog.lookup("standard");
        let high = catalog.lookup("high_capacity");
        assert!(high.max_pv_kw > standard.max_pv_kw);
        assert!(high.max_inverter_kw > standard.max_inverter_kw);
        assert!(high.backup_heater_kw > standard.backup_heater_kw);
    }

    #[rstest]
    #[case("ARCTIC_12", "ARCTIC_12")]
    #[case("ARCTIC_14", "ARCTIC_14")]
    #[case("arctic_14", "ARCTIC_14")]
    #[case("standard", "ARCTIC_12")]
    #[case("high_capacity", "ARCTIC_14")]
    #[case("ARCTIC_99", "ARCTIC_12")]
    #[case("", "ARCTIC_12")]
    fn test_lookup(#[case] input: &str, #[case] expected: &str) {
        let catalog = HardwareCatalog::default();
        assert_eq!(catalog.lookup(input).id, expected);
    }

    #[test]
    fn test_default_tier_id() {
        let catalog = HardwareCatalog::default();
        assert_eq!(catalog.default_tier().id, DEFAULT_TIER_ID);
        assert!(catalog.contains(DEFAULT_TIER_ID));
        assert!(!catalog.contains("standard"));
    }
}
