//! Building envelope models and the learned thermal fingerprint.

use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const FINGERPRINT_MIN: f64 = 0.4;
pub const FINGERPRINT_MAX: f64 = 2.0;
/// Half-width of the per-cycle fingerprint random walk
pub const FINGERPRINT_DRIFT: f64 = 0.001;

/// Construction type of the house; scales heat-pump draw through the thermal coefficient
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThermalType {
    Weatherboard,
    #[default]
    BrickVeneer,
    Modern,
    /// Coefficient learned from observed behavior
    AiFingerprint,
}

impl ThermalType {
    pub fn is_learned(&self) -> bool {
        matches!(self, ThermalType::AiFingerprint)
    }
}

/// Advance the learned fingerprint one cycle: uniform drift in ±0.001, clamped to [0.4, 2.0]
pub fn drift_fingerprint<R: Rng + ?Sized>(current: f64, rng: &mut R) -> f64 {
    let drift = rng.gen_range(-FINGERPRINT_DRIFT..=FINGERPRINT_DRIFT);
    (current + drift).clamp(FINGERPRINT_MIN, FINGERPRINT_MAX)
}
