use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Time-of-use tariff period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TariffPeriod {
    Peak,
    Shoulder,
    Offpeak,
}

/// Optimization goal derived from the current and upcoming tariff periods
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyGoal {
    #[default]
    Stable,
    PeakShaving,
    PreCharge,
    ReserveMode,
    BalancedFlux,
}

impl StrategyGoal {
    /// Human readable recommendation shown next to the goal
    pub fn recommendation(&self) -> &'static str {
        match self {
            StrategyGoal::Stable => "Holding steady. No tariff pressure in the look-ahead window.",
            StrategyGoal::PreCharge => "Upcoming price surge. Accelerating battery buffering.",
            StrategyGoal::ReserveMode => "Low tariff window. Optimizing thermal storage.",
            StrategyGoal::PeakShaving => "Critical high tariff. Inhibiting grid draw via SoC-Max.",
            StrategyGoal::BalancedFlux => {
                "Standard trading flux. Balancing PV with internal demand."
            }
        }
    }
}

/// Whether the tariff period changes inside the look-ahead window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ChangeHint {
    Imminent,
    Stable,
}

/// A tariff classification of one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffQuote {
    pub period: TariffPeriod,
    /// Currency per kWh
    pub price: f64,
}

/// Fresh output of one strategist evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub period: TariffPeriod,
    pub price: f64,
    /// Period and price at the end of the look-ahead window
    pub upcoming: TariffQuote,
    pub goal: StrategyGoal,
    pub recommendation: String,
    pub next_change_hint: ChangeHint,
}
