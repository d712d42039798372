use serde::{Deserialize, Serialize};
use strum::Display;

use super::StrategyGoal;

/// Device an advisory action is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DispatchTarget {
    HeatPump,
    Battery,
}

/// Operation recommended for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DispatchOperation {
    /// Limit to `value` percent of capacity
    Throttle,
    MaxDischarge,
    Discharge,
    Charge,
}

/// Why an action was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchReason {
    RedlineProtection,
    EconomicOptimization,
    EconomicPreparation,
}

/// One advisory dispatch recommendation. Never applied to hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchAction {
    pub target: DispatchTarget,
    pub operation: DispatchOperation,
    /// Percent
    pub value: f64,
    pub reason: DispatchReason,
}

impl DispatchAction {
    pub fn new(
        target: DispatchTarget,
        operation: DispatchOperation,
        value: f64,
        reason: DispatchReason,
    ) -> Self {
        Self {
            target,
            operation,
            value,
            reason,
        }
    }
}

/// Binding level of governance output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SovereigntyMode {
    #[default]
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceResult {
    /// Net load relative to the redline, in [0, 1]
    pub stress_index: f64,
    /// Ordered by rule priority
    pub actions: Vec<DispatchAction>,
    pub approved_goal: StrategyGoal,
    pub sovereignty_mode: SovereigntyMode,
}

impl GovernanceResult {
    pub fn has_reason(&self, reason: DispatchReason) -> bool {
        self.actions.iter().any(|a| a.reason == reason)
    }
}

/// Visualization weights: resilience (x), thermal pressure (y), strategy cadence (z)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceVector {
    pub ex: f64,
    pub sy: f64,
    pub tz: f64,
    pub magnitude: f64,
}

impl ForceVector {
    pub fn new(ex: f64, sy: f64, tz: f64) -> Self {
        Self {
            ex,
            sy,
            tz,
            magnitude: (ex * ex + sy * sy + tz * tz).sqrt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadLevel {
    Safe,
    Alert,
}

/// Total-load status against the redline, used by the stress visualization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadAlert {
    pub total_load_kw: f64,
    pub level: LoadLevel,
    /// Load above the warning threshold
    pub breach_predicted: bool,
    /// Load above the redline
    pub breach_accepted: bool,
    pub pulse_frequency: f64,
}
