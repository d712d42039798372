use tracing::warn;

use crate::config::GovernanceConfig;
use crate::domain::{
    DispatchAction, DispatchOperation, DispatchReason, DispatchTarget, ForceVector,
    GovernanceResult, LoadAlert, LoadLevel, SimulationState, SovereigntyMode, StrategyGoal,
    StrategyResult,
};

/// Share of the redline at which protective actions are emitted
pub const REDLINE_TRIGGER_RATIO: f64 = 0.9;
/// Peak shaving is only recommended below this stress
pub const PEAK_SHAVING_MAX_STRESS: f64 = 0.8;
/// Heat-pump capacity (%) under redline protection
pub const THROTTLE_PERCENT: f64 = 30.0;
pub const PEAK_SHAVING_DISCHARGE_PERCENT: f64 = 80.0;
/// PV output that normalizes to 1.0 on the resilience axis
pub const PV_REFERENCE_KW: f64 = 10.0;

const PULSE_STABLE: f64 = 0.02;
const PULSE_ACTIVE: f64 = 0.05;

/// Advisory arbitration between the simulated plant and the tariff strategy.
///
/// Never mutates simulated hardware; every action is a recommendation.
#[derive(Debug, Clone, Default)]
pub struct GovernanceArbiter {
    config: GovernanceConfig,
}

impl GovernanceArbiter {
    pub fn new(config: GovernanceConfig) -> Self {
        Self { config }
    }

    pub fn redline_kw(&self) -> f64 {
        self.config.redline_kw
    }

    /// Stress index and prioritized dispatch recommendations.
    ///
    /// Redline protection is checked independently of the economic rules, so
    /// it can be emitted together with a pre-charge recommendation.
    pub fn govern(&self, state: &SimulationState, strategy: &StrategyResult) -> GovernanceResult {
        let redline = self.config.redline_kw;
        let net_load = state.net_load_kw();
        let stress_index = if redline > 0.0 {
            (net_load / redline).min(1.0)
        } else {
            1.0
        };

        let mut actions = Vec::new();

        if net_load > redline * REDLINE_TRIGGER_RATIO {
            warn!(
                net_load_kw = net_load,
                redline_kw = redline,
                "net load approaching redline, recommending protection"
            );
            actions.push(DispatchAction::new(
                DispatchTarget::HeatPump,
                DispatchOperation::Throttle,
                THROTTLE_PERCENT,
                DispatchReason::RedlineProtection,
            ));
            actions.push(DispatchAction::new(
                DispatchTarget::Battery,
                DispatchOperation::MaxDischarge,
                100.0,
                DispatchReason::RedlineProtection,
            ));
        }

        if strategy.goal == StrategyGoal::PeakShaving && stress_index < PEAK_SHAVING_MAX_STRESS {
            actions.push(DispatchAction::new(
                DispatchTarget::Battery,
                DispatchOperation::Discharge,
                PEAK_SHAVING_DISCHARGE_PERCENT,
                DispatchReason::EconomicOptimization,
            ));
        } else if strategy.goal == StrategyGoal::PreCharge {
            actions.push(DispatchAction::new(
                DispatchTarget::Battery,
                DispatchOperation::Charge,
                100.0,
                DispatchReason::EconomicPreparation,
            ));
        }

        GovernanceResult {
            stress_index,
            actions,
            approved_goal: strategy.goal,
            sovereignty_mode: SovereigntyMode::Advisory,
        }
    }

    /// Visualization weights: resilience (Ex), thermal pressure (Sy), cadence (Tz)
    pub fn force_vector(
        &self,
        state: &SimulationState,
        strategy: &StrategyResult,
        outdoor_temp_c: f64,
        indoor_target_c: f64,
    ) -> ForceVector {
        let ex = (state.battery_soc_percent / 100.0) * 0.7
            + (state.solar_pv_kw / PV_REFERENCE_KW) * 0.3
            + 0.5;
        let gradient = (indoor_target_c - outdoor_temp_c).abs();
        let sy = (1.2 - gradient / 20.0).max(0.2);
        let tz = if strategy.goal == StrategyGoal::Stable {
            1.0
        } else {
            1.8
        };
        ForceVector::new(ex, sy, tz)
    }

    /// Gross electrical load against the redline and warning thresholds
    pub fn assess_load(&self, state: &SimulationState, strategy: &StrategyResult) -> LoadAlert {
        let total = state.consumption_kw();
        LoadAlert {
            total_load_kw: total,
            level: if total < self.config.redline_kw {
                LoadLevel::Safe
            } else {
                LoadLevel::Alert
            },
            breach_predicted: total > self.config.warning_kw,
            breach_accepted: total > self.config.redline_kw,
            pulse_frequency: if strategy.goal == StrategyGoal::Stable {
                PULSE_STABLE
            } else {
                PULSE_ACTIVE
            },
        }
    }
}
