//! Time-of-use tariff and the 30-minute look-ahead strategist.
//!
//! The table is static: two peak windows, a midday shoulder and an overnight
//! off-peak window that wraps midnight. Classification depends only on the
//! local hour, so it is total over the day.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

use crate::config::TariffConfig;
use crate::domain::{ChangeHint, StrategyGoal, StrategyResult, TariffPeriod, TariffQuote};

/// Half-open `[start_hour, end_hour)` window; wraps midnight when `end_hour <= start_hour`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffWindow {
    pub period: TariffPeriod,
    pub start_hour: u32,
    pub end_hour: u32,
    pub price: f64,
}

impl TariffWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffTable {
    windows: Vec<TariffWindow>,
}

impl Default for TariffTable {
    fn default() -> Self {
        Self::from_config(&TariffConfig::default())
    }
}

impl TariffTable {
    /// Tasmanian residential ToU shape with the given prices
    pub fn from_config(cfg: &TariffConfig) -> Self {
        let window = |period, start_hour, end_hour, price| TariffWindow {
            period,
            start_hour,
            end_hour,
            price,
        };
        Self {
            windows: vec![
                window(TariffPeriod::Peak, 7, 10, cfg.peak_price),
                window(TariffPeriod::Shoulder, 10, 16, cfg.shoulder_price),
                window(TariffPeriod::Peak, 16, 21, cfg.peak_price),
                window(TariffPeriod::Offpeak, 21, 7, cfg.offpeak_price),
            ],
        }
    }

    /// Replace the peak and off-peak prices, keeping the window layout
    pub fn with_prices(mut self, peak: Option<f64>, offpeak: Option<f64>) -> Self {
        for w in &mut self.windows {
            match (w.period, peak, offpeak) {
                (TariffPeriod::Peak, Some(p), _) => w.price = p,
                (TariffPeriod::Offpeak, _, Some(p)) => w.price = p,
                _ => {}
            }
        }
        self
    }

    pub fn windows(&self) -> &[TariffWindow] {
        &self.windows
    }

    /// First window containing `hour`. Off-peak if none does.
    pub fn quote_for_hour(&self, hour: u32) -> TariffQuote {
        self.windows
            .iter()
            .find(|w| w.contains(hour))
            .or_else(|| {
                self.windows
                    .iter()
                    .find(|w| w.period == TariffPeriod::Offpeak)
            })
            .map(|w| TariffQuote {
                period: w.period,
                price: w.price,
            })
            .unwrap_or(TariffQuote {
                period: TariffPeriod::Offpeak,
                price: 0.0,
            })
    }

    pub fn covers_full_day(&self) -> bool {
        (0..24).all(|h| self.windows.iter().filter(|w| w.contains(h)).count() == 1)
    }
}

/// Goal for the current and look-ahead periods
pub fn decide_goal(current: TariffPeriod, upcoming: TariffPeriod) -> StrategyGoal {
    match (current, upcoming) {
        (TariffPeriod::Offpeak, TariffPeriod::Peak | TariffPeriod::Shoulder) => {
            StrategyGoal::PreCharge
        }
        (TariffPeriod::Offpeak, TariffPeriod::Offpeak) => StrategyGoal::ReserveMode,
        (TariffPeriod::Peak, _) => StrategyGoal::PeakShaving,
        (TariffPeriod::Shoulder, _) => StrategyGoal::BalancedFlux,
    }
}

#[derive(Debug, Clone)]
pub struct PricingStrategist {
    table: TariffTable,
    lookahead: Duration,
}

impl Default for PricingStrategist {
    fn default() -> Self {
        Self::from_config(&TariffConfig::default())
    }
}

impl PricingStrategist {
    pub fn new(table: TariffTable, lookahead: Duration) -> Self {
        Self { table, lookahead }
    }

    pub fn from_config(cfg: &TariffConfig) -> Self {
        Self::new(
            TariffTable::from_config(cfg),
            Duration::minutes(cfg.lookahead_minutes),
        )
    }

    /// Same strategist with user price overrides applied
    pub fn with_prices(&self, peak: Option<f64>, offpeak: Option<f64>) -> Self {
        Self::new(self.table.clone().with_prices(peak, offpeak), self.lookahead)
    }

    pub fn table(&self) -> &TariffTable {
        &self.table
    }

    pub fn classify(&self, time: NaiveTime) -> TariffQuote {
        self.table.quote_for_hour(time.hour())
    }

    pub fn evaluate(&self, now: NaiveDateTime) -> StrategyResult {
        let current = self.classify(now.time());
        let upcoming = self.classify((now + self.lookahead).time());
        let goal = decide_goal(current.period, upcoming.period);

        StrategyResult {
            period: current.period,
            price: current.price,
            upcoming,
            goal,
            recommendation: goal.recommendation().to_string(),
            next_change_hint: if upcoming.period != current.period {
                ChangeHint::Imminent
            } else {
                ChangeHint::Stable
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 21)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_table_partitions_day() {
        assert!(TariffTable::default().covers_full_day());
    }

    #[rstest]
    #[case(0, TariffPeriod::Offpeak, 0.15)]
    #[case(6, TariffPeriod::Offpeak, 0.15)]
    #[case(7, TariffPeriod::Peak, 0.38)]
    #[case(9, TariffPeriod::Peak, 0.38)]
    #[case(10, TariffPeriod::Shoulder, 0.22)]
    #[case(15, TariffPeriod::Shoulder, 0.22)]
    #[case(16, TariffPeriod::Peak, 0.38)]
    #[case(20, TariffPeriod::Peak, 0.38)]
    #[case(21, TariffPeriod::Offpeak, 0.15)]
    #[case(23, TariffPeriod::Offpeak, 0.15)]
    fn test_classify(#[case] hour: u32, #[case] period: TariffPeriod, #[case] price: f64) {
        let s = PricingStrategist::default();
        let quote = s.classify(NaiveTime::from_hms_opt(hour, 15, 0).unwrap());
        assert_eq!(quote.period, period);
        assert_eq!(quote.price, price);
    }

    #[rstest]
    #[case(TariffPeriod::Offpeak, TariffPeriod::Peak, StrategyGoal::PreCharge)]
    #[case(TariffPeriod::Offpeak, TariffPeriod::Shoulder, StrategyGoal::PreCharge)]
    #[case(TariffPeriod::Offpeak, TariffPeriod::Offpeak, StrategyGoal::ReserveMode)]
    #[case(TariffPeriod::Peak, TariffPeriod::Peak, StrategyGoal::PeakShaving)]
    #[case(TariffPeriod::Peak, TariffPeriod::Offpeak, StrategyGoal::PeakShaving)]
    #[case(TariffPeriod::Shoulder, TariffPeriod::Peak, StrategyGoal::BalancedFlux)]
    fn test_decision_table(
        #[case] current: TariffPeriod,
        #[case] upcoming: TariffPeriod,
        #[case] goal: StrategyGoal,
    ) {
        assert_eq!(decide_goal(current, upcoming), goal);
    }

    #[test]
    fn test_pre_charge_before_morning_peak() {
        let result = PricingStrategist::default().evaluate(at(6, 45));
        assert_eq!(result.period, TariffPeriod::Offpeak);
        assert_eq!(result.upcoming.period, TariffPeriod::Peak);
        assert_eq!(result.goal, StrategyGoal::PreCharge);
        assert_eq!(result.next_change_hint, ChangeHint::Imminent);
        assert_eq!(
            result.recommendation,
            "Upcoming price surge. Accelerating battery buffering."
        );
    }

    #[test]
    fn test_stable_window_mid_shoulder() {
        let result = PricingStrategist::default().evaluate(at(12, 0));
        assert_eq!(result.goal, StrategyGoal::BalancedFlux);
        assert_eq!(result.next_change_hint, ChangeHint::Stable);
    }

    #[test]
    fn test_lookahead_wraps_midnight() {
        let result = PricingStrategist::default().evaluate(at(23, 50));
        assert_eq!(result.upcoming.period, TariffPeriod::Offpeak);
        assert_eq!(result.goal, StrategyGoal::ReserveMode);
    }

    #[test]
    fn test_price_overrides() {
        let s = PricingStrategist::default().with_prices(Some(0.45), Some(0.10));
        assert_eq!(s.classify(NaiveTime::from_hms_opt(8, 0, 0).unwrap()).price, 0.45);
        assert_eq!(s.classify(NaiveTime::from_hms_opt(17, 0, 0).unwrap()).price, 0.45);
        assert_eq!(s.classify(NaiveTime::from_hms_opt(2, 0, 0).unwrap()).price, 0.10);
        assert_eq!(s.classify(NaiveTime::from_hms_opt(12, 0, 0).unwrap()).price, 0.22);
    }
}
