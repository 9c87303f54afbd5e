use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::prediction::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Ce,
    Pe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterStatus {
    Pass,
    Warn,
    Block,
}

/// Name + verdict + human-readable reason for one filter-chain stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub filter: String,
    pub status: FilterStatus,
    pub reason: String,
}

/// Top-level action a caller of `/api/levels` observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanAction {
    Trade,
    Hold,
    Wait,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub target: f64,
    pub target2: f64,
    pub stoploss: f64,
    pub risk_reward: f64,
    pub position_size_lots: u32,
    pub strike: f64,
    pub option_type: OptionType,
    pub premium_entry: f64,
    pub premium_target: f64,
    pub premium_sl: f64,
    pub projected_pl: f64,
    pub filters_status: BTreeMap<String, FilterStatus>,
    pub rationale: String,
}

impl TradePlan {
    pub fn risk_reward_of(entry: f64, target: f64, stoploss: f64) -> f64 {
        let risk = (entry - stoploss).abs();
        if risk <= f64::EPSILON {
            return 0.0;
        }
        (target - entry).abs() / risk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_reward_is_reward_over_risk() {
        let rr = TradePlan::risk_reward_of(100.0, 140.0, 86.0);
        assert!((rr - (40.0 / 14.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_risk_yields_zero_rr_rather_than_infinity() {
        assert_eq!(TradePlan::risk_reward_of(100.0, 140.0, 100.0), 0.0);
    }
}
