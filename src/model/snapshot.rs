use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::condition::MarketCondition;
use super::features::FeatureVector;
use super::plan::{FilterResult, PlanAction, TradePlan};
use super::prediction::Prediction;
use super::quality::SetupQuality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pending,
    Win,
    Loss,
    Expired,
    Wait,
}

/// One audit record of a pipeline invocation. Always written, whether or
/// not a plan was emitted — a `WAIT` invocation still leaves a row with
/// `outcome = WAIT` and `plan = None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub timestamp: i64,
    pub symbol: String,
    pub feature_vector: FeatureVector,
    pub market_condition: MarketCondition,
    pub setup_quality: SetupQuality,
    pub prediction: Option<Prediction>,
    pub plan: Option<TradePlan>,
    pub filter_results: Vec<FilterResult>,
    pub action: PlanAction,
    pub outcome: Outcome,
    pub realized_pl: Option<f64>,
}

/// In-memory record of the most recently emitted non-WAIT plan for a
/// symbol, with the 15-minute validity window from §4.7.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePosition {
    pub snapshot_id: Uuid,
    pub plan: TradePlan,
    pub market_condition: MarketCondition,
    pub emitted_at: i64,
    pub valid_until: i64,
    pub status: PositionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Hold,
    Closed,
}

impl ActivePosition {
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.status != PositionStatus::Closed && now < self.valid_until
    }

    /// Structure is considered unchanged — and so a HOLD is appropriate —
    /// when both the condition and direction match the active position.
    pub fn structure_matches(&self, condition: MarketCondition, direction: super::prediction::Direction) -> bool {
        self.market_condition == condition && self.plan.direction == direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::plan::{FilterStatus, OptionType};
    use crate::model::prediction::Direction;
    use std::collections::BTreeMap;

    fn sample_plan(direction: Direction) -> TradePlan {
        TradePlan {
            symbol: "NIFTY".into(),
            direction,
            entry: 100.0,
            target: 140.0,
            target2: 170.0,
            stoploss: 86.0,
            risk_reward: 2.0,
            position_size_lots: 1,
            strike: 22500.0,
            option_type: OptionType::Ce,
            premium_entry: 50.0,
            premium_target: 70.0,
            premium_sl: 40.0,
            projected_pl: 1300.0,
            filters_status: BTreeMap::from([("confidence".to_string(), FilterStatus::Pass)]),
            rationale: "test".into(),
        }
    }

    #[test]
    fn valid_until_elapses() {
        let pos = ActivePosition {
            snapshot_id: Uuid::new_v4(),
            plan: sample_plan(Direction::Buy),
            market_condition: MarketCondition::Normal,
            emitted_at: 1000,
            valid_until: 1900,
            status: PositionStatus::Open,
        };
        assert!(pos.is_valid_at(1500));
        assert!(!pos.is_valid_at(1900));
    }

    #[test]
    fn closed_position_is_never_valid() {
        let mut pos = ActivePosition {
            snapshot_id: Uuid::new_v4(),
            plan: sample_plan(Direction::Buy),
            market_condition: MarketCondition::Normal,
            emitted_at: 1000,
            valid_until: 1900,
            status: PositionStatus::Open,
        };
        pos.status = PositionStatus::Closed;
        assert!(!pos.is_valid_at(1200));
    }

    #[test]
    fn structure_match_requires_same_condition_and_direction() {
        let pos = ActivePosition {
            snapshot_id: Uuid::new_v4(),
            plan: sample_plan(Direction::Buy),
            market_condition: MarketCondition::Normal,
            emitted_at: 1000,
            valid_until: 1900,
            status: PositionStatus::Open,
        };
        assert!(pos.structure_matches(MarketCondition::Normal, Direction::Buy));
        assert!(!pos.structure_matches(MarketCondition::Normal, Direction::Sell));
        assert!(!pos.structure_matches(MarketCondition::High, Direction::Buy));
    }
}
