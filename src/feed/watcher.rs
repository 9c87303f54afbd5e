//! Outcome watcher (§7): compares live LTP against the active plan's
//! target/stop-loss levels and calls `update_outcome` exactly once per
//! plan. Grounded on the reference backend's position-monitor loop,
//! adapted to this feed's target/SL-only outcome model.

use crate::model::prediction::Direction;
use crate::model::snapshot::Outcome;
use crate::model::TradePlan;

/// Pure decision: does this tick resolve the plan? `None` means still
/// pending. BUY resolves TARGET on `ltp >= target`, SL on `ltp <= stoploss`;
/// SELL is mirrored. Ties favor TARGET (a simultaneous touch is a win).
pub fn resolve(plan: &TradePlan, ltp: f64) -> Option<Outcome> {
    match plan.direction {
        Direction::Buy => {
            if ltp >= plan.target {
                Some(Outcome::Win)
            } else if ltp <= plan.stoploss {
                Some(Outcome::Loss)
            } else {
                None
            }
        }
        Direction::Sell => {
            if ltp <= plan.target {
                Some(Outcome::Win)
            } else if ltp >= plan.stoploss {
                Some(Outcome::Loss)
            } else {
                None
            }
        }
    }
}

/// Tracks at-most-once resolution across a tick stream for one plan.
pub struct WatcherState {
    resolved: bool,
}

impl WatcherState {
    pub fn new() -> Self {
        Self { resolved: false }
    }

    /// Feeds one tick; returns `Some(outcome)` the first time the plan
    /// resolves, and `None` on every subsequent call regardless of price.
    pub fn observe(&mut self, plan: &TradePlan, ltp: f64) -> Option<Outcome> {
        if self.resolved {
            return None;
        }
        let outcome = resolve(plan, ltp)?;
        self.resolved = true;
        Some(outcome)
    }
}

impl Default for WatcherState {
    fn default() -> Self {
        Self::new()
    }
}

/// Realized P/L for a resolved outcome, in index points times lot size.
pub fn realized_pl(plan: &TradePlan, outcome: Outcome, lot_size: u32) -> f64 {
    let points = match (plan.direction, outcome) {
        (Direction::Buy, Outcome::Win) => plan.target - plan.entry,
        (Direction::Buy, Outcome::Loss) => plan.stoploss - plan.entry,
        (Direction::Sell, Outcome::Win) => plan.entry - plan.target,
        (Direction::Sell, Outcome::Loss) => plan.entry - plan.stoploss,
        _ => 0.0,
    };
    points * plan.position_size_lots as f64 * lot_size as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::plan::{FilterStatus, OptionType};
    use std::collections::BTreeMap;

    fn buy_plan() -> TradePlan {
        TradePlan {
            symbol: "NIFTY".into(),
            direction: Direction::Buy,
            entry: 100.0,
            target: 110.0,
            target2: 120.0,
            stoploss: 95.0,
            risk_reward: 2.0,
            position_size_lots: 1,
            strike: 22500.0,
            option_type: OptionType::Ce,
            premium_entry: 50.0,
            premium_target: 70.0,
            premium_sl: 40.0,
            projected_pl: 650.0,
            filters_status: BTreeMap::from([("confidence".to_string(), FilterStatus::Pass)]),
            rationale: "test".into(),
        }
    }

    #[test]
    fn target_sequence_fires_once_and_ignores_further_ticks() {
        let plan = buy_plan();
        let mut watcher = WatcherState::new();
        assert_eq!(watcher.observe(&plan, 102.0), None);
        assert_eq!(watcher.observe(&plan, 108.0), None);
        assert_eq!(watcher.observe(&plan, 110.2), Some(Outcome::Win));
        assert_eq!(watcher.observe(&plan, 111.0), None);
    }

    #[test]
    fn stoploss_resolves_as_loss() {
        let plan = buy_plan();
        let mut watcher = WatcherState::new();
        assert_eq!(watcher.observe(&plan, 95.0), Some(Outcome::Loss));
        assert_eq!(watcher.observe(&plan, 110.0), None);
    }

    #[test]
    fn sell_plan_mirrors_direction() {
        let mut plan = buy_plan();
        plan.direction = Direction::Sell;
        plan.target = 90.0;
        plan.stoploss = 105.0;
        assert_eq!(resolve(&plan, 89.0), Some(Outcome::Win));
        assert_eq!(resolve(&plan, 106.0), Some(Outcome::Loss));
        assert_eq!(resolve(&plan, 100.0), None);
    }

    #[test]
    fn realized_pl_scales_by_lot_size() {
        let plan = buy_plan();
        assert_eq!(realized_pl(&plan, Outcome::Win, 65), (110.0 - 100.0) * 65.0);
        assert_eq!(realized_pl(&plan, Outcome::Loss, 65), (95.0 - 100.0) * 65.0);
    }
}
