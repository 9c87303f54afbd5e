//! 15-minute cadence scheduler (§4.7): decides HOLD vs. a fresh pipeline
//! invocation, then persists whatever the pipeline emits.

use tokio::sync::RwLock;

use crate::db::MetricsRepository;
use crate::model::snapshot::{ActivePosition, PositionStatus, Snapshot};
use crate::pipeline::{filters, PipelineInputs, PipelineState};

/// Whether the active position (if any) still covers `now`/`condition`/
/// `direction`, in which case the scheduler should emit HOLD instead of
/// re-running the pipeline.
pub fn should_hold(
    active: &Option<ActivePosition>,
    now_ts: i64,
    condition: crate::model::MarketCondition,
    direction: crate::model::prediction::Direction,
) -> bool {
    match active {
        Some(pos) => pos.is_valid_at(now_ts) && pos.structure_matches(condition, direction),
        None => false,
    }
}

/// One cadence tick. A cheap HOLD check happens before the (heavier)
/// pipeline run; `crate::pipeline::run` itself decides condition/
/// direction, so a second, structure-aware HOLD is applied once its
/// snapshot is in hand — re-running is unavoidable to know the
/// structure, but nothing is persisted or mutated when it matches.
pub async fn tick(
    inputs: PipelineInputs<'_>,
    level_validity_seconds: i64,
    state: &RwLock<PipelineState>,
    repo: &MetricsRepository,
) -> Option<Snapshot> {
    let now_ts = inputs.now_ts;
    let symbol = inputs.symbol.to_string();
    let adaptive_threshold =
        filters::adaptive_confidence_threshold(inputs.recent_snapshots, inputs.confidence_floor, inputs.confidence_ceiling);

    let prior_active = state.read().await.active_position.clone();

    let snapshot = crate::pipeline::run(inputs);

    // §6: config_kv is the persisted home for adaptive-threshold state,
    // kept for operator visibility; the filter chain itself always
    // recomputes it from recent snapshots rather than trusting this copy.
    if let Err(e) = repo.set_config(&format!("adaptive_threshold:{symbol}"), &adaptive_threshold.to_string()).await {
        tracing::warn!(symbol = %symbol, error = %e, "failed to persist adaptive threshold");
    }

    if let (Some(prediction), Some(pos)) = (&snapshot.prediction, &prior_active) {
        if should_hold(&Some(pos.clone()), now_ts, snapshot.market_condition, prediction.direction) {
            tracing::info!(symbol = %symbol, "cadence tick holding active position, discarding fresh run");
            let mut guard = state.write().await;
            guard.last_cadence_ts = now_ts;
            if let Some(active) = guard.active_position.as_mut() {
                active.status = PositionStatus::Hold;
            }
            return None;
        }
    }

    if let Err(e) = repo.put(&snapshot).await {
        tracing::error!(symbol = %symbol, error = %e, "repository write failed, discarding snapshot");
        state.write().await.last_cadence_ts = now_ts;
        return None;
    }

    let mut guard = state.write().await;
    guard.last_cadence_ts = now_ts;
    if let Some(plan) = &snapshot.plan {
        guard.active_position = Some(ActivePosition {
            snapshot_id: snapshot.id,
            plan: plan.clone(),
            market_condition: snapshot.market_condition,
            emitted_at: now_ts,
            valid_until: now_ts + level_validity_seconds,
            status: PositionStatus::Open,
        });
    }
    drop(guard);

    Some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::plan::{FilterStatus, OptionType};
    use crate::model::prediction::Direction;
    use crate::model::{MarketCondition, TradePlan};
    use std::collections::BTreeMap;
    use uuid::Uuid;

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
    fn holds_when_structure_unchanged_and_valid() {
        let pos = ActivePosition {
            snapshot_id: Uuid::new_v4(),
            plan: sample_plan(Direction::Buy),
            market_condition: MarketCondition::Normal,
            emitted_at: 1000,
            valid_until: 1900,
            status: PositionStatus::Open,
        };
        assert!(should_hold(&Some(pos), 1500, MarketCondition::Normal, Direction::Buy));
    }

    #[test]
    fn does_not_hold_once_expired() {
        let pos = ActivePosition {
            snapshot_id: Uuid::new_v4(),
            plan: sample_plan(Direction::Buy),
            market_condition: MarketCondition::Normal,
            emitted_at: 1000,
            valid_until: 1900,
            status: PositionStatus::Open,
        };
        assert!(!should_hold(&Some(pos), 1900, MarketCondition::Normal, Direction::Buy));
    }

    #[test]
    fn does_not_hold_when_direction_flips() {
        let pos = ActivePosition {
            snapshot_id: Uuid::new_v4(),
            plan: sample_plan(Direction::Buy),
            market_condition: MarketCondition::Normal,
            emitted_at: 1000,
            valid_until: 1900,
            status: PositionStatus::Open,
        };
        assert!(!should_hold(&Some(pos), 1500, MarketCondition::Normal, Direction::Sell));
    }

    #[test]
    fn no_active_position_never_holds() {
        assert!(!should_hold(&None, 1500, MarketCondition::Normal, Direction::Buy));
    }
}
