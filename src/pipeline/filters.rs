//! The five-stage gating chain from the trading-level generator. Each
//! stage is pure: given the feature vector, prediction and recent
//! snapshot history, it returns a verdict and a human-readable reason.
//! The caller (the pipeline orchestrator) is responsible for sourcing
//! `recent_snapshots` and `daily_realized_loss` from the repository.

use std::collections::BTreeMap;

use crate::model::features::FeatureVector;
use crate::model::plan::{FilterResult, FilterStatus};
use crate::model::prediction::{Direction, Prediction};
use crate::model::quality::SetupQuality;
use crate::model::snapshot::{Outcome, Snapshot};

/// Inputs the filter chain needs beyond the feature vector and
/// prediction — everything sourced from config or the repository.
pub struct FilterContext<'a> {
    pub recent_snapshots: &'a [Snapshot],
    pub daily_realized_loss: f64,
    pub lot_size: u32,
    pub max_per_trade_loss: f64,
    pub max_daily_loss: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
}

/// Starts at `confidence_floor`, +2 per loss in the trailing 10
/// snapshots (capped at `confidence_ceiling`), −1 per loss-free trading
/// day represented in the history.
pub fn adaptive_confidence_threshold(recent: &[Snapshot], floor: f64, ceiling: f64) -> f64 {
    let losses_recent = recent.iter().rev().take(10).filter(|s| s.outcome == Outcome::Loss).count() as f64;

    let mut by_day: BTreeMap<i64, bool> = BTreeMap::new();
    for s in recent {
        let day = s.timestamp / 86_400;
        let had_loss = s.outcome == Outcome::Loss;
        let entry = by_day.entry(day).or_insert(false);
        *entry = *entry || had_loss;
    }
    let clean_days = by_day.values().filter(|had_loss| !**had_loss).count() as f64;

    (floor + 2.0 * losses_recent - clean_days).clamp(floor, ceiling)
}

pub fn position_sizing(
    sl_points: f64,
    position_multiplier: f64,
    ctx: &FilterContext,
) -> FilterResult {
    let per_trade_cost = sl_points * ctx.lot_size as f64 * position_multiplier;
    let status = if per_trade_cost > ctx.max_per_trade_loss || ctx.daily_realized_loss.abs() >= ctx.max_daily_loss {
        FilterStatus::Block
    } else {
        FilterStatus::Pass
    };
    let reason = format!(
        "per-trade risk {:.1} vs cap {:.1}; daily realized loss {:.1} vs cap {:.1}",
        per_trade_cost, ctx.max_per_trade_loss, ctx.daily_realized_loss, ctx.max_daily_loss
    );
    FilterResult { filter: "position_sizing".into(), status, reason }
}

pub fn confidence_threshold(confidence: f64, threshold: f64) -> FilterResult {
    let status = if confidence < threshold { FilterStatus::Block } else { FilterStatus::Pass };
    FilterResult {
        filter: "confidence_threshold".into(),
        status,
        reason: format!("confidence {:.1} vs adaptive threshold {:.1}", confidence, threshold),
    }
}

pub fn trend_alignment(direction: Direction, fv: &FeatureVector, confidence: f64) -> FilterResult {
    const FLAT_EPSILON: f64 = 1e-6;
    let diff = fv.ema_5 - fv.ema_20;
    let trend = if diff.abs() < FLAT_EPSILON {
        None
    } else if diff > 0.0 {
        Some(Direction::Buy)
    } else {
        Some(Direction::Sell)
    };

    let (status, reason) = match trend {
        None => (FilterStatus::Warn, "15-min trend is flat".to_string()),
        Some(t) if t == direction => (FilterStatus::Pass, "prediction agrees with 15-min trend".to_string()),
        Some(_) if confidence < 72.0 => {
            (FilterStatus::Block, format!("opposed to 15-min trend, confidence {:.1} < 72", confidence))
        }
        Some(_) => (FilterStatus::Warn, "opposed to 15-min trend but high confidence".to_string()),
    };
    FilterResult { filter: "trend_alignment".into(), status, reason }
}

pub fn entry_quality(direction: Direction, fv: &FeatureVector, quality: SetupQuality) -> FilterResult {
    let dist_atr = match direction {
        Direction::Buy => fv.dist_to_support_atr,
        Direction::Sell => fv.dist_to_resistance_atr,
    };
    let (grade, status) = if dist_atr <= 0.5 {
        ("GOOD", FilterStatus::Pass)
    } else if dist_atr <= 1.0 {
        ("FAIR", FilterStatus::Warn)
    } else if quality == SetupQuality::Excellent {
        ("POOR", FilterStatus::Warn)
    } else {
        ("POOR", FilterStatus::Block)
    };
    FilterResult {
        filter: "entry_quality".into(),
        status,
        reason: format!("entry proximity {grade} ({dist_atr:.2} ATR)"),
    }
}

pub fn failure_detection(recent: &[Snapshot]) -> FilterResult {
    let stop_loss_hits = recent.iter().rev().take(10).filter(|s| s.outcome == Outcome::Loss).count();
    let status = if stop_loss_hits >= 3 {
        FilterStatus::Block
    } else if stop_loss_hits == 2 {
        FilterStatus::Warn
    } else {
        FilterStatus::Pass
    };
    FilterResult {
        filter: "failure_detection".into(),
        status,
        reason: format!("{stop_loss_hits} stop-loss hits in last 10 snapshots"),
    }
}

/// Runs all five filters in order and returns their results plus whether
/// any stage blocked the plan.
pub fn run_chain(
    direction: Direction,
    prediction: &Prediction,
    fv: &FeatureVector,
    quality: SetupQuality,
    sl_points: f64,
    position_multiplier: f64,
    ctx: &FilterContext,
) -> (Vec<FilterResult>, bool) {
    let threshold = adaptive_confidence_threshold(ctx.recent_snapshots, ctx.confidence_floor, ctx.confidence_ceiling);
    let results = vec![
        position_sizing(sl_points, position_multiplier, ctx),
        confidence_threshold(prediction.confidence, threshold),
        trend_alignment(direction, fv, prediction.confidence),
        entry_quality(direction, fv, quality),
        failure_detection(ctx.recent_snapshots),
    ];
    let blocked = results.iter().any(|r| r.status == FilterStatus::Block);
    (results, blocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn snapshot_with_outcome(ts: i64, outcome: Outcome) -> Snapshot {
        Snapshot {
            id: Uuid::new_v4(),
            timestamp: ts,
            symbol: "NIFTY".into(),
            feature_vector: FeatureVector::default_zeroed(),
            market_condition: crate::model::MarketCondition::Normal,
            setup_quality: SetupQuality::Strong,
            prediction: None,
            plan: None,
            filter_results: vec![],
            action: crate::model::plan::PlanAction::Wait,
            outcome,
            realized_pl: None,
        }
    }

    fn base_ctx(recent: &[Snapshot]) -> FilterContext<'_> {
        FilterContext {
            recent_snapshots: recent,
            daily_realized_loss: 0.0,
            lot_size: 50,
            max_per_trade_loss: 2000.0,
            max_daily_loss: 6000.0,
            confidence_floor: 60.0,
            confidence_ceiling: 75.0,
        }
    }

    #[test]
    fn position_sizing_blocks_when_risk_exceeds_cap() {
        let ctx = base_ctx(&[]);
        let result = position_sizing(50.0, 1.0, &ctx);
        assert_eq!(result.status, FilterStatus::Block);
    }

    #[test]
    fn position_sizing_passes_within_cap() {
        let ctx = base_ctx(&[]);
        let result = position_sizing(10.0, 1.0, &ctx);
        assert_eq!(result.status, FilterStatus::Pass);
    }

    #[test]
    fn adaptive_threshold_rises_with_recent_losses() {
        let recent: Vec<Snapshot> =
            (0..3).map(|i| snapshot_with_outcome(i * 86_400, Outcome::Loss)).collect();
        let threshold = adaptive_confidence_threshold(&recent, 60.0, 75.0);
        assert!(threshold > 60.0);
    }

    #[test]
    fn adaptive_threshold_never_exceeds_ceiling() {
        let recent: Vec<Snapshot> =
            (0..20).map(|i| snapshot_with_outcome(i * 86_400, Outcome::Loss)).collect();
        let threshold = adaptive_confidence_threshold(&recent, 60.0, 75.0);
        assert_eq!(threshold, 75.0);
    }

    #[test]
    fn failure_detection_blocks_at_three_stop_losses() {
        let recent: Vec<Snapshot> =
            (0..3).map(|i| snapshot_with_outcome(i * 300, Outcome::Loss)).collect();
        assert_eq!(failure_detection(&recent).status, FilterStatus::Block);
    }

    #[test]
    fn failure_detection_warns_at_two() {
        let mut recent: Vec<Snapshot> =
            (0..2).map(|i| snapshot_with_outcome(i * 300, Outcome::Loss)).collect();
        recent.push(snapshot_with_outcome(900, Outcome::Win));
        assert_eq!(failure_detection(&recent).status, FilterStatus::Warn);
    }

    #[test]
    fn entry_quality_blocks_poor_unless_excellent() {
        let mut fv = FeatureVector::default_zeroed();
        fv.dist_to_support_atr = 2.0;
        let strong = entry_quality(Direction::Buy, &fv, SetupQuality::Strong);
        assert_eq!(strong.status, FilterStatus::Block);
        let excellent = entry_quality(Direction::Buy, &fv, SetupQuality::Excellent);
        assert_eq!(excellent.status, FilterStatus::Warn);
    }

    #[test]
    fn trend_alignment_blocks_on_opposition_with_low_confidence() {
        let mut fv = FeatureVector::default_zeroed();
        fv.ema_5 = 100.0;
        fv.ema_20 = 105.0; // trend is SELL
        let result = trend_alignment(Direction::Buy, &fv, 60.0);
        assert_eq!(result.status, FilterStatus::Block);
    }

    #[test]
    fn trend_alignment_warns_on_opposition_with_high_confidence() {
        let mut fv = FeatureVector::default_zeroed();
        fv.ema_5 = 100.0;
        fv.ema_20 = 105.0;
        let result = trend_alignment(Direction::Buy, &fv, 80.0);
        assert_eq!(result.status, FilterStatus::Warn);
    }

    #[test]
    fn run_chain_blocks_overall_when_any_stage_blocks() {
        let recent = vec![];
        let ctx = base_ctx(&recent);
        let fv = FeatureVector::default_zeroed();
        let prediction = Prediction::from_probs(0.9, 0.1);
        let (_, blocked) = run_chain(Direction::Buy, &prediction, &fv, SetupQuality::Strong, 100.0, 1.0, &ctx);
        assert!(blocked);
    }
}
