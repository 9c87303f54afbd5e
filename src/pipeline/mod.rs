//! The synchronous signal-generation pipeline: feature engineering →
//! classification → scoring → prediction → filter chain → plan
//! generation. Runs to completion with no suspension points so a cadence
//! invocation always sees one consistent feature snapshot (§5).

pub mod feature_engineer;
pub mod filters;
pub mod plan_generator;
pub mod predictor;

use uuid::Uuid;

use crate::model::candle::Candle;
use crate::model::options::OptionChainSnapshot;
use crate::model::plan::{FilterResult, FilterStatus, PlanAction};
use crate::model::snapshot::{ActivePosition, Outcome, Snapshot};
use crate::model::{MarketCondition, SetupQuality};

pub use feature_engineer::{FeatureEngineer, HistoricalLevels, PreviousDaySummary, SessionWindow};
pub use predictor::{ModelArtifact, Predictor};

/// Mutable state owned exclusively by the cadence scheduler per §9's
/// "global mutable state → explicit state object" redesign.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub active_position: Option<ActivePosition>,
    pub daily_realized_pl: f64,
    pub last_cadence_ts: i64,
}

pub struct PipelineInputs<'a> {
    pub symbol: &'a str,
    pub candles: &'a [Candle],
    pub previous_day: PreviousDaySummary,
    pub levels: &'a HistoricalLevels,
    pub option_chain: Option<&'a OptionChainSnapshot>,
    pub strike_step: f64,
    pub lot_size: u32,
    pub base_lots: u32,
    pub max_per_trade_loss: f64,
    pub max_daily_loss: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub now_ts: i64,
    pub session: SessionWindow,
    pub predictor: &'a Predictor,
    pub recent_snapshots: &'a [Snapshot],
    pub daily_realized_loss: f64,
}

pub fn run(inputs: PipelineInputs) -> Snapshot {
    let spot = inputs.candles.last().map(|c| c.close).unwrap_or(0.0);

    let fv = match FeatureEngineer::compute(
        inputs.candles,
        inputs.previous_day,
        inputs.levels,
        inputs.option_chain,
        inputs.strike_step,
        spot,
        inputs.now_ts,
        inputs.session,
    ) {
        Ok(fv) => fv,
        Err(e) => {
            tracing::warn!(symbol = inputs.symbol, error = %e, "feature engineer failed");
            return wait_snapshot(inputs.symbol, inputs.now_ts, None, None, vec![], e.to_string());
        }
    };

    let condition = MarketCondition::classify(&fv);
    let quality = SetupQuality::score(&fv);

    let prediction = match inputs.predictor.predict(&fv) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(symbol = inputs.symbol, error = %e, "predictor unavailable");
            return wait_snapshot(inputs.symbol, inputs.now_ts, Some(fv), None, vec![], e.to_string());
        }
    };

    let row = crate::model::matrix::lookup(condition, quality);
    let ctx = filters::FilterContext {
        recent_snapshots: inputs.recent_snapshots,
        daily_realized_loss: inputs.daily_realized_loss,
        lot_size: inputs.lot_size,
        max_per_trade_loss: inputs.max_per_trade_loss,
        max_daily_loss: inputs.max_daily_loss,
        confidence_floor: inputs.confidence_floor,
        confidence_ceiling: inputs.confidence_ceiling,
    };
    let (filter_results, blocked) = filters::run_chain(
        prediction.direction,
        &prediction,
        &fv,
        quality,
        row.stop_loss_points,
        row.position_multiplier,
        &ctx,
    );

    if blocked {
        for r in filter_results.iter().filter(|r| r.status != FilterStatus::Pass) {
            tracing::warn!(symbol = inputs.symbol, filter = %r.filter, status = ?r.status, reason = %r.reason, "filter chain stage");
        }
        return wait_snapshot(
            inputs.symbol,
            inputs.now_ts,
            Some(fv),
            Some(prediction),
            filter_results,
            "filter chain blocked".into(),
        );
    }

    let plan = plan_generator::generate(plan_generator::PlanInputs {
        symbol: inputs.symbol,
        spot,
        condition,
        quality,
        prediction,
        fv: &fv,
        filter_results: filter_results.clone(),
        base_lots: inputs.base_lots,
        lot_size: inputs.lot_size,
        strike_step: inputs.strike_step,
        option_chain: inputs.option_chain,
    });

    match plan {
        Ok(plan) => {
            tracing::info!(
                symbol = inputs.symbol,
                market_condition = ?condition,
                setup_quality = ?quality,
                action = "TRADE",
                "pipeline emitted plan"
            );
            Snapshot {
                id: Uuid::new_v4(),
                timestamp: inputs.now_ts,
                symbol: inputs.symbol.to_string(),
                feature_vector: fv,
                market_condition: condition,
                setup_quality: quality,
                prediction: Some(prediction),
                plan: Some(plan),
                filter_results,
                action: PlanAction::Trade,
                outcome: Outcome::Pending,
                realized_pl: None,
            }
        }
        Err(e) => {
            tracing::warn!(symbol = inputs.symbol, error = %e, "plan generation aborted");
            wait_snapshot(inputs.symbol, inputs.now_ts, Some(fv), Some(prediction), filter_results, e.to_string())
        }
    }
}

fn wait_snapshot(
    symbol: &str,
    now_ts: i64,
    fv: Option<crate::model::FeatureVector>,
    prediction: Option<crate::model::Prediction>,
    filter_results: Vec<FilterResult>,
    _reason: String,
) -> Snapshot {
    Snapshot {
        id: Uuid::new_v4(),
        timestamp: now_ts,
        symbol: symbol.to_string(),
        feature_vector: fv.unwrap_or_else(crate::model::FeatureVector::default_zeroed),
        market_condition: MarketCondition::Normal,
        setup_quality: SetupQuality::Weak,
        prediction,
        plan: None,
        filter_results,
        action: PlanAction::Wait,
        outcome: Outcome::Wait,
        realized_pl: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candle::Candle;

    fn synthetic_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let t = i as i64 * 300;
                let base = 22000.0 + (i as f64 * 0.05).sin() * 30.0 + i as f64 * 0.5;
                Candle { time: t, open: base, high: base + 5.0, low: base - 5.0, close: base + 1.0, volume: 1000 }
            })
            .collect()
    }

    fn base_inputs<'a>(
        candles: &'a [Candle],
        predictor: &'a Predictor,
        levels: &'a HistoricalLevels,
    ) -> PipelineInputs<'a> {
        PipelineInputs {
            symbol: "NIFTY",
            candles,
            previous_day: PreviousDaySummary { high: 22100.0, low: 21900.0, close: 22000.0 },
            levels,
            option_chain: None,
            strike_step: 50.0,
            lot_size: 65,
            base_lots: 2,
            max_per_trade_loss: 100_000.0,
            max_daily_loss: 300_000.0,
            confidence_floor: 60.0,
            confidence_ceiling: 75.0,
            now_ts: candles.last().unwrap().time,
            session: SessionWindow { open_ts: 0, close_ts: 22500 },
            predictor,
            recent_snapshots: &[],
            daily_realized_loss: 0.0,
        }
    }

    #[test]
    fn insufficient_candles_yields_wait_snapshot() {
        let candles = synthetic_candles(50);
        let predictor = Predictor::new();
        let levels = HistoricalLevels::default();
        let snapshot = run(base_inputs(&candles, &predictor, &levels));
        assert_eq!(snapshot.action, PlanAction::Wait);
        assert_eq!(snapshot.outcome, Outcome::Wait);
        assert!(snapshot.plan.is_none());
    }

    #[test]
    fn model_not_loaded_yields_wait_snapshot_with_features() {
        let candles = synthetic_candles(250);
        let predictor = Predictor::new();
        let levels = HistoricalLevels::default();
        let snapshot = run(base_inputs(&candles, &predictor, &levels));
        assert_eq!(snapshot.action, PlanAction::Wait);
        assert!(snapshot.prediction.is_none());
    }

    #[test]
    fn loaded_model_with_oversize_risk_blocks_on_position_sizing() {
        let candles = synthetic_candles(250);
        let mut predictor = Predictor::new();
        predictor
            .load(ModelArtifact {
                feature_names: crate::model::features::FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                weights: vec![0.0; crate::model::features::FEATURE_COUNT],
                bias: 3.0, // strongly confident
                version: "test".into(),
            })
            .unwrap();
        let levels = HistoricalLevels::default();
        let mut inputs = base_inputs(&candles, &predictor, &levels);
        inputs.max_per_trade_loss = 1.0; // impossible to satisfy -> filter 1 blocks
        let snapshot = run(inputs);
        assert_eq!(snapshot.action, PlanAction::Wait);
        assert!(snapshot.prediction.is_some());
        assert!(snapshot.filter_results.iter().any(|r| r.filter == "position_sizing" && r.status == FilterStatus::Block));
    }
}
