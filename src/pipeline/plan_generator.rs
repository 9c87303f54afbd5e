//! Turns a passed filter chain into the concrete `TradePlan`: levels,
//! strike selection and premium projection.

use std::collections::BTreeMap;

use crate::model::features::FeatureVector;
use crate::model::matrix::{self, MatrixRow};
use crate::model::options::OptionChainSnapshot;
use crate::model::plan::{FilterResult, FilterStatus, OptionType, TradePlan};
use crate::model::prediction::{Direction, Prediction};
use crate::model::{MarketCondition, SetupQuality};
use crate::utils::errors::PipelineError;

pub struct PlanInputs<'a> {
    pub symbol: &'a str,
    pub spot: f64,
    pub condition: MarketCondition,
    pub quality: SetupQuality,
    pub prediction: Prediction,
    pub fv: &'a FeatureVector,
    pub filter_results: Vec<FilterResult>,
    pub base_lots: u32,
    pub lot_size: u32,
    pub strike_step: f64,
    pub option_chain: Option<&'a OptionChainSnapshot>,
}

pub fn generate(inputs: PlanInputs) -> Result<TradePlan, PipelineError> {
    let PlanInputs {
        symbol,
        spot,
        condition,
        quality,
        prediction,
        fv,
        filter_results,
        base_lots,
        lot_size,
        strike_step,
        option_chain,
    } = inputs;

    let row: MatrixRow = matrix::lookup(condition, quality);
    let direction = prediction.direction;

    let entry = choose_entry(spot, direction, fv, row.stop_loss_points);
    let (stoploss, target, target2) = match direction {
        Direction::Buy => (entry - row.stop_loss_points, entry + row.target1_points, entry + row.target2_points),
        Direction::Sell => (entry + row.stop_loss_points, entry - row.target1_points, entry - row.target2_points),
    };

    let risk_reward = TradePlan::risk_reward_of(entry, target, stoploss);
    if risk_reward < 1.0 {
        return Err(PipelineError::DataUnavailable(format!(
            "risk_reward {risk_reward:.2} below 1.0 minimum"
        )));
    }

    let position_size_lots = (base_lots as f64 * row.position_multiplier).floor() as u32;

    let option_type = match direction {
        Direction::Buy => OptionType::Ce,
        Direction::Sell => OptionType::Pe,
    };
    let strike = (spot / strike_step).round() * strike_step;

    let (premium_entry, premium_target, premium_sl) =
        project_premiums(option_chain, strike, option_type, spot, entry, target, stoploss);

    let projected_pl = (premium_target - premium_entry) * lot_size as f64 * position_size_lots as f64;

    let mut filters_status = BTreeMap::new();
    for r in &filter_results {
        filters_status.insert(r.filter.clone(), r.status);
    }

    let rationale = rationale_for(condition, quality, &prediction, &filter_results);

    Ok(TradePlan {
        symbol: symbol.to_string(),
        direction,
        entry,
        target,
        target2,
        stoploss,
        risk_reward,
        position_size_lots,
        strike,
        option_type,
        premium_entry,
        premium_target,
        premium_sl,
        projected_pl,
        filters_status,
        rationale,
    })
}

/// Entry is the current close unless a VWAP or CPR level sits within
/// `0.25·ATR` between the close and the intended direction, in which case
/// that level is used instead.
fn choose_entry(spot: f64, direction: Direction, fv: &FeatureVector, _sl_points: f64) -> f64 {
    let band = 0.25 * fv.atr_14.max(1e-6);
    let candidates = [fv.vwap, fv.cpr_pivot, fv.cpr_tc, fv.cpr_bc];

    let between = |level: f64| match direction {
        Direction::Buy => level > spot && level - spot <= band,
        Direction::Sell => level < spot && spot - level <= band,
    };

    candidates
        .into_iter()
        .filter(|&level| between(level))
        .min_by(|a, b| (a - spot).abs().partial_cmp(&(b - spot).abs()).unwrap())
        .unwrap_or(spot)
}

fn project_premiums(
    option_chain: Option<&OptionChainSnapshot>,
    strike: f64,
    option_type: OptionType,
    spot: f64,
    entry: f64,
    target: f64,
    stoploss: f64,
) -> (f64, f64, f64) {
    match option_chain.and_then(|c| c.quote_for(strike, option_type)) {
        Some(quote) => {
            let mid = quote.mid();
            let delta = quote.delta.abs().max(1e-3);
            let to_premium = |spot_level: f64| (mid + delta * (spot_level - spot)).max(0.01);
            (mid, to_premium(target), to_premium(stoploss))
        }
        None => {
            // No live chain row: delta-linearize from a conservative 0.5 delta estimate.
            let delta = 0.5;
            let base = (spot * 0.02).max(1.0);
            let to_premium = |spot_level: f64| (base + delta * (spot_level - entry)).max(0.01);
            (base, to_premium(target), to_premium(stoploss))
        }
    }
}

fn rationale_for(
    condition: MarketCondition,
    quality: SetupQuality,
    prediction: &Prediction,
    filter_results: &[FilterResult],
) -> String {
    let warns: Vec<&str> =
        filter_results.iter().filter(|r| r.status == FilterStatus::Warn).map(|r| r.filter.as_str()).collect();
    let warn_note = if warns.is_empty() { String::new() } else { format!("; warnings: {}", warns.join(", ")) };
    format!(
        "{condition:?}/{quality:?} setup, {direction:?} at {confidence:.1}% confidence{warn_note}",
        condition = condition,
        quality = quality,
        direction = prediction.direction,
        confidence = prediction.confidence,
    )
}
