//! Turns a candle window plus side-inputs into the fixed 74-slot
//! `FeatureVector`. Indicator math follows the same hand-rolled style as
//! the strategy modules this engine grew out of (simple/Wilder moving
//! averages, realized-vol estimators, percentile ranks) rather than
//! pulling in a charting-indicator crate.

use statrs::statistics::{Data, Distribution};

use crate::model::candle::Candle;
use crate::model::features::{FeatureVector, MarketPhase};
use crate::model::options::OptionChainSnapshot;
use crate::model::plan::OptionType;
use crate::model::quality::SetupQuality;
use crate::utils::errors::PipelineError;

pub const MIN_CANDLES: usize = 200;

/// Previous trading day's OHLC, used to derive the classical pivot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviousDaySummary {
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Cached swing-level set maintained alongside the candle buffer.
#[derive(Debug, Clone, Default)]
pub struct HistoricalLevels {
    pub resistances: Vec<(f64, u32)>,
    pub supports: Vec<(f64, u32)>,
}

impl HistoricalLevels {
    fn nearest_resistance(&self, close: f64) -> Option<(f64, u32)> {
        self.resistances
            .iter()
            .filter(|(p, _)| *p >= close)
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
            .copied()
    }

    fn nearest_support(&self, close: f64) -> Option<(f64, u32)> {
        self.supports
            .iter()
            .filter(|(p, _)| *p <= close)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
            .copied()
    }
}

/// The session window a cadence invocation falls in, used for the time
/// family and the opening-range feature.
#[derive(Debug, Clone, Copy)]
pub struct SessionWindow {
    pub open_ts: i64,
    pub close_ts: i64,
}

pub struct FeatureEngineer;

impl FeatureEngineer {
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        candles: &[Candle],
        previous_day: PreviousDaySummary,
        levels: &HistoricalLevels,
        option_chain: Option<&OptionChainSnapshot>,
        strike_step: f64,
        spot: f64,
        now_ts: i64,
        session: SessionWindow,
    ) -> Result<FeatureVector, PipelineError> {
        if candles.len() < MIN_CANDLES {
            return Err(PipelineError::InsufficientData { need: MIN_CANDLES, have: candles.len() });
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume as f64).collect();
        let last = candles.last().expect("checked len above");

        let mut fv = FeatureVector::default_zeroed();

        // --- trend/momentum ---
        fv.ema_5 = last_ema(&closes, 5);
        fv.ema_12 = last_ema(&closes, 12);
        fv.ema_20 = last_ema(&closes, 20);
        fv.ema_50 = last_ema(&closes, 50);
        fv.ema_200 = last_ema(&closes, 200);
        fv.rsi_14 = rsi(&closes, 14);
        fv.rsi_5 = rsi(&closes, 5);
        let (macd_line, macd_signal, macd_hist) = macd(&closes);
        fv.macd_line = macd_line;
        fv.macd_signal = macd_signal;
        fv.macd_hist = macd_hist;
        fv.adx = adx_like(&highs, &lows, &closes, 14);
        fv.ema_5_slope = ema_slope(&closes, 5);
        fv.ema_20_slope = ema_slope(&closes, 20);
        fv.atr_14 = atr(&highs, &lows, &closes, 14);
        fv.trend_strength = if fv.atr_14 > 0.0 { (fv.ema_5 - fv.ema_20) / fv.atr_14 } else { 0.0 };

        // --- volatility ---
        fv.parkinson_vol_20 = parkinson_vol(&highs, &lows, 20);
        fv.garman_klass_vol = garman_klass_vol(candles, 20);
        fv.return_std_5 = return_std(&closes, 5);
        fv.return_std_20 = return_std(&closes, 20);
        let atr_series = atr_series(&highs, &lows, &closes, 14, 20);
        fv.vol_of_vol_20 = std_dev(&atr_series);
        fv.vol_of_vol_zscore = zscore(fv.atr_14, &atr_series);
        fv.realized_range_pct_78 = realized_range_percentile(&highs, &lows, 78);

        // --- CPR ---
        let pivot = (previous_day.high + previous_day.low + previous_day.close) / 3.0;
        let bc = (previous_day.high + previous_day.low) / 2.0;
        let tc = (pivot - bc) + pivot;
        fv.cpr_pivot = pivot;
        fv.cpr_tc = tc;
        fv.cpr_bc = bc;
        fv.cpr_width = (tc - bc).abs();
        let atr_safe = if fv.atr_14 > 0.0 { fv.atr_14 } else { 1.0 };
        fv.dist_close_to_pivot_atr = (last.close - pivot).abs() / atr_safe;
        let dist_tc = (last.close - tc).abs();
        let dist_bc = (last.close - bc).abs();
        fv.dist_close_to_band_atr = dist_tc.min(dist_bc) / atr_safe;

        // --- VWAP ---
        let vwap_series = session_vwap_series(candles, session.open_ts, 5);
        fv.vwap = *vwap_series.last().unwrap_or(&last.close);
        fv.dist_close_vwap_atr = (last.close - fv.vwap).abs() / atr_safe;
        fv.vwap_slope = if vwap_series.len() >= 2 {
            (vwap_series[vwap_series.len() - 1] - vwap_series[0]) / (vwap_series.len() - 1) as f64
        } else {
            0.0
        };

        // --- support/resistance ---
        let (res_price, res_touch) = levels.nearest_resistance(last.close).unwrap_or((last.close + 10.0 * atr_safe, 0));
        let (sup_price, sup_touch) = levels.nearest_support(last.close).unwrap_or((last.close - 10.0 * atr_safe, 0));
        fv.nearest_resistance = res_price;
        fv.nearest_support = sup_price;
        fv.dist_to_resistance_pts = (res_price - last.close).abs();
        fv.dist_to_support_pts = (last.close - sup_price).abs();
        fv.dist_to_resistance_atr = fv.dist_to_resistance_pts / atr_safe;
        fv.dist_to_support_atr = fv.dist_to_support_pts / atr_safe;
        fv.resistance_touch_count = res_touch as f64;
        fv.support_touch_count = sup_touch as f64;

        // --- microstructure ---
        fv.tick_direction_ratio = tick_direction_ratio(&closes, 20);
        let range = (last.high - last.low).max(1e-8);
        let mid = (last.high + last.low) / 2.0;
        fv.order_flow_imbalance = (last.close - mid) / range;
        fv.upper_wick_ratio = (last.high - last.open.max(last.close)) / range;
        fv.lower_wick_ratio = (last.open.min(last.close) - last.low) / range;
        fv.body_ratio = (last.close - last.open).abs() / range;
        let prev_close = closes[closes.len() - 2];
        fv.gap_from_prev_close = last.open - prev_close;
        fv.opening_range_position = opening_range_position(candles, session.open_ts);
        fv.volume_zscore = zscore(*volumes.last().unwrap_or(&0.0), &volumes[volumes.len().saturating_sub(20)..]);
        fv.cumulative_signed_volume = cumulative_signed_volume(candles, 20);
        fv.realized_range_last_bar = last.high - last.low;

        // --- options-derived ---
        match option_chain.filter(|c| !c.is_stale(now_ts)) {
            Some(chain) => {
                let (pcr, oi_skew, iv_skew, atm_iv_rank, institutional) =
                    options_features(chain, spot, strike_step);
                fv.pcr = pcr;
                fv.oi_skew = oi_skew;
                fv.iv_skew = iv_skew;
                fv.atm_iv_rank = atm_iv_rank;
                fv.institutional_activity_proxy = institutional;
                fv.feature_stale = false;
            }
            None => {
                fv.pcr = 1.0;
                fv.oi_skew = 0.0;
                fv.iv_skew = 0.0;
                fv.atm_iv_rank = 50.0;
                fv.institutional_activity_proxy = 0.0;
                fv.feature_stale = true;
            }
        }

        // --- time ---
        let phase = market_phase(now_ts, session);
        fv.hour = ((now_ts / 3600) % 24) as f64;
        fv.minute = ((now_ts / 60) % 60) as f64;
        fv.minute_of_day = ((now_ts % 86400) / 60) as f64;
        fv.market_phase = phase.as_f64();

        // --- aggregate scores ---
        let aligned_up = fv.ema_5 > fv.ema_20 && fv.ema_20 > fv.ema_50;
        let aligned_down = fv.ema_5 < fv.ema_20 && fv.ema_20 < fv.ema_50;
        let trend_component = if aligned_up || aligned_down { 1.0 } else { 0.4 };
        let volume_component = (fv.volume_zscore / 3.0).clamp(0.0, 1.0);
        fv.l1_trend_component = trend_component;
        fv.l1_volume_component = volume_component;
        fv.l1_structure = (trend_component + volume_component) / 2.0;

        let pcr_component = (1.0 - (fv.pcr - 1.0).abs()).clamp(0.0, 1.0);
        let iv_component = (1.0 - fv.atm_iv_rank / 100.0).clamp(0.0, 1.0);
        fv.l2_pcr_component = pcr_component;
        fv.l2_iv_component = iv_component;
        fv.l2_options = (pcr_component + iv_component) / 2.0;

        let momentum_component = (1.0 - (fv.rsi_14 - 50.0).abs() / 50.0).clamp(0.0, 1.0);
        let volatility_component = (1.0 - fv.atr_14 / 50.0).clamp(0.0, 1.0);
        fv.l3_momentum_component = momentum_component;
        fv.l3_volatility_component = volatility_component;
        fv.l3_technical = (momentum_component + volatility_component) / 2.0;

        fv.structural_break_flag = if (last.close - fv.vwap).abs() > 2.0 * atr_safe { 1.0 } else { 0.0 };
        fv.failure_window_flag = if fv.gap_from_prev_close.abs() > atr_safe { 1.0 } else { 0.0 };
        let risk_component = (1.0 - (fv.dist_to_resistance_atr.min(fv.dist_to_support_atr) / 2.0)).clamp(0.0, 1.0);
        fv.l4_risk_component = risk_component;
        fv.l4_blocking = (risk_component + (1.0 - fv.failure_window_flag)) / 2.0;

        let alignment_component = if fv.ema_5_slope.signum() == fv.macd_hist.signum() { 1.0 } else { 0.0 };
        fv.l5_alignment_component = alignment_component;
        fv.l5_multi_timeframe = alignment_component;

        fv.quality_weighted_sum = SetupQuality::weighted_sum(&fv);

        debug_assert!(fv.is_finite(), "feature engineer must never emit NaN/inf");
        Ok(fv)
    }
}

fn market_phase(now_ts: i64, session: SessionWindow) -> MarketPhase {
    let elapsed = now_ts - session.open_ts;
    let remaining = session.close_ts - now_ts;
    if elapsed <= 3600 {
        MarketPhase::Open
    } else if remaining <= 3600 {
        MarketPhase::Close
    } else {
        MarketPhase::Mid
    }
}

fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period || period == 0 {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    for v in &values[period..] {
        let prev = *out.last().unwrap();
        out.push(v * k + prev * (1.0 - k));
    }
    out
}

fn last_ema(values: &[f64], period: usize) -> f64 {
    ema_series(values, period).last().copied().unwrap_or_else(|| values.last().copied().unwrap_or(0.0))
}

fn ema_slope(values: &[f64], period: usize) -> f64 {
    let series = ema_series(values, period);
    if series.len() >= 2 {
        series[series.len() - 1] - series[series.len() - 2]
    } else {
        0.0
    }
}

fn rsi(closes: &[f64], period: usize) -> f64 {
    if closes.len() <= period {
        return 50.0;
    }
    let window = &closes[closes.len() - period - 1..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss <= 1e-12 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD(12,26,9) computed from the full close series so the signal line is
/// itself an EMA of a genuine MACD-line history, not a single point.
fn macd(closes: &[f64]) -> (f64, f64, f64) {
    let ema12 = ema_series(closes, 12);
    let ema26 = ema_series(closes, 26);
    if ema12.is_empty() || ema26.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let offset = ema12.len() - ema26.len();
    let macd_line_series: Vec<f64> =
        ema26.iter().enumerate().map(|(i, v)| ema12[i + offset] - v).collect();
    let signal_series = ema_series(&macd_line_series, 9);
    let line = *macd_line_series.last().unwrap();
    let signal = signal_series.last().copied().unwrap_or(line);
    (line, signal, line - signal)
}

fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low).max((high - prev_close).abs()).max((low - prev_close).abs())
}

fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> f64 {
    if closes.len() <= period {
        return 0.0;
    }
    let n = closes.len();
    let mut sum = 0.0;
    for i in n - period..n {
        sum += true_range(highs[i], lows[i], closes[i - 1]);
    }
    sum / period as f64
}

/// Rolling ATR history, `count` values each computed over `period` bars.
fn atr_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize, count: usize) -> Vec<f64> {
    let n = closes.len();
    let usable = n.saturating_sub(period);
    let take = count.min(usable);
    (0..take)
        .map(|i| {
            let end = n - i;
            atr(&highs[..end], &lows[..end], &closes[..end], period)
        })
        .rev()
        .collect()
}

fn adx_like(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> f64 {
    if closes.len() <= period + 1 {
        return 0.0;
    }
    let n = closes.len();
    let mut plus_dm = 0.0;
    let mut minus_dm = 0.0;
    let mut tr_sum = 0.0;
    for i in n - period..n {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        if up_move > down_move && up_move > 0.0 {
            plus_dm += up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm += down_move;
        }
        tr_sum += true_range(highs[i], lows[i], closes[i - 1]);
    }
    if tr_sum <= 1e-12 {
        return 0.0;
    }
    let plus_di = 100.0 * plus_dm / tr_sum;
    let minus_di = 100.0 * minus_dm / tr_sum;
    let denom = plus_di + minus_di;
    if denom <= 1e-12 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / denom
    }
}

fn parkinson_vol(highs: &[f64], lows: &[f64], window: usize) -> f64 {
    let n = highs.len();
    if n < window {
        return 0.0;
    }
    let start = n - window;
    let sum: f64 = (start..n).map(|i| (highs[i] / lows[i].max(1e-8)).ln().powi(2)).sum();
    (sum / (4.0 * std::f64::consts::LN_2 * window as f64)).sqrt()
}

fn garman_klass_vol(candles: &[Candle], window: usize) -> f64 {
    let n = candles.len();
    if n < window {
        return 0.0;
    }
    let c = 2.0 * std::f64::consts::LN_2 - 1.0;
    let start = n - window;
    let sum: f64 = candles[start..n]
        .iter()
        .map(|bar| {
            let hl = (bar.high / bar.low.max(1e-8)).ln().powi(2);
            let co = (bar.close / bar.open.max(1e-8)).ln().powi(2);
            0.5 * hl - c * co
        })
        .sum();
    (sum / window as f64).max(0.0).sqrt()
}

fn return_std(closes: &[f64], window: usize) -> f64 {
    if closes.len() <= window {
        return 0.0;
    }
    let start = closes.len() - window - 1;
    let returns: Vec<f64> = closes[start..]
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0].max(1e-8))
        .collect();
    std_dev(&returns)
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    Data::new(values.to_vec()).std_dev().unwrap_or(0.0)
}

fn zscore(value: f64, population: &[f64]) -> f64 {
    if population.len() < 2 {
        return 0.0;
    }
    let data = Data::new(population.to_vec());
    let mean = data.mean().unwrap_or(value);
    let std = data.std_dev().unwrap_or(0.0);
    if std <= 1e-12 {
        0.0
    } else {
        (value - mean) / std
    }
}

fn realized_range_percentile(highs: &[f64], lows: &[f64], window: usize) -> f64 {
    let n = highs.len();
    if n < window {
        return 50.0;
    }
    let start = n - window;
    let mut ranges: Vec<f64> = (start..n).map(|i| highs[i] - lows[i]).collect();
    let current = ranges[ranges.len() - 1];
    ranges.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = ranges.iter().position(|&r| r >= current).unwrap_or(ranges.len() - 1);
    100.0 * rank as f64 / (ranges.len() - 1).max(1) as f64
}

fn session_vwap_series(candles: &[Candle], session_open_ts: i64, tail: usize) -> Vec<f64> {
    let session: Vec<&Candle> = candles.iter().filter(|c| c.time >= session_open_ts).collect();
    if session.is_empty() {
        return vec![candles.last().map(|c| c.close).unwrap_or(0.0)];
    }
    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;
    let mut series = Vec::with_capacity(session.len());
    for bar in &session {
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        cum_pv += typical * bar.volume as f64;
        cum_vol += bar.volume as f64;
        series.push(cum_pv / cum_vol.max(1e-8));
    }
    let start = series.len().saturating_sub(tail);
    series[start..].to_vec()
}

fn opening_range_position(candles: &[Candle], session_open_ts: i64) -> f64 {
    let opening: Vec<&Candle> =
        candles.iter().filter(|c| c.time >= session_open_ts && c.time < session_open_ts + 900).collect();
    let Some(last) = candles.last() else { return 0.5 };
    if opening.is_empty() {
        return 0.5;
    }
    let high = opening.iter().fold(f64::MIN, |acc, c| acc.max(c.high));
    let low = opening.iter().fold(f64::MAX, |acc, c| acc.min(c.low));
    let range = (high - low).max(1e-8);
    ((last.close - low) / range).clamp(0.0, 1.0)
}

fn tick_direction_ratio(closes: &[f64], window: usize) -> f64 {
    let n = closes.len();
    if n <= window {
        return 0.0;
    }
    let start = n - window;
    let mut up = 0i32;
    let mut down = 0i32;
    for pair in closes[start - 1..].windows(2) {
        if pair[1] > pair[0] {
            up += 1;
        } else if pair[1] < pair[0] {
            down += 1;
        }
    }
    let total = (up + down).max(1) as f64;
    (up - down) as f64 / total
}

fn cumulative_signed_volume(candles: &[Candle], window: usize) -> f64 {
    let n = candles.len();
    let start = n.saturating_sub(window);
    candles[start..]
        .iter()
        .map(|c| {
            let sign = if c.close >= c.open { 1.0 } else { -1.0 };
            sign * c.volume as f64
        })
        .sum()
}

/// `(pcr, oi_skew, iv_skew, atm_iv_rank, institutional_activity_proxy)`.
/// Formulas grounded on the put/call-ratio and IV-skew/rank derivations of
/// an options-analytics engine in the reference pack: OI-weighted PCR,
/// put-minus-call average IV skew, and IV rank scaled against a [10,60]
/// vol band.
fn options_features(chain: &OptionChainSnapshot, spot: f64, strike_step: f64) -> (f64, f64, f64, f64, f64) {
    let mut put_oi = 0i64;
    let mut call_oi = 0i64;
    let mut put_iv_sum = 0.0;
    let mut put_iv_n = 0usize;
    let mut call_iv_sum = 0.0;
    let mut call_iv_n = 0usize;
    let mut institutional = 0.0;

    let atm_strike = (spot / strike_step).round() * strike_step;
    let near_band = 5.0 * strike_step;

    let mut atm_call_oi = 0i64;
    let mut atm_put_oi = 0i64;
    let mut atm_iv = 0.0;
    let mut atm_iv_n = 0usize;

    for q in &chain.quotes {
        institutional += q.oi as f64 * q.volume as f64;
        match q.option_type {
            OptionType::Pe => {
                put_oi += q.oi;
                put_iv_sum += q.iv;
                put_iv_n += 1;
                if (q.strike - atm_strike).abs() <= near_band {
                    atm_put_oi += q.oi;
                }
            }
            OptionType::Ce => {
                call_oi += q.oi;
                call_iv_sum += q.iv;
                call_iv_n += 1;
                if (q.strike - atm_strike).abs() <= near_band {
                    atm_call_oi += q.oi;
                }
            }
        }
        if (q.strike - atm_strike).abs() < f64::EPSILON {
            atm_iv += q.iv;
            atm_iv_n += 1;
        }
    }

    let pcr = if call_oi == 0 { 1.0 } else { put_oi as f64 / call_oi as f64 };
    let oi_skew = {
        let total = (atm_put_oi + atm_call_oi).max(1) as f64;
        (atm_put_oi - atm_call_oi) as f64 / total
    };
    let avg_put_iv = if put_iv_n > 0 { put_iv_sum / put_iv_n as f64 } else { 0.0 };
    let avg_call_iv = if call_iv_n > 0 { call_iv_sum / call_iv_n as f64 } else { 0.0 };
    let iv_skew = avg_put_iv - avg_call_iv;
    let atm_iv_value = if atm_iv_n > 0 { atm_iv / atm_iv_n as f64 } else { (avg_put_iv + avg_call_iv) / 2.0 };
    let atm_iv_rank = (((atm_iv_value - 0.10) / 0.50) * 100.0).clamp(0.0, 100.0);
    let institutional_activity_proxy = (institutional / 1_000_000.0).min(10.0);

    (pcr, oi_skew, iv_skew, atm_iv_rank, institutional_activity_proxy)
}
