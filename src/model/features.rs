use serde::{Deserialize, Serialize};

/// Number of named slots in the feature vector. Fixed: adding or removing a
/// feature is a breaking change that requires model retraining.
pub const FEATURE_COUNT: usize = 74;

/// The ABI between the feature engineer, the predictor and the metrics
/// repository: a fixed-schema, named numeric record. Field order below is
/// the canonical order used by [`FeatureVector::as_array`] and
/// [`FeatureVector::names`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    // --- trend/momentum (14) ---
    pub ema_5: f64,
    pub ema_12: f64,
    pub ema_20: f64,
    pub ema_50: f64,
    pub ema_200: f64,
    pub rsi_14: f64,
    pub rsi_5: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub adx: f64,
    pub ema_5_slope: f64,
    pub ema_20_slope: f64,
    pub trend_strength: f64,

    // --- volatility (8) ---
    pub atr_14: f64,
    pub parkinson_vol_20: f64,
    pub garman_klass_vol: f64,
    pub return_std_5: f64,
    pub return_std_20: f64,
    pub vol_of_vol_20: f64,
    pub vol_of_vol_zscore: f64,
    pub realized_range_pct_78: f64,

    // --- CPR (6) ---
    pub cpr_pivot: f64,
    pub cpr_tc: f64,
    pub cpr_bc: f64,
    pub cpr_width: f64,
    pub dist_close_to_pivot_atr: f64,
    pub dist_close_to_band_atr: f64,

    // --- VWAP (3) ---
    pub vwap: f64,
    pub dist_close_vwap_atr: f64,
    pub vwap_slope: f64,

    // --- support/resistance (8) ---
    pub nearest_resistance: f64,
    pub nearest_support: f64,
    pub dist_to_resistance_pts: f64,
    pub dist_to_support_pts: f64,
    pub dist_to_resistance_atr: f64,
    pub dist_to_support_atr: f64,
    pub resistance_touch_count: f64,
    pub support_touch_count: f64,

    // --- microstructure (10) ---
    pub tick_direction_ratio: f64,
    pub order_flow_imbalance: f64,
    pub upper_wick_ratio: f64,
    pub lower_wick_ratio: f64,
    pub body_ratio: f64,
    pub gap_from_prev_close: f64,
    pub opening_range_position: f64,
    pub volume_zscore: f64,
    pub cumulative_signed_volume: f64,
    pub realized_range_last_bar: f64,

    // --- options-derived (5) ---
    pub pcr: f64,
    pub oi_skew: f64,
    pub iv_skew: f64,
    pub atm_iv_rank: f64,
    pub institutional_activity_proxy: f64,

    // --- time (4) ---
    pub hour: f64,
    pub minute: f64,
    pub minute_of_day: f64,
    pub market_phase: f64,

    // --- aggregate scores (16) ---
    pub l1_structure: f64,
    pub l2_options: f64,
    pub l3_technical: f64,
    pub l4_blocking: f64,
    pub l5_multi_timeframe: f64,
    pub quality_weighted_sum: f64,
    pub structural_break_flag: f64,
    pub failure_window_flag: f64,
    pub l1_trend_component: f64,
    pub l1_volume_component: f64,
    pub l2_pcr_component: f64,
    pub l2_iv_component: f64,
    pub l3_momentum_component: f64,
    pub l3_volatility_component: f64,
    pub l4_risk_component: f64,
    pub l5_alignment_component: f64,

    /// Side metadata: true when the options snapshot used was stale
    /// (older than 5 minutes) and sentinel values were substituted.
    #[serde(default)]
    pub feature_stale: bool,
}

/// Market phase encoding used by the `market_phase` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketPhase {
    Open,
    Mid,
    Close,
}

impl MarketPhase {
    pub fn as_f64(self) -> f64 {
        match self {
            MarketPhase::Open => 0.0,
            MarketPhase::Mid => 1.0,
            MarketPhase::Close => 2.0,
        }
    }
}

macro_rules! feature_names {
    ($($field:ident),+ $(,)?) => {
        pub const FEATURE_NAMES: [&'static str; FEATURE_COUNT] = [
            $(stringify!($field)),+
        ];

        impl FeatureVector {
            /// Values in the canonical schema order, ready for model input.
            pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
                [$(self.$field),+]
            }
        }
    };
}

feature_names!(
    ema_5, ema_12, ema_20, ema_50, ema_200, rsi_14, rsi_5, macd_line, macd_signal, macd_hist, adx,
    ema_5_slope, ema_20_slope, trend_strength,
    atr_14, parkinson_vol_20, garman_klass_vol, return_std_5, return_std_20, vol_of_vol_20,
    vol_of_vol_zscore, realized_range_pct_78,
    cpr_pivot, cpr_tc, cpr_bc, cpr_width, dist_close_to_pivot_atr, dist_close_to_band_atr,
    vwap, dist_close_vwap_atr, vwap_slope,
    nearest_resistance, nearest_support, dist_to_resistance_pts, dist_to_support_pts,
    dist_to_resistance_atr, dist_to_support_atr, resistance_touch_count, support_touch_count,
    tick_direction_ratio, order_flow_imbalance, upper_wick_ratio, lower_wick_ratio, body_ratio,
    gap_from_prev_close, opening_range_position, volume_zscore, cumulative_signed_volume,
    realized_range_last_bar,
    pcr, oi_skew, iv_skew, atm_iv_rank, institutional_activity_proxy,
    hour, minute, minute_of_day, market_phase,
    l1_structure, l2_options, l3_technical, l4_blocking, l5_multi_timeframe, quality_weighted_sum,
    structural_break_flag, failure_window_flag, l1_trend_component, l1_volume_component,
    l2_pcr_component, l2_iv_component, l3_momentum_component, l3_volatility_component,
    l4_risk_component, l5_alignment_component,
);

impl FeatureVector {
    /// No NaN or infinity anywhere in the schema — the invariant every
    /// producer of a `FeatureVector` must uphold.
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }
}

impl FeatureVector {
    /// All-zero vector, useful as a test fixture or a sentinel baseline.
    pub fn default_zeroed() -> Self {
        Self {
            ema_5: 0.0, ema_12: 0.0, ema_20: 0.0, ema_50: 0.0, ema_200: 0.0,
            rsi_14: 0.0, rsi_5: 0.0, macd_line: 0.0, macd_signal: 0.0, macd_hist: 0.0, adx: 0.0,
            ema_5_slope: 0.0, ema_20_slope: 0.0, trend_strength: 0.0,
            atr_14: 0.0, parkinson_vol_20: 0.0, garman_klass_vol: 0.0, return_std_5: 0.0,
            return_std_20: 0.0, vol_of_vol_20: 0.0, vol_of_vol_zscore: 0.0,
            realized_range_pct_78: 0.0,
            cpr_pivot: 0.0, cpr_tc: 0.0, cpr_bc: 0.0, cpr_width: 0.0,
            dist_close_to_pivot_atr: 0.0, dist_close_to_band_atr: 0.0,
            vwap: 0.0, dist_close_vwap_atr: 0.0, vwap_slope: 0.0,
            nearest_resistance: 0.0, nearest_support: 0.0, dist_to_resistance_pts: 0.0,
            dist_to_support_pts: 0.0, dist_to_resistance_atr: 0.0, dist_to_support_atr: 0.0,
            resistance_touch_count: 0.0, support_touch_count: 0.0,
            tick_direction_ratio: 0.0, order_flow_imbalance: 0.0, upper_wick_ratio: 0.0,
            lower_wick_ratio: 0.0, body_ratio: 0.0, gap_from_prev_close: 0.0,
            opening_range_position: 0.0, volume_zscore: 0.0, cumulative_signed_volume: 0.0,
            realized_range_last_bar: 0.0,
            pcr: 0.0, oi_skew: 0.0, iv_skew: 0.0, atm_iv_rank: 0.0,
            institutional_activity_proxy: 0.0,
            hour: 0.0, minute: 0.0, minute_of_day: 0.0, market_phase: 0.0,
            l1_structure: 0.0, l2_options: 0.0, l3_technical: 0.0, l4_blocking: 0.0,
            l5_multi_timeframe: 0.0, quality_weighted_sum: 0.0, structural_break_flag: 0.0,
            failure_window_flag: 0.0, l1_trend_component: 0.0, l1_volume_component: 0.0,
            l2_pcr_component: 0.0, l2_iv_component: 0.0, l3_momentum_component: 0.0,
            l3_volatility_component: 0.0, l4_risk_component: 0.0, l5_alignment_component: 0.0,
            feature_stale: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_74_named_slots() {
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        assert_eq!(FEATURE_COUNT, 74);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FEATURE_COUNT);
    }

    #[test]
    fn as_array_matches_field_count() {
        let fv = FeatureVector::default_zeroed();
        assert_eq!(fv.as_array().len(), FEATURE_COUNT);
        assert!(fv.is_finite());
    }
}
