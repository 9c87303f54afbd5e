use serde::{Deserialize, Serialize};

use super::features::FeatureVector;

/// Volatility regime, stable across a cadence window — derived purely from
/// ATR, realized range and volume dispersion, never from direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketCondition {
    Quiet,
    Normal,
    High,
    Extreme,
}

impl MarketCondition {
    /// Ties are broken toward the higher-volatility bucket, so this is
    /// evaluated EXTREME first, then HIGH, then NORMAL, then QUIET.
    pub fn classify(fv: &FeatureVector) -> Self {
        let atr = fv.atr_14;
        let range_pct = fv.realized_range_pct_78;
        let vol_of_vol_z = fv.vol_of_vol_zscore;
        let rsi_dispersion = (fv.rsi_14 - 50.0).abs() >= 20.0;

        if atr >= 45.0 || range_pct >= 95.0 || vol_of_vol_z >= 2.5 {
            return MarketCondition::Extreme;
        }
        if (22.0..45.0).contains(&atr) || (rsi_dispersion && fv.volume_zscore >= 1.5) {
            return MarketCondition::High;
        }
        if (13.0..22.0).contains(&atr) {
            return MarketCondition::Normal;
        }
        if atr < 13.0 && range_pct <= 25.0 {
            return MarketCondition::Quiet;
        }
        // Falls between the QUIET and NORMAL bands without meeting either
        // fully (e.g. low ATR but elevated realized range) — NORMAL is the
        // conservative default.
        MarketCondition::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv_with(atr: f64, range_pct: f64, vol_z: f64, rsi: f64, vol_zscore: f64) -> FeatureVector {
        let mut fv = FeatureVector::default_zeroed();
        fv.atr_14 = atr;
        fv.realized_range_pct_78 = range_pct;
        fv.vol_of_vol_zscore = vol_z;
        fv.rsi_14 = rsi;
        fv.volume_zscore = vol_zscore;
        fv
    }

    #[test]
    fn extreme_on_high_atr() {
        let fv = fv_with(50.0, 50.0, 0.0, 50.0, 0.0);
        assert_eq!(MarketCondition::classify(&fv), MarketCondition::Extreme);
    }

    #[test]
    fn extreme_on_volofvol_zscore_even_with_low_atr() {
        let fv = fv_with(10.0, 10.0, 3.0, 50.0, 0.0);
        assert_eq!(MarketCondition::classify(&fv), MarketCondition::Extreme);
    }

    #[test]
    fn high_on_atr_band() {
        let fv = fv_with(30.0, 50.0, 0.0, 50.0, 0.0);
        assert_eq!(MarketCondition::classify(&fv), MarketCondition::High);
    }

    #[test]
    fn high_on_rsi_dispersion_with_volume() {
        let fv = fv_with(15.0, 50.0, 0.0, 75.0, 2.0);
        assert_eq!(MarketCondition::classify(&fv), MarketCondition::High);
    }

    #[test]
    fn normal_band() {
        let fv = fv_with(15.0, 50.0, 0.0, 50.0, 0.0);
        assert_eq!(MarketCondition::classify(&fv), MarketCondition::Normal);
    }

    #[test]
    fn quiet_requires_both_low_atr_and_low_range() {
        let fv = fv_with(5.0, 10.0, 0.0, 50.0, 0.0);
        assert_eq!(MarketCondition::classify(&fv), MarketCondition::Quiet);
    }
}
