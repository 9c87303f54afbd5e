use serde::{Deserialize, Serialize};

use super::features::FeatureVector;

/// Bucketed strength of a setup, derived from the weighted sum of the five
/// layer scores the feature engineer already computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupQuality {
    Weak,
    Moderate,
    Strong,
    Excellent,
}

impl SetupQuality {
    /// `Q = 0.25·L1 + 0.20·L2 + 0.20·L3 + 0.20·L4 + 0.15·L5`.
    pub fn weighted_sum(fv: &FeatureVector) -> f64 {
        0.25 * fv.l1_structure
            + 0.20 * fv.l2_options
            + 0.20 * fv.l3_technical
            + 0.20 * fv.l4_blocking
            + 0.15 * fv.l5_multi_timeframe
    }

    pub fn score(fv: &FeatureVector) -> Self {
        let q = Self::weighted_sum(fv);
        if q < 0.35 {
            SetupQuality::Weak
        } else if q < 0.55 {
            SetupQuality::Moderate
        } else if q < 0.75 {
            SetupQuality::Strong
        } else {
            SetupQuality::Excellent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv_with_layers(l1: f64, l2: f64, l3: f64, l4: f64, l5: f64) -> FeatureVector {
        let mut fv = FeatureVector::default_zeroed();
        fv.l1_structure = l1;
        fv.l2_options = l2;
        fv.l3_technical = l3;
        fv.l4_blocking = l4;
        fv.l5_multi_timeframe = l5;
        fv
    }

    #[test]
    fn weak_below_035() {
        let fv = fv_with_layers(0.1, 0.1, 0.1, 0.1, 0.1);
        assert_eq!(SetupQuality::score(&fv), SetupQuality::Weak);
    }

    #[test]
    fn excellent_at_or_above_075() {
        let fv = fv_with_layers(1.0, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(SetupQuality::weighted_sum(&fv), 1.0);
        assert_eq!(SetupQuality::score(&fv), SetupQuality::Excellent);
    }

    #[test]
    fn bucket_boundaries_are_half_open() {
        let fv = fv_with_layers(0.35, 0.35, 0.35, 0.35, 0.35);
        assert_eq!(SetupQuality::score(&fv), SetupQuality::Moderate);
    }
}
