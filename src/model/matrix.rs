use super::condition::MarketCondition;
use super::quality::SetupQuality;

/// One row of the 16-cell lookup table: the stop-loss/target band for a
/// `(MarketCondition, SetupQuality)` pair and the position-size multiplier
/// applied to `base_lots`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixRow {
    pub stop_loss_points: f64,
    pub target1_points: f64,
    pub target2_points: f64,
    pub position_multiplier: f64,
}

/// Deterministic lookup from market condition and setup quality to the
/// risk band used by the trading-level generator. Stop-loss values are the
/// midpoint of each condition's documented band.
pub fn lookup(condition: MarketCondition, quality: SetupQuality) -> MatrixRow {
    use MarketCondition::*;
    use SetupQuality::*;

    let (stop_loss_points, target1_points, target2_points) = match condition {
        Quiet => (9.0, 20.0, 35.0),
        Normal => (14.0, 40.0, 70.0),
        High => (24.5, 80.0, 150.0),
        Extreme => (47.5, 150.0, 300.0),
    };

    let position_multiplier = match (condition, quality) {
        (_, Weak) => 0.0,
        (Quiet, Moderate) => 0.0,
        (Extreme, Moderate) => 0.0,
        (Quiet, Strong) => 0.50,
        (Quiet, Excellent) => 1.00,
        (Normal, Moderate) => 0.50,
        (Normal, Strong) => 1.00,
        (Normal, Excellent) => 1.25,
        (High, Moderate) => 0.50,
        (High, Strong) => 1.00,
        (High, Excellent) => 1.25,
        (Extreme, Strong) => 0.50,
        (Extreme, Excellent) => 1.00,
    };

    MatrixRow { stop_loss_points, target1_points, target2_points, position_multiplier }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_is_always_zeroed_out() {
        for c in [MarketCondition::Quiet, MarketCondition::Normal, MarketCondition::High, MarketCondition::Extreme] {
            assert_eq!(lookup(c, SetupQuality::Weak).position_multiplier, 0.0);
        }
    }

    #[test]
    fn quiet_moderate_and_extreme_moderate_are_zeroed() {
        assert_eq!(lookup(MarketCondition::Quiet, SetupQuality::Moderate).position_multiplier, 0.0);
        assert_eq!(lookup(MarketCondition::Extreme, SetupQuality::Moderate).position_multiplier, 0.0);
    }

    #[test]
    fn normal_excellent_is_the_highest_multiplier() {
        let row = lookup(MarketCondition::Normal, SetupQuality::Excellent);
        assert_eq!(row.position_multiplier, 1.25);
    }

    #[test]
    fn extreme_band_has_widest_stop() {
        let row = lookup(MarketCondition::Extreme, SetupQuality::Excellent);
        assert_eq!(row.stop_loss_points, 47.5);
        assert_eq!(row.target2_points, 300.0);
    }
}
