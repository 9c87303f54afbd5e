use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

/// Output of the external gradient-boosted classifier for one feature
/// vector. `confidence` is always `100 · max(up_prob, down_prob)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub direction: Direction,
    pub confidence: f64,
    pub up_prob: f64,
    pub down_prob: f64,
}

impl Prediction {
    pub fn from_probs(up_prob: f64, down_prob: f64) -> Self {
        let direction = if up_prob >= down_prob { Direction::Buy } else { Direction::Sell };
        let confidence = 100.0 * up_prob.max(down_prob);
        Self { direction, confidence, up_prob, down_prob }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_follows_argmax() {
        let p = Prediction::from_probs(0.7, 0.3);
        assert_eq!(p.direction, Direction::Buy);
        assert_eq!(p.confidence, 70.0);
    }

    #[test]
    fn tie_favors_buy() {
        let p = Prediction::from_probs(0.5, 0.5);
        assert_eq!(p.direction, Direction::Buy);
        assert_eq!(p.confidence, 50.0);
    }
}
