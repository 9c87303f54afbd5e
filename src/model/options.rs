use serde::{Deserialize, Serialize};

use super::plan::OptionType;

/// One strike/side row in an option-chain snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: f64,
    pub option_type: OptionType,
    pub ltp: f64,
    pub bid: f64,
    pub ask: f64,
    pub iv: f64,
    pub oi: i64,
    pub volume: i64,
    pub delta: f64,
}

impl OptionQuote {
    pub fn mid(&self) -> f64 {
        if self.bid > 0.0 && self.ask > 0.0 {
            (self.bid + self.ask) / 2.0
        } else {
            self.ltp
        }
    }
}

/// Full option-chain snapshot for one underlying/expiry pair, as fetched
/// from the broker's chain endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChainSnapshot {
    pub underlying: String,
    pub expiry: String,
    pub spot: f64,
    pub fetched_at: i64,
    pub quotes: Vec<OptionQuote>,
}

impl OptionChainSnapshot {
    pub fn quote_for(&self, strike: f64, option_type: OptionType) -> Option<&OptionQuote> {
        self.quotes
            .iter()
            .find(|q| (q.strike - strike).abs() < f64::EPSILON && q.option_type == option_type)
    }

    pub fn age_secs(&self, now: i64) -> i64 {
        (now - self.fetched_at).max(0)
    }

    /// Stale beyond 5 minutes per the feature-engineer contract.
    pub fn is_stale(&self, now: i64) -> bool {
        self.age_secs(now) > 300
    }
}
