pub mod candle;
pub mod condition;
pub mod features;
pub mod matrix;
pub mod options;
pub mod plan;
pub mod prediction;
pub mod quality;
pub mod snapshot;

pub use candle::{Candle, CandleBuffer};
pub use condition::MarketCondition;
pub use features::FeatureVector;
pub use options::{OptionChainSnapshot, OptionQuote};
pub use plan::{FilterResult, FilterStatus, OptionType, PlanAction, TradePlan};
pub use prediction::{Direction, Prediction};
pub use quality::SetupQuality;
pub use snapshot::{ActivePosition, Outcome, PositionStatus, Snapshot};
