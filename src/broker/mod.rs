pub mod client;
pub mod ws;

pub use client::BrokerClient;
pub use ws::{Tick, TICKER_SUBSCRIPTION_CODE};
