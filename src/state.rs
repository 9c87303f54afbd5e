//! Shared application state handed to route handlers via `web::Data`,
//! grounded on the reference backend's pattern of injecting pools and
//! settings directly rather than one monolithic god-object — here
//! bundled into one struct because every route needs the same
//! per-symbol registry.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::AbortHandle;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::broker::BrokerClient;
use crate::config::settings::SymbolConfig;
use crate::db::MetricsRepository;
use crate::model::candle::CandleBuffer;
use crate::model::snapshot::Snapshot;
use crate::pipeline::{HistoricalLevels, PipelineState, Predictor, PreviousDaySummary};

/// Fan-out event for `/ws/stream` (§6): either a raw tick or an outcome
/// notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Tick { ltp: f64, ts: i64 },
    #[serde(rename = "outcome")]
    Outcome { outcome: String, direction: String, price: f64 },
}

/// Everything one symbol's feed/cadence/watcher tasks and HTTP handlers
/// share. One per configured symbol, tracked in `AppState::symbols`.
pub struct SymbolHandle {
    pub config: SymbolConfig,
    pub buffer: Arc<RwLock<CandleBuffer>>,
    pub pipeline_state: Arc<RwLock<PipelineState>>,
    pub predictor: Arc<RwLock<Predictor>>,
    pub levels: Arc<RwLock<HistoricalLevels>>,
    pub previous_day: Arc<RwLock<PreviousDaySummary>>,
    pub recent_snapshots: Arc<RwLock<Vec<Snapshot>>>,
    pub stream_tx: broadcast::Sender<StreamEvent>,
    /// Abort handle for this symbol's ingestor task, so a sustained feed
    /// failure can be restarted independently of the rest of the process.
    pub ingestor_abort: Arc<RwLock<Option<AbortHandle>>>,
}

impl SymbolHandle {
    pub fn new(config: SymbolConfig) -> Self {
        let (stream_tx, _rx) = broadcast::channel(256);
        Self {
            config,
            buffer: Arc::new(RwLock::new(CandleBuffer::new(crate::model::candle::MIN_BUFFER_CANDLES))),
            pipeline_state: Arc::new(RwLock::new(PipelineState::default())),
            predictor: Arc::new(RwLock::new(Predictor::new())),
            levels: Arc::new(RwLock::new(HistoricalLevels::default())),
            previous_day: Arc::new(RwLock::new(PreviousDaySummary { high: 0.0, low: 0.0, close: 0.0 })),
            recent_snapshots: Arc::new(RwLock::new(Vec::new())),
            stream_tx,
            ingestor_abort: Arc::new(RwLock::new(None)),
        }
    }
}

pub struct AppState {
    pub repo: Arc<MetricsRepository>,
    pub broker: Arc<BrokerClient>,
    pub symbols: DashMap<String, Arc<SymbolHandle>>,
}

impl AppState {
    pub fn symbol(&self, name: &str) -> Option<Arc<SymbolHandle>> {
        self.symbols.get(&name.to_uppercase()).map(|h| h.clone())
    }
}
