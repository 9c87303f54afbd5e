use thiserror::Error;

/// Errors from the broker REST/websocket adapters.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("auth failed: {0}")]
    AuthFailed(String),
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the signal-generation pipeline (§7 of the contract).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("insufficient candle history: need {need}, have {have}")]
    InsufficientData { need: usize, have: usize },
    #[error("feature schema mismatch: model expects {expected} features, got {actual}")]
    FeatureSchemaMismatch { expected: usize, actual: usize },
    #[error("predictive model not loaded")]
    ModelNotLoaded,
    #[error("broker data unavailable: {0}")]
    DataUnavailable(String),
    #[error("auth refresh failed: {0}")]
    AuthFailed(String),
}

/// Errors from the durable metrics repository.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("snapshot not found: {0}")]
    NotFound(uuid::Uuid),
}
