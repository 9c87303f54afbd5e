//! Per-symbol websocket tick ingestor. Grounded on the reference backend's
//! reconnecting feed task (connect, read loop, backoff-and-retry) adapted
//! to this feed's bar-aggregation and auth-refresh rules (§4.7, §5).

use std::sync::Arc;
use std::time::Duration;

use metrics::increment_counter;
use tokio::sync::{mpsc, RwLock};

use crate::broker::client::BrokerClient;
use crate::broker::ws::{self, Tick};
use crate::model::candle::CandleBuffer;
use crate::utils::errors::ApiError;

/// Minimum spacing between UI tick pushes per subscriber (§4.7).
pub const PUSH_THROTTLE: Duration = Duration::from_millis(100);

fn is_auth_error(err: &ApiError) -> bool {
    match err {
        ApiError::AuthFailed(_) => true,
        ApiError::WebSocket(_) | ApiError::Other(_) => {
            let msg = err.to_string();
            msg.contains("401") || msg.contains("403")
        }
        _ => false,
    }
}

/// Drives one symbol's connection for as long as the process runs.
/// Reconnects with the §4.7 backoff table; on an auth-shaped failure,
/// refreshes the broker token and retries once before resuming backoff.
pub async fn run(
    symbol: String,
    security_id: String,
    ws_host: String,
    broker: Arc<BrokerClient>,
    buffer: Arc<RwLock<CandleBuffer>>,
    tick_tx: mpsc::Sender<Tick>,
    now_ts: impl Fn() -> i64,
) {
    let mut attempt = 0usize;
    let mut refreshed_this_failure = false;

    loop {
        let token = broker.access_token_for_feed(now_ts()).await;
        let token = match token {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "ingestor could not obtain feed token");
                tokio::time::sleep(ws::backoff_delay(attempt)).await;
                attempt += 1;
                continue;
            }
        };

        let url = ws::feed_url(&ws_host, &token, broker.client_id_ref());
        let (local_tx, mut local_rx) = mpsc::channel::<Tick>(256);
        let security_ids = vec![security_id.clone()];

        let forward_buffer = buffer.clone();
        let forward_tx = tick_tx.clone();
        let forward_symbol: &'static str = Box::leak(symbol.clone().into_boxed_str());
        let forward = tokio::spawn(async move {
            while let Some(tick) = local_rx.recv().await {
                let advanced = forward_buffer.write().await.ingest_tick(tick.ts, tick.ltp);
                if advanced {
                    let _ = forward_tx.try_send(tick);
                } else {
                    increment_counter!("feed_late_ticks_dropped_total", "symbol" => forward_symbol);
                }
            }
        });

        let result = ws::run_once(&url, &security_ids, &local_tx).await;
        drop(local_tx);
        let _ = forward.await;

        match result {
            Ok(()) => {
                tracing::info!(symbol = %symbol, "feed socket closed cleanly, reconnecting");
                attempt = 0;
                refreshed_this_failure = false;
            }
            Err(e) if is_auth_error(&e) && !refreshed_this_failure => {
                tracing::warn!(symbol = %symbol, "feed auth rejected, refreshing token");
                increment_counter!("feed_auth_refresh_total", "symbol" => symbol.clone());
                refreshed_this_failure = true;
                if let Err(e) = broker.ensure_token(now_ts()).await {
                    tracing::warn!(symbol = %symbol, error = %e, "token refresh after auth failure also failed");
                }
                continue;
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "feed disconnected");
                increment_counter!("feed_reconnect_attempts_total", "symbol" => symbol.clone());
                refreshed_this_failure = false;
                tokio::time::sleep(ws::backoff_delay(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_401_is_treated_as_auth_error() {
        let err = ApiError::AuthFailed("token expired".into());
        assert!(is_auth_error(&err));
    }

    #[test]
    fn other_error_is_not_auth_error() {
        let err = ApiError::Other("server returned 503".into());
        assert!(!is_auth_error(&err));
    }
}
