//! Market-feed websocket adapter. Grounded on the reference backend's
//! private-WS client (`connect_async` + `SinkExt`/`StreamExt` read loop),
//! adapted to this feed's query-param auth and ticker-packet shape
//! instead of a JSON login operation.

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tokio_tungstenite::connect_async;
use tungstenite::Message;

use crate::utils::errors::ApiError;

pub const TICKER_SUBSCRIPTION_CODE: u8 = 15;
const RECONNECT_BACKOFF_SECS: [u64; 6] = [1, 2, 4, 8, 16, 30];
const IDLE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub security_id: i64,
    pub ltp: f64,
    pub ts: i64,
}

#[derive(Debug, Deserialize)]
struct RawTick {
    #[serde(rename = "securityId")]
    security_id: i64,
    ltp: f64,
    ts: i64,
}

pub fn feed_url(host: &str, token: &str, client_id: &str) -> String {
    format!("wss://{host}?version=2&token={token}&clientId={client_id}&authType=2")
}

/// Connects once, subscribes the given security IDs at ticker depth, and
/// forwards decoded ticks until the socket closes or the idle timeout
/// fires. Returns so the caller's reconnect loop can apply backoff.
pub async fn run_once(
    url: &str,
    security_ids: &[String],
    out: &Sender<Tick>,
) -> Result<(), ApiError> {
    let (mut ws, _) = connect_async(url).await?;

    let subscribe = serde_json::json!({
        "securities": security_ids
            .iter()
            .map(|id| serde_json::json!({
                "security_id": id,
                "exchange_segment": "NSE_FO",
                "subscription_code": TICKER_SUBSCRIPTION_CODE,
            }))
            .collect::<Vec<_>>(),
    })
    .to_string();
    ws.send(Message::Text(subscribe.into())).await?;

    loop {
        let next = tokio::time::timeout(std::time::Duration::from_secs(IDLE_TIMEOUT_SECS), ws.next()).await;
        let msg = match next {
            Ok(Some(msg)) => msg?,
            Ok(None) => return Ok(()),
            Err(_) => return Err(ApiError::Other("websocket idle timeout".into())),
        };
        if let Message::Text(txt) = msg {
            if let Ok(raw) = serde_json::from_str::<RawTick>(&txt) {
                let tick = Tick { security_id: raw.security_id, ltp: raw.ltp, ts: raw.ts };
                if out.send(tick).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

/// Backoff delay for the given consecutive-failure count, with up to 25%
/// jitter, capped at the table's last entry.
pub fn backoff_delay(attempt: usize) -> std::time::Duration {
    let base = RECONNECT_BACKOFF_SECS[attempt.min(RECONNECT_BACKOFF_SECS.len() - 1)];
    let jitter_ms = rand::thread_rng().gen_range(0..(base * 250));
    std::time::Duration::from_millis(base * 1000 + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_embeds_credentials_as_query_params() {
        let url = feed_url("host.example.com", "JWT123", "client-9");
        assert!(url.starts_with("wss://host.example.com?"));
        assert!(url.contains("token=JWT123"));
        assert!(url.contains("clientId=client-9"));
        assert!(url.contains("authType=2"));
    }

    #[test]
    fn backoff_caps_at_table_length() {
        let d = backoff_delay(100);
        assert!(d.as_secs() >= 30);
        assert!(d.as_secs() < 38);
    }

    #[test]
    fn backoff_grows_with_attempt() {
        assert!(backoff_delay(0).as_millis() < backoff_delay(3).as_millis());
    }
}
