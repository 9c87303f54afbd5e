//! REST adapter for the broker's historical-candle and option-chain
//! endpoints. Grounded on the reference backend's exchange-client wrapper
//! (a `reqwest::Client` plus a signed-request helper) but swaps HMAC
//! request signing for the bearer-token + client-id header scheme this
//! feed actually uses (§6).

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::sleep;

use crate::config::settings::Settings;
use crate::model::candle::Candle;
use crate::model::options::{OptionChainSnapshot, OptionQuote};
use crate::model::plan::OptionType;
use crate::utils::errors::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 3;
const TOKEN_VALIDITY_SECS: i64 = 24 * 3600;
const REFRESH_SKEW_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct BrokerToken {
    access_token: String,
    expires_at: i64,
}

pub struct BrokerClient {
    http: reqwest::Client,
    rest_base: String,
    client_id: String,
    api_key: String,
    api_secret: String,
    token: RwLock<Option<BrokerToken>>,
}

#[derive(Debug, Deserialize)]
struct HistoricalCandleRow {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

#[derive(Debug, Deserialize)]
struct OptionChainRow {
    strike: f64,
    option_type: String,
    ltp: f64,
    bid: f64,
    ask: f64,
    iv: f64,
    oi: i64,
    volume: i64,
    delta: f64,
}

#[derive(Debug, Deserialize)]
struct OptionChainResponse {
    spot: f64,
    rows: Vec<OptionChainRow>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl BrokerClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().expect("reqwest client"),
            rest_base: settings.broker_rest_base.clone(),
            client_id: settings.broker_client_id.clone(),
            api_key: settings.broker_api_key.clone(),
            api_secret: settings.broker_api_secret.clone(),
            token: RwLock::new(None),
        }
    }

    /// Proactively refreshes when within `REFRESH_SKEW_SECS` of expiry.
    pub async fn ensure_token(&self, now_ts: i64) -> Result<(), ApiError> {
        let needs_refresh = {
            let guard = self.token.read().await;
            match guard.as_ref() {
                Some(t) => now_ts >= t.expires_at - REFRESH_SKEW_SECS,
                None => true,
            }
        };
        if needs_refresh {
            self.refresh_token(now_ts).await?;
        }
        Ok(())
    }

    async fn refresh_token(&self, now_ts: i64) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(format!("{}/session/token", self.rest_base))
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "api_key": self.api_key,
                "api_secret": self.api_secret,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ApiError::AuthFailed(format!("token refresh returned {}", resp.status())));
        }
        let body: TokenResponse = resp.json().await?;
        let mut guard = self.token.write().await;
        *guard = Some(BrokerToken { access_token: body.access_token, expires_at: now_ts + TOKEN_VALIDITY_SECS });
        Ok(())
    }

    async fn access_token(&self) -> Option<String> {
        self.token.read().await.as_ref().map(|t| t.access_token.clone())
    }

    pub fn client_id_ref(&self) -> &str {
        &self.client_id
    }

    /// Ensures a live token and returns it for embedding in the feed's
    /// websocket connection URL (§6: credentials travel as query params,
    /// not headers, for the feed specifically).
    pub async fn access_token_for_feed(&self, now_ts: i64) -> Result<String, ApiError> {
        self.ensure_token(now_ts).await?;
        self.access_token().await.ok_or_else(|| ApiError::AuthFailed("no token after refresh".into()))
    }

    async fn get_with_retry(&self, url: &str, now_ts: i64) -> Result<reqwest::Response, ApiError> {
        self.ensure_token(now_ts).await?;
        let mut attempt = 0;
        let mut refreshed_on_401 = false;
        loop {
            let token = self.access_token().await.unwrap_or_default();
            let resp = self
                .http
                .get(url)
                .header("access-token", token)
                .header("client-id", &self.client_id)
                .send()
                .await;

            match resp {
                Ok(r) if r.status() == reqwest::StatusCode::UNAUTHORIZED && !refreshed_on_401 => {
                    refreshed_on_401 = true;
                    self.refresh_token(now_ts).await?;
                    continue;
                }
                Ok(r) if r.status().is_server_error() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    sleep(Duration::from_secs(1 << (attempt - 1))).await;
                    continue;
                }
                Ok(r) if r.status().is_success() => return Ok(r),
                Ok(r) => return Err(ApiError::Other(format!("broker returned {}", r.status()))),
                Err(_) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    sleep(Duration::from_secs(1 << (attempt - 1))).await;
                    continue;
                }
                Err(e) => return Err(ApiError::Http(e)),
            }
        }
    }

    pub async fn historical_candles(
        &self,
        symbol: &str,
        interval_seconds: i64,
        from_ts: i64,
        to_ts: i64,
        now_ts: i64,
    ) -> Result<Vec<Candle>, ApiError> {
        let url = format!(
            "{}/charts/history?symbol={}&interval={}&from={}&to={}",
            self.rest_base, symbol, interval_seconds, from_ts, to_ts
        );
        let rows: Vec<HistoricalCandleRow> = self.get_with_retry(&url, now_ts).await?.json().await?;
        Ok(rows
            .into_iter()
            .map(|r| Candle { time: r.time, open: r.open, high: r.high, low: r.low, close: r.close, volume: r.volume })
            .collect())
    }

    pub async fn option_chain(
        &self,
        underlying: &str,
        expiry: &str,
        now_ts: i64,
    ) -> Result<OptionChainSnapshot, ApiError> {
        let url = format!("{}/options/chain?underlying={}&expiry={}", self.rest_base, underlying, expiry);
        let body: OptionChainResponse = self.get_with_retry(&url, now_ts).await?.json().await?;
        let quotes = body
            .rows
            .into_iter()
            .filter_map(|r| {
                let option_type = match r.option_type.to_uppercase().as_str() {
                    "CE" => OptionType::Ce,
                    "PE" => OptionType::Pe,
                    _ => return None,
                };
                Some(OptionQuote {
                    strike: r.strike,
                    option_type,
                    ltp: r.ltp,
                    bid: r.bid,
                    ask: r.ask,
                    iv: r.iv,
                    oi: r.oi,
                    volume: r.volume,
                    delta: r.delta,
                })
            })
            .collect();
        Ok(OptionChainSnapshot {
            underlying: underlying.to_string(),
            expiry: expiry.to_string(),
            spot: body.spot,
            fetched_at: now_ts,
            quotes,
        })
    }
}
