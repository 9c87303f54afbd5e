//! `GET /api/candles?symbol=&interval=&days=` — recent candles for the
//! dashboard chart (§6).

use actix_web::{get, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::utils::HttpError;

#[derive(Debug, Deserialize)]
pub struct CandlesQuery {
    pub symbol: String,
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_interval() -> i64 {
    300
}

fn default_days() -> i64 {
    5
}

#[derive(Debug, Serialize)]
struct CandleOut {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

#[derive(Debug, Serialize)]
struct CandlesResponse {
    candles: Vec<CandleOut>,
    last_price: Option<f64>,
}

#[get("/candles")]
pub async fn candles(
    state: web::Data<AppState>,
    query: web::Query<CandlesQuery>,
) -> Result<impl Responder, HttpError> {
    let handle = state
        .symbol(&query.symbol)
        .ok_or_else(|| HttpError::not_found("unknown_symbol", format!("no such symbol: {}", query.symbol)))?;

    let bars_wanted = (query.days.max(1) * 86_400 / query.interval.max(1)) as usize;
    let buffer = handle.buffer.read().await;
    let tail = buffer.tail(bars_wanted);

    let candles = tail
        .iter()
        .map(|c| CandleOut { time: c.time, open: c.open, high: c.high, low: c.low, close: c.close })
        .collect();
    let last_price = tail.last().map(|c| c.close);

    Ok(HttpResponse::Ok().json(CandlesResponse { candles, last_price }))
}
