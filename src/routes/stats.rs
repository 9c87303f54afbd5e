//! `GET /api/stats?days=` — repository win-rate and P/L summary (§4.8,
//! §6).

use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;

use crate::state::AppState;
use crate::utils::HttpError;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

#[get("/stats")]
pub async fn stats(state: web::Data<AppState>, query: web::Query<StatsQuery>) -> Result<impl Responder, HttpError> {
    let now_ts = chrono::Utc::now().timestamp();
    let stats = state
        .repo
        .stats(query.days, now_ts)
        .await
        .map_err(|e| HttpError::internal("repository_error", e.to_string()))?;

    Ok(HttpResponse::Ok().json(stats))
}
