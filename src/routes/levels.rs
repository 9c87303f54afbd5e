//! `GET /api/levels?symbol=` — the current trade plan or HOLD/WAIT
//! status (§6). Reads the scheduler's last-published active position;
//! it never re-runs the pipeline inline with an HTTP request.

use actix_web::{get, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::model::snapshot::PositionStatus;
use crate::model::TradePlan;
use crate::state::AppState;
use crate::utils::HttpError;

#[derive(Debug, Deserialize)]
pub struct LevelsQuery {
    pub symbol: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum Action {
    Trade,
    Hold,
    Wait,
}

#[derive(Debug, Serialize)]
struct LevelsResponse {
    action: Action,
    position_status: Option<&'static str>,
    plan: Option<TradePlan>,
}

#[get("/levels")]
pub async fn levels(state: web::Data<AppState>, query: web::Query<LevelsQuery>) -> Result<impl Responder, HttpError> {
    let handle = state
        .symbol(&query.symbol)
        .ok_or_else(|| HttpError::not_found("unknown_symbol", format!("no such symbol: {}", query.symbol)))?;

    let pipeline_state = handle.pipeline_state.read().await;
    let response = match &pipeline_state.active_position {
        Some(pos) => {
            let (action, position_status) = match pos.status {
                PositionStatus::Open => (Action::Trade, "OPEN"),
                PositionStatus::Hold => (Action::Hold, "HOLD"),
                PositionStatus::Closed => (Action::Wait, "CLOSED"),
            };
            LevelsResponse { action, position_status: Some(position_status), plan: Some(pos.plan.clone()) }
        }
        None => LevelsResponse { action: Action::Wait, position_status: None, plan: None },
    };

    Ok(HttpResponse::Ok().json(response))
}
