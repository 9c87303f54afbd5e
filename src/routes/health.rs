//! `GET /api/health` — liveness probe, unchanged in shape from the
//! reference backend's health route.

use actix_web::{get, HttpResponse, Responder};
use serde_json::json;

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
