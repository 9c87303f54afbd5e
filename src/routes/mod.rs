pub mod candles;
pub mod health;
pub mod levels;
pub mod stats;
pub mod stream;

use actix_web::{web, Scope};

/// Everything under `/api` (§6's dashboard HTTP surface), mirroring the
/// reference backend's one-scope-per-concern layout.
pub fn api_scope() -> Scope {
    web::scope("/api")
        .service(health::health)
        .service(candles::candles)
        .service(levels::levels)
        .service(stats::stats)
}

/// Registers the raw `/ws/stream` websocket upgrade, which can't live in
/// `api_scope` since it isn't an `actix_web::Scope`-compatible service.
pub fn configure_ws(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws/stream", web::get().to(stream::stream));
}
