//! HTTP surface tests against an in-memory SQLite pool, so the suite
//! needs no external services.

use std::sync::Arc;

use actix_web::{test, web, App};
use dashmap::DashMap;
use sqlx::sqlite::SqlitePoolOptions;

use nifty_signal_engine::broker::BrokerClient;
use nifty_signal_engine::config::settings::{Settings, SymbolConfig};
use nifty_signal_engine::db::MetricsRepository;
use nifty_signal_engine::routes;
use nifty_signal_engine::state::{AppState, SymbolHandle};

fn test_settings() -> Settings {
    Settings {
        server_port: 0,
        database_url: "sqlite::memory:".into(),
        base_lots: 1,
        max_per_trade_loss: 2000.0,
        max_daily_loss: 6000.0,
        confidence_floor: 60.0,
        confidence_ceiling: 75.0,
        market_open: "09:15".into(),
        market_close: "15:30".into(),
        cadence_seconds: 900,
        level_validity_seconds: 900,
        retention_days: 30,
        broker_client_id: "test-client".into(),
        broker_api_key: "key".into(),
        broker_api_secret: "secret".into(),
        broker_ws_host: "example.invalid".into(),
        broker_rest_base: "https://example.invalid".into(),
        symbols: vec![SymbolConfig {
            symbol: "NIFTY".into(),
            security_id: "13".into(),
            lot_size: 65,
            strike_step: 50.0,
        }],
    }
}

async fn test_state() -> AppState {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.expect("sqlite pool");
    let repo = Arc::new(MetricsRepository::new(pool));
    repo.migrate().await.expect("migrate");

    let settings = test_settings();
    let broker = Arc::new(BrokerClient::new(&settings));

    let symbols = DashMap::new();
    for symbol_config in &settings.symbols {
        symbols.insert(symbol_config.symbol.clone(), Arc::new(SymbolHandle::new(symbol_config.clone())));
    }

    AppState { repo, broker, symbols }
}

#[actix_web::test]
async fn health_reports_ok() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).service(routes::api_scope())).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn candles_for_known_symbol_returns_empty_buffer() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).service(routes::api_scope())).await;

    let req = test::TestRequest::get().uri("/api/candles?symbol=NIFTY").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["candles"].as_array().unwrap().len(), 0);
    assert!(body["last_price"].is_null());
}

#[actix_web::test]
async fn candles_for_unknown_symbol_is_not_found() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).service(routes::api_scope())).await;

    let req = test::TestRequest::get().uri("/api/candles?symbol=DOWJONES").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["kind"], "unknown_symbol");
}

#[actix_web::test]
async fn levels_waits_when_no_active_position() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).service(routes::api_scope())).await;

    let req = test::TestRequest::get().uri("/api/levels?symbol=NIFTY").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["action"], "WAIT");
    assert!(body["plan"].is_null());
}

#[actix_web::test]
async fn stats_on_empty_repository_reports_zero_total() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).service(routes::api_scope())).await;

    let req = test::TestRequest::get().uri("/api/stats?days=30").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 0);
}
