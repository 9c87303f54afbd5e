use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dashmap::DashMap;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use nifty_signal_engine::broker::{BrokerClient, Tick};
use nifty_signal_engine::config::settings::Settings;
use nifty_signal_engine::db::MetricsRepository;
use nifty_signal_engine::feed::{ingestor, scheduler, watcher};
use nifty_signal_engine::middleware::metrics::Metrics;
use nifty_signal_engine::model::snapshot::{Outcome, PositionStatus};
use nifty_signal_engine::pipeline::PipelineInputs;
use nifty_signal_engine::routes;
use nifty_signal_engine::state::{AppState, StreamEvent, SymbolHandle};

fn init_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing();
    tracing::info!("starting nifty signal engine");

    let settings = Settings::new().unwrap_or_else(|e| {
        eprintln!("failed to load settings: {e}");
        std::process::exit(1);
    });
    let port = settings.server_port;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await
        .expect("sqlite pool");
    let repo = Arc::new(MetricsRepository::new(pool));
    repo.migrate().await.expect("repository migration");

    let broker = Arc::new(BrokerClient::new(&settings));

    let symbols = DashMap::new();
    for symbol_config in &settings.symbols {
        symbols.insert(symbol_config.symbol.clone(), Arc::new(SymbolHandle::new(symbol_config.clone())));
    }
    let app_state = AppState { repo: repo.clone(), broker: broker.clone(), symbols };

    for entry in app_state.symbols.iter() {
        let symbol = entry.key().clone();
        let handle = entry.value().clone();
        spawn_symbol_tasks(symbol, handle, settings.clone(), broker.clone(), repo.clone());
    }
    spawn_retention_task(repo.clone(), settings.retention_days);

    let data = web::Data::new(app_state);
    let settings_data = web::Data::new(settings);

    HttpServer::new(move || {
        App::new()
            .wrap(Metrics)
            .app_data(data.clone())
            .app_data(settings_data.clone())
            .service(routes::api_scope())
            .configure(routes::configure_ws)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

fn spawn_symbol_tasks(
    symbol: String,
    handle: Arc<SymbolHandle>,
    settings: Settings,
    broker: Arc<BrokerClient>,
    repo: Arc<MetricsRepository>,
) {
    let (tick_tx, mut ingestor_rx) = mpsc::channel::<Tick>(256);

    // Tick ingestor: aggregates the candle buffer and republishes ticks.
    // Wrapped as an abortable task so a sustained feed failure can be
    // restarted independently of the rest of the process.
    {
        let symbol = symbol.clone();
        let security_id = handle.config.security_id.clone();
        let ws_host = settings.broker_ws_host.clone();
        let broker = broker.clone();
        let buffer = handle.buffer.clone();
        let ingestor_abort = handle.ingestor_abort.clone();
        let (fut, abort) = futures::future::abortable(async move {
            ingestor::run(symbol, security_id, ws_host, broker, buffer, tick_tx, now_ts).await;
        });
        tokio::spawn(fut);
        tokio::spawn(async move {
            *ingestor_abort.write().await = Some(abort);
        });
    }

    // Tick fan-out + outcome watcher: every aggregated tick is republished
    // to dashboard subscribers and checked against the active plan.
    {
        let handle = handle.clone();
        let repo = repo.clone();
        let symbol = symbol.clone();
        tokio::spawn(async move {
            let mut watcher_state = watcher::WatcherState::new();
            while let Some(tick) = ingestor_rx.recv().await {
                let _ = handle.stream_tx.send(StreamEvent::Tick { ltp: tick.ltp, ts: tick.ts });

                let plan = {
                    let state = handle.pipeline_state.read().await;
                    state.active_position.as_ref().map(|p| p.plan.clone())
                };
                let Some(plan) = plan else { continue };
                let Some(outcome) = watcher_state.observe(&plan, tick.ltp) else { continue };

                let realized = watcher::realized_pl(&plan, outcome, handle.config.lot_size);
                if let Err(e) = repo_update_outcome(&repo, &handle, outcome, realized, tick.ts).await {
                    tracing::error!(symbol = %symbol, error = %e, "failed to persist outcome");
                }

                let _ = handle.stream_tx.send(StreamEvent::Outcome {
                    outcome: outcome_label(outcome).to_string(),
                    direction: format!("{:?}", plan.direction).to_uppercase(),
                    price: tick.ltp,
                });
            }
        });
    }

    // Cadence scheduler: runs the pipeline every `cadence_seconds` during
    // market hours, holding when the active position still applies.
    {
        let symbol = symbol.clone();
        let handle = handle.clone();
        let repo = repo.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(settings.cadence_seconds));
            loop {
                interval.tick().await;
                let now = now_ts();
                if !nifty_signal_engine::feed::is_market_open(now, &settings.market_open, &settings.market_close) {
                    continue;
                }
                run_cadence_tick(&symbol, &handle, &settings, &repo, now).await;
            }
        });
    }
}

const RETENTION_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// Enforces §3/§4.8's 30-day (configurable) retention by purging old
/// snapshots once a day.
fn spawn_retention_task(repo: Arc<MetricsRepository>, retention_days: i64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(RETENTION_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match repo.purge(retention_days, now_ts()).await {
                Ok(deleted) => tracing::info!(deleted, "retention sweep complete"),
                Err(e) => tracing::error!(error = %e, "retention sweep failed"),
            }
        }
    });
}

async fn run_cadence_tick(
    symbol: &str,
    handle: &Arc<SymbolHandle>,
    settings: &Settings,
    repo: &MetricsRepository,
    now: i64,
) {
    let candles = handle.buffer.read().await.as_slice().to_vec();
    let previous_day = *handle.previous_day.read().await;
    let levels = handle.levels.read().await.clone();
    let recent = handle.recent_snapshots.read().await.clone();
    let predictor = handle.predictor.read().await;

    if !predictor.is_ready() {
        tracing::warn!(symbol = %symbol, "cadence tick skipped, model not loaded");
        return;
    }

    let daily_realized_loss = handle.pipeline_state.read().await.daily_realized_pl.min(0.0).abs();
    let session = nifty_signal_engine::feed::session_window_for(now, &settings.market_open, &settings.market_close);

    let inputs = PipelineInputs {
        symbol,
        candles: &candles,
        previous_day,
        levels: &levels,
        option_chain: None,
        strike_step: handle.config.strike_step,
        lot_size: handle.config.lot_size,
        base_lots: settings.base_lots,
        max_per_trade_loss: settings.max_per_trade_loss,
        max_daily_loss: settings.max_daily_loss,
        confidence_floor: settings.confidence_floor,
        confidence_ceiling: settings.confidence_ceiling,
        now_ts: now,
        session,
        predictor: &predictor,
        recent_snapshots: &recent,
        daily_realized_loss,
    };

    if let Some(snapshot) =
        scheduler::tick(inputs, settings.level_validity_seconds as i64, &handle.pipeline_state, repo).await
    {
        let mut recent = handle.recent_snapshots.write().await;
        recent.push(snapshot);
        let overflow = recent.len().saturating_sub(50);
        recent.drain(0..overflow);
    }
}

async fn repo_update_outcome(
    repo: &MetricsRepository,
    handle: &Arc<SymbolHandle>,
    outcome: Outcome,
    realized_pl: f64,
    now_ts: i64,
) -> Result<(), nifty_signal_engine::utils::RepoError> {
    let snapshot_id = {
        let mut state = handle.pipeline_state.write().await;
        let id = state.active_position.as_ref().map(|p| p.snapshot_id);
        if let Some(pos) = state.active_position.as_mut() {
            pos.status = PositionStatus::Closed;
        }
        state.daily_realized_pl += realized_pl;
        id
    };
    if let Some(id) = snapshot_id {
        repo.update_outcome(id, outcome, Some(realized_pl), now_ts).await?;
    }
    Ok(())
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Win => "TARGET",
        Outcome::Loss => "SL",
        _ => "PENDING",
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
