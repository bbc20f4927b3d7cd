// Framework bootstrap for the realtime server runtime.

use crate::domain::HistoryStore;
use crate::frameworks::config::{self, Settings};
use crate::frameworks::db;
use crate::interface_adapters::net::{history_query_handler, history_save_handler, ws_handler};
use crate::interface_adapters::state::{AppState, SystemClock};
use crate::interface_adapters::stores::{InMemoryHistoryStore, PostgresHistoryStore};
use crate::use_cases::run_world_ticker;

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::Notify;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/{user_id}", get(ws_handler))
        .route(
            "/history",
            get(history_query_handler).post(history_save_handler),
        )
        .with_state(state)
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_with_settings(listener, Settings::from_env()).await
}

pub async fn run_with_settings(listener: tokio::net::TcpListener, settings: Settings) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(&settings).await?;

    // The ticker is the only scheduled activity; it stops when the server does.
    let ticker_shutdown = Arc::new(Notify::new());
    let ticker = tokio::spawn(run_world_ticker(
        Arc::clone(&state.world),
        settings.world_tick_interval,
        Arc::clone(&ticker_shutdown),
    ));

    let app = app(state);
    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });

    ticker_shutdown.notify_one();
    if let Err(e) = ticker.await {
        tracing::warn!(error = %e, "world ticker task failed");
    }
    tracing::info!("server stopped");
    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::bind_addr(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

async fn build_state(settings: &Settings) -> Result<Arc<AppState>> {
    let history: Arc<dyn HistoryStore> = match settings.database_url.as_deref() {
        Some(database_url) => {
            let pool = db::connect_pool(database_url, settings.db_max_connections)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "failed to connect to database");
                    std::io::Error::other(format!("failed to connect to database: {e}"))
                })?;
            db::run_migrations(&pool).await.map_err(|e| {
                tracing::error!(error = %e, "failed to run migrations");
                std::io::Error::other(format!("failed to run migrations: {e}"))
            })?;
            tracing::info!("history persisted to postgres");
            Arc::new(PostgresHistoryStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; history kept in memory only");
            Arc::new(InMemoryHistoryStore::new())
        }
    };

    tracing::debug!(
        world_tick_interval_ms = settings.world_tick_interval.as_millis() as u64,
        egress_capacity = settings.egress_capacity,
        "server settings"
    );

    Ok(Arc::new(AppState::new(
        history,
        Arc::new(SystemClock),
        settings.egress_capacity,
    )))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        // Keep serving; without a signal handler there is no clean way to stop.
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
