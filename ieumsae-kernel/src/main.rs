/**
 * IEUMSAE KERNEL - Entry point of the dashboard backend
 *
 * ROLE: Wires config, the live aggregator (connectivity, detection logs,
 * weather), the login gate, the query service and the HTTP API.
 *
 * LIFECYCLE: aggregator timers start before the listener binds and are torn
 * down after the server drains on Ctrl-C.
 */

mod aggregator;
mod auth;
mod config;
mod connectivity;
mod health;
mod http;
mod log_buffer;
mod models;
mod query;
mod state;
mod weather;

use crate::aggregator::LiveAggregator;
use crate::auth::SessionStore;
use crate::config::{load_config, ProbeMode};
use crate::connectivity::{ConnectivityProbe, SimulatedProbe, TcpProbe};
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::query::QueryService;
use crate::weather::WeatherFetcher;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ieumsae_kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting ieumsae kernel v{}", env!("CARGO_PKG_VERSION"));

    let cfg = load_config().await;

    let client = reqwest::Client::builder()
        .timeout(cfg.weather.timeout())
        .build()
        .context("building HTTP client")?;

    let probe: Arc<dyn ConnectivityProbe> = match cfg.probe.mode {
        ProbeMode::Simulated => Arc::new(SimulatedProbe),
        ProbeMode::Tcp => Arc::new(TcpProbe::new(cfg.probe.timeout())),
    };
    let fetcher = WeatherFetcher::from_config(&cfg.weather, client.clone());
    if cfg.weather.api_key.is_none() {
        tracing::warn!("no weather API key configured, weather will stay offline");
    }

    let aggregator = Arc::new(LiveAggregator::new(&cfg, probe, fetcher));
    aggregator.start();

    let app_state = AppState {
        aggregator: aggregator.clone(),
        sessions: SessionStore::new(cfg.auth.clone()),
        query: Arc::new(QueryService::new(cfg.query.clone(), client, cfg.camera_ids())),
        health_tracker: HealthTracker::new(),
    };
    let app = http::build_router(app_state);

    let listener = TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    info!(addr = %cfg.bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("serving HTTP")?;

    aggregator.shutdown().await;
    Ok(())
}
