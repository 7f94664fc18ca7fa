// =============================================================================
// Liquidity Pulse — Main Entry Point
// =============================================================================
//
// Wires the data providers, the analytical engines and the orchestrator
// together, then serves the REST API until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod engine;
mod engines;
mod orchestrator;
mod providers;
mod runtime_config;
mod signals;
mod stats;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::engine::{Engine, EngineRegistry};
use crate::orchestrator::OrchestrationError;
use crate::providers::{
    BinanceMarketClient, EconomicDataSource, ExchangeDataSource, FredClient, RateLimitTracker,
};
use crate::runtime_config::{RuntimeConfig, DEFAULT_CONFIG_PATH};

/// Binance request weight resets every minute.
const WEIGHT_RESET_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Liquidity Pulse starting up");

    let config_path =
        std::env::var("PULSE_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();

    // ── 2. Providers ─────────────────────────────────────────────────────
    let rate_limit = Arc::new(RateLimitTracker::new());
    let exchange: Arc<dyn ExchangeDataSource> = Arc::new(
        BinanceMarketClient::new(
            config.binance_spot_base_url.clone(),
            config.binance_futures_base_url.clone(),
            Arc::clone(&rate_limit),
        )
        .context("failed to build Binance client")?,
    );

    let fred_key = std::env::var("FRED_API_KEY").ok();
    if fred_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        warn!("FRED_API_KEY not set; macro engines will serve degraded data");
    }
    let economic: Arc<dyn EconomicDataSource> = Arc::new(
        FredClient::new(fred_key, config.fred_base_url.clone())
            .context("failed to build FRED client")?,
    );

    // ── 3. Engines ───────────────────────────────────────────────────────
    let registry = Arc::new(EngineRegistry::new());
    for engine in engines::build_engines(economic, exchange, &config.symbol) {
        let id = engine.id().to_string();
        if !config.is_enabled(&id) {
            info!(engine_id = %id, "engine disabled by config");
            continue;
        }
        registry
            .register(engine, config.engine_config(&id))
            .with_context(|| format!("failed to register engine '{id}'"))?;
    }
    info!(count = registry.len(), symbol = %config.symbol, "engines registered");

    let bind_addr = config.bind_addr.clone();
    let interval = config.orchestration_interval();
    let state = Arc::new(AppState::new(config, registry).with_rate_limit(Arc::clone(&rate_limit)));

    // ── 4. Rate-limit window reset ───────────────────────────────────────
    let reset_tracker = Arc::clone(&rate_limit);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(WEIGHT_RESET_INTERVAL);
        loop {
            ticker.tick().await;
            reset_tracker.reset_1m_weight();
        }
    });

    // ── 5. Scheduled orchestration ───────────────────────────────────────
    match interval {
        Some(period) => {
            let loop_state = Arc::clone(&state);
            tokio::spawn(async move {
                info!(interval_secs = period.as_secs(), "orchestration loop starting");
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    match loop_state.run_orchestration(false).await {
                        Ok(_) | Err(OrchestrationError::Busy) => {}
                        Err(e) => error!(error = %e, "scheduled orchestration failed"),
                    }
                }
            });
        }
        None => info!("scheduled orchestration disabled; trigger via API"),
    }

    // ── 6. API server ────────────────────────────────────────────────────
    let app = api::rest::router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    // ── 7. Shutdown ──────────────────────────────────────────────────────
    state.shutdown();

    if let Err(e) = state.runtime_config.read().save(&config_path) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Liquidity Pulse shut down complete.");
    Ok(())
}
