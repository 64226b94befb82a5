// gateway/src/main.rs

//! API gateway binary.
//!
//! Exposes `govcore`'s resilience engine and governance voting/audit chain
//! over HTTP:
//!
//! - `GET /health`
//! - `GET /models`
//! - `GET /breakers`
//! - `POST /tasks/execute`
//! - `POST /sessions/{minute}/start`
//! - `POST /sessions/{minute}/votes`
//! - `POST /sessions/{minute}/finalize`
//! - `GET /sessions/{minute}`
//!
//! It wires a `FallbackOrchestrator` over an `HttpModelExecutor` fleet, a
//! `CircuitBreakerRegistry`, a `GovStorage` root for on-disk chains, and a
//! Prometheus metrics exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;
use tokio::sync::Mutex;

use govcore::{
    CircuitBreakerRegistry, FallbackOrchestrator, GovConfig, GovStorage, HttpModelExecutor,
    MetricsRegistry, MetricsStore, StaticEndpointResolver, default_prng, run_prometheus_http_server,
    system_clock,
};

use config::{ApiConfig, ModelFleetConfig};
use routes::{breakers, health, models, sessions, tasks};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "govcore_gateway=info,govcore=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::default();
    let gov_cfg = GovConfig::default();
    let fleet_cfg = ModelFleetConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if gov_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = gov_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Resilience engine: breakers, routing metrics, HTTP executor, fallback
    // ---------------------------

    let breakers = Arc::new(CircuitBreakerRegistry::new(gov_cfg.breaker.clone()));
    let model_metrics = Arc::new(MetricsStore::new());

    let resolver = StaticEndpointResolver::new(fleet_cfg.endpoints.clone());
    let executor = HttpModelExecutor::new(resolver, gov_cfg.executor.timeout)
        .map_err(|e| format!("failed to build HTTP model executor: {e}"))?;

    let orchestrator = FallbackOrchestrator::new(
        Arc::new(executor),
        breakers.clone(),
        model_metrics.clone(),
        gov_cfg.retry.clone(),
        gov_cfg.fallback_weight,
        default_prng(),
        system_clock(),
    );

    let models: HashMap<String, govcore::ModelIdentity> =
        fleet_cfg.models.into_iter().map(|m| (m.id.clone(), m)).collect();

    // ---------------------------
    // Governance storage
    // ---------------------------

    let storage = GovStorage::new(gov_cfg.storage.root.clone());

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        orchestrator,
        models,
        sessions: Mutex::new(HashMap::new()),
        storage,
        metrics: metrics.clone(),
        breakers,
        model_metrics,
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/models", get(models::list))
        .route("/breakers", get(breakers::status))
        .route("/tasks/execute", post(tasks::execute))
        .route("/sessions/{minute}/start", post(sessions::start))
        .route("/sessions/{minute}/votes", post(sessions::submit_vote))
        .route("/sessions/{minute}/finalize", post(sessions::finalize))
        .route("/sessions/{minute}", get(sessions::get))
        .with_state(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
