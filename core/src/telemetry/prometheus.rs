//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed resilience/governance metrics,
//! and an async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Resilience- and governance-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the
/// resilience engine and the governance chain/session code.
#[derive(Clone)]
pub struct GovMetrics {
    /// Latency of a full fallback-orchestrated task execution, in seconds.
    pub task_execution_seconds: Histogram,
    /// Per-outcome count of model executor attempts (labeled `model_id`,
    /// `outcome` ∈ {success, failure, breaker_open, timeout}).
    pub model_attempts_total: IntCounterVec,
    /// Count of circuit breaker state transitions (labeled `model_id`,
    /// `to_state`).
    pub breaker_transitions_total: IntCounterVec,
    /// Count of retry exhaustion events.
    pub retry_exhausted_total: IntCounter,
    /// Count of blocks appended to any audit chain (labeled `topic_id`,
    /// `block_type`).
    pub blocks_appended_total: IntCounterVec,
    /// Count of chain integrity verification failures.
    pub chain_integrity_violations_total: IntCounter,
    /// Count of sessions finalized.
    pub sessions_finalized_total: IntCounter,
}

impl GovMetrics {
    /// Registers resilience/governance metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let task_execution_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "task_execution_seconds",
                "Time to execute an AITask through the fallback orchestrator, in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(task_execution_seconds.clone()))?;

        let model_attempts_total = IntCounterVec::new(
            Opts::new("model_attempts_total", "Total per-model executor attempts by outcome"),
            &["model_id", "outcome"],
        )?;
        registry.register(Box::new(model_attempts_total.clone()))?;

        let breaker_transitions_total = IntCounterVec::new(
            Opts::new("breaker_transitions_total", "Total circuit breaker state transitions"),
            &["model_id", "to_state"],
        )?;
        registry.register(Box::new(breaker_transitions_total.clone()))?;

        let retry_exhausted_total = IntCounter::with_opts(Opts::new(
            "retry_exhausted_total",
            "Total number of retry budgets exhausted across all models",
        ))?;
        registry.register(Box::new(retry_exhausted_total.clone()))?;

        let blocks_appended_total = IntCounterVec::new(
            Opts::new("blocks_appended_total", "Total blocks appended to audit chains"),
            &["topic_id", "block_type"],
        )?;
        registry.register(Box::new(blocks_appended_total.clone()))?;

        let chain_integrity_violations_total = IntCounter::with_opts(Opts::new(
            "chain_integrity_violations_total",
            "Total chain integrity violations observed across all verify_chain calls",
        ))?;
        registry.register(Box::new(chain_integrity_violations_total.clone()))?;

        let sessions_finalized_total = IntCounter::with_opts(Opts::new(
            "sessions_finalized_total",
            "Total voting sessions finalized",
        ))?;
        registry.register(Box::new(sessions_finalized_total.clone()))?;

        Ok(Self {
            task_execution_seconds,
            model_attempts_total,
            breaker_transitions_total,
            retry_exhausted_total,
            blocks_appended_total,
            chain_integrity_violations_total,
            sessions_finalized_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the resilience/governance
/// metrics. The main handle passed around the gateway; wrap in an `Arc`
/// and share across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub gov: GovMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the resilience/governance metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("govcore".to_string()), None)?;
        let gov = GovMetrics::register(&registry)?;
        Ok(Self { registry, gov })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "prometheus exporter listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!(error = %err, "prometheus HTTP server connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn gov_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = GovMetrics::register(&registry).expect("register metrics");

        metrics.task_execution_seconds.observe(0.123);
        metrics.model_attempts_total.with_label_values(&["model-a", "success"]).inc();
        metrics.breaker_transitions_total.with_label_values(&["model-a", "open"]).inc();
        metrics.retry_exhausted_total.inc();
        metrics.blocks_appended_total.with_label_values(&["BIP-01", "vote"]).inc();
        metrics.chain_integrity_violations_total.inc();
        metrics.sessions_finalized_total.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.gov.task_execution_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("task_execution_seconds"));
    }
}
