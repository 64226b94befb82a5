//! Metrics and instrumentation for the resilience and governance engines.
//!
//! This module defines Prometheus-compatible metrics covering circuit
//! breakers, retries, fallback executions, and the audit chain, and
//! exposes a small HTTP exporter that serves `/metrics` in Prometheus
//! text format.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use govcore::telemetry::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! // Spawn the HTTP exporter in the background:
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Elsewhere in the code:
//! registry.gov.task_execution_seconds.observe(duration_secs);
//! ```

pub mod prometheus;

pub use prometheus::{GovMetrics, MetricsRegistry, run_prometheus_http_server};
