//! Top-level configuration for a governance substrate instance.
//!
//! This module aggregates configuration for:
//!
//! - resilience parameters (circuit breaker, retry, fallback weighting),
//! - the HTTP model executor (per-model base URLs + request timeout),
//! - governance storage (on-disk root for chains/votes/notifications),
//! - metrics exporter (enable flag + listen address).
//!
//! The goal is a single `GovConfig` struct that higher-level binaries
//! (e.g. `main.rs`, the gateway) can construct from defaults, config
//! files, or environment variables as needed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::resilience::{CircuitBreakerConfig, FallbackWeightConfig, RetryConfig};

/// Configuration for the HTTP model executor.
///
/// A fleet of model endpoints, each resolved by id.
#[derive(Clone, Debug)]
pub struct ModelExecutorConfig {
    /// Per-model base URL, e.g. `{"gpt-4o": "http://127.0.0.1:8081"}`.
    pub endpoints: HashMap<String, String>,
    /// Request timeout applied to every model invocation.
    pub timeout: Duration,
}

impl Default for ModelExecutorConfig {
    fn default() -> Self {
        Self { endpoints: HashMap::new(), timeout: Duration::from_secs(10) }
    }
}

/// Configuration for governance on-disk storage.
#[derive(Clone, Debug)]
pub struct GovStorageConfig {
    /// Root directory under which per-topic chains, votes, and
    /// notifications are written (spec.md §6).
    pub root: String,
}

impl Default for GovStorageConfig {
    fn default() -> Self {
        Self { root: "gov/minutes".to_string() }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self { enabled: true, listen_addr: addr }
    }
}

/// Top-level configuration for a governance node.
///
/// This aggregates all the sub-configs needed to wire up a typical node:
///
/// - circuit breaker tuning (`breaker`),
/// - retry tuning (`retry`),
/// - fallback routing-weight tuning (`fallback_weight`),
/// - the HTTP model executor (`executor`),
/// - governance storage root (`storage`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct GovConfig {
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub fallback_weight: FallbackWeightConfig,
    pub executor: ModelExecutorConfig,
    pub storage: GovStorageConfig,
    pub metrics: MetricsConfig,
}
