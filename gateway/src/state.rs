//! Shared application state for the gateway's HTTP handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use govcore::{
    CircuitBreakerRegistry, FallbackOrchestrator, GovStorage, MetricsRegistry, MetricsStore,
    ModelIdentity, VotingSession,
};

/// Shared state held by the API and passed to request handlers via Axum's
/// `State` extractor.
///
/// One shared orchestration engine plus a `Mutex`-guarded collection the
/// HTTP layer mutates per request.
pub struct AppState {
    /// Fallback orchestrator wired to a fleet of HTTP model endpoints.
    pub orchestrator: FallbackOrchestrator,
    /// Known model endpoints, keyed by model id, resolved from config.
    pub models: HashMap<String, ModelIdentity>,
    /// Live voting sessions keyed by `minuteId`, created on first `/start`.
    pub sessions: Mutex<HashMap<String, Arc<VotingSession>>>,
    /// On-disk persistence root for chains, votes, and notifications.
    pub storage: GovStorage,
    /// Metrics registry shared between the resilience engine and the API.
    pub metrics: Arc<MetricsRegistry>,
    /// Breaker registry, exposed directly for the `/breakers` status route.
    pub breakers: Arc<CircuitBreakerRegistry>,
    /// Routing-weight metrics store, exposed for the `/breakers` route.
    pub model_metrics: Arc<MetricsStore>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
