//! The resilience engine (spec.md §3-4): per-model circuit breakers,
//! retry with backoff, rolling performance metrics, and multi-strategy
//! fallback orchestration across a fleet of model endpoints.

pub mod breaker;
pub mod fallback;
pub mod metrics;
pub mod model;
pub mod retry;

pub use breaker::{
    BreakerEvent, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitBreakerState, CircuitBreakerStatus, ExecuteOutcome,
};
pub use fallback::{
    AllModelsFailedError, FallbackOrchestrator, FallbackStrategy, ModelExecutor, ResilienceExecutionResult,
};
pub use metrics::{FallbackWeightConfig, MetricsStore, ModelMetrics, routing_weight};
pub use model::{AIResponse, AITask, ModelIdentity, Priority, ResilienceError, ResilienceErrorCode};
pub use retry::{BatchOutcome, RetryConfig, RetryExhaustedError, execute_with_retry, run_batch_with_retry};
