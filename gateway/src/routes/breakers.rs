//! `GET /breakers` — per-model circuit breaker status and routing metrics.
//!
//! Read-only status surface over `CircuitBreakerRegistry::get_all_status`
//! and `MetricsStore::all_snapshots` (spec.md §4.4, §4.7).

use axum::{Json, extract::State};
use serde::Serialize;

use govcore::{CircuitBreakerState, FallbackWeightConfig, routing_weight};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct BreakerStatusDto {
    pub model_id: String,
    pub state: &'static str,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_failure_at_ms: Option<u64>,
    pub next_retry_at_ms: Option<u64>,
    pub avg_response_time_ms: f64,
    pub success_rate: f64,
    pub total_requests: u64,
    pub routing_weight: f64,
}

#[derive(Debug, Serialize)]
pub struct BreakersResponse {
    pub breakers: Vec<BreakerStatusDto>,
}

fn state_label(state: CircuitBreakerState) -> &'static str {
    match state {
        CircuitBreakerState::Closed => "closed",
        CircuitBreakerState::Open => "open",
        CircuitBreakerState::HalfOpen => "half-open",
    }
}

/// `GET /breakers`
pub async fn status(State(state): State<SharedState>) -> Json<BreakersResponse> {
    let weight_config = FallbackWeightConfig::default();
    let mut breakers: Vec<BreakerStatusDto> = state
        .breakers
        .get_all_status()
        .into_iter()
        .map(|(model_id, status)| {
            let metrics = state.model_metrics.snapshot(&model_id);
            BreakerStatusDto {
                model_id,
                state: state_label(status.state),
                consecutive_failures: status.consecutive_failures,
                consecutive_successes: status.consecutive_successes,
                last_failure_at_ms: status.last_failure_at_ms,
                next_retry_at_ms: status.next_retry_at_ms,
                avg_response_time_ms: metrics.avg_response_time_ms,
                success_rate: metrics.success_rate,
                total_requests: metrics.total_requests,
                routing_weight: routing_weight(&metrics, &weight_config),
            }
        })
        .collect();
    breakers.sort_by(|a, b| a.model_id.cmp(&b.model_id));
    Json(BreakersResponse { breakers })
}
