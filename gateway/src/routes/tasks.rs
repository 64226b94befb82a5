use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use govcore::{AITask, FallbackStrategy, ModelIdentity, Priority};

use crate::state::SharedState;

/// Request body for `POST /tasks/execute`.
///
/// `candidates` names known model ids in priority order; the chosen
/// `strategy` decides how the orchestrator walks that list (spec.md §4.6).
#[derive(Debug, Deserialize)]
pub struct ExecuteTaskRequest {
    pub task_id: String,
    pub task_type: String,
    /// UTF-8 text payload. The resilience engine itself is payload-agnostic
    /// (`Vec<u8>`); this route accepts text for a minimal JSON surface.
    pub payload: String,
    #[serde(default)]
    pub priority: PriorityDto,
    pub candidates: Vec<String>,
    #[serde(default)]
    pub strategy: StrategyDto,
    /// Only consulted by `strategy: "parallel"` (spec.md §4.6): the first
    /// `min(max_concurrent, candidates.len())` candidates are raced.
    /// Unset races every candidate.
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityDto {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl From<PriorityDto> for Priority {
    fn from(p: PriorityDto) -> Self {
        match p {
            PriorityDto::Low => Priority::Low,
            PriorityDto::Normal => Priority::Normal,
            PriorityDto::High => Priority::High,
            PriorityDto::Critical => Priority::Critical,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyDto {
    #[default]
    Sequential,
    Parallel,
    Weighted,
    Random,
}

impl From<StrategyDto> for FallbackStrategy {
    fn from(s: StrategyDto) -> Self {
        match s {
            StrategyDto::Sequential => FallbackStrategy::Sequential,
            StrategyDto::Parallel => FallbackStrategy::Parallel,
            StrategyDto::Weighted => FallbackStrategy::Weighted,
            StrategyDto::Random => FallbackStrategy::Random,
        }
    }
}

/// Response body for `POST /tasks/execute`, mirroring
/// `ResilienceExecutionResult` (spec.md §4.6).
#[derive(Debug, Serialize)]
pub struct ExecuteTaskResponse {
    pub result: String,
    pub success: bool,
    pub model_used: String,
    pub execution_time_ms: u64,
    pub fallback_used: bool,
    pub retry_count: u32,
    pub circuit_breaker_triggered: bool,
    pub attempted_models: Vec<String>,
}

/// `POST /tasks/execute`
///
/// Runs `body` through the shared [`FallbackOrchestrator`](govcore::FallbackOrchestrator)
/// against the requested candidates, in the requested order/strategy.
pub async fn execute(
    State(state): State<SharedState>,
    Json(body): Json<ExecuteTaskRequest>,
) -> Result<(StatusCode, Json<ExecuteTaskResponse>), (StatusCode, String)> {
    let mut candidates: Vec<ModelIdentity> = Vec::with_capacity(body.candidates.len());
    for id in &body.candidates {
        match state.models.get(id) {
            Some(model) => candidates.push(model.clone()),
            None => return Err((StatusCode::BAD_REQUEST, format!("unknown model id: {id}"))),
        }
    }
    if candidates.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "candidates must not be empty".to_string()));
    }

    let task = AITask {
        id: body.task_id,
        task_type: body.task_type,
        payload: body.payload.into_bytes(),
        priority: body.priority.into(),
        timeout_ms: None,
        metadata: Default::default(),
    };

    let outcome = state
        .orchestrator
        .execute(&task, &candidates, body.strategy.into(), body.max_concurrent)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(ExecuteTaskResponse {
            result: String::from_utf8_lossy(&outcome.response.result).into_owned(),
            success: outcome.success,
            model_used: outcome.winning_model,
            execution_time_ms: outcome.execution_time_ms,
            fallback_used: outcome.fallback_used,
            retry_count: outcome.retry_count,
            circuit_breaker_triggered: outcome.circuit_breaker_triggered,
            attempted_models: outcome.attempted_models,
        }),
    ))
}
