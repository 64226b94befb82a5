//! Multi-strategy fallback orchestration across a fleet of models (C6).
//!
//! Combines [`CircuitBreakerRegistry`], [`execute_with_retry`], and
//! [`MetricsStore`] the way `consensus::validator::CombinedValidator`
//! combines several independent `BlockValidator`s into one decision — each
//! concern stays a separate, independently-testable module, and this file
//! only wires them together.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::clock::SharedClock;
use crate::resilience::breaker::{CircuitBreakerRegistry, ExecuteOutcome};
use crate::resilience::metrics::{FallbackWeightConfig, MetricsStore};
use crate::resilience::model::{AITask, AIResponse, ModelIdentity, ResilienceError, ResilienceErrorCode};
use crate::resilience::retry::{RetryConfig, execute_with_retry};
use crate::rng::SharedPrng;

/// How candidate models are ordered/selected for a task (spec.md §4.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FallbackStrategy {
    /// Try candidates in the order given, stopping at the first success.
    Sequential,
    /// Dispatch to all candidates at once, keep the first success.
    Parallel,
    /// Try candidates in order, biased by routing weight (best-first).
    Weighted,
    /// Try candidates in a random order.
    Random,
}

/// Trait object executing one [`AITask`] against one [`ModelIdentity`].
///
/// The HTTP implementation lives in `crate::executor`; this trait is the
/// seam the fallback orchestrator depends on instead, so tests can supply
/// an in-memory fake.
#[async_trait::async_trait]
pub trait ModelExecutor: Send + Sync {
    async fn execute(&self, model: &ModelIdentity, task: &AITask) -> Result<AIResponse, ResilienceError>;
}

/// Raised when every candidate model failed (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct AllModelsFailedError {
    pub task_id: String,
    pub attempted_models: Vec<String>,
    pub errors: Vec<String>,
}

impl fmt::Display for AllModelsFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all {} candidate model(s) failed for task {}: {}",
            self.attempted_models.len(),
            self.task_id,
            self.errors.join("; ")
        )
    }
}

impl std::error::Error for AllModelsFailedError {}

/// Result of a successful [`FallbackOrchestrator::execute`] call (spec.md
/// §4.6, `ResilienceExecutionResult`).
#[derive(Debug, Clone)]
pub struct ResilienceExecutionResult {
    pub response: AIResponse,
    pub success: bool,
    /// The model whose attempt produced `response`.
    pub winning_model: String,
    pub execution_time_ms: u64,
    /// `true` iff `winning_model` is not the first candidate tried, i.e.
    /// the primary did not win outright.
    pub fallback_used: bool,
    /// Total retry attempts spent across every candidate, winner included.
    pub retry_count: u32,
    /// Whether any candidate's breaker rejected a call during this
    /// execution (spec.md §4.6 step 4).
    pub circuit_breaker_triggered: bool,
    pub attempted_models: Vec<String>,
}

pub struct FallbackOrchestrator {
    executor: Arc<dyn ModelExecutor>,
    breakers: Arc<CircuitBreakerRegistry>,
    metrics: Arc<MetricsStore>,
    retry_config: RetryConfig,
    weight_config: FallbackWeightConfig,
    prng: SharedPrng,
    clock: SharedClock,
}

fn is_retryable(err: &ResilienceError) -> bool {
    err.recoverable
}

impl FallbackOrchestrator {
    pub fn new(
        executor: Arc<dyn ModelExecutor>,
        breakers: Arc<CircuitBreakerRegistry>,
        metrics: Arc<MetricsStore>,
        retry_config: RetryConfig,
        weight_config: FallbackWeightConfig,
        prng: SharedPrng,
        clock: SharedClock,
    ) -> Self {
        Self {
            executor,
            breakers,
            metrics,
            retry_config,
            weight_config,
            prng,
            clock,
        }
    }

    /// Orders `candidates` according to `strategy`. Does not mutate the
    /// input; callers that need the decided order for logging can inspect
    /// the returned `Vec`.
    fn order_candidates(&self, strategy: FallbackStrategy, candidates: &[ModelIdentity]) -> Vec<ModelIdentity> {
        let mut ordered: Vec<ModelIdentity> = candidates.to_vec();
        match strategy {
            FallbackStrategy::Sequential | FallbackStrategy::Parallel => ordered,
            FallbackStrategy::Random => {
                self.prng.shuffle(&mut ordered);
                ordered
            }
            FallbackStrategy::Weighted => {
                let mut weighted: Vec<(f64, ModelIdentity)> = ordered
                    .into_iter()
                    .map(|m| {
                        let w = self.metrics.weight_for(&m.id, &self.weight_config);
                        (w, m)
                    })
                    .collect();
                weighted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
                weighted.into_iter().map(|(_, m)| m).collect()
            }
        }
    }

    /// Runs one candidate through its circuit breaker with retry, recording
    /// the outcome in the metrics store. Returns the attempt count spent
    /// (attempts beyond the first count as retries) and whether the
    /// breaker rejected any attempt, alongside the executor's own result.
    async fn try_one(&self, model: &ModelIdentity, task: &AITask) -> (Result<AIResponse, ResilienceError>, u32, bool) {
        let breaker = self.breakers.get_or_create(&model.id);
        let executor = self.executor.clone();
        let model_owned = model.clone();
        let task_owned = task.clone();
        let last_attempt = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let breaker_triggered = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let last_attempt_for_closure = last_attempt.clone();
        let breaker_triggered_for_closure = breaker_triggered.clone();

        let outcome = execute_with_retry(
            &self.retry_config,
            &self.prng,
            is_retryable,
            move |attempt| {
                last_attempt_for_closure.store(attempt, std::sync::atomic::Ordering::SeqCst);
                let breaker = breaker.clone();
                let executor = executor.clone();
                let model_owned = model_owned.clone();
                let task_owned = task_owned.clone();
                let breaker_triggered = breaker_triggered_for_closure.clone();
                async move {
                    match breaker.execute(move || executor.execute(&model_owned, &task_owned)).await {
                        ExecuteOutcome::Rejected(e) => {
                            breaker_triggered.store(true, std::sync::atomic::Ordering::SeqCst);
                            Err(ResilienceError::new(ResilienceErrorCode::BreakerOpen, e.to_string()))
                        }
                        ExecuteOutcome::TimedOut => Err(ResilienceError::new(
                            ResilienceErrorCode::Timeout,
                            "model call exceeded the breaker timeout",
                        )),
                        ExecuteOutcome::Completed(inner) => inner,
                    }
                }
            },
        )
        .await;

        let retry_count = last_attempt.load(std::sync::atomic::Ordering::SeqCst).saturating_sub(1);
        let breaker_triggered = breaker_triggered.load(std::sync::atomic::Ordering::SeqCst);

        let start = self.clock.now_millis();
        let result = match outcome {
            Ok(response) => {
                self.metrics.record(&model.id, response.success, response.response_time_ms);
                Ok(response)
            }
            Err(exhausted) => {
                let elapsed = self.clock.now_millis().saturating_sub(start);
                self.metrics.record(&model.id, false, elapsed);
                Err(ResilienceError::new(ResilienceErrorCode::Unknown, exhausted.to_string())
                    .with_model(model.id.clone()))
            }
        };
        (result, retry_count, breaker_triggered)
    }

    /// Tries `candidates` in order, per `strategy`, stopping at the first
    /// success. `Parallel` races the first `min(max_concurrent, candidates
    /// .len())` candidates (spec.md §4.6) and keeps the first to resolve
    /// successfully, cancelling the rest. `max_concurrent` is ignored by
    /// every other strategy.
    pub async fn execute(
        &self,
        task: &AITask,
        candidates: &[ModelIdentity],
        strategy: FallbackStrategy,
        max_concurrent: Option<usize>,
    ) -> Result<ResilienceExecutionResult, AllModelsFailedError> {
        let ordered = self.order_candidates(strategy, candidates);

        if strategy == FallbackStrategy::Parallel {
            let limit = max_concurrent.unwrap_or(ordered.len()).max(1).min(ordered.len());
            let pool: Vec<ModelIdentity> = ordered.into_iter().take(limit).collect();
            let attempted_models: Vec<String> = pool.iter().map(|m| m.id.clone()).collect();
            return self.execute_parallel(task, &pool, attempted_models).await;
        }

        let attempted_models: Vec<String> = ordered.iter().map(|m| m.id.clone()).collect();

        let started_at = self.clock.now_millis();
        let primary_id = ordered.first().map(|m| m.id.clone());
        let mut errors = Vec::new();
        let mut retries_spent = 0u32;
        let mut any_breaker_triggered = false;
        for model in &ordered {
            let (outcome, retry_count, breaker_triggered) = self.try_one(model, task).await;
            retries_spent += retry_count;
            any_breaker_triggered |= breaker_triggered;
            match outcome {
                Ok(response) => {
                    let fallback_used = primary_id.as_deref() != Some(model.id.as_str());
                    tracing::info!(task_id = %task.id, winning_model = %model.id, fallback_used, "task execution succeeded");
                    return Ok(ResilienceExecutionResult {
                        success: response.success,
                        execution_time_ms: self.clock.now_millis().saturating_sub(started_at),
                        fallback_used,
                        retry_count: retries_spent,
                        circuit_breaker_triggered: any_breaker_triggered,
                        response,
                        winning_model: model.id.clone(),
                        attempted_models,
                    });
                }
                Err(err) => errors.push(format!("{}: {err}", model.id)),
            }
        }

        tracing::warn!(task_id = %task.id, attempted = ?attempted_models, "all candidate models failed");
        Err(AllModelsFailedError {
            task_id: task.id.clone(),
            attempted_models,
            errors,
        })
    }

    async fn execute_parallel(
        &self,
        task: &AITask,
        ordered: &[ModelIdentity],
        attempted_models: Vec<String>,
    ) -> Result<ResilienceExecutionResult, AllModelsFailedError> {
        type PendingFuture<'a> = Pin<
            Box<dyn Future<Output = (String, Result<AIResponse, ResilienceError>, u32, bool)> + Send + 'a>,
        >;

        let started_at = self.clock.now_millis();
        let primary_id = ordered.first().map(|m| m.id.clone());

        let mut futures: Vec<PendingFuture<'_>> = Vec::with_capacity(ordered.len());
        for model in ordered {
            let model = model.clone();
            let task = task.clone();
            let fut: PendingFuture<'_> = Box::pin(async move {
                let (result, retry_count, breaker_triggered) = self.try_one(&model, &task).await;
                (model.id, result, retry_count, breaker_triggered)
            });
            futures.push(fut);
        }

        let mut errors = Vec::new();
        let mut retries_spent = 0u32;
        let mut any_breaker_triggered = false;
        let mut pending = futures;
        while !pending.is_empty() {
            let (output, _index, remaining) = futures::future::select_all(pending).await;
            pending = remaining;
            let (model_id, result, retry_count, breaker_triggered) = output;
            retries_spent += retry_count;
            any_breaker_triggered |= breaker_triggered;
            match result {
                Ok(response) => {
                    let fallback_used = primary_id.as_deref() != Some(model_id.as_str());
                    tracing::info!(task_id = %task.id, winning_model = %model_id, fallback_used, "parallel task execution succeeded");
                    return Ok(ResilienceExecutionResult {
                        success: response.success,
                        execution_time_ms: self.clock.now_millis().saturating_sub(started_at),
                        fallback_used,
                        retry_count: retries_spent,
                        circuit_breaker_triggered: any_breaker_triggered,
                        response,
                        winning_model: model_id,
                        attempted_models,
                    });
                }
                Err(err) => errors.push(format!("{model_id}: {err}")),
            }
        }

        tracing::warn!(task_id = %task.id, attempted = ?attempted_models, "all candidate models failed (parallel)");
        Err(AllModelsFailedError {
            task_id: task.id.clone(),
            attempted_models,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::resilience::breaker::CircuitBreakerConfig;
    use crate::resilience::retry::RetryConfig;
    use crate::rng::DefaultPrng;
    use std::collections::HashMap;
    use tokio::time::Duration;

    /// A fake executor whose per-model behaviour (fail, or succeed after a
    /// delay) is fixed at construction, for deterministic strategy tests.
    struct ScriptedExecutor {
        behaviors: HashMap<String, ModelBehavior>,
    }

    #[derive(Clone)]
    enum ModelBehavior {
        AlwaysFails,
        SucceedsAfter(Duration),
    }

    #[async_trait::async_trait]
    impl ModelExecutor for ScriptedExecutor {
        async fn execute(&self, model: &ModelIdentity, task: &AITask) -> Result<AIResponse, ResilienceError> {
            match self.behaviors.get(&model.id) {
                Some(ModelBehavior::AlwaysFails) | None => Err(ResilienceError::new(
                    ResilienceErrorCode::Transient,
                    format!("{} is scripted to fail", model.id),
                )
                .with_model(model.id.clone())),
                Some(ModelBehavior::SucceedsAfter(delay)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(AIResponse {
                        task_id: task.id.clone(),
                        model_id: model.id.clone(),
                        result: b"ok".to_vec(),
                        success: true,
                        response_time_ms: delay.as_millis() as u64,
                        timestamp_ms: 0,
                        error: None,
                        metadata: HashMap::new(),
                    })
                }
            }
        }
    }

    fn model(id: &str) -> ModelIdentity {
        ModelIdentity::new(id, id, "test-provider")
    }

    fn orchestrator(behaviors: HashMap<String, ModelBehavior>) -> FallbackOrchestrator {
        let clock: SharedClock = Arc::new(FixedClock::new(0));
        FallbackOrchestrator::new(
            Arc::new(ScriptedExecutor { behaviors }),
            Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
                failure_threshold: 100,
                recovery_timeout_ms: 1,
                success_threshold: 1,
                timeout_ms: 5_000,
            })),
            Arc::new(MetricsStore::new()),
            RetryConfig { max_attempts: 1, base_delay_ms: 1, max_delay_ms: 1, backoff_multiplier: 1.0, jitter: false },
            FallbackWeightConfig::default(),
            Arc::new(DefaultPrng::from_seed(1)),
            clock,
        )
    }

    /// spec.md S3: primary fails, first fallback succeeds.
    #[tokio::test]
    async fn sequential_fallback_returns_first_success() {
        let mut behaviors = HashMap::new();
        behaviors.insert("claude-4-sonnet".to_string(), ModelBehavior::AlwaysFails);
        behaviors.insert("gpt-5".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(0)));
        behaviors.insert("deepseek-v3".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(0)));
        let orchestrator = orchestrator(behaviors);

        let task = AITask::new("task-1", "chat", b"hi".to_vec());
        let candidates = vec![model("claude-4-sonnet"), model("gpt-5"), model("deepseek-v3")];
        let result = orchestrator.execute(&task, &candidates, FallbackStrategy::Sequential, None).await.unwrap();

        assert_eq!(result.winning_model, "gpt-5");
        assert!(result.fallback_used);
        assert_eq!(result.attempted_models, vec!["claude-4-sonnet", "gpt-5"]);
    }

    /// spec.md S4: all three succeed, parallel strategy keeps the fastest.
    #[tokio::test]
    async fn parallel_strategy_keeps_fastest_success() {
        let mut behaviors = HashMap::new();
        behaviors.insert("model-a".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(200)));
        behaviors.insert("model-b".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(50)));
        behaviors.insert("model-c".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(300)));
        let orchestrator = orchestrator(behaviors);

        let task = AITask::new("task-2", "chat", b"hi".to_vec());
        let candidates = vec![model("model-a"), model("model-b"), model("model-c")];
        let result = orchestrator
            .execute(&task, &candidates, FallbackStrategy::Parallel, Some(3))
            .await
            .unwrap();

        assert_eq!(result.winning_model, "model-b");
    }

    /// spec.md §4.6 parallel strategy takes only the first
    /// `min(max_concurrent, candidates.len())` models: the fastest model is
    /// excluded by a `max_concurrent` of 1, so the first (slower) candidate
    /// must win instead.
    #[tokio::test]
    async fn parallel_strategy_respects_max_concurrent() {
        let mut behaviors = HashMap::new();
        behaviors.insert("model-a".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(100)));
        behaviors.insert("model-b".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(0)));
        let orchestrator = orchestrator(behaviors);

        let task = AITask::new("task-2b", "chat", b"hi".to_vec());
        let candidates = vec![model("model-a"), model("model-b")];
        let result = orchestrator
            .execute(&task, &candidates, FallbackStrategy::Parallel, Some(1))
            .await
            .unwrap();

        assert_eq!(result.winning_model, "model-a");
        assert_eq!(result.attempted_models, vec!["model-a"]);
    }

    /// spec.md §4.6 "AllModelsFailed": every candidate fails.
    #[tokio::test]
    async fn all_models_failing_surfaces_allmodelsfailederror() {
        let mut behaviors = HashMap::new();
        behaviors.insert("model-a".to_string(), ModelBehavior::AlwaysFails);
        behaviors.insert("model-b".to_string(), ModelBehavior::AlwaysFails);
        let orchestrator = orchestrator(behaviors);

        let task = AITask::new("task-3", "chat", b"hi".to_vec());
        let candidates = vec![model("model-a"), model("model-b")];
        let err = orchestrator
            .execute(&task, &candidates, FallbackStrategy::Sequential, None)
            .await
            .unwrap_err();

        assert_eq!(err.attempted_models, vec!["model-a", "model-b"]);
        assert_eq!(err.errors.len(), 2);
    }

    /// spec.md §4.6 weighted strategy: descending routing weight, ties
    /// broken by original order.
    #[tokio::test]
    async fn weighted_strategy_orders_by_descending_weight() {
        let mut behaviors = HashMap::new();
        behaviors.insert("slow".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(0)));
        behaviors.insert("fast".to_string(), ModelBehavior::SucceedsAfter(Duration::from_millis(0)));
        let orchestrator = orchestrator(behaviors);

        // Prime the metrics store so "fast" clearly outweighs "slow".
        orchestrator.metrics.record("fast", true, 10);
        orchestrator.metrics.record("slow", true, 9_900);

        let task = AITask::new("task-4", "chat", b"hi".to_vec());
        let candidates = vec![model("slow"), model("fast")];
        let result = orchestrator.execute(&task, &candidates, FallbackStrategy::Weighted, None).await.unwrap();

        assert_eq!(result.winning_model, "fast");
        assert_eq!(result.attempted_models, vec!["fast", "slow"]);
    }
}
