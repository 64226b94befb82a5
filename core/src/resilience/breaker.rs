//! Per-model circuit breaker (C4).
//!
//! A small struct owning atomically-updated state behind a lock, with a
//! process-wide registry keyed by model id owning named, independently
//! updatable instances.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::clock::{SharedClock, system_clock};

/// The three states a breaker can be in (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitBreakerState::Closed => "closed",
            CircuitBreakerState::Open => "open",
            CircuitBreakerState::HalfOpen => "half-open",
        };
        write!(f, "{s}")
    }
}

/// Tuning parameters for one breaker instance (spec.md §4.4).
#[derive(Clone, Copy, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub success_threshold: u32,
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            success_threshold: 2,
            timeout_ms: 10_000,
        }
    }
}

/// Point-in-time snapshot of a breaker's state and counters (spec.md §3).
#[derive(Clone, Copy, Debug)]
pub struct CircuitBreakerStatus {
    pub state: CircuitBreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_failure_at_ms: Option<u64>,
    pub next_retry_at_ms: Option<u64>,
}

/// State-change and execution events emitted by a breaker.
///
/// Per spec.md §9 Design Notes, these are delivered as messages to a
/// dedicated consumer task (an `mpsc` channel) rather than as synchronous
/// callbacks holding the breaker's internal lock.
#[derive(Clone, Debug)]
pub enum BreakerEvent {
    StateChange {
        model_id: String,
        from: CircuitBreakerState,
        to: CircuitBreakerState,
        trigger: String,
    },
    Execution {
        model_id: String,
        success: bool,
        duration_ms: u64,
    },
}

/// Failure surfaced when the breaker rejects a call outright.
#[derive(Debug, Clone)]
pub struct CircuitBreakerError {
    pub model_id: String,
    pub next_retry_at_ms: Option<u64>,
}

impl fmt::Display for CircuitBreakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "circuit breaker open for model {}", self.model_id)
    }
}

impl std::error::Error for CircuitBreakerError {}

/// Outcome of [`CircuitBreaker::execute`]: either the breaker rejected the
/// call, the action timed out, or the action ran and returned its own
/// result (success or failure).
#[derive(Debug)]
pub enum ExecuteOutcome<T, E> {
    Rejected(CircuitBreakerError),
    TimedOut,
    Completed(Result<T, E>),
}

struct Inner {
    state: CircuitBreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at_ms: Option<u64>,
    next_retry_at_ms: Option<u64>,
}

impl Inner {
    fn status(&self) -> CircuitBreakerStatus {
        CircuitBreakerStatus {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            last_failure_at_ms: self.last_failure_at_ms,
            next_retry_at_ms: self.next_retry_at_ms,
        }
    }
}

/// A single per-model circuit breaker.
pub struct CircuitBreaker {
    model_id: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    clock: SharedClock,
    listeners: Mutex<Vec<mpsc::UnboundedSender<BreakerEvent>>>,
}

impl CircuitBreaker {
    pub fn new(model_id: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(model_id, config, system_clock())
    }

    pub fn with_clock(model_id: impl Into<String>, config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            model_id: model_id.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitBreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure_at_ms: None,
                next_retry_at_ms: None,
            }),
            clock,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        self.inner.lock().status()
    }

    /// Registers a new listener. The returned receiver gets every future
    /// `StateChange`/`Execution` event; delivery never blocks the breaker
    /// (an unbounded channel means a slow/absent consumer cannot stall a
    /// request in flight).
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<BreakerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().push(tx);
        rx
    }

    fn emit(&self, event: BreakerEvent) {
        match &event {
            BreakerEvent::StateChange { model_id, from, to, trigger } => {
                tracing::info!(%model_id, %from, %to, %trigger, "circuit breaker state change");
            }
            BreakerEvent::Execution { model_id, success, duration_ms } => {
                tracing::debug!(%model_id, success, duration_ms, "circuit breaker execution recorded");
            }
        }
        let mut listeners = self.listeners.lock();
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Forces the breaker closed with zeroed counters (manual operation).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let from = inner.state;
        inner.state = CircuitBreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.next_retry_at_ms = None;
        drop(inner);
        if from != CircuitBreakerState::Closed {
            self.emit(BreakerEvent::StateChange {
                model_id: self.model_id.clone(),
                from,
                to: CircuitBreakerState::Closed,
                trigger: "manual-reset".to_string(),
            });
        }
    }

    /// Forces the breaker open and stamps a last-failure time (manual
    /// operation).
    pub fn trip(&self, reason: &str) {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let from = inner.state;
        inner.state = CircuitBreakerState::Open;
        inner.last_failure_at_ms = Some(now);
        inner.next_retry_at_ms = Some(now + self.config.recovery_timeout_ms);
        inner.consecutive_successes = 0;
        drop(inner);
        self.emit(BreakerEvent::StateChange {
            model_id: self.model_id.clone(),
            from,
            to: CircuitBreakerState::Open,
            trigger: reason.to_string(),
        });
    }

    /// Decides whether a call may be admitted right now, transitioning
    /// open -> half-open atomically with the decision if the recovery
    /// timeout has elapsed.
    fn admit(&self) -> Result<(), CircuitBreakerError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => Ok(()),
            CircuitBreakerState::Open => {
                let next_retry = inner.next_retry_at_ms.unwrap_or(u64::MAX);
                if now >= next_retry {
                    inner.state = CircuitBreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                    drop(inner);
                    self.emit(BreakerEvent::StateChange {
                        model_id: self.model_id.clone(),
                        from: CircuitBreakerState::Open,
                        to: CircuitBreakerState::HalfOpen,
                        trigger: "recovery-timeout-elapsed".to_string(),
                    });
                    Ok(())
                } else {
                    let next_retry_at_ms = inner.next_retry_at_ms;
                    Err(CircuitBreakerError {
                        model_id: self.model_id.clone(),
                        next_retry_at_ms,
                    })
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitBreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitBreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    let from = inner.state;
                    inner.state = CircuitBreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.next_retry_at_ms = None;
                    drop(inner);
                    self.emit(BreakerEvent::StateChange {
                        model_id: self.model_id.clone(),
                        from,
                        to: CircuitBreakerState::Closed,
                        trigger: "success-threshold-reached".to_string(),
                    });
                }
            }
            CircuitBreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitBreakerState::Closed => {
                inner.consecutive_failures += 1;
                inner.last_failure_at_ms = Some(now);
                if inner.consecutive_failures >= self.config.failure_threshold {
                    let from = inner.state;
                    inner.state = CircuitBreakerState::Open;
                    inner.next_retry_at_ms = Some(now + self.config.recovery_timeout_ms);
                    inner.consecutive_successes = 0;
                    drop(inner);
                    self.emit(BreakerEvent::StateChange {
                        model_id: self.model_id.clone(),
                        from,
                        to: CircuitBreakerState::Open,
                        trigger: "failure-threshold-reached".to_string(),
                    });
                }
            }
            CircuitBreakerState::HalfOpen => {
                let from = inner.state;
                inner.state = CircuitBreakerState::Open;
                inner.last_failure_at_ms = Some(now);
                inner.next_retry_at_ms = Some(now + self.config.recovery_timeout_ms);
                inner.consecutive_successes = 0;
                drop(inner);
                self.emit(BreakerEvent::StateChange {
                    model_id: self.model_id.clone(),
                    from,
                    to: CircuitBreakerState::Open,
                    trigger: "half-open-failure".to_string(),
                });
            }
            CircuitBreakerState::Open => {}
        }
    }

    /// Runs `action` under this breaker, applying `timeout_ms` to the call.
    /// A timeout counts as a failure. Cancellation of the in-flight action
    /// on timeout is best-effort: dropping the future is the cancellation
    /// signal, and the executor is expected to honor it (spec.md §4.4).
    pub async fn execute<F, Fut, T, E>(&self, action: F) -> ExecuteOutcome<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(rejected) = self.admit() {
            return ExecuteOutcome::Rejected(rejected);
        }

        let start = self.clock.now_millis();
        let timeout = std::time::Duration::from_millis(self.config.timeout_ms);
        let outcome = tokio::time::timeout(timeout, action()).await;
        let duration_ms = self.clock.now_millis().saturating_sub(start);

        match outcome {
            Ok(Ok(value)) => {
                self.record_success();
                self.emit(BreakerEvent::Execution {
                    model_id: self.model_id.clone(),
                    success: true,
                    duration_ms,
                });
                ExecuteOutcome::Completed(Ok(value))
            }
            Ok(Err(err)) => {
                self.record_failure();
                self.emit(BreakerEvent::Execution {
                    model_id: self.model_id.clone(),
                    success: false,
                    duration_ms,
                });
                ExecuteOutcome::Completed(Err(err))
            }
            Err(_elapsed) => {
                self.record_failure();
                self.emit(BreakerEvent::Execution {
                    model_id: self.model_id.clone(),
                    success: false,
                    duration_ms,
                });
                ExecuteOutcome::TimedOut
            }
        }
    }
}

/// Process-wide registry of breakers, keyed by model id.
///
/// Per spec.md §9 Design Notes this is an explicit handle passed around
/// (e.g. embedded in a gateway's shared state), not a global static; the
/// `Default` impl is the "one convenience constructor that wires a default
/// registry".
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
    clock: SharedClock,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self::with_clock(default_config, system_clock())
    }

    pub fn with_clock(default_config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
            clock,
        }
    }

    /// Returns the existing breaker for `model_id`, or creates one with the
    /// registry's default config.
    pub fn get_or_create(&self, model_id: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().get(model_id) {
            return existing.clone();
        }
        let mut write = self.breakers.write();
        write
            .entry(model_id.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_clock(
                    model_id,
                    self.default_config,
                    self.clock.clone(),
                ))
            })
            .clone()
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    pub fn get_all_status(&self) -> HashMap<String, CircuitBreakerStatus> {
        self.breakers
            .read()
            .iter()
            .map(|(id, breaker)| (id.clone(), breaker.status()))
            .collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use std::sync::Arc as StdArc;

    fn test_breaker(clock: FixedClock) -> CircuitBreaker {
        CircuitBreaker::with_clock(
            "test-model",
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout_ms: 1_000,
                success_threshold: 2,
                timeout_ms: 50,
            },
            StdArc::new(clock),
        )
    }

    #[tokio::test]
    async fn trips_open_after_failure_threshold_and_recovers() {
        let clock = FixedClock::new(0);
        let breaker = test_breaker(clock.clone());

        for _ in 0..3 {
            let outcome = breaker
                .execute(|| async { Err::<(), &str>("boom") })
                .await;
            assert!(matches!(outcome, ExecuteOutcome::Completed(Err(_))));
        }
        assert_eq!(breaker.status().state, CircuitBreakerState::Open);

        // Immediately after trip: rejected, underlying fn not invoked.
        let invoked = StdArc::new(std::sync::atomic::AtomicBool::new(false));
        let invoked_clone = invoked.clone();
        let outcome = breaker
            .execute(move || {
                let invoked_clone = invoked_clone.clone();
                async move {
                    invoked_clone.store(true, std::sync::atomic::Ordering::SeqCst);
                    Ok::<(), &str>(())
                }
            })
            .await;
        assert!(matches!(outcome, ExecuteOutcome::Rejected(_)));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));

        // After the recovery timeout elapses, the next call is admitted
        // (half-open) and two successes close the breaker.
        clock.advance(std::time::Duration::from_millis(1_100));

        let outcome = breaker.execute(|| async { Ok::<(), &str>(()) }).await;
        assert!(matches!(outcome, ExecuteOutcome::Completed(Ok(()))));
        assert_eq!(breaker.status().state, CircuitBreakerState::HalfOpen);

        let outcome = breaker.execute(|| async { Ok::<(), &str>(()) }).await;
        assert!(matches!(outcome, ExecuteOutcome::Completed(Ok(()))));
        assert_eq!(breaker.status().state, CircuitBreakerState::Closed);
        assert_eq!(breaker.status().consecutive_failures, 0);
        assert_eq!(breaker.status().consecutive_successes, 0);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let clock = FixedClock::new(0);
        let breaker = test_breaker(clock.clone());
        for _ in 0..3 {
            let _ = breaker.execute(|| async { Err::<(), &str>("x") }).await;
        }
        clock.advance(std::time::Duration::from_millis(1_100));
        let _ = breaker.execute(|| async { Err::<(), &str>("x") }).await;
        assert_eq!(breaker.status().state, CircuitBreakerState::Open);
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let clock = FixedClock::new(0);
        let breaker = test_breaker(clock.clone());
        let outcome = breaker
            .execute(|| async {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                Ok::<(), &str>(())
            })
            .await;
        assert!(matches!(outcome, ExecuteOutcome::TimedOut));
        assert_eq!(breaker.status().consecutive_failures, 1);
    }

    #[test]
    fn registry_reuses_breakers_per_model() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_or_create("model-a");
        let b = registry.get_or_create("model-a");
        assert!(StdArc::ptr_eq(&a, &b));

        a.trip("manual");
        let status = registry.get_all_status();
        assert_eq!(status["model-a"].state, CircuitBreakerState::Open);

        registry.reset_all();
        assert_eq!(
            registry.get_all_status()["model-a"].state,
            CircuitBreakerState::Closed
        );
    }
}
