//! Governance-and-resilience substrate.
//!
//! This crate provides the core building blocks for coordinating votes
//! among a fleet of AI model endpoints and invoking those endpoints
//! reliably under partial failure:
//!
//! - injectable clock/RNG seams for deterministic tests (`clock`, `rng`),
//! - canonical byte/hash encoding and secp256k1 signing (`codec`, `crypto`),
//! - per-model circuit breakers, retry with backoff, EMA-based routing
//!   metrics, and multi-strategy fallback orchestration (`resilience`),
//! - an async HTTP model executor (`executor`),
//! - the per-topic append-only audit chain, vote session state machine,
//!   notification boundary, reminder scheduler, and on-disk persistence
//!   (`governance`),
//! - Prometheus-based metrics (`telemetry`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries (this crate's `main`, and the `gateway` crate)
//! compose these pieces into a running node.

pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod governance;
pub mod resilience;
pub mod rng;
pub mod telemetry;

// Clock/RNG seams.
pub use clock::{Clock, FixedClock, SharedClock, SystemClock, system_clock};
pub use rng::{DefaultPrng, Prng, SharedPrng, default_prng};

// Canonical encoding + crypto primitives.
pub use codec::{to_canonical_bytes, to_canonical_string};
pub use crypto::{
    CompactSignature, Hash256, PrivateKey, PublicKeyBytes, Signature, SignatureError,
    VerificationOutcome, equals_ct, generate_deterministic_key_pair, generate_key_pair, hash_record,
    hmac_record, recover_public_key, sign_message, to_compact, to_der, verify_signature,
};

// Top-level configuration types.
pub use config::{GovConfig, GovStorageConfig, MetricsConfig, ModelExecutorConfig};

// Crate-wide error aggregation.
pub use error::{GovError, ValidationError};

// Resilience engine: model identity/task/response types, circuit breaker,
// retry, EMA metrics, and fallback orchestration.
pub use resilience::{
    AIResponse, AITask, AllModelsFailedError, BreakerEvent, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerError, CircuitBreakerRegistry, CircuitBreakerState, CircuitBreakerStatus,
    ExecuteOutcome, FallbackOrchestrator, FallbackStrategy, FallbackWeightConfig, ModelExecutor,
    ModelIdentity, ModelMetrics, MetricsStore, Priority, ResilienceError, ResilienceErrorCode,
    ResilienceExecutionResult, RetryConfig, RetryExhaustedError, execute_with_retry, routing_weight,
    run_batch_with_retry,
};

// HTTP model executor.
pub use executor::{EndpointResolver, HttpModelExecutor, StaticEndpointResolver};

// Governance: audit chain, session state machine, notifications,
// scheduler, and on-disk storage.
pub use governance::{
    Block, BlockPayload, BlockType, BlockchainIndex, CanFinalize, Chain, ChainIntegrityError,
    ChainSnapshot, ChainVerification, GovStorage, InMemoryNotificationSink, NotificationEvent,
    NotificationEventType, NotificationSink, PartialBlock, ProposalResult, ProposalStatus,
    ProposalVote, ReminderSchedule, ReminderTick, ResultData, SessionStateError, SessionStatus,
    Timestamp, VoteData, VoteRecord, VotingSession, batch_vote_hash, compute_ticks, session_hash,
    verify_blocks,
};

// Metrics registry.
pub use telemetry::{GovMetrics, MetricsRegistry, run_prometheus_http_server};
