//! Model identity and the task/response types that flow through the
//! resilience engine (spec.md §3).
//!
//! Newtype domain types throughout — no naked primitives at the module
//! boundary.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique, immutable identity of a model endpoint.
///
/// Lifetime equals the process or a configuration reload — there is no API
/// to mutate a `ModelIdentity` in place, matching spec.md §3.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub version: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ModelIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider: provider.into(),
            version: None,
            capabilities: Vec::new(),
        }
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.provider)
    }
}

/// Priority of an [`AITask`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// A unit of work to be routed to one of a fleet of models.
///
/// Created by the caller, consumed once by the fallback orchestrator
/// (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AITask {
    pub id: String,
    pub task_type: String,
    pub payload: Vec<u8>,
    #[serde(default)]
    pub priority: Priority,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl AITask {
    pub fn new(id: impl Into<String>, task_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            payload,
            priority: Priority::Normal,
            timeout_ms: None,
            metadata: HashMap::new(),
        }
    }
}

/// The result of invoking one model on one [`AITask`].
///
/// Produced by the model executor (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AIResponse {
    pub task_id: String,
    pub model_id: String,
    pub result: Vec<u8>,
    pub success: bool,
    pub response_time_ms: u64,
    pub timestamp_ms: u64,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Error taxonomy surfaced by the resilience engine (spec.md §4.6, §7).
#[derive(Debug, Clone)]
pub struct ResilienceError {
    pub code: ResilienceErrorCode,
    pub model_id: Option<String>,
    pub recoverable: bool,
    pub message: String,
}

/// Classification tag used by the retry manager to decide whether an error
/// is retryable (spec.md §4.5).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResilienceErrorCode {
    Transient,
    Timeout,
    RateLimited,
    BreakerOpen,
    ModelUnavailable,
    Validation,
    Unknown,
}

impl fmt::Display for ResilienceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ResilienceError {}

impl ResilienceError {
    pub fn new(code: ResilienceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            model_id: None,
            recoverable: matches!(
                code,
                ResilienceErrorCode::Transient
                    | ResilienceErrorCode::Timeout
                    | ResilienceErrorCode::RateLimited
            ),
            message: message.into(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}
