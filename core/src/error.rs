//! Crate-wide error aggregation.
//!
//! Individual modules (resilience, governance) define their own focused
//! error enums with hand-written `Display`/`Error` impls. [`GovError`] is
//! the top-level enum that callers crossing module boundaries (e.g. the
//! gateway) see.

use std::fmt;

use crate::governance::chain::ChainIntegrityError;
use crate::governance::session::SessionStateError;
use crate::resilience::breaker::CircuitBreakerError;
use crate::resilience::fallback::AllModelsFailedError;
use crate::resilience::retry::RetryExhaustedError;

/// Validation errors: malformed input, out-of-range weights, unknown
/// modelId, duplicate proposal.
#[derive(Debug)]
pub enum ValidationError {
    Invalid(&'static str),
    Custom(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Invalid(msg) => write!(f, "invalid: {msg}"),
            ValidationError::Custom(msg) => write!(f, "invalid: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Top-level error type aggregating every failure mode the core surfaces.
#[derive(Debug)]
pub enum GovError {
    Validation(ValidationError),
    Integrity(ChainIntegrityError),
    State(SessionStateError),
    CircuitBreaker(CircuitBreakerError),
    RetryExhausted(RetryExhaustedError),
    AllModelsFailed(AllModelsFailedError),
    Io(std::io::Error),
    Other(String),
}

impl fmt::Display for GovError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GovError::Validation(e) => write!(f, "{e}"),
            GovError::Integrity(e) => write!(f, "{e}"),
            GovError::State(e) => write!(f, "{e}"),
            GovError::CircuitBreaker(e) => write!(f, "{e}"),
            GovError::RetryExhausted(e) => write!(f, "{e}"),
            GovError::AllModelsFailed(e) => write!(f, "{e}"),
            GovError::Io(e) => write!(f, "io error: {e}"),
            GovError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for GovError {}

impl From<ValidationError> for GovError {
    fn from(e: ValidationError) -> Self {
        GovError::Validation(e)
    }
}

impl From<ChainIntegrityError> for GovError {
    fn from(e: ChainIntegrityError) -> Self {
        GovError::Integrity(e)
    }
}

impl From<SessionStateError> for GovError {
    fn from(e: SessionStateError) -> Self {
        GovError::State(e)
    }
}

impl From<CircuitBreakerError> for GovError {
    fn from(e: CircuitBreakerError) -> Self {
        GovError::CircuitBreaker(e)
    }
}

impl From<RetryExhaustedError> for GovError {
    fn from(e: RetryExhaustedError) -> Self {
        GovError::RetryExhausted(e)
    }
}

impl From<AllModelsFailedError> for GovError {
    fn from(e: AllModelsFailedError) -> Self {
        GovError::AllModelsFailed(e)
    }
}

impl From<std::io::Error> for GovError {
    fn from(e: std::io::Error) -> Self {
        GovError::Io(e)
    }
}
