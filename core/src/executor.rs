//! HTTP model executor.
//!
//! A thin, `Send + Sync` client wrapping one `reqwest::Client`, talking JSON
//! over HTTP to an external model endpoint: one base URL, one timeout, one
//! endpoint-resolution helper, request/response structs private to the
//! module.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{SharedClock, system_clock};
use crate::resilience::model::{AIResponse, AITask, ModelIdentity, ResilienceError, ResilienceErrorCode};
use crate::resilience::fallback::ModelExecutor;

/// HTTP-based executor, dispatching tasks to a model endpoint's `/execute`
/// route.
///
/// `base_url` should be the root of the model's service, e.g.
/// `"http://127.0.0.1:9000"` (without a trailing slash) — each
/// [`ModelIdentity`] is expected to resolve to its own base URL via
/// [`EndpointResolver`].
pub struct HttpModelExecutor<R> {
    client: reqwest::Client,
    resolver: R,
    clock: SharedClock,
}

/// Maps a [`ModelIdentity`] to the base URL of its HTTP endpoint.
///
/// A trait rather than a fixed `HashMap` so callers can back it with
/// configuration, service discovery, or a static table, as fits their
/// deployment.
pub trait EndpointResolver: Send + Sync {
    fn base_url_for(&self, model: &ModelIdentity) -> Option<String>;
}

/// A fixed, in-memory `model_id -> base_url` table.
pub struct StaticEndpointResolver {
    urls: std::collections::HashMap<String, String>,
}

impl StaticEndpointResolver {
    pub fn new(urls: std::collections::HashMap<String, String>) -> Self {
        Self { urls }
    }
}

impl EndpointResolver for StaticEndpointResolver {
    fn base_url_for(&self, model: &ModelIdentity) -> Option<String> {
        self.urls.get(&model.id).cloned()
    }
}

impl<R: EndpointResolver> HttpModelExecutor<R> {
    pub fn new(resolver: R, timeout: Duration) -> Result<Self, ResilienceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResilienceError::new(ResilienceErrorCode::Unknown, format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            resolver,
            clock: system_clock(),
        })
    }

    fn endpoint(&self, base_url: &str, path: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    task_id: &'a str,
    task_type: &'a str,
    payload: String,
    priority: crate::resilience::model::Priority,
    metadata: &'a std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    success: bool,
    result: Option<String>,
    error: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

fn classify_transport_error(message: &str) -> ResilienceErrorCode {
    if message.contains("timed out") || message.contains("timeout") {
        ResilienceErrorCode::Timeout
    } else {
        ResilienceErrorCode::Transient
    }
}

#[async_trait::async_trait]
impl<R: EndpointResolver> ModelExecutor for HttpModelExecutor<R> {
    async fn execute(&self, model: &ModelIdentity, task: &AITask) -> Result<AIResponse, ResilienceError> {
        let base_url = self.resolver.base_url_for(model).ok_or_else(|| {
            ResilienceError::new(
                ResilienceErrorCode::ModelUnavailable,
                format!("no endpoint configured for model {}", model.id),
            )
            .with_model(model.id.clone())
        })?;
        let url = self.endpoint(&base_url, "/execute");

        let req_body = ExecuteRequest {
            task_id: &task.id,
            task_type: &task.task_type,
            payload: hex::encode(&task.payload),
            priority: task.priority,
            metadata: &task.metadata,
        };

        let start = self.clock.now_millis();
        let resp = self
            .client
            .post(&url)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                let code = if e.is_timeout() { ResilienceErrorCode::Timeout } else { classify_transport_error(&msg) };
                ResilienceError::new(code, format!("HTTP POST {url} failed: {msg}")).with_model(model.id.clone())
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ResilienceError::new(ResilienceErrorCode::RateLimited, format!("model {} rate-limited", model.id))
                .with_model(model.id.clone()));
        }
        if !status.is_success() {
            let code = if status.is_server_error() { ResilienceErrorCode::Transient } else { ResilienceErrorCode::Validation };
            return Err(ResilienceError::new(code, format!("model service returned HTTP {status}")).with_model(model.id.clone()));
        }

        let body = resp
            .json::<ExecuteResponse>()
            .await
            .map_err(|e| ResilienceError::new(ResilienceErrorCode::Validation, format!("failed to parse JSON response: {e}")).with_model(model.id.clone()))?;

        let response_time_ms = self.clock.now_millis().saturating_sub(start);
        let result = match body.result {
            Some(hex_str) => hex::decode(&hex_str)
                .map_err(|e| ResilienceError::new(ResilienceErrorCode::Validation, format!("result is not valid hex: {e}")).with_model(model.id.clone()))?,
            None => Vec::new(),
        };

        Ok(AIResponse {
            task_id: task.id.clone(),
            model_id: model.id.clone(),
            result,
            success: body.success,
            response_time_ms,
            timestamp_ms: self.clock.now_millis(),
            error: body.error,
            metadata: body.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let executor = HttpModelExecutor {
            client: reqwest::Client::new(),
            resolver: StaticEndpointResolver::new(std::collections::HashMap::new()),
            clock: system_clock(),
        };
        assert_eq!(executor.endpoint("http://host/", "/execute"), "http://host/execute");
        assert_eq!(executor.endpoint("http://host", "execute"), "http://host/execute");
    }

    #[test]
    fn unresolved_model_reports_model_unavailable() {
        let resolver = StaticEndpointResolver::new(std::collections::HashMap::new());
        assert!(resolver.base_url_for(&ModelIdentity::new("m1", "Model One", "acme")).is_none());
    }
}
