//! API gateway configuration.
//!
//! For now this only configures the HTTP listen address and the fleet of
//! model endpoints the resilience engine routes across. The underlying
//! node configuration (breaker/retry/fallback tuning, storage root) is
//! taken from `govcore::GovConfig::default()`.

use std::collections::HashMap;
use std::net::SocketAddr;

use govcore::ModelIdentity;

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        // Bind to all interfaces so the container port mapping (8081→8081) is reachable
        // from the host when running under docker-compose.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self { listen_addr: addr }
    }
}

/// The fleet of model endpoints the gateway knows about: identity plus the
/// base URL `HttpModelExecutor` dispatches task requests to (spec.md §3,
/// `ModelIdentity`).
#[derive(Clone, Debug)]
pub struct ModelFleetConfig {
    pub models: Vec<ModelIdentity>,
    pub endpoints: HashMap<String, String>,
}

impl Default for ModelFleetConfig {
    /// A small demo fleet matching the models named in spec.md's end-to-end
    /// scenarios (S3/S4), each resolved to a local placeholder port. Real
    /// deployments override this with the operator's actual endpoint map.
    fn default() -> Self {
        let defaults = [
            ("claude-4-sonnet", "Claude 4 Sonnet", "anthropic", "http://127.0.0.1:9001"),
            ("gpt-5", "GPT-5", "openai", "http://127.0.0.1:9002"),
            ("deepseek-v3", "DeepSeek V3", "deepseek", "http://127.0.0.1:9003"),
        ];

        let mut models = Vec::with_capacity(defaults.len());
        let mut endpoints = HashMap::with_capacity(defaults.len());
        for (id, name, provider, base_url) in defaults {
            models.push(ModelIdentity::new(id, name, provider));
            endpoints.insert(id.to_string(), base_url.to_string());
        }
        Self { models, endpoints }
    }
}
