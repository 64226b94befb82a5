//! Rolling performance metrics per model and the routing weight formula
//! derived from them (C7).
//!
//! A process-wide store keyed by model id, guarded by a lock, exposing
//! read-only snapshots to callers.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Smoothing factor for the exponential moving averages (spec.md §4.7).
/// Each new sample contributes `ALPHA` of the new EMA — a fixed,
/// conservative smoothing constant rather than a configurable one, since
/// no caller has ever needed to tune it.
const ALPHA: f64 = 0.1;

/// Snapshot of one model's rolling performance.
#[derive(Clone, Copy, Debug)]
pub struct ModelMetrics {
    pub avg_response_time_ms: f64,
    pub success_rate: f64,
    pub total_requests: u64,
    pub total_successes: u64,
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self {
            avg_response_time_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            total_successes: 0,
        }
    }
}

impl ModelMetrics {
    fn record(&mut self, success: bool, response_time_ms: u64) {
        let sample = response_time_ms as f64;
        self.avg_response_time_ms = if self.total_requests == 0 {
            sample
        } else {
            ALPHA * sample + (1.0 - ALPHA) * self.avg_response_time_ms
        };

        let success_sample = if success { 1.0 } else { 0.0 };
        self.success_rate = if self.total_requests == 0 {
            success_sample
        } else {
            ALPHA * success_sample + (1.0 - ALPHA) * self.success_rate
        };

        self.total_requests += 1;
        if success {
            self.total_successes += 1;
        }
    }
}

/// Configuration for [`routing_weight`] (spec.md §4.7, Open Question
/// resolved: ceiling 10s, success weighted 70%, responsiveness 30%).
#[derive(Clone, Copy, Debug)]
pub struct FallbackWeightConfig {
    pub response_time_ceiling_ms: f64,
    pub success_weight: f64,
    pub responsiveness_weight: f64,
}

impl Default for FallbackWeightConfig {
    fn default() -> Self {
        Self {
            response_time_ceiling_ms: 10_000.0,
            success_weight: 0.7,
            responsiveness_weight: 0.3,
        }
    }
}

/// Computes a routing weight in `[0, 1]` from a model's rolling metrics:
/// `success_weight * success_rate + responsiveness_weight *
/// (1 - min(avg_response_time_ms, ceiling) / ceiling)`.
///
/// A model with no samples yet (`total_requests == 0`) gets the default
/// weight `0.5` spec.md §4.6 specifies for an unknown model.
pub fn routing_weight(metrics: &ModelMetrics, config: &FallbackWeightConfig) -> f64 {
    if metrics.total_requests == 0 {
        return 0.5;
    }
    let capped_latency = metrics.avg_response_time_ms.min(config.response_time_ceiling_ms);
    let responsiveness = 1.0 - (capped_latency / config.response_time_ceiling_ms);
    (config.success_weight * metrics.success_rate
        + config.responsiveness_weight * responsiveness)
        .clamp(0.0, 1.0)
}

/// Process-wide store of per-model [`ModelMetrics`].
pub struct MetricsStore {
    models: RwLock<HashMap<String, ModelMetrics>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, model_id: &str, success: bool, response_time_ms: u64) {
        let mut models = self.models.write();
        models
            .entry(model_id.to_string())
            .or_default()
            .record(success, response_time_ms);
    }

    pub fn snapshot(&self, model_id: &str) -> ModelMetrics {
        self.models.read().get(model_id).copied().unwrap_or_default()
    }

    pub fn all_snapshots(&self) -> HashMap<String, ModelMetrics> {
        self.models.read().clone()
    }

    pub fn weight_for(&self, model_id: &str, config: &FallbackWeightConfig) -> f64 {
        routing_weight(&self.snapshot(model_id), config)
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsampled_model_gets_default_weight_of_half() {
        let store = MetricsStore::new();
        let weight = store.weight_for("fresh-model", &FallbackWeightConfig::default());
        assert_eq!(weight, 0.5);
    }

    #[test]
    fn fast_reliable_model_outweighs_slow_flaky_one() {
        let store = MetricsStore::new();
        for _ in 0..10 {
            store.record("fast", true, 200);
            store.record("slow", false, 9_500);
        }
        let config = FallbackWeightConfig::default();
        let fast_weight = store.weight_for("fast", &config);
        let slow_weight = store.weight_for("slow", &config);
        assert!(fast_weight > slow_weight);
        assert!(fast_weight > 0.9);
        assert!(slow_weight < 0.2);
    }

    #[test]
    fn ema_tracks_recent_samples_more_than_old_ones() {
        let mut metrics = ModelMetrics::default();
        for _ in 0..50 {
            metrics.record(true, 1_000);
        }
        let before = metrics.avg_response_time_ms;
        metrics.record(true, 0);
        assert!(metrics.avg_response_time_ms < before);
    }
}
