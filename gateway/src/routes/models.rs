//! `GET /models` — lists the model fleet the gateway was configured with.
//!
//! `ModelIdentity` is immutable after creation (spec.md §3), so this route
//! is read-only: the fleet is fixed at startup from `ModelFleetConfig` and
//! exposed here for callers building a `/tasks/execute` request.

use axum::{Json, extract::State};
use serde::Serialize;

use govcore::ModelIdentity;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelIdentity>,
}

/// `GET /models`
pub async fn list(State(state): State<SharedState>) -> Json<ModelsResponse> {
    let models = state.models.values().cloned().collect();
    Json(ModelsResponse { models })
}
