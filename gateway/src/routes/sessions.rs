//! Vote session lifecycle routes: `start`/`votes`/`finalize`/status,
//! driving `govcore::VotingSession` (C9) and persisting its chain through
//! `govcore::GovStorage` (spec.md §6) after every mutating call.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use govcore::{Chain, ProposalResult, ProposalVote, SessionStatus, VotingSession, system_clock};

use crate::state::SharedState;

type ApiError = (StatusCode, String);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn not_found(minute_id: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("no session for minute {minute_id}"))
}

/// Request body for `POST /sessions/{minute}/start`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub proposal_ids: Vec<String>,
    pub participants: Vec<String>,
    pub quorum_threshold: f64,
    pub approval_threshold: f64,
    pub duration_hours: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub minute_id: String,
    pub status: SessionStatus,
    pub chain_length: usize,
}

fn summarize(minute_id: &str, session: &VotingSession) -> SessionSummary {
    SessionSummary {
        minute_id: minute_id.to_string(),
        status: session.status(),
        chain_length: session.chain().len(),
    }
}

/// Validates a vote payload per spec.md §6: non-empty, unique proposal
/// ids, and each weight in `1..=10`.
fn validate_votes(votes: &[ProposalVote]) -> Result<(), ApiError> {
    if votes.is_empty() {
        return Err(bad_request("votes must not be empty"));
    }
    let mut seen = HashSet::with_capacity(votes.len());
    for vote in votes {
        if !(1..=10).contains(&vote.weight) {
            return Err(bad_request(format!(
                "vote weight for {} must be between 1 and 10, got {}",
                vote.proposal_id, vote.weight
            )));
        }
        if !seen.insert(vote.proposal_id.as_str()) {
            return Err(bad_request(format!("duplicate proposalId in submission: {}", vote.proposal_id)));
        }
    }
    Ok(())
}

fn persist_chain(state: &SharedState, session: &VotingSession) {
    if let Err(e) = state.storage.save_chain(&session.chain().to_snapshot()) {
        tracing::warn!(error = %e, minute_id = session.minute_id(), "failed to persist chain to disk");
    }
}

/// `POST /sessions/{minute}/start`
pub async fn start(
    State(state): State<SharedState>,
    Path(minute_id): Path<String>,
    Json(body): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionSummary>), ApiError> {
    if body.proposal_ids.is_empty() {
        return Err(bad_request("proposalIds must not be empty"));
    }
    if body.participants.is_empty() {
        return Err(bad_request("participants must not be empty"));
    }
    if !(0.0..=1.0).contains(&body.quorum_threshold) || body.quorum_threshold <= 0.0 {
        return Err(bad_request("quorumThreshold must be in (0, 1]"));
    }
    if !(0.0..=1.0).contains(&body.approval_threshold) || body.approval_threshold <= 0.0 {
        return Err(bad_request("approvalThreshold must be in (0, 1]"));
    }

    let mut sessions = state.sessions.lock().await;
    if sessions.contains_key(&minute_id) {
        return Err(bad_request(format!("session {minute_id} already exists")));
    }

    let clock = system_clock();
    let chain = Chain::create(minute_id.clone(), serde_json::json!({"proposalIds": body.proposal_ids}), clock.clone());
    let participants: HashSet<String> = body.participants.into_iter().collect();
    let session = Arc::new(VotingSession::new(
        minute_id.clone(),
        body.proposal_ids,
        participants,
        body.duration_hours,
        body.quorum_threshold,
        body.approval_threshold,
        chain,
        clock,
    ));

    session.start().map_err(|e| bad_request(e.to_string()))?;
    persist_chain(&state, &session);
    let summary = summarize(&minute_id, &session);
    sessions.insert(minute_id, session);

    Ok((StatusCode::CREATED, Json(summary)))
}

/// Request body for `POST /sessions/{minute}/votes`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    pub model_id: String,
    pub votes: Vec<ProposalVote>,
    pub vote_file: String,
    pub vote_file_hash: String,
}

/// `POST /sessions/{minute}/votes`
pub async fn submit_vote(
    State(state): State<SharedState>,
    Path(minute_id): Path<String>,
    Json(body): Json<SubmitVoteRequest>,
) -> Result<Json<SessionSummary>, ApiError> {
    validate_votes(&body.votes)?;

    let sessions = state.sessions.lock().await;
    let session = sessions.get(&minute_id).ok_or_else(|| not_found(&minute_id))?.clone();
    drop(sessions);

    session
        .submit_vote(&body.model_id, body.votes, body.vote_file, body.vote_file_hash)
        .map_err(|e| bad_request(e.to_string()))?;
    persist_chain(&state, &session);

    Ok(Json(summarize(&minute_id, &session)))
}

/// Request body for `POST /sessions/{minute}/finalize`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub reporter_model_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub minute_id: String,
    pub status: SessionStatus,
    pub results: Vec<ProposalResult>,
}

/// `POST /sessions/{minute}/finalize`
pub async fn finalize(
    State(state): State<SharedState>,
    Path(minute_id): Path<String>,
    Json(body): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&minute_id).ok_or_else(|| not_found(&minute_id))?.clone();
    drop(sessions);

    let results = session.finalize(&body.reporter_model_id).map_err(|e| bad_request(e.to_string()))?;
    persist_chain(&state, &session);

    Ok(Json(FinalizeResponse {
        minute_id,
        status: session.status(),
        results,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub minute_id: String,
    pub status: SessionStatus,
    pub proposal_ids: Vec<String>,
    pub chain_length: usize,
    pub chain_valid: bool,
    pub chain_errors: Vec<String>,
}

/// `GET /sessions/{minute}`
pub async fn get(
    State(state): State<SharedState>,
    Path(minute_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&minute_id).ok_or_else(|| not_found(&minute_id))?;

    let verification = session.chain().verify();
    Ok(Json(SessionStatusResponse {
        minute_id,
        status: session.status(),
        proposal_ids: session.proposal_ids().to_vec(),
        chain_length: session.chain().len(),
        chain_valid: verification.valid,
        chain_errors: verification.errors.iter().map(|e| e.to_string()).collect(),
    }))
}
