//! Vote session state machine (C9).
//!
//! The status enum and guarded mutation pattern advance through a small
//! fixed set of states under a single lock rather than allowing free-form
//! external mutation.

use std::collections::HashSet;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::governance::block::{BlockPayload, BlockType, PartialBlock};
use crate::governance::chain::Chain;
use crate::governance::types::{ProposalResult, ProposalStatus, ProposalVote, ResultData, Timestamp, VoteData};

/// Lifecycle state of a [`VotingSession`] (spec.md §3, §4.9).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Active,
    Complete,
    Expired,
    Finalized,
    Cancelled,
}

/// Illegal state transitions and vote-admission failures (spec.md §7,
/// "State" taxonomy). `DuplicateVote` and `DeadlineExceeded` are kept as
/// variants here rather than separate types, since both are really just
/// "this state transition is not legal right now".
#[derive(Debug, Clone)]
pub enum SessionStateError {
    NotCreated,
    NotActive,
    UnknownParticipant { model_id: String },
    DuplicateVote { model_id: String },
    DuplicateProposalInVote { model_id: String, proposal_id: String },
    DeadlineExceeded,
    NotReadyToFinalize { reason: String },
}

impl fmt::Display for SessionStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStateError::NotCreated => write!(f, "session has already started"),
            SessionStateError::NotActive => write!(f, "session is not active"),
            SessionStateError::UnknownParticipant { model_id } => write!(f, "{model_id} is not a participant in this session"),
            SessionStateError::DuplicateVote { model_id } => write!(f, "{model_id} has already voted in this session"),
            SessionStateError::DuplicateProposalInVote { model_id, proposal_id } => {
                write!(f, "{model_id}'s submission votes on {proposal_id} more than once")
            }
            SessionStateError::DeadlineExceeded => write!(f, "session voting deadline has passed"),
            SessionStateError::NotReadyToFinalize { reason } => write!(f, "cannot finalize: {reason}"),
        }
    }
}

impl std::error::Error for SessionStateError {}

/// Whether [`VotingSession::finalize`] would succeed right now, and why
/// not if it wouldn't (spec.md §4.9, `canFinalize`).
#[derive(Debug, Clone)]
pub struct CanFinalize {
    pub can_finalize: bool,
    pub reason: Option<String>,
}

struct Mutable {
    status: SessionStatus,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    voted_models: HashSet<String>,
    stored_results: Option<Vec<ProposalResult>>,
}

/// A single minute's (topic's) voting session: participants, proposals,
/// thresholds, and the audit chain recording every transition (spec.md §3).
pub struct VotingSession {
    minute_id: String,
    proposal_ids: Vec<String>,
    participants: HashSet<String>,
    duration_hours: i64,
    quorum_threshold: f64,
    approval_threshold: f64,
    chain: Chain,
    clock: SharedClock,
    state: Mutex<Mutable>,
}

impl VotingSession {
    pub fn new(
        minute_id: impl Into<String>,
        proposal_ids: Vec<String>,
        participants: HashSet<String>,
        duration_hours: i64,
        quorum_threshold: f64,
        approval_threshold: f64,
        chain: Chain,
        clock: SharedClock,
    ) -> Self {
        Self {
            minute_id: minute_id.into(),
            proposal_ids,
            participants,
            duration_hours,
            quorum_threshold,
            approval_threshold,
            chain,
            clock,
            state: Mutex::new(Mutable {
                status: SessionStatus::Created,
                start_time: None,
                end_time: None,
                voted_models: HashSet::new(),
                stored_results: None,
            }),
        }
    }

    pub fn minute_id(&self) -> &str {
        &self.minute_id
    }

    pub fn proposal_ids(&self) -> &[String] {
        &self.proposal_ids
    }

    pub fn participants(&self) -> &HashSet<String> {
        &self.participants
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn status(&self) -> SessionStatus {
        self.refresh_expiry();
        self.state.lock().status
    }

    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.clock.now_millis() as i64)
    }

    /// Promotes `Active` to `Expired` in place if the deadline has passed.
    /// Read-only state checks (`status()`, `can_finalize()`) call this
    /// first so callers never observe a stale `Active` after the deadline.
    fn refresh_expiry(&self) {
        let now = self.now();
        let mut state = self.state.lock();
        if state.status == SessionStatus::Active {
            if let Some(end_time) = state.end_time {
                if now > end_time {
                    state.status = SessionStatus::Expired;
                }
            }
        }
    }

    /// `Created -> Active`: records a start block, stamps `startTime` and
    /// `endTime = startTime + durationHours` (spec.md §4.9).
    pub fn start(&self) -> Result<(), SessionStateError> {
        let mut state = self.state.lock();
        if state.status != SessionStatus::Created {
            return Err(SessionStateError::NotCreated);
        }
        let start_time = self.now();
        let end_time = start_time.plus_hours(self.duration_hours);
        state.status = SessionStatus::Active;
        state.start_time = Some(start_time);
        state.end_time = Some(end_time);
        drop(state);

        self.chain.append_block(PartialBlock {
            timestamp: start_time,
            block_type: BlockType::Start,
            model_id: None,
            action: "start-session".to_string(),
            file_paths: Vec::new(),
            file_hash: None,
            data: BlockPayload::Metadata(serde_json::json!({
                "minuteId": self.minute_id,
                "proposalIds": self.proposal_ids,
                "endTime": end_time.to_string(),
            })),
        });
        tracing::info!(minute_id = %self.minute_id, end_time = %end_time, "voting session started");
        Ok(())
    }

    /// Appends a vote block for `model_id` if active, a participant, no
    /// prior vote exists for it, the submission votes on each proposal at
    /// most once (spec.md §3, `ProposalVote` invariant), and the deadline
    /// has not passed. May transition `Active -> Complete` if this is the
    /// last expected voter (spec.md §4.9).
    pub fn submit_vote(
        &self,
        model_id: &str,
        votes: Vec<ProposalVote>,
        vote_file: String,
        vote_file_hash: String,
    ) -> Result<(), SessionStateError> {
        let mut seen_proposals = HashSet::with_capacity(votes.len());
        for vote in &votes {
            if !seen_proposals.insert(vote.proposal_id.as_str()) {
                return Err(SessionStateError::DuplicateProposalInVote {
                    model_id: model_id.to_string(),
                    proposal_id: vote.proposal_id.clone(),
                });
            }
        }

        let mut state = self.state.lock();
        if state.status != SessionStatus::Active {
            return Err(SessionStateError::NotActive);
        }
        if !self.participants.contains(model_id) {
            return Err(SessionStateError::UnknownParticipant { model_id: model_id.to_string() });
        }
        if state.voted_models.contains(model_id) {
            return Err(SessionStateError::DuplicateVote { model_id: model_id.to_string() });
        }
        let now = self.now();
        if let Some(end_time) = state.end_time {
            if now > end_time {
                state.status = SessionStatus::Expired;
                return Err(SessionStateError::DeadlineExceeded);
            }
        }

        state.voted_models.insert(model_id.to_string());
        let all_voted = state.voted_models.len() == self.participants.len();
        if all_voted {
            state.status = SessionStatus::Complete;
        }
        drop(state);

        self.chain.append_block(PartialBlock {
            timestamp: now,
            block_type: BlockType::Vote,
            model_id: Some(model_id.to_string()),
            action: "submit-vote".to_string(),
            file_paths: vec![vote_file.clone()],
            file_hash: None,
            data: BlockPayload::Vote(VoteData {
                voter_model_id: model_id.to_string(),
                votes,
                vote_file,
                vote_file_hash,
            }),
        });
        tracing::info!(minute_id = %self.minute_id, model_id, all_voted, "vote recorded");
        Ok(())
    }

    /// Tallies every proposal against the votes recorded so far. Used by
    /// both [`VotingSession::finalize`] and [`VotingSession::can_finalize`].
    fn tally(&self) -> Vec<ProposalResult> {
        let blocks = self.chain.blocks();
        let voter_count = self.participants.len();

        self.proposal_ids
            .iter()
            .map(|proposal_id| {
                let mut votes_on_proposal: Vec<(&str, &ProposalVote)> = Vec::new();
                for block in &blocks {
                    if let BlockPayload::Vote(vote_data) = &block.data {
                        if let Some(vote) = vote_data.votes.iter().find(|v| &v.proposal_id == proposal_id) {
                            votes_on_proposal.push((vote_data.voter_model_id.as_str(), vote));
                        }
                    }
                }

                let total_score: i64 = votes_on_proposal.iter().map(|(_, v)| v.weight as i64).sum();
                let participant_count = votes_on_proposal.len();
                let has_veto = votes_on_proposal.iter().any(|(_, v)| v.is_veto());

                let participation_rate = if voter_count == 0 { 0.0 } else { participant_count as f64 / voter_count as f64 };
                let quorum_met = participation_rate >= self.quorum_threshold;

                let approvals = votes_on_proposal.iter().filter(|(_, v)| v.weight >= 7).count();
                let approval_rate = if participant_count == 0 { 0.0 } else { approvals as f64 / participant_count as f64 };
                let approval_met = approval_rate >= self.approval_threshold;

                let status = if has_veto || !quorum_met || !approval_met {
                    ProposalStatus::Rejected
                } else {
                    ProposalStatus::Approved
                };

                ProposalResult {
                    proposal_id: proposal_id.clone(),
                    total_score,
                    participant_count,
                    status,
                    reporter_model_id: String::new(),
                }
            })
            .collect()
    }

    /// Returns whether [`VotingSession::finalize`] would succeed right
    /// now, using the same predicates finalize itself checks.
    pub fn can_finalize(&self) -> CanFinalize {
        self.refresh_expiry();
        let status = self.state.lock().status;
        match status {
            SessionStatus::Complete | SessionStatus::Expired | SessionStatus::Finalized => CanFinalize { can_finalize: true, reason: None },
            SessionStatus::Created => CanFinalize { can_finalize: false, reason: Some("session has not started".to_string()) },
            SessionStatus::Active => CanFinalize { can_finalize: false, reason: Some("voting is still active".to_string()) },
            SessionStatus::Cancelled => CanFinalize { can_finalize: false, reason: Some("session was cancelled".to_string()) },
        }
    }

    /// `Complete`/`Expired -> Finalized`: computes results and appends one
    /// finalize block. Idempotent: a second call returns the stored
    /// results without appending another block (spec.md §4.9).
    pub fn finalize(&self, reporter_model_id: &str) -> Result<Vec<ProposalResult>, SessionStateError> {
        self.refresh_expiry();

        {
            let state = self.state.lock();
            if let Some(stored) = &state.stored_results {
                return Ok(stored.clone());
            }
            if !matches!(state.status, SessionStatus::Complete | SessionStatus::Expired) {
                return Err(SessionStateError::NotReadyToFinalize {
                    reason: self.can_finalize().reason.unwrap_or_else(|| "session is not ready".to_string()),
                });
            }
        }

        let mut results = self.tally();
        for result in &mut results {
            result.reporter_model_id = reporter_model_id.to_string();
        }

        let now = self.now();
        self.chain.append_block(PartialBlock {
            timestamp: now,
            block_type: BlockType::Finalize,
            model_id: Some(reporter_model_id.to_string()),
            action: "finalize-session".to_string(),
            file_paths: Vec::new(),
            file_hash: None,
            data: BlockPayload::Finalize(ResultData { results: results.clone() }),
        });

        let mut state = self.state.lock();
        state.status = SessionStatus::Finalized;
        state.stored_results = Some(results.clone());
        let approved = results.iter().filter(|r| r.status == ProposalStatus::Approved).count() as u64;
        tracing::info!(minute_id = %self.minute_id, reporter_model_id, approved, "voting session finalized");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use std::sync::Arc;

    fn make_session(clock: FixedClock) -> VotingSession {
        let participants: HashSet<String> = ["model-a", "model-b"].iter().map(|s| s.to_string()).collect();
        let chain = Chain::create("2026-07", serde_json::json!({}), Arc::new(clock.clone()));
        VotingSession::new(
            "2026-07",
            vec!["BIP-01".to_string()],
            participants,
            1,
            0.5,
            0.5,
            chain,
            Arc::new(clock),
        )
    }

    #[test]
    fn full_lifecycle_reaches_finalized() {
        let clock = FixedClock::new(0);
        let session = make_session(clock.clone());
        session.start().unwrap();
        assert_eq!(session.status(), SessionStatus::Active);

        session
            .submit_vote("model-a", vec![ProposalVote { proposal_id: "BIP-01".to_string(), weight: 8, justification: None, veto: None }], "votes/model-a.json".to_string(), "deadbeef".to_string())
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Active);

        session
            .submit_vote("model-b", vec![ProposalVote { proposal_id: "BIP-01".to_string(), weight: 9, justification: None, veto: None }], "votes/model-b.json".to_string(), "deadbeef".to_string())
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Complete);

        let results = session.finalize("model-a").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ProposalStatus::Approved);
        assert_eq!(results[0].total_score, 17);
        assert_eq!(session.status(), SessionStatus::Finalized);

        let second = session.finalize("model-b").unwrap();
        assert_eq!(second[0].reporter_model_id, "model-a");
    }

    #[test]
    fn duplicate_vote_is_rejected() {
        let clock = FixedClock::new(0);
        let session = make_session(clock);
        session.start().unwrap();
        let vote = vec![ProposalVote { proposal_id: "BIP-01".to_string(), weight: 5, justification: None, veto: None }];
        session.submit_vote("model-a", vote.clone(), "f".to_string(), "h".to_string()).unwrap();
        let result = session.submit_vote("model-a", vote, "f".to_string(), "h".to_string());
        assert!(matches!(result, Err(SessionStateError::DuplicateVote { .. })));
    }

    #[test]
    fn duplicate_proposal_within_one_submission_is_rejected() {
        let clock = FixedClock::new(0);
        let session = make_session(clock);
        session.start().unwrap();
        let votes = vec![
            ProposalVote { proposal_id: "BIP-01".to_string(), weight: 5, justification: None, veto: None },
            ProposalVote { proposal_id: "BIP-01".to_string(), weight: 9, justification: None, veto: None },
        ];
        let result = session.submit_vote("model-a", votes, "f".to_string(), "h".to_string());
        assert!(matches!(result, Err(SessionStateError::DuplicateProposalInVote { .. })));
        // The rejected submission must not have been recorded as a vote.
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[test]
    fn vote_after_deadline_is_rejected() {
        let clock = FixedClock::new(0);
        let session = make_session(clock.clone());
        session.start().unwrap();
        clock.advance(std::time::Duration::from_secs(3 * 3600));
        let vote = vec![ProposalVote { proposal_id: "BIP-01".to_string(), weight: 5, justification: None, veto: None }];
        let result = session.submit_vote("model-a", vote, "f".to_string(), "h".to_string());
        assert!(matches!(result, Err(SessionStateError::DeadlineExceeded)));
        assert_eq!(session.status(), SessionStatus::Expired);
    }

    #[test]
    fn veto_forces_rejection_regardless_of_score() {
        let clock = FixedClock::new(0);
        let session = make_session(clock);
        session.start().unwrap();
        session
            .submit_vote("model-a", vec![ProposalVote { proposal_id: "BIP-01".to_string(), weight: 10, justification: None, veto: Some(true) }], "f".to_string(), "h".to_string())
            .unwrap();
        session
            .submit_vote("model-b", vec![ProposalVote { proposal_id: "BIP-01".to_string(), weight: 10, justification: None, veto: None }], "f".to_string(), "h".to_string())
            .unwrap();
        let results = session.finalize("model-a").unwrap();
        assert_eq!(results[0].status, ProposalStatus::Rejected);
    }
}
