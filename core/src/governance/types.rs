//! Shared governance data types: timestamps, votes, and finalize-time
//! tallies (spec.md §3).
//!
//! `Timestamp` wraps a primitive value that needs a stable, custom wire
//! encoding (cf. [`crate::crypto::hash::Hash256`]'s hex `Serialize`) — here
//! the encoding is UTC ISO-8601 with millisecond precision, per the
//! canonical codec's rule (b).

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A UTC instant, serialized as millisecond-precision ISO-8601
/// (`2026-07-28T00:00:00.000Z`), per the canonical codec (C1 rule b).
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.0).unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap())
    }

    pub fn plus_millis(&self, millis: i64) -> Self {
        Timestamp(self.0 + millis)
    }

    pub fn plus_hours(&self, hours: i64) -> Self {
        self.plus_millis(hours * 3_600_000)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let parsed = DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom)?;
        Ok(Timestamp(parsed.timestamp_millis()))
    }
}

/// One model's vote on one proposal (spec.md §3).
///
/// Invariant (enforced by [`crate::governance::session::VotingSession::submit_vote`],
/// not here): within one voter's submission, `proposalId`s are unique.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalVote {
    pub proposal_id: String,
    pub weight: u8,
    pub justification: Option<String>,
    pub veto: Option<bool>,
}

impl ProposalVote {
    pub fn is_veto(&self) -> bool {
        self.veto.unwrap_or(false)
    }
}

/// Payload of a `vote` block.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteData {
    pub voter_model_id: String,
    pub votes: Vec<ProposalVote>,
    pub vote_file: String,
    pub vote_file_hash: String,
}

/// Per-proposal outcome of a vote tally (spec.md §4.9).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Approved,
    Rejected,
}

/// One proposal's result, as stored in a `finalize` block's payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalResult {
    pub proposal_id: String,
    pub total_score: i64,
    pub participant_count: usize,
    pub status: ProposalStatus,
    pub reporter_model_id: String,
}

/// Payload of a `finalize` block.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultData {
    pub results: Vec<ProposalResult>,
}
