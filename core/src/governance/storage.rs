//! On-disk layout for governance chains (spec.md §6).
//!
//! Every write goes through [`write_json_atomic`]: serialize to a temp
//! file in the same directory, then `rename` over the destination. This
//! is the write-temp+rename discipline spec.md §5 calls out explicitly
//! for the durable copy of a chain, written directly against `std::fs`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::governance::chain::ChainSnapshot;
use crate::governance::scheduler::ReminderSchedule;
use crate::governance::types::{ProposalVote, Timestamp};

/// A signed vote record as stored under `votes/<modelId>.json`, referenced
/// from the corresponding vote block's `filePaths` (spec.md §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub voter_model_id: String,
    pub votes: Vec<ProposalVote>,
    pub timestamp: Timestamp,
    /// Hex-encoded compact signature over the canonical vote payload,
    /// present when the submitting model signed its vote (spec.md §4.3).
    pub signature: Option<String>,
}

/// The root `blockchain.json` aggregating every topic's chain (spec.md §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainIndex {
    pub version: String,
    pub created: Timestamp,
    pub total_bips: usize,
    pub description: String,
    pub chains: Vec<ChainSnapshot>,
}

/// Writes `value` to `path` atomically: serialize to a sibling temp file,
/// then rename it over `path`. UTF-8, LF line endings, 2-space indent
/// (spec.md §6).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    buf.push(b'\n');

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, &buf)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp");
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Reads and deserializes `path`, returning `None` if it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// The on-disk layout for governance data, rooted at a configurable
/// directory (default `gov/minutes/`, spec.md §6).
pub struct GovStorage {
    root: PathBuf,
}

impl GovStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn topic_dir(&self, topic_id: &str) -> PathBuf {
        self.root.join(topic_id)
    }

    pub fn chain_path(&self, topic_id: &str) -> PathBuf {
        self.topic_dir(topic_id).join("chain.json")
    }

    pub fn notifications_path(&self, topic_id: &str) -> PathBuf {
        self.topic_dir(topic_id).join("notifications.json")
    }

    pub fn reminder_schedule_path(&self, topic_id: &str) -> PathBuf {
        self.topic_dir(topic_id).join("reminder_schedule.json")
    }

    pub fn vote_path(&self, topic_id: &str, model_id: &str) -> PathBuf {
        self.topic_dir(topic_id).join("votes").join(format!("{model_id}.json"))
    }

    pub fn blockchain_index_path(&self) -> PathBuf {
        self.root.join("blockchain.json")
    }

    pub fn save_chain(&self, snapshot: &ChainSnapshot) -> io::Result<()> {
        write_json_atomic(&self.chain_path(&snapshot.topic_id), snapshot)
    }

    pub fn load_chain(&self, topic_id: &str) -> io::Result<Option<ChainSnapshot>> {
        read_json(&self.chain_path(topic_id))
    }

    pub fn append_notification<T: Serialize + DeserializeOwned>(&self, topic_id: &str, event: T) -> io::Result<()> {
        let path = self.notifications_path(topic_id);
        let mut log: Vec<T> = read_json(&path)?.unwrap_or_default();
        log.push(event);
        write_json_atomic(&path, &log)
    }

    pub fn save_reminder_schedule(&self, topic_id: &str, schedule: &ReminderSchedule) -> io::Result<()> {
        write_json_atomic(&self.reminder_schedule_path(topic_id), schedule)
    }

    pub fn load_reminder_schedule(&self, topic_id: &str) -> io::Result<Option<ReminderSchedule>> {
        read_json(&self.reminder_schedule_path(topic_id))
    }

    pub fn save_vote_record(&self, topic_id: &str, model_id: &str, record: &VoteRecord) -> io::Result<()> {
        write_json_atomic(&self.vote_path(topic_id, model_id), record)
    }

    pub fn load_vote_record(&self, topic_id: &str, model_id: &str) -> io::Result<Option<VoteRecord>> {
        read_json(&self.vote_path(topic_id, model_id))
    }

    pub fn save_blockchain_index(&self, index: &BlockchainIndex) -> io::Result<()> {
        write_json_atomic(&self.blockchain_index_path(), index)
    }

    pub fn load_blockchain_index(&self) -> io::Result<Option<BlockchainIndex>> {
        read_json(&self.blockchain_index_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let storage = GovStorage::new(dir.path());
        let record = VoteRecord {
            voter_model_id: "model-a".to_string(),
            votes: vec![ProposalVote { proposal_id: "BIP-01".to_string(), weight: 8, justification: None, veto: None }],
            timestamp: Timestamp::from_millis(0),
            signature: None,
        };
        storage.save_vote_record("2026-07", "model-a", &record).unwrap();
        let loaded = storage.load_vote_record("2026-07", "model-a").unwrap().unwrap();
        assert_eq!(loaded.voter_model_id, "model-a");
        assert_eq!(loaded.votes.len(), 1);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let storage = GovStorage::new(dir.path());
        let loaded: Option<VoteRecord> = storage.load_vote_record("2026-07", "model-z").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn notifications_append_accumulates() {
        let dir = tempdir().unwrap();
        let storage = GovStorage::new(dir.path());
        storage.append_notification("2026-07", "event-1".to_string()).unwrap();
        storage.append_notification("2026-07", "event-2".to_string()).unwrap();
        let log: Vec<String> = read_json(&storage.notifications_path("2026-07")).unwrap().unwrap();
        assert_eq!(log, vec!["event-1".to_string(), "event-2".to_string()]);
    }

    #[test]
    fn written_file_has_trailing_newline_and_two_space_indent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");
        write_json_atomic(&path, &serde_json::json!({"a": 1})).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
        assert!(contents.contains("  \"a\""));
    }
}
