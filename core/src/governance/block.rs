//! Audit-chain block type and canonical hashing (spec.md §3, §4.8).
//!
//! A header of linking fields plus a payload, hashed by serializing a
//! canonical form (canonical-JSON+SHA-256, per spec.md §4.2) and feeding it
//! to a digest function. The hash is computed over the block *excluding its
//! own hash field* rather than over the whole struct, since here the hash
//! is a field of the record it describes.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::Hash256;
use crate::governance::types::{ResultData, Timestamp, VoteData};

/// Discriminates a [`Block`]'s payload kind. Kept as its own field
/// (rather than derived from [`BlockPayload`]) because spec.md §3 lists
/// `type` as a first-class attribute of a block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Genesis,
    Start,
    Vote,
    Finalize,
    Draft,
}

/// Typed payload carried by a block, matched to its [`BlockType`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockPayload {
    Vote(VoteData),
    Finalize(ResultData),
    /// Genesis and session-start blocks carry free-form metadata; every
    /// other block carries a strongly-typed payload.
    Metadata(serde_json::Value),
}

/// One element of an audit chain.
///
/// Invariants (spec.md §3, enforced by [`crate::governance::chain`], not
/// by this type): `index` strictly increasing from 1; `previous_hash` is
/// `None` iff `index == 1`; `hash` equals the SHA-256 of this block's
/// canonical bytes with `hash` itself omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: Timestamp,
    pub previous_hash: Option<Hash256>,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub model_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub file_paths: Vec<String>,
    pub file_hash: Option<Hash256>,
    pub data: BlockPayload,
    pub hash: Hash256,
}

/// The same fields as [`Block`] minus `hash` — the record that actually
/// gets hashed, matching spec.md §4.8's "SHA-256(canonical(block without
/// hash))".
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnhashedBlock<'a> {
    index: u64,
    timestamp: Timestamp,
    previous_hash: Option<Hash256>,
    #[serde(rename = "type")]
    block_type: BlockType,
    model_id: &'a Option<String>,
    action: &'a str,
    file_paths: &'a [String],
    file_hash: Option<Hash256>,
    data: &'a BlockPayload,
}

/// A block's fields prior to hash assignment, as handed to
/// [`crate::governance::chain::append_block`].
pub struct PartialBlock {
    pub timestamp: Timestamp,
    pub block_type: BlockType,
    pub model_id: Option<String>,
    pub action: String,
    pub file_paths: Vec<String>,
    pub file_hash: Option<Hash256>,
    pub data: BlockPayload,
}

impl Block {
    /// Computes `index`, `previous_hash`, and `hash` for `partial` given
    /// the values of the chain's current tail block (or `None` for the
    /// genesis block).
    pub fn assemble(partial: PartialBlock, tail: Option<&Block>) -> Block {
        let index = tail.map(|t| t.index + 1).unwrap_or(1);
        let previous_hash = tail.map(|t| t.hash);

        let unhashed = UnhashedBlock {
            index,
            timestamp: partial.timestamp,
            previous_hash,
            block_type: partial.block_type,
            model_id: &partial.model_id,
            action: &partial.action,
            file_paths: &partial.file_paths,
            file_hash: partial.file_hash,
            data: &partial.data,
        };
        let hash = Hash256::of_record(&unhashed);

        Block {
            index,
            timestamp: partial.timestamp,
            previous_hash,
            block_type: partial.block_type,
            model_id: partial.model_id,
            action: partial.action,
            file_paths: partial.file_paths,
            file_hash: partial.file_hash,
            data: partial.data,
            hash,
        }
    }

    /// Recomputes this block's hash from its current fields, for
    /// integrity verification.
    pub fn recompute_hash(&self) -> Hash256 {
        let unhashed = UnhashedBlock {
            index: self.index,
            timestamp: self.timestamp,
            previous_hash: self.previous_hash,
            block_type: self.block_type,
            model_id: &self.model_id,
            action: &self.action,
            file_paths: &self.file_paths,
            file_hash: self.file_hash,
            data: &self.data,
        };
        Hash256::of_record(&unhashed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis(timestamp: Timestamp) -> Block {
        Block::assemble(
            PartialBlock {
                timestamp,
                block_type: BlockType::Genesis,
                model_id: None,
                action: "create-chain".to_string(),
                file_paths: Vec::new(),
                file_hash: None,
                data: BlockPayload::Metadata(serde_json::json!({"topicId": "BIP-01"})),
            },
            None,
        )
    }

    #[test]
    fn genesis_block_has_null_previous_hash_and_index_one() {
        let block = genesis(Timestamp::from_millis(0));
        assert_eq!(block.index, 1);
        assert!(block.previous_hash.is_none());
        assert_eq!(block.recompute_hash(), block.hash);
    }

    #[test]
    fn appended_block_links_to_tail() {
        let g = genesis(Timestamp::from_millis(0));
        let next = Block::assemble(
            PartialBlock {
                timestamp: Timestamp::from_millis(1_000),
                block_type: BlockType::Start,
                model_id: None,
                action: "start-session".to_string(),
                file_paths: Vec::new(),
                file_hash: None,
                data: BlockPayload::Metadata(serde_json::json!({"minuteId": "2026-07"})),
            },
            Some(&g),
        );
        assert_eq!(next.index, 2);
        assert_eq!(next.previous_hash, Some(g.hash));
        assert_eq!(next.recompute_hash(), next.hash);
    }

    #[test]
    fn hash_changes_if_any_field_changes() {
        let g = genesis(Timestamp::from_millis(0));
        let mut tampered = g.clone();
        tampered.action = "tampered".to_string();
        assert_ne!(tampered.recompute_hash(), tampered.hash);
    }
}
