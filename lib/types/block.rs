//! The `Block` value type: immutable once constructed, self-verifying.

use crate::sha256::{CanonicalHasher, Hash};
use crate::types::Transaction;
use crate::util::Saveable;
use crate::{FIELD_ENCODING_WIDTH, GENESIS_TIMESTAMP};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult, Write};
use std::sync::atomic::{AtomicBool, Ordering};

fn truncate_to_seconds(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.timestamp(), 0).expect("in-range timestamp")
}

/// The raw (JSON-like) wire form from the specification's §6.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockRaw {
    pub index: u64,
    #[serde(rename = "previousHash")]
    pub previous_hash: Option<String>,
    pub timestamp: i64,
    pub data: Vec<Transaction>,
    pub difficulty: u32,
    pub nonce: u64,
    pub hash: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: Option<Hash>,
    pub timestamp: DateTime<Utc>,
    pub data: Vec<Transaction>,
    pub difficulty: u32,
    pub nonce: u64,
    pub hash: Hash,
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.previous_hash == other.previous_hash
            && self.timestamp == other.timestamp
            && self.difficulty == other.difficulty
            && self.nonce == other.nonce
            && self.hash == other.hash
            && self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.id == b.id)
    }
}
impl Eq for Block {}

impl Block {
    /// Computes and stores the hash; does not validate difficulty.
    ///
    /// `timestamp` is truncated to whole seconds, matching both the
    /// canonical hash (which only ever hashes `timestamp.timestamp()`) and
    /// the wire form's `i64` seconds field, so a block's stored timestamp
    /// never drifts from what was hashed or what a round-trip through
    /// [`BlockRaw`] reconstructs.
    pub fn new(
        index: u64,
        previous_hash: Option<Hash>,
        timestamp: DateTime<Utc>,
        data: Vec<Transaction>,
        difficulty: u32,
        nonce: u64,
    ) -> Self {
        let timestamp = truncate_to_seconds(timestamp);
        let hash = Self::calculate_hash(index, previous_hash.as_ref(), timestamp, &data, difficulty, nonce);
        Block {
            index,
            previous_hash,
            timestamp,
            data,
            difficulty,
            nonce,
            hash,
        }
    }

    /// The canonical hash for the given fields, per §4.1: index || previous
    /// hash (or zero) || timestamp || each transaction id || difficulty ||
    /// nonce, all integers encoded as `FIELD_ENCODING_WIDTH`-byte big-endian.
    pub fn calculate_hash(
        index: u64,
        previous_hash: Option<&Hash>,
        timestamp: DateTime<Utc>,
        data: &[Transaction],
        difficulty: u32,
        nonce: u64,
    ) -> Hash {
        debug_assert_eq!(FIELD_ENCODING_WIDTH, 8);
        let mut hasher = CanonicalHasher::new()
            .update_u64_be(index)
            .update_hash_or_zero(previous_hash)
            .update_i64_be(timestamp.timestamp());
        for tx in data {
            hasher = hasher.update_hash(&tx.get_id());
        }
        hasher
            .update_u64_be(difficulty as u64)
            .update_u64_be(nonce)
            .finalize()
    }

    /// The fixed first block of every valid chain.
    pub fn genesis() -> Self {
        let timestamp = DateTime::from_timestamp(GENESIS_TIMESTAMP, 0).expect("fixed constant");
        Block::new(0, None, timestamp, vec![], 0, 0)
    }

    pub fn is_genesis(&self) -> bool {
        *self == Block::genesis()
    }

    /// Searches for a nonce satisfying `difficulty`, starting from zero.
    /// Returns `None` if `cancel` is set before a conforming nonce is found.
    /// The search yields by checking `cancel` every `CANCEL_CHECK_INTERVAL`
    /// nonces so a caller on another thread can preempt a long-running mine.
    pub fn mine(
        index: u64,
        previous_hash: Option<Hash>,
        timestamp: DateTime<Utc>,
        data: Vec<Transaction>,
        difficulty: u32,
        cancel: &AtomicBool,
    ) -> Option<Self> {
        const CANCEL_CHECK_INTERVAL: u64 = 4096;
        let timestamp = truncate_to_seconds(timestamp);
        let mut nonce: u64 = 0;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return None;
            }
            let hash = Self::calculate_hash(index, previous_hash.as_ref(), timestamp, &data, difficulty, nonce);
            if hash.satisfies_difficulty(difficulty) {
                return Some(Block {
                    index,
                    previous_hash,
                    timestamp,
                    data,
                    difficulty,
                    nonce,
                    hash,
                });
            }
            nonce += 1;
        }
    }

    /// Recomputes the hash and checks both equality with the stored hash and
    /// difficulty satisfaction.
    pub fn has_valid_hash(&self) -> bool {
        let recomputed = Self::calculate_hash(
            self.index,
            self.previous_hash.as_ref(),
            self.timestamp,
            &self.data,
            self.difficulty,
            self.nonce,
        );
        if recomputed != self.hash {
            tracing::debug!(block = self.index, "block hash does not match its fields");
            return false;
        }
        if !self.hash.satisfies_difficulty(self.difficulty) {
            tracing::debug!(
                block = self.index,
                difficulty = self.difficulty,
                "block hash does not satisfy its declared difficulty"
            );
            return false;
        }
        true
    }

    /// Is `candidate` a valid immediate successor of `self`?
    pub fn is_valid_next(&self, candidate: &Block) -> bool {
        if candidate.index != self.index + 1 {
            tracing::debug!("invalid index");
            return false;
        }
        if candidate.previous_hash != Some(self.hash) {
            tracing::debug!("invalid previous hash");
            return false;
        }
        if !Self::is_valid_timestamp(candidate, self) {
            tracing::debug!("invalid timestamp");
            return false;
        }
        if !candidate.has_valid_hash() {
            return false;
        }
        true
    }

    /// Timestamp tolerance: both comparisons are strict `<`, so a timestamp
    /// exactly 60s away in either direction is rejected.
    fn is_valid_timestamp(candidate: &Block, previous: &Block) -> bool {
        let behind_previous = (previous.timestamp - candidate.timestamp).num_seconds() < 60;
        let ahead_of_now = (candidate.timestamp - Utc::now()).num_seconds() < 60;
        behind_previous && ahead_of_now
    }

    pub fn to_raw(&self) -> BlockRaw {
        BlockRaw {
            index: self.index,
            previous_hash: self.previous_hash.map(|h| h.to_hex()),
            timestamp: self.timestamp.timestamp(),
            data: self.data.clone(),
            difficulty: self.difficulty,
            nonce: self.nonce,
            hash: self.hash.to_hex(),
        }
    }

    pub fn from_raw(raw: BlockRaw) -> crate::Result<Self> {
        let previous_hash = raw
            .previous_hash
            .map(|h| Hash::from_hex(&h))
            .transpose()
            .map_err(|e| crate::ChainError::bad_request(format!("invalid previousHash: {e}")))?;
        let timestamp = DateTime::from_timestamp(raw.timestamp, 0)
            .ok_or_else(|| crate::ChainError::bad_request("invalid timestamp"))?;
        let hash = Hash::from_hex(&raw.hash)
            .map_err(|e| crate::ChainError::bad_request(format!("invalid hash: {e}")))?;
        Ok(Block {
            index: raw.index,
            previous_hash,
            timestamp,
            data: raw.data,
            difficulty: raw.difficulty,
            nonce: raw.nonce,
            hash,
        })
    }
}

impl Saveable for Block {
    fn load<I: Read>(reader: I) -> IoResult<Self> {
        ciborium::de::from_reader(reader)
            .map_err(|_| IoError::new(IoErrorKind::InvalidData, "failed to deserialize block"))
    }

    fn save<O: Write>(&self, writer: O) -> IoResult<()> {
        ciborium::ser::into_writer(self, writer)
            .map_err(|_| IoError::new(IoErrorKind::InvalidData, "failed to serialize block"))
    }
}
