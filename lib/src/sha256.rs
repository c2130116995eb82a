//! Content-addressed 32-byte digests and the canonical block hasher.
//!
//! `Hash` wraps a raw SHA-256 digest. The canonical encoding used to derive a
//! block's own hash is implemented here as [`CanonicalHasher`] rather than on
//! `Block` itself, so the byte layout consensus depends on lives in one place
//! and is independently testable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash as StdHash;

/// A 32-byte SHA-256 digest, used both as a block hash and a transaction id.
#[derive(Clone, Copy, PartialEq, Eq, StdHash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Hash([u8; 32]);

impl Hash {
    pub fn zero() -> Self {
        Hash([0u8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut out = [0u8; 32];
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        out.copy_from_slice(&bytes);
        Ok(Hash(out))
    }

    /// Hashes an arbitrary byte slice directly (used for things that are not
    /// part of the block's canonical encoding, e.g. signing a UTXO
    /// reference).
    pub fn hash_bytes(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash(out)
    }

    /// Does the first `difficulty` bits of this hash (most-significant-bit
    /// first, across the 32 bytes) equal zero? `difficulty == 0` is always
    /// satisfied.
    pub fn satisfies_difficulty(&self, difficulty: u32) -> bool {
        if difficulty == 0 {
            return true;
        }
        let zero_bytes = (difficulty / 8) as usize;
        let zero_bits = (difficulty % 8) as u8;

        if zero_bytes >= self.0.len() {
            return self.0.iter().all(|&b| b == 0);
        }
        if self.0[..zero_bytes].iter().any(|&b| b != 0) {
            return false;
        }
        if zero_bits == 0 {
            return true;
        }
        self.0[zero_bytes].leading_zeros() as u8 >= zero_bits
    }
}

impl From<Hash> for String {
    fn from(h: Hash) -> Self {
        h.to_hex()
    }
}

impl TryFrom<String> for Hash {
    type Error = hex::FromHexError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Hash::from_hex(&s)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Builds the canonical byte encoding a block hashes over, one field at a
/// time, in the exact order consensus requires:
///
/// 1. `index` as 8-byte big-endian.
/// 2. `previous_hash` raw bytes, or 32 zero bytes if absent.
/// 3. `timestamp` (Unix seconds) as 8-byte big-endian.
/// 4. Each transaction's id, 32 bytes, in order.
/// 5. `difficulty` as 8-byte big-endian.
/// 6. `nonce` as 8-byte big-endian.
///
/// This is deterministic across implementations: identical inputs produce a
/// bit-identical digest, which is what makes it usable as a consensus rule
/// rather than just a cache key.
pub struct CanonicalHasher {
    hasher: Sha256,
}

impl CanonicalHasher {
    pub fn new() -> Self {
        CanonicalHasher {
            hasher: Sha256::new(),
        }
    }

    pub fn update_u64_be(mut self, value: u64) -> Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn update_i64_be(mut self, value: i64) -> Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn update_hash_or_zero(mut self, hash: Option<&Hash>) -> Self {
        match hash {
            Some(h) => self.hasher.update(h.0),
            None => self.hasher.update([0u8; 32]),
        }
        self
    }

    pub fn update_hash(mut self, hash: &Hash) -> Self {
        self.hasher.update(hash.0);
        self
    }

    pub fn finalize(self) -> Hash {
        let digest = self.hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash(out)
    }
}

impl Default for CanonicalHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_zero_always_satisfied() {
        let h = Hash::from_bytes([0xFF; 32]);
        assert!(h.satisfies_difficulty(0));
    }

    #[test]
    fn difficulty_byte_aligned() {
        let mut bytes = [0xFF; 32];
        bytes[0] = 0x00;
        let h = Hash::from_bytes(bytes);
        assert!(h.satisfies_difficulty(8));
        assert!(!h.satisfies_difficulty(9));
    }

    #[test]
    fn difficulty_bit_aligned() {
        let mut bytes = [0xFF; 32];
        bytes[0] = 0b0000_1111;
        let h = Hash::from_bytes(bytes);
        assert!(h.satisfies_difficulty(4));
        assert!(!h.satisfies_difficulty(5));
    }

    #[test]
    fn deterministic_across_calls() {
        let h1 = CanonicalHasher::new()
            .update_u64_be(1)
            .update_hash_or_zero(None)
            .update_i64_be(1000)
            .update_u64_be(0)
            .update_u64_be(0)
            .finalize();
        let h2 = CanonicalHasher::new()
            .update_u64_be(1)
            .update_hash_or_zero(None)
            .update_i64_be(1000)
            .update_u64_be(0)
            .update_u64_be(0)
            .finalize();
        assert_eq!(h1, h2);
    }

    #[test]
    fn hex_round_trip() {
        let h = Hash::hash_bytes(b"hello");
        let hex = h.to_hex();
        assert_eq!(Hash::from_hex(&hex).unwrap(), h);
    }
}
