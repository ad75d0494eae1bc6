//! # Block Records
//!
//! A block, as far as coordinate derivation cares, is a height and a hash.
//! [`BlockHash`] enforces the 64-lowercase-hex-character shape at the type
//! level so nothing downstream has to re-check it, and [`BlockRecord`] pairs
//! it with the height it was fetched for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BLOCK_HASH_HEX_LENGTH, GENESIS_BLOCK_HASH, GENESIS_HEIGHT};

/// Errors from [`BlockHash::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// Wrong number of characters after trimming.
    #[error("block hash must be 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// Non-hex characters present.
    #[error("block hash is not valid hex: {0}")]
    InvalidHex(String),
}

// ---------------------------------------------------------------------------
// BlockHash
// ---------------------------------------------------------------------------

/// A 256-bit block hash as 64 lowercase hex characters.
///
/// Kept as text rather than `[u8; 32]` because the derivation slices the
/// hex string itself, and explorers hand it to us in that form anyway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockHash(String);

impl BlockHash {
    /// Parses a hash from text.
    ///
    /// Surrounding whitespace is ignored (plain-text HTTP bodies often end
    /// in a newline) and uppercase hex is normalised to lowercase.
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let s = s.trim();
        if s.len() != BLOCK_HASH_HEX_LENGTH {
            return Err(HashError::InvalidLength(s.len()));
        }
        hex::decode(s).map_err(|e| HashError::InvalidHex(e.to_string()))?;
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The hash of block 0.
    pub fn genesis() -> Self {
        Self(GENESIS_BLOCK_HASH.to_string())
    }

    /// Hex text, always lowercase and exactly 64 characters.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The second half of the hash (characters 32..64), split into the
    /// latitude half and the longitude half.
    pub fn coordinate_halves(&self) -> (&str, &str) {
        let tail = &self.0[32..];
        tail.split_at(16)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlockHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlockHash {
    type Error = HashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BlockHash> for String {
    fn from(h: BlockHash) -> Self {
        h.0
    }
}

// ---------------------------------------------------------------------------
// BlockRecord
// ---------------------------------------------------------------------------

/// A resolved `height → hash` pair. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Position in the chain, 0 for genesis.
    pub height: u64,
    /// Hash of the block at `height`.
    pub hash: BlockHash,
}

impl BlockRecord {
    /// Pairs a height with its hash.
    pub fn new(height: u64, hash: BlockHash) -> Self {
        Self { height, hash }
    }

    /// The well-known genesis record. Needs no network call.
    pub fn genesis() -> Self {
        Self::new(GENESIS_HEIGHT, BlockHash::genesis())
    }
}
