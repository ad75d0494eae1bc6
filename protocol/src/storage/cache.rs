//! Process-lifetime `height → hash` memo.
//!
//! Backed by a `DashMap`, so reads and writes for different heights never
//! contend on a single lock. Two writers racing on the same height is
//! harmless: a height has exactly one hash for a fixed chain state, so
//! whichever write lands last is indistinguishable from the other.
//!
//! The cache never evicts. An interactive session only visits a handful of
//! heights, so growth is bounded in practice.

use dashmap::DashMap;
use tracing::trace;

use super::block::BlockRecord;

/// Memoised block records keyed by height.
#[derive(Debug)]
pub struct BlockCache {
    records: DashMap<u64, BlockRecord>,
}

impl BlockCache {
    /// Creates a cache seeded with the genesis record.
    pub fn new() -> Self {
        let cache = Self::empty();
        cache.put(BlockRecord::genesis());
        cache
    }

    /// Creates a cache with nothing in it, not even genesis.
    pub fn empty() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Returns the record for `height`, if one has been stored.
    pub fn get(&self, height: u64) -> Option<BlockRecord> {
        self.records.get(&height).map(|r| r.value().clone())
    }

    /// Stores `record`, replacing any previous record at the same height.
    pub fn put(&self, record: BlockRecord) {
        trace!(height = record.height, hash = %record.hash, "caching block");
        self.records.insert(record.height, record);
    }

    /// Whether `height` has been resolved before.
    pub fn contains(&self, height: u64) -> bool {
        self.records.contains_key(&height)
    }

    /// Number of cached heights.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new()
    }
}
