//! # Storage Module
//!
//! In-memory storage for resolved blocks. Nothing here touches disk: the
//! cache lives exactly as long as the process.
//!
//! ## Architecture
//!
//! ```text
//! block.rs  — BlockHash (validated hex) and BlockRecord (height + hash)
//! cache.rs  — BlockCache, the concurrent height → record memo
//! ```
//!
//! Genesis is seeded as a literal at construction. Every other record is
//! inserted on the first successful fetch for its height and is never
//! removed.

pub mod block;
pub mod cache;

pub use block::{BlockHash, BlockRecord, HashError};
pub use cache::BlockCache;
