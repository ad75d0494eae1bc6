//! # Constants & Defaults
//!
//! Every magic number the coordinate engine depends on lives here. The block
//! cadence constants feed the quick-jump heights, the genesis constants seed
//! the cache, and the network defaults point at a public block explorer.
//!
//! Changing `FRACTION_DIGITS` or the hash slice layout changes every derived
//! coordinate ever published. Don't.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Chain Cadence
// ---------------------------------------------------------------------------

/// Average blocks per day, assuming the ten-minute target spacing.
pub const BLOCKS_PER_DAY: u64 = 6 * 24;

/// Average blocks per week.
pub const BLOCKS_PER_WEEK: u64 = BLOCKS_PER_DAY * 7;

/// Height of the first block in the chain.
pub const GENESIS_HEIGHT: u64 = 0;

/// Hash of block 0. Seeded into every cache so the genesis coordinate never
/// needs a network round-trip.
pub const GENESIS_BLOCK_HASH: &str =
    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

/// Hex characters in a 256-bit block hash.
pub const BLOCK_HASH_HEX_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Number of decimal digits taken from each converted hash half.
pub const FRACTION_DIGITS: usize = 6;

/// Fallback reference point (latitude, longitude) when the caller has none.
/// Austin, TX.
pub const DEFAULT_REFERENCE: (f64, f64) = (30.375115, -97.687444);

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Public Esplora-compatible API origin.
pub const DEFAULT_API_BASE_URL: &str = "https://blockstream.info/api";

/// Per-request timeout for the HTTP block source.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Quiet period before a height selection hits the network. Rapid input
/// (typing a height digit by digit) collapses into one fetch.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Default port for the node's HTTP API.
pub const DEFAULT_API_PORT: u16 = 9750;
