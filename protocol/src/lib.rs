// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bitcoin Places — Core Library
//!
//! Every block hash is a public, unforgeable random number. This crate turns
//! one into a place: a coordinate in the same one-degree cell as a reference
//! point you choose, reproducible by anyone holding the same hash.
//!
//! ## Architecture
//!
//! - **geo** — Base conversion, the hash → coordinate deriver, and the
//!   one-degree graticule around a reference.
//! - **storage** — Validated block hashes, block records, and the
//!   process-lifetime height → hash cache.
//! - **network** — The block source contract, its HTTP implementation, and
//!   the height navigator that ties cache and source together.
//! - **config** — Chain cadence constants, genesis, and network defaults.
//!
//! ## Flow
//!
//! ```text
//! select_height(h) ──> BlockCache ──miss──> BlockSource ──> BlockCache
//!                          │                                    │
//!                          └──────────hit──────┬────────────────┘
//!                                              v
//!                               derive(hash, reference) ──> Coordinate
//! ```
//!
//! ## Design Philosophy
//!
//! 1. Derivation is pure. Same hash, same reference, same bits. Forever.
//! 2. Numbers wider than 64 bits go through `BigUint`, never through `f64`.
//! 3. Network failures become state, not panics.

pub mod config;
pub mod geo;
pub mod network;
pub mod storage;

pub use geo::{derive, BlockPlace, Coordinate};
pub use network::{BlockSource, HeightNavigator, Jump, JumpHeights, Selection};
pub use storage::{BlockCache, BlockHash, BlockRecord};
