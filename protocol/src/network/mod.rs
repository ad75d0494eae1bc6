//! # Network Module
//!
//! Everything that waits on the outside world, plus the state machine that
//! decides what to do with the answers.
//!
//! ## Architecture
//!
//! ```text
//! source.rs     — BlockSource contract, FetchError, cancellation tokens
//! http.rs       — HttpBlockSource over an Esplora-style REST API (reqwest)
//! navigator.rs  — HeightNavigator: cache-first, most-recent-wins selection
//! ```
//!
//! ## Design Decisions
//!
//! - The navigator depends on `Arc<dyn BlockSource>`, never on reqwest. Tests
//!   drive it with scripted sources and no sockets.
//! - Cancellation is a `tokio::sync::watch` flag. The navigator owns the
//!   sending half for the current selection; superseding a selection fires it
//!   and issues a new one, so no shared state is mutated by a stale fetch.
//! - Navigator state sits behind a `parking_lot::Mutex` that is never held
//!   across an `.await`.

pub mod http;
pub mod navigator;
pub mod source;

pub use http::{HttpBlockSource, HttpSourceConfig};
pub use navigator::{
    HeightNavigator, HeightState, Jump, JumpHeights, NavigationSnapshot, NavigatorConfig,
    Selection,
};
pub use source::{cancellation_pair, BlockSource, CancelHandle, CancellationToken, FetchError};
