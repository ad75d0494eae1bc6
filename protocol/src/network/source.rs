//! # Block Source Contract
//!
//! The core never talks to the network directly. It depends on
//! [`BlockSource`], which answers two questions: "what is the hash at height
//! H?" and "what is the current tip height?". The production implementation
//! is [`HttpBlockSource`](super::http::HttpBlockSource); tests plug in
//! scripted sources.
//!
//! Every call takes a [`CancellationToken`]. Cancellation is cooperative: a
//! source should stop waiting on the transport once the token fires and
//! return [`FetchError::Cancelled`], but a response that was already in
//! flight may still be returned and it is the caller's job to discard it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::storage::BlockHash;

// ---------------------------------------------------------------------------
// FetchError
// ---------------------------------------------------------------------------

/// Why a [`BlockSource`] call produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout, or other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// The body could not be interpreted (bad hash, non-numeric height).
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// The request was abandoned because its token was cancelled. Not a
    /// failure from the user's point of view.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether this is a cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Owner side of a cancellable operation. Dropping it cancels too.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, passed into [`BlockSource`] calls.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
    /// Set only by [`CancellationToken::never`], which has no handle.
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

/// Creates a linked handle/token pair.
pub fn cancellation_pair() -> (CancelHandle, CancellationToken) {
    let (tx, rx) = watch::channel(false);
    let token = CancellationToken {
        rx,
        _keepalive: None,
    };
    (CancelHandle { tx }, token)
}

impl CancelHandle {
    /// Signals cancellation to every clone of the token.
    pub fn cancel(&self) {
        // send_replace never fails, even with no receivers left.
        self.tx.send_replace(true);
    }
}

impl CancellationToken {
    /// A token that is never cancelled. For one-shot calls that nobody will
    /// supersede, such as the startup tip fetch from the CLI.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    /// Whether cancellation has been requested (or the handle was dropped).
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the token is cancelled or its handle is dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // wait_for errors only when the sender is gone, which also counts.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

// ---------------------------------------------------------------------------
// BlockSource
// ---------------------------------------------------------------------------

/// Supplier of block hashes and the chain tip.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Hash of the block at `height`.
    async fn fetch_hash_by_height(
        &self,
        height: u64,
        cancel: &CancellationToken,
    ) -> Result<BlockHash, FetchError>;

    /// Height of the most recent block.
    async fn fetch_tip_height(&self, cancel: &CancellationToken) -> Result<u64, FetchError>;
}
