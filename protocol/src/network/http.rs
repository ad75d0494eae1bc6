//! Esplora-style HTTP block source.
//!
//! Two plain-text endpoints are all the navigator needs:
//!
//! | Method | Path                    | Body on 2xx            |
//! |--------|-------------------------|------------------------|
//! | GET    | `/block-height/{h}`     | block hash, hex        |
//! | GET    | `/blocks/tip/height`    | tip height, decimal    |
//!
//! Any non-2xx status or transport error is a [`FetchError`]. A cancelled
//! token drops the in-flight request future, which aborts the connection.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::source::{BlockSource, CancellationToken, FetchError};
use crate::config::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::storage::BlockHash;

/// Connection settings for [`HttpBlockSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// API origin, e.g. `https://blockstream.info/api`. A trailing slash is
    /// tolerated.
    pub base_url: String,

    /// Whole-request timeout, connect through body.
    pub request_timeout: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// [`BlockSource`] over a block explorer's REST API.
#[derive(Debug, Clone)]
pub struct HttpBlockSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlockSource {
    /// Builds the HTTP client. Fails only if the TLS backend cannot be
    /// initialised.
    pub fn new(config: HttpSourceConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The origin requests are sent to, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn block_height_url(&self, height: u64) -> String {
        format!("{}/block-height/{}", self.base_url, height)
    }

    fn tip_height_url(&self) -> String {
        format!("{}/blocks/tip/height", self.base_url)
    }

    async fn get_text(&self, url: &str, cancel: &CancellationToken) -> Result<String, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .text()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url, "request cancelled");
                Err(FetchError::Cancelled)
            }
            res = request => res,
        }
    }
}

#[async_trait]
impl BlockSource for HttpBlockSource {
    async fn fetch_hash_by_height(
        &self,
        height: u64,
        cancel: &CancellationToken,
    ) -> Result<BlockHash, FetchError> {
        let url = self.block_height_url(height);
        let body = self.get_text(&url, cancel).await?;
        BlockHash::parse(&body).map_err(|e| FetchError::InvalidBody(e.to_string()))
    }

    async fn fetch_tip_height(&self, cancel: &CancellationToken) -> Result<u64, FetchError> {
        let url = self.tip_height_url();
        let body = self.get_text(&url, cancel).await?;
        body.trim()
            .parse::<u64>()
            .map_err(|e| FetchError::InvalidBody(format!("tip height {:?}: {e}", body.trim())))
    }
}
