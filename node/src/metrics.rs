//! # Prometheus Metrics
//!
//! Operational counters for the API server, scraped at `/metrics`.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] with the
//! `places` prefix, so they never collide with the default global registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Coordinates served, from any endpoint.
    pub coordinate_requests_total: IntCounter,
    /// Block fetches that ended in a visible failure.
    pub fetch_failures_total: IntCounter,
    /// Selections replaced by a newer one before they resolved.
    pub superseded_selections_total: IntCounter,
    /// Entries in the block cache, genesis included.
    pub cached_blocks: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("places".into()), None)
            .expect("failed to create prometheus registry");

        let coordinate_requests_total = IntCounter::new(
            "coordinate_requests_total",
            "Total number of coordinates derived and returned",
        )
        .expect("metric creation");
        registry
            .register(Box::new(coordinate_requests_total.clone()))
            .expect("metric registration");

        let fetch_failures_total = IntCounter::new(
            "fetch_failures_total",
            "Total number of block fetches that failed for the current selection",
        )
        .expect("metric creation");
        registry
            .register(Box::new(fetch_failures_total.clone()))
            .expect("metric registration");

        let superseded_selections_total = IntCounter::new(
            "superseded_selections_total",
            "Total number of selections superseded by a newer one",
        )
        .expect("metric creation");
        registry
            .register(Box::new(superseded_selections_total.clone()))
            .expect("metric registration");

        let cached_blocks = IntGauge::new("cached_blocks", "Number of blocks held in the cache")
            .expect("metric creation");
        registry
            .register(Box::new(cached_blocks.clone()))
            .expect("metric registration");

        Self {
            registry,
            coordinate_requests_total,
            fetch_failures_total,
            superseded_selections_total,
            cached_blocks,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// Renders `/metrics` in Prometheus text format. 500 if encoding fails.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
