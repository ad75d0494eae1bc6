//! # REST API
//!
//! Builds the axum router for the node's HTTP interface. Every handler shares
//! one [`HeightNavigator`], so concurrent clients see the same most-recent
//! selection and the same block cache.
//!
//! ## Endpoints
//!
//! | Method | Path                 | Description                              |
//! |--------|----------------------|------------------------------------------|
//! | GET    | `/health`            | Liveness probe                           |
//! | GET    | `/status`            | Version, uptime, navigation snapshot     |
//! | GET    | `/jumps`             | Quick-jump heights from the tip          |
//! | GET    | `/jumps/:name`       | Select a named jump and place it         |
//! | GET    | `/blocks/:height`    | Select a height and place it             |
//! | GET    | `/derive/:hash`      | Place an arbitrary hash (no network)     |
//! | GET    | `/graticule`         | The 3x3 one-degree cells around a point  |
//! | GET    | `/metrics`           | Prometheus text exposition               |
//!
//! Placement endpoints take optional `lat` and `lng` query parameters. A
//! missing component falls back to the server's configured reference.

use axum::{
    extract::{FromRef, Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use places_protocol::geo::{derive, graticule, BlockPlace, Coordinate, GraticuleCell};
use places_protocol::network::{HeightNavigator, Jump, JumpHeights, NavigationSnapshot, Selection};
use places_protocol::storage::BlockHash;

use crate::metrics::{self, SharedMetrics};

/// Body of every 502 caused by a failed block fetch.
pub const NO_DATA_MESSAGE: &str = "no data for this height yet";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    /// Block API the navigator fetches from.
    pub api_url: String,
    pub started_at: DateTime<Utc>,
    pub navigator: Arc<HeightNavigator>,
    /// Reference used when a request does not supply one.
    pub reference: Coordinate,
    pub metrics: SharedMetrics,
}

impl FromRef<AppState> for SharedMetrics {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

impl AppState {
    fn sync_cache_gauge(&self) {
        self.metrics
            .cached_blocks
            .set(self.navigator.cache().len() as i64);
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/jumps", get(jumps_handler))
        .route("/jumps/:name", get(jump_select_handler))
        .route("/blocks/:height", get(block_by_height_handler))
        .route("/derive/:hash", get(derive_handler))
        .route("/graticule", get(graticule_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Optional reference override, e.g. `?lat=-33.86&lng=151.2`.
#[derive(Debug, Default, Deserialize)]
pub struct ReferenceQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl ReferenceQuery {
    fn resolve(&self, fallback: Coordinate) -> Coordinate {
        Coordinate::new(
            self.lat.unwrap_or(fallback.lat),
            self.lng.unwrap_or(fallback.lng),
        )
    }
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub api_url: String,
    pub started_at: String,
    pub uptime_secs: i64,
    pub reference: Coordinate,
    pub cached_blocks: usize,
    pub navigation: NavigationSnapshot,
}

/// Response payload for `GET /graticule`.
#[derive(Debug, Serialize)]
pub struct GraticuleResponse {
    pub reference: Coordinate,
    pub cells: Vec<GraticuleCell>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn error_response(status: StatusCode, error: impl Into<String>, detail: Option<String>) -> Response {
    let body = ErrorResponse {
        error: error.into(),
        detail,
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.sync_cache_gauge();
    let now = Utc::now();
    Json(StatusResponse {
        version: state.version.clone(),
        api_url: state.api_url.clone(),
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: (now - state.started_at).num_seconds(),
        reference: state.reference,
        cached_blocks: state.navigator.cache().len(),
        navigation: state.navigator.snapshot(),
    })
}

/// `GET /jumps`: loads the tip on first use.
async fn jumps_handler(State(state): State<AppState>) -> Response {
    match state.navigator.load_tip().await {
        Ok(jumps) => (StatusCode::OK, Json::<JumpHeights>(jumps)).into_response(),
        Err(e) => {
            state.metrics.fetch_failures_total.inc();
            error_response(
                StatusCode::BAD_GATEWAY,
                "tip height unavailable",
                Some(e.to_string()),
            )
        }
    }
}

/// `GET /jumps/:name`: `current`, `day`, `week`, or `genesis`.
async fn jump_select_handler(
    Path(name): Path<String>,
    Query(query): Query<ReferenceQuery>,
    State(state): State<AppState>,
) -> Response {
    let jump = match name.parse::<Jump>() {
        Ok(j) => j,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e, None),
    };
    let reference = query.resolve(state.reference);

    match state.navigator.select_jump(jump).await {
        Ok(selection) => selection_response(&state, selection, reference),
        Err(e) => {
            state.metrics.fetch_failures_total.inc();
            error_response(
                StatusCode::BAD_GATEWAY,
                "tip height unavailable",
                Some(e.to_string()),
            )
        }
    }
}

/// `GET /blocks/:height`
///
/// 200 with the block's place, 502 when the hash could not be fetched, 409
/// when a newer selection replaced this one before it resolved.
async fn block_by_height_handler(
    Path(height): Path<u64>,
    Query(query): Query<ReferenceQuery>,
    State(state): State<AppState>,
) -> Response {
    let reference = query.resolve(state.reference);
    let selection = state.navigator.select_height(height).await;
    selection_response(&state, selection, reference)
}

/// `GET /derive/:hash`: pure derivation, never touches the navigator.
async fn derive_handler(
    Path(hash): Path<String>,
    Query(query): Query<ReferenceQuery>,
    State(state): State<AppState>,
) -> Response {
    let hash = match BlockHash::parse(&hash) {
        Ok(h) => h,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string(), None),
    };
    let reference = query.resolve(state.reference);

    match derive(&hash, reference) {
        Ok(coordinate) => {
            state.metrics.coordinate_requests_total.inc();
            let body = serde_json::json!({
                "hash": hash,
                "reference": reference,
                "coordinate": coordinate,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string(), None),
    }
}

/// `GET /graticule`
async fn graticule_handler(
    Query(query): Query<ReferenceQuery>,
    State(state): State<AppState>,
) -> Response {
    let reference = query.resolve(state.reference);
    if !reference.is_finite() {
        return error_response(StatusCode::BAD_REQUEST, "reference is not finite", None);
    }
    let cells = graticule(reference);
    (StatusCode::OK, Json(GraticuleResponse { reference, cells })).into_response()
}

/// Maps a navigator [`Selection`] onto an HTTP response and records metrics.
fn selection_response(state: &AppState, selection: Selection, reference: Coordinate) -> Response {
    state.sync_cache_gauge();
    match selection {
        Selection::Resolved(record) => match BlockPlace::locate(&record, reference) {
            Ok(place) => {
                state.metrics.coordinate_requests_total.inc();
                (StatusCode::OK, Json(place)).into_response()
            }
            Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string(), None),
        },
        Selection::Failed { height, error } => {
            state.metrics.fetch_failures_total.inc();
            tracing::debug!(height, %error, "block fetch failed");
            error_response(StatusCode::BAD_GATEWAY, NO_DATA_MESSAGE, Some(error.to_string()))
        }
        Selection::Superseded => {
            state.metrics.superseded_selections_total.inc();
            error_response(
                StatusCode::CONFLICT,
                "superseded by a newer selection",
                None,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use places_protocol::network::{BlockSource, CancellationToken, FetchError, NavigatorConfig};
    use places_protocol::storage::BlockCache;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    const BLOCK_750000: &str = "0000000000000000000592a974b1b9f087cb77628bb4a097d5c2c11b3476a58e";

    /// Heights in the table answer at once. [`HANGING_HEIGHT`] waits for
    /// cancellation; [`SLOW_HEIGHT`] answers after 200ms. Everything else is
    /// a 404.
    struct StaticSource {
        tip: u64,
        hashes: HashMap<u64, BlockHash>,
    }

    const HANGING_HEIGHT: u64 = 999_999;
    const SLOW_HEIGHT: u64 = 750_001;

    #[async_trait]
    impl BlockSource for StaticSource {
        async fn fetch_hash_by_height(
            &self,
            height: u64,
            cancel: &CancellationToken,
        ) -> Result<BlockHash, FetchError> {
            if height == HANGING_HEIGHT {
                cancel.cancelled().await;
                return Err(FetchError::Cancelled);
            }
            if height == SLOW_HEIGHT {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                }
                return Ok(BlockHash::parse(BLOCK_750000).unwrap());
            }
            self.hashes.get(&height).cloned().ok_or(FetchError::Status {
                status: 404,
                url: format!("/block-height/{height}"),
            })
        }

        async fn fetch_tip_height(&self, _cancel: &CancellationToken) -> Result<u64, FetchError> {
            Ok(self.tip)
        }
    }

    fn test_app_state() -> AppState {
        let mut hashes = HashMap::new();
        hashes.insert(750_000, BlockHash::parse(BLOCK_750000).unwrap());
        let source = Arc::new(StaticSource {
            tip: 750_000,
            hashes,
        });
        let navigator = Arc::new(HeightNavigator::new(
            source,
            Arc::new(BlockCache::new()),
            NavigatorConfig {
                debounce: Duration::ZERO,
            },
        ));

        AppState {
            version: "0.1.0-test".into(),
            api_url: "http://mock".into(),
            started_at: Utc::now(),
            navigator,
            reference: Coordinate::default(),
            metrics: Arc::new(crate::metrics::NodeMetrics::new()),
        }
    }

    /// Sends a GET request through the router and returns (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn genesis_block_places_near_default_reference() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/blocks/0").await;
        assert_eq!(status, StatusCode::OK);

        let v = json(&body);
        assert_eq!(v["height"], 0);
        assert_eq!(
            v["hash"],
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(v["coordinate"]["lat"], 30.576218);
        assert_eq!(v["coordinate"]["lng"], -97.826521);
    }

    #[tokio::test]
    async fn block_endpoint_honours_reference_query() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/blocks/750000?lat=-33.5&lng=151.2").await;
        assert_eq!(status, StatusCode::OK);

        let v = json(&body);
        assert_eq!(v["reference"]["lat"], -33.5);
        assert_eq!(v["coordinate"]["lat"], -33.978504);
        assert_eq!(v["coordinate"]["lng"], 151.15403);
    }

    #[tokio::test]
    async fn missing_height_returns_502_no_data() {
        let state = test_app_state();
        let metrics = Arc::clone(&state.metrics);
        let router = create_router(state);

        let (status, body) = get(&router, "/blocks/12345").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json(&body)["error"], NO_DATA_MESSAGE);
        assert_eq!(metrics.fetch_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn superseded_request_returns_409() {
        let state = test_app_state();
        let navigator = Arc::clone(&state.navigator);
        let router = create_router(state);

        let hanging = {
            let router = router.clone();
            tokio::spawn(async move { get(&router, &format!("/blocks/{HANGING_HEIGHT}")).await })
        };
        tokio::time::timeout(Duration::from_secs(2), async {
            while !navigator.snapshot().pending {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first request should start fetching");

        let (status, _) = get(&router, "/blocks/0").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = hanging.await.unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json(&body)["error"].as_str().unwrap().contains("superseded"));
        assert_eq!(navigator.current().unwrap().height, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_for_one_height_both_resolve() {
        let state = test_app_state();
        let navigator = Arc::clone(&state.navigator);
        let metrics = Arc::clone(&state.metrics);
        let router = create_router(state);
        let path = format!("/blocks/{SLOW_HEIGHT}");

        let first = {
            let router = router.clone();
            let path = path.clone();
            tokio::spawn(async move { get(&router, &path).await })
        };
        while !navigator.snapshot().pending {
            tokio::task::yield_now().await;
        }

        let (status, second) = get(&router, &path).await;
        assert_eq!(status, StatusCode::OK);
        let (status, first) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&first), json(&second));
        assert_eq!(metrics.superseded_selections_total.get(), 0);
        assert_eq!(metrics.coordinate_requests_total.get(), 2);
    }

    #[tokio::test]
    async fn jumps_endpoint_reports_heights_from_tip() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/jumps").await;
        assert_eq!(status, StatusCode::OK);

        let v = json(&body);
        assert_eq!(v["current"], 750_000);
        assert_eq!(v["start_of_day"], 749_808);
        assert_eq!(v["start_of_week"], 748_944);
        assert_eq!(v["genesis"], 0);
    }

    #[tokio::test]
    async fn named_jump_selects_tip() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/jumps/current").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["coordinate"]["lat"], 30.978504);

        let (status, _) = get(&router, "/jumps/yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn derive_endpoint_is_offline() {
        let router = create_router(test_app_state());
        let path = format!("/derive/{}", BLOCK_750000.to_uppercase());
        let (status, body) = get(&router, &path).await;
        assert_eq!(status, StatusCode::OK);

        let v = json(&body);
        assert_eq!(v["hash"], BLOCK_750000);
        assert_eq!(v["coordinate"]["lng"], -97.15403);
    }

    #[tokio::test]
    async fn derive_endpoint_rejects_bad_hash() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/derive/not-a-hash").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json(&body)["error"].is_string());
    }

    #[tokio::test]
    async fn graticule_endpoint_returns_nine_cells() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/graticule?lat=10.5&lng=20.5").await;
        assert_eq!(status, StatusCode::OK);

        let v = json(&body);
        let cells = v["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 9);
        let active: Vec<_> = cells.iter().filter(|c| c["active"] == true).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["south_west"]["lat"], 10.0);
        assert_eq!(active[0]["north_east"]["lng"], 21.0);
    }

    #[tokio::test]
    async fn status_reports_navigation_and_cache() {
        let router = create_router(test_app_state());
        get(&router, "/blocks/750000").await;

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);

        let v = json(&body);
        assert_eq!(v["version"], "0.1.0-test");
        assert_eq!(v["cached_blocks"], 2);
        assert_eq!(v["navigation"]["current_height"], 750_000);
        assert_eq!(v["navigation"]["state"]["state"], "resolved");
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_counters() {
        let router = create_router(test_app_state());
        get(&router, "/blocks/0").await;

        let (status, body) = get(&router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("places_coordinate_requests_total 1"));
        assert!(text.contains("places_cached_blocks 1"));
    }
}
