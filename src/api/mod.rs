//! HTTP transport over the extraction engine.

pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::downloader::{MetadataProber, RetrievalPipeline, ToolInfo};

pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub prober: Arc<MetadataProber>,
    pub pipeline: Arc<RetrievalPipeline>,
    /// Tool detection result, computed once at startup
    pub tools: Arc<Vec<ToolInfo>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(prober: MetadataProber, pipeline: RetrievalPipeline, tools: Vec<ToolInfo>) -> Self {
        Self {
            prober: Arc::new(prober),
            pipeline: Arc::new(pipeline),
            tools: Arc::new(tools),
            started_at: Instant::now(),
        }
    }
}

/// Build the router with CORS and request tracing.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/info", post(handlers::video_info))
        .route("/api/download", post(handlers::download))
        .route("/api/platforms", get(handlers::platforms))
        .route("/api/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let exposed_headers = [
        header::CONTENT_LENGTH,
        header::CONTENT_TYPE,
        header::CONTENT_DISPOSITION,
    ];
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .expose_headers(exposed_headers);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(parsed)
}
