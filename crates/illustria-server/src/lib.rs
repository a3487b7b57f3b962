#![forbid(unsafe_code)]
//! Thin HTTP surface over the snapshot and query layers. Routing and
//! response shaping only; everything with real behavior lives in
//! `illustria-snapshot` and `illustria-query`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::get;
use axum::Router;
use illustria_snapshot::SnapshotManager;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};

mod http;

pub const CRATE_NAME: &str = "illustria-server";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApiErrorCode {
    InvalidQueryParameter,
    NotFound,
    SchemaUnsupported,
    SnapshotUnavailable,
    ConfigError,
    Internal,
}

/// Machine-readable error body: `{"error": {code, message, details}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
    pub default_forecast_days: i64,
    pub default_page_size: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024,
            default_forecast_days: 7,
            default_page_size: illustria_query::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub snapshots: Arc<SnapshotManager>,
    pub api: ApiConfig,
}

impl AppState {
    #[must_use]
    pub fn new(snapshots: Arc<SnapshotManager>) -> Self {
        Self::with_config(snapshots, ApiConfig::default())
    }

    #[must_use]
    pub fn with_config(snapshots: Arc<SnapshotManager>, api: ApiConfig) -> Self {
        Self { snapshots, api }
    }
}

pub fn build_router(state: AppState) -> Router {
    // The map frontend is served from a different origin; the API is
    // read-only, so any-origin GET is safe.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);
    Router::new()
        .route("/api/health", get(http::handlers::health_handler))
        .route("/api/schema", get(http::handlers::schema_handler))
        .route("/api/city/:city_id", get(http::handlers::city_handler))
        .route("/api/nearest", get(http::handlers::nearest_handler))
        .route("/api/nearest_map", get(http::handlers::nearest_map_handler))
        .route("/api/forecast", get(http::handlers::forecast_handler))
        .route("/api/cities", get(http::handlers::cities_handler))
        .route("/api/continents", get(http::handlers::continents_handler))
        .route("/api/countries", get(http::handlers::countries_handler))
        .layer(cors)
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .with_state(state)
}
