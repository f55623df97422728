//! REST API for browsing, searching and analysing the regulation corpus
//!
//! Every route is a read-only GET returning JSON. Handlers only talk to the
//! `RegulationStore` held in `AppState`.

pub mod agency_routes;
pub mod correction_routes;
pub mod error;
pub mod navigation_routes;
pub mod regulation_routes;
pub mod search_routes;

pub use error::{ApiError, ApiResult, ErrorBody};

use std::sync::Arc;

use axum::{response::Json, routing::get, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ServerConfig, DEFAULT_SEARCH_LIMIT};
use crate::store::RegulationStore;

/// Shared, immutable application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RegulationStore>,
    pub search_limit: usize,
    pub cors_any: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn RegulationStore>) -> Self {
        Self {
            store,
            search_limit: DEFAULT_SEARCH_LIMIT,
            cors_any: true,
        }
    }

    pub fn with_config(store: Arc<dyn RegulationStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            search_limit: config.search_limit,
            cors_any: config.cors_any,
        }
    }
}

/// Values of every occurrence of `key` in a decoded query string
pub(crate) fn query_values(pairs: &[(String, String)], key: &str) -> Vec<String> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .collect()
}

/// First value of `key` in a decoded query string
pub(crate) fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Full API router with tracing and (optionally) permissive CORS
pub fn create_router(state: AppState) -> Router {
    let cors_any = state.cors_any;

    let router = Router::new()
        .route("/api/health", get(health_check))
        .merge(navigation_routes::create_navigation_router(state.clone()))
        .merge(regulation_routes::create_regulation_router(state.clone()))
        .merge(search_routes::create_search_router(state.clone()))
        .merge(agency_routes::create_agency_router(state.clone()))
        .merge(correction_routes::create_correction_router(state));

    let router = router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));
    if cors_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}
