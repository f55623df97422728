//! Regulation detail routes, addressed by browse path

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState};
use crate::error::{AnalyzerError, Result};
use crate::models::{Correction, RegulationNode};
use crate::navigation::{Breadcrumb, BrowsePath};
use crate::store::RegulationStore;

/// Corrections listed beside a regulation
const RECENT_CORRECTIONS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulationResponse {
    pub node_info: RegulationNode,
    pub content: Vec<String>,
    pub child_nodes: Vec<RegulationNode>,
    pub breadcrumbs: Vec<Breadcrumb>,
}

#[derive(Debug, Serialize)]
pub struct CorrectionsResponse {
    pub corrections: Vec<Correction>,
}

/// Parse the `path` parameter and resolve it to a node
async fn resolve_path(
    store: &dyn RegulationStore,
    raw: Option<&str>,
) -> Result<(BrowsePath, RegulationNode)> {
    let raw = raw
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(AnalyzerError::MissingParameter { name: "path" })?;
    let path = BrowsePath::parse(raw)?;
    let node = store
        .node_by_path(&path)
        .await?
        .ok_or_else(|| AnalyzerError::PathNotFound {
            path: path.to_url(),
        })?;
    Ok((path, node))
}

// ============================================================================
// GET /api/regulation
// ============================================================================

pub async fn get_regulation(
    State(state): State<AppState>,
    Query(params): Query<PathQuery>,
) -> ApiResult<RegulationResponse> {
    let store = state.store.as_ref();
    let (path, node) = resolve_path(store, params.path.as_deref()).await?;

    let (chunks, child_nodes) =
        tokio::try_join!(store.content_chunks(&node.id), store.child_nodes(&node.id))?;

    Ok(Json(RegulationResponse {
        node_info: node,
        content: chunks.into_iter().map(|c| c.content).collect(),
        child_nodes,
        breadcrumbs: path.breadcrumbs(),
    }))
}

// ============================================================================
// GET /api/regulation/corrections
// ============================================================================

pub async fn get_regulation_corrections(
    State(state): State<AppState>,
    Query(params): Query<PathQuery>,
) -> ApiResult<CorrectionsResponse> {
    let store = state.store.as_ref();
    let (_, node) = resolve_path(store, params.path.as_deref()).await?;
    let corrections = store.node_corrections(&node.id, RECENT_CORRECTIONS).await?;
    Ok(Json(CorrectionsResponse { corrections }))
}

pub fn create_regulation_router(state: AppState) -> Router {
    Router::new()
        .route("/api/regulation", get(get_regulation))
        .route(
            "/api/regulation/corrections",
            get(get_regulation_corrections),
        )
        .with_state(state)
}
