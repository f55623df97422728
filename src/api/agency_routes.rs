//! Agency listing, detail and analytics routes

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState};
use crate::analytics::{sort_agencies, AgencyAnalytics, AgencySort};
use crate::error::AnalyzerError;
use crate::models::{Agency, AgencyReference};

#[derive(Debug, Deserialize)]
pub struct AgencyListQuery {
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgencyDetail {
    pub agency: Agency,
    pub children: Vec<Agency>,
    pub references: Vec<AgencyReference>,
    /// Parent chain, root first, for breadcrumbs
    pub ancestors: Vec<Agency>,
}

// ============================================================================
// GET /api/agencies
// ============================================================================

pub async fn list_agencies(
    State(state): State<AppState>,
    Query(params): Query<AgencyListQuery>,
) -> ApiResult<Vec<Agency>> {
    let mut agencies = state.store.root_agencies().await?;
    sort_agencies(&mut agencies, AgencySort::parse(params.sort_by.as_deref()));
    Ok(Json(agencies))
}

// ============================================================================
// GET /api/agencies/:id
// ============================================================================

pub async fn get_agency(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AgencyDetail> {
    let store = state.store.as_ref();
    let agency = store
        .agency(&id)
        .await?
        .ok_or_else(|| AnalyzerError::AgencyNotFound { id: id.clone() })?;

    let (children, nodes, ancestors) = tokio::try_join!(
        store.child_agencies(&agency.id),
        store.agency_nodes(&agency.id),
        store.agency_ancestors(&agency),
    )?;

    Ok(Json(AgencyDetail {
        references: AgencyReference::from_nodes(&agency.id, nodes),
        agency,
        children,
        ancestors,
    }))
}

// ============================================================================
// GET /api/agencies/analytics
// ============================================================================

pub async fn get_agency_analytics(State(state): State<AppState>) -> ApiResult<AgencyAnalytics> {
    let agencies = state.store.all_agencies().await?;
    Ok(Json(AgencyAnalytics::compute(&agencies)))
}

pub fn create_agency_router(state: AppState) -> Router {
    Router::new()
        .route("/api/agencies", get(list_agencies))
        .route("/api/agencies/analytics", get(get_agency_analytics))
        .route("/api/agencies/:id", get(get_agency))
        .with_state(state)
}
