//! Correction history routes

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use tracing::debug;

use super::regulation_routes::CorrectionsResponse;
use super::{query_value, query_values, ApiResult, AppState};
use crate::analytics::{CorrectionAnalytics, TOP_N};
use crate::models::CorrectionFilter;

// ============================================================================
// GET /api/corrections?start_date=&end_date=&agency=&title=
// ============================================================================

pub async fn list_corrections(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<CorrectionsResponse> {
    let filter = CorrectionFilter::parse(
        query_value(&pairs, "start_date"),
        query_value(&pairs, "end_date"),
        query_values(&pairs, "agency"),
        query_value(&pairs, "title"),
    )?;

    let corrections = state.store.corrections_between(&filter).await?;
    debug!(
        start = %filter.start,
        end = %filter.end,
        count = corrections.len(),
        "corrections in range"
    );

    Ok(Json(CorrectionsResponse { corrections }))
}

// ============================================================================
// GET /api/corrections/analytics
// ============================================================================

pub async fn get_correction_analytics(
    State(state): State<AppState>,
) -> ApiResult<CorrectionAnalytics> {
    let store = state.store.as_ref();
    let (agencies, top_nodes, corrections) = tokio::try_join!(
        store.all_agencies(),
        store.top_nodes_by_corrections(TOP_N),
        store.all_corrections(),
    )?;

    Ok(Json(CorrectionAnalytics::compute(
        &agencies,
        top_nodes,
        &corrections,
    )))
}

pub fn create_correction_router(state: AppState) -> Router {
    Router::new()
        .route("/api/corrections", get(list_corrections))
        .route("/api/corrections/analytics", get(get_correction_analytics))
        .with_state(state)
}
