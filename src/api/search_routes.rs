//! Full-text and citation search

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use tracing::info;

use super::{query_value, query_values, ApiResult, AppState};
use crate::error::AnalyzerError;
use crate::search::{run_search, SearchQuery, SearchResponse};

// ============================================================================
// GET /api/search?q=&title=&title=&limit=
// ============================================================================

/// `title` may repeat, so the query string is read as raw pairs
pub async fn search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<SearchResponse> {
    let limit = match query_value(&pairs, "limit").map(str::trim) {
        None | Some("") => state.search_limit,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| AnalyzerError::InvalidParameter {
                name: "limit",
                reason: format!("'{}' is not a positive integer", raw),
            })?,
    };

    let query = SearchQuery::new(
        query_value(&pairs, "q"),
        query_values(&pairs, "title"),
        Some(limit),
    )?;

    let response = run_search(state.store.as_ref(), &query).await?;
    info!(
        q = %query.q,
        titles = ?query.titles,
        total = response.total,
        truncated = response.truncated,
        "search"
    );

    Ok(Json(response))
}

pub fn create_search_router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .with_state(state)
}
