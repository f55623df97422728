//! Hierarchy routes: title listing and the navigation tree

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::debug;

use super::{ApiResult, AppState};
use crate::error::AnalyzerError;
use crate::models::TitleSummary;
use crate::navigation::{load_forest, NavNode};

/// `levels` stays a string so a malformed value is reported as an
/// `{error}` body rather than an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct NavigationQuery {
    pub parent: Option<String>,
    pub levels: Option<String>,
}

impl NavigationQuery {
    pub fn levels(&self) -> Result<usize, AnalyzerError> {
        match self.levels.as_deref().map(str::trim) {
            None | Some("") => Ok(1),
            Some(raw) => raw.parse().map_err(|_| AnalyzerError::InvalidParameter {
                name: "levels",
                reason: format!("'{}' is not a positive integer", raw),
            }),
        }
    }
}

// ============================================================================
// GET /api/titles
// ============================================================================

pub async fn list_titles(State(state): State<AppState>) -> ApiResult<Vec<TitleSummary>> {
    let titles = state.store.titles().await?;
    Ok(Json(titles))
}

// ============================================================================
// GET /api/navigation
// ============================================================================

/// Roots (or the children of `parent`) with `levels - 1` further levels
/// already loaded.
pub async fn get_navigation(
    State(state): State<AppState>,
    Query(params): Query<NavigationQuery>,
) -> ApiResult<Vec<NavNode>> {
    let levels = params.levels()?;
    let parent = params
        .parent
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let (forest, report) = load_forest(state.store.as_ref(), parent, levels).await?;
    debug!(
        parent = parent.unwrap_or("<root>"),
        roots = report.roots,
        nodes = report.nodes,
        promoted = report.promoted.len(),
        "navigation tree built"
    );

    Ok(Json(forest))
}

pub fn create_navigation_router(state: AppState) -> Router {
    Router::new()
        .route("/api/titles", get(list_titles))
        .route("/api/navigation", get(get_navigation))
        .with_state(state)
}
