//! Read-only access to the regulation corpus
//!
//! `RegulationStore` is the one seam between request handling and storage.
//! `database::PgRegulationStore` implements it over Postgres; `MemoryStore`
//! serves snapshots and tests.

pub mod memory;

pub use memory::{MemoryStore, Snapshot};

use std::collections::HashSet;

use async_trait::async_trait;

use crate::analytics::NamedCount;
use crate::error::Result;
use crate::models::{
    Agency, ContentChunk, Correction, CorrectionFilter, FlatNode, RegulationNode, TitleSummary,
};
use crate::navigation::{BrowsePath, ChildLoader};
use crate::search::{SearchHit, SearchQuery};

#[async_trait]
pub trait RegulationStore: Send + Sync {
    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    /// Depth-0 nodes, ordered by number
    async fn titles(&self) -> Result<Vec<TitleSummary>>;

    /// Nodes without a parent
    async fn root_nodes(&self) -> Result<Vec<FlatNode>>;

    async fn node(&self, id: &str) -> Result<Option<RegulationNode>>;

    /// Direct children of every id in `parent_ids`, in one round trip
    async fn children_of_many(&self, parent_ids: &[String]) -> Result<Vec<FlatNode>>;

    async fn children(&self, parent_id: &str) -> Result<Vec<FlatNode>> {
        self.children_of_many(&[parent_id.to_string()]).await
    }

    /// Ancestors of `id`, root first, excluding `id` itself
    async fn ancestors(&self, id: &str) -> Result<Vec<FlatNode>>;

    async fn node_by_path(&self, path: &BrowsePath) -> Result<Option<RegulationNode>>;

    /// Full records of a node's direct children
    async fn child_nodes(&self, id: &str) -> Result<Vec<RegulationNode>>;

    async fn content_chunks(&self, section_id: &str) -> Result<Vec<ContentChunk>>;

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    async fn exact_matches(&self, query: &SearchQuery) -> Result<Vec<SearchHit>>;

    async fn full_text(&self, query: &SearchQuery) -> Result<Vec<SearchHit>>;

    // ------------------------------------------------------------------
    // Agencies
    // ------------------------------------------------------------------

    async fn root_agencies(&self) -> Result<Vec<Agency>>;

    async fn all_agencies(&self) -> Result<Vec<Agency>>;

    async fn agency(&self, id: &str) -> Result<Option<Agency>>;

    async fn child_agencies(&self, id: &str) -> Result<Vec<Agency>>;

    /// Nodes mapped to an agency, in mapping order
    async fn agency_nodes(&self, id: &str) -> Result<Vec<RegulationNode>>;

    /// Parent chain of an agency, root first. Stops at an unresolvable
    /// parent or a repeated id.
    async fn agency_ancestors(&self, agency: &Agency) -> Result<Vec<Agency>> {
        let mut chain = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([agency.id.clone()]);
        let mut next = agency.parent_id.clone();
        while let Some(parent_id) = next {
            if !seen.insert(parent_id.clone()) {
                tracing::warn!(agency = %agency.id, %parent_id, "agency parent cycle");
                break;
            }
            match self.agency(&parent_id).await? {
                Some(parent) => {
                    next = parent.parent_id.clone();
                    chain.push(parent);
                }
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    // ------------------------------------------------------------------
    // Corrections
    // ------------------------------------------------------------------

    /// Corrections inside the filter, newest first
    async fn corrections_between(&self, filter: &CorrectionFilter) -> Result<Vec<Correction>>;

    /// Most recent corrections of one node
    async fn node_corrections(&self, node_id: &str, limit: usize) -> Result<Vec<Correction>>;

    async fn all_corrections(&self) -> Result<Vec<Correction>>;

    async fn top_nodes_by_corrections(&self, limit: usize) -> Result<Vec<NamedCount>>;
}

#[async_trait]
impl<S> ChildLoader for S
where
    S: RegulationStore + ?Sized,
{
    async fn fetch_children(&self, parent_id: &str) -> Result<Vec<FlatNode>> {
        self.children(parent_id).await
    }
}
