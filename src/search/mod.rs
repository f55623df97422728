//! Search over the regulation text
//!
//! Matching itself (exact lookups, Postgres full-text) belongs to the store;
//! this module validates the request and merges what the store returns.

pub mod merge;
pub mod query;

pub use merge::{merge_results, MatchKind, SearchHit, SearchResponse, SectionRef};
pub use query::{CitationQuery, SearchQuery};

use crate::error::Result;
use crate::store::RegulationStore;

/// Run both lookups concurrently and merge them
pub async fn run_search<S>(store: &S, query: &SearchQuery) -> Result<SearchResponse>
where
    S: RegulationStore + ?Sized,
{
    let (exact, fuzzy) = tokio::try_join!(store.exact_matches(query), store.full_text(query))?;
    tracing::debug!(
        q = %query.q,
        exact = exact.len(),
        full_text = fuzzy.len(),
        "search candidates"
    );
    let (results, truncated) = merge_results(exact, fuzzy, &query.q, query.limit);
    Ok(SearchResponse::new(results, &query.q, truncated))
}
