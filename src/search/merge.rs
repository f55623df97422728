//! Merge exact-match and full-text hits into one ranked list
//!
//! Exact hits keep their store order and always rank first. Full-text hits
//! follow, ordered by store rank and then by Jaro-Winkler similarity between
//! the query and the section name. Each section id appears once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    FullText,
}

/// Section a hit belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
    pub id: String,
    pub level_type: String,
    pub number: String,
    pub name: String,
    pub citation: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Section id; the merge key
    pub id: String,
    pub chunk_id: Option<String>,
    pub match_kind: MatchKind,
    pub content: String,
    pub chunk_number: Option<i32>,
    /// Store-side relevance; exact hits carry 1.0
    pub rank: f32,
    pub section: SectionRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub query: String,
    pub truncated: bool,
}

/// Merge and truncate. Returns the merged hits and whether anything was cut.
pub fn merge_results(
    exact: Vec<SearchHit>,
    fuzzy: Vec<SearchHit>,
    query: &str,
    limit: usize,
) -> (Vec<SearchHit>, bool) {
    let query_lower = query.to_lowercase();
    let mut merged: Vec<SearchHit> = Vec::with_capacity(exact.len() + fuzzy.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for mut hit in exact {
        if position.contains_key(&hit.id) {
            continue;
        }
        hit.match_kind = MatchKind::Exact;
        position.insert(hit.id.clone(), merged.len());
        merged.push(hit);
    }

    let mut scored: Vec<(f64, SearchHit)> = fuzzy
        .into_iter()
        .map(|hit| {
            let similarity =
                strsim::jaro_winkler(&query_lower, &hit.section.name.to_lowercase());
            (similarity, hit)
        })
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| {
        b.rank
            .total_cmp(&a.rank)
            .then_with(|| sb.total_cmp(sa))
            .then_with(|| a.id.cmp(&b.id))
            .then_with(|| a.chunk_number.cmp(&b.chunk_number))
    });

    for (_, mut hit) in scored {
        match position.get(&hit.id) {
            Some(&idx) => {
                // Exact hit without text borrows the best matching chunk
                let existing = &mut merged[idx];
                if existing.match_kind == MatchKind::Exact && existing.content.is_empty() {
                    existing.content = std::mem::take(&mut hit.content);
                    existing.chunk_id = hit.chunk_id.take();
                    existing.chunk_number = hit.chunk_number;
                }
            }
            None => {
                hit.match_kind = MatchKind::FullText;
                position.insert(hit.id.clone(), merged.len());
                merged.push(hit);
            }
        }
    }

    let truncated = merged.len() > limit;
    merged.truncate(limit);
    (merged, truncated)
}

impl SearchResponse {
    pub fn new(results: Vec<SearchHit>, query: &str, truncated: bool) -> Self {
        Self {
            total: results.len(),
            results,
            query: query.to_string(),
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, kind: MatchKind, rank: f32, name: &str, content: &str) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            chunk_id: (!content.is_empty()).then(|| format!("{}#0", id)),
            match_kind: kind,
            content: content.to_string(),
            chunk_number: (!content.is_empty()).then_some(0),
            rank,
            section: SectionRef {
                id: id.to_string(),
                level_type: "section".into(),
                number: id.to_string(),
                name: name.to_string(),
                citation: format!("4 CFR {}", id),
                parent: None,
            },
        }
    }

    #[test]
    fn test_shared_id_appears_once_as_exact() {
        let exact = vec![hit("21.1", MatchKind::Exact, 1.0, "Purpose", "")];
        let fuzzy = vec![
            hit("21.2", MatchKind::FullText, 0.5, "Definitions", "rule means"),
            hit("21.1", MatchKind::FullText, 0.9, "Purpose", "this part sets forth"),
        ];
        let (merged, truncated) = merge_results(exact, fuzzy, "21.1", 10);
        assert!(!truncated);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "21.1");
        assert_eq!(merged[0].match_kind, MatchKind::Exact);
        assert_eq!(merged[0].content, "this part sets forth");
        assert_eq!(merged.iter().filter(|h| h.id == "21.1").count(), 1);
    }

    #[test]
    fn test_exact_ranked_above_higher_scoring_fuzzy() {
        let exact = vec![hit("b", MatchKind::FullText, 0.0, "B", "b")];
        let fuzzy = vec![hit("a", MatchKind::FullText, 99.0, "A", "a")];
        let (merged, _) = merge_results(exact, fuzzy, "q", 10);
        assert_eq!(merged[0].id, "b");
        assert_eq!(merged[0].match_kind, MatchKind::Exact);
        assert_eq!(merged[1].match_kind, MatchKind::FullText);
    }

    #[test]
    fn test_fuzzy_tie_broken_by_name_similarity() {
        let fuzzy = vec![
            hit("x", MatchKind::FullText, 0.5, "General Procedures", "..."),
            hit("y", MatchKind::FullText, 0.5, "Bid Protest Regulations", "..."),
        ];
        let (merged, _) = merge_results(vec![], fuzzy, "bid protest", 10);
        assert_eq!(merged[0].id, "y");
    }

    #[test]
    fn test_truncation() {
        let fuzzy: Vec<SearchHit> = (0..5)
            .map(|i| hit(&format!("s{}", i), MatchKind::FullText, i as f32, "n", "c"))
            .collect();
        let (merged, truncated) = merge_results(vec![], fuzzy, "q", 3);
        assert!(truncated);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].id, "s4");
    }

    #[test]
    fn test_empty_inputs() {
        let (merged, truncated) = merge_results(vec![], vec![], "q", 10);
        assert!(merged.is_empty());
        assert!(!truncated);
    }
}
