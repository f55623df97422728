//! In-memory store over a JSON snapshot of the corpus

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RegulationStore;
use crate::analytics::NamedCount;
use crate::error::{AnalyzerError, Result};
use crate::models::{
    Agency, ContentChunk, Correction, CorrectionFilter, FlatNode, LevelType, RegulationNode,
    TitleSummary,
};
use crate::navigation::{sort_siblings, BrowsePath};
use crate::search::{MatchKind, SearchHit, SearchQuery, SectionRef};

/// Serialised corpus: what `MemoryStore` loads from disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<RegulationNode>,
    #[serde(default)]
    pub chunks: Vec<ContentChunk>,
    #[serde(default)]
    pub agencies: Vec<Agency>,
    /// `(agency_id, node_id)` pairs in mapping order
    #[serde(default)]
    pub mappings: Vec<(String, String)>,
    #[serde(default)]
    pub corrections: Vec<Correction>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: Snapshot,
    by_id: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        let by_id = snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id.clone(), idx))
            .collect();
        Self { snapshot, by_id }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::Store(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn get(&self, id: &str) -> Option<&RegulationNode> {
        self.by_id.get(id).map(|&idx| &self.snapshot.nodes[idx])
    }

    fn ancestor_chain(&self, id: &str) -> Vec<&RegulationNode> {
        let mut chain = Vec::new();
        let mut current = self.get(id).and_then(|n| n.parent.as_deref());
        while let Some(parent_id) = current {
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            if chain.iter().any(|n: &&RegulationNode| n.id == parent.id) || parent.id == id {
                break;
            }
            chain.push(parent);
            current = parent.parent.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Number of the title a node belongs to
    fn title_of(&self, id: &str) -> Option<String> {
        let node = self.get(id)?;
        if node.level_type == LevelType::Title {
            return Some(node.number.clone());
        }
        self.ancestor_chain(id)
            .into_iter()
            .find(|n| n.level_type == LevelType::Title)
            .map(|n| n.number.clone())
    }

    fn section_ref(node: &RegulationNode) -> SectionRef {
        SectionRef {
            id: node.id.clone(),
            level_type: node.level_type.to_string(),
            number: node.number.clone(),
            name: node.node_name.clone(),
            citation: node.citation.clone(),
            parent: node.parent.clone(),
        }
    }
}

fn newest_first(corrections: &mut [Correction]) {
    corrections.sort_by(|a, b| {
        b.error_occurred
            .cmp(&a.error_occurred)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl RegulationStore for MemoryStore {
    async fn titles(&self) -> Result<Vec<TitleSummary>> {
        let mut titles: Vec<FlatNode> = self
            .snapshot
            .nodes
            .iter()
            .filter(|n| n.depth == 0)
            .map(RegulationNode::flat)
            .collect();
        sort_siblings(&mut titles);
        Ok(titles
            .into_iter()
            .map(|n| TitleSummary {
                number: n.number,
                node_name: n.name,
            })
            .collect())
    }

    async fn root_nodes(&self) -> Result<Vec<FlatNode>> {
        Ok(self
            .snapshot
            .nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(RegulationNode::flat)
            .collect())
    }

    async fn node(&self, id: &str) -> Result<Option<RegulationNode>> {
        Ok(self.get(id).cloned())
    }

    async fn children_of_many(&self, parent_ids: &[String]) -> Result<Vec<FlatNode>> {
        Ok(self
            .snapshot
            .nodes
            .iter()
            .filter(|n| {
                n.parent
                    .as_ref()
                    .is_some_and(|p| parent_ids.iter().any(|id| id == p))
            })
            .map(RegulationNode::flat)
            .collect())
    }

    async fn ancestors(&self, id: &str) -> Result<Vec<FlatNode>> {
        Ok(self
            .ancestor_chain(id)
            .into_iter()
            .map(RegulationNode::flat)
            .collect())
    }

    async fn node_by_path(&self, path: &BrowsePath) -> Result<Option<RegulationNode>> {
        let target = path.relative();
        if target.is_empty() {
            return Ok(None);
        }
        Ok(self
            .snapshot
            .nodes
            .iter()
            .find(|n| {
                let link = n.link.trim_start_matches('/');
                link == target
                    || link.strip_prefix("browse/") == Some(target.as_str())
                    || BrowsePath::from_node_id(&n.id).relative() == target
            })
            .cloned())
    }

    async fn child_nodes(&self, id: &str) -> Result<Vec<RegulationNode>> {
        let mut children: Vec<RegulationNode> = self
            .snapshot
            .nodes
            .iter()
            .filter(|n| n.parent.as_deref() == Some(id))
            .cloned()
            .collect();
        children.sort_by(|a, b| crate::navigation::compare_siblings(&a.flat(), &b.flat()));
        Ok(children)
    }

    async fn content_chunks(&self, section_id: &str) -> Result<Vec<ContentChunk>> {
        let mut chunks: Vec<ContentChunk> = self
            .snapshot
            .chunks
            .iter()
            .filter(|c| c.section_id == section_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_number);
        Ok(chunks)
    }

    async fn exact_matches(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let citation = query.citation();
        let q_lower = query.q.to_lowercase();
        let mut hits: Vec<&RegulationNode> = self
            .snapshot
            .nodes
            .iter()
            .filter(|n| match &citation {
                Some(c) => {
                    n.number == c.number
                        && c.title
                            .as_ref()
                            .map_or(true, |t| self.title_of(&n.id).as_ref() == Some(t))
                }
                None => n.node_name.to_lowercase() == q_lower || n.citation.to_lowercase() == q_lower,
            })
            .filter(|n| query.in_scope(self.title_of(&n.id).as_deref()))
            .collect();
        hits.sort_by(|a, b| crate::navigation::compare_siblings(&a.flat(), &b.flat()));

        Ok(hits
            .into_iter()
            .map(|n| SearchHit {
                id: n.id.clone(),
                chunk_id: None,
                match_kind: MatchKind::Exact,
                content: String::new(),
                chunk_number: None,
                rank: 1.0,
                section: Self::section_ref(n),
            })
            .collect())
    }

    async fn full_text(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let terms: Vec<String> = query
            .q
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();

        let mut hits = Vec::new();
        for chunk in &self.snapshot.chunks {
            let text = chunk.content.to_lowercase();
            if !terms.iter().all(|t| text.contains(t.as_str())) {
                continue;
            }
            let Some(section) = self.get(&chunk.section_id) else {
                continue;
            };
            if !query.in_scope(self.title_of(&section.id).as_deref()) {
                continue;
            }
            let occurrences: usize = terms.iter().map(|t| text.matches(t.as_str()).count()).sum();
            hits.push(SearchHit {
                id: section.id.clone(),
                chunk_id: Some(chunk.id.clone()),
                match_kind: MatchKind::FullText,
                content: chunk.content.clone(),
                chunk_number: Some(chunk.chunk_number),
                rank: occurrences as f32 / (1.0 + text.len() as f32 / 1000.0),
                section: Self::section_ref(section),
            });
        }
        Ok(hits)
    }

    async fn root_agencies(&self) -> Result<Vec<Agency>> {
        let mut roots: Vec<Agency> = self
            .snapshot
            .agencies
            .iter()
            .filter(|a| a.parent_id.is_none())
            .cloned()
            .collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roots)
    }

    async fn all_agencies(&self) -> Result<Vec<Agency>> {
        Ok(self.snapshot.agencies.clone())
    }

    async fn agency(&self, id: &str) -> Result<Option<Agency>> {
        Ok(self.snapshot.agencies.iter().find(|a| a.id == id).cloned())
    }

    async fn child_agencies(&self, id: &str) -> Result<Vec<Agency>> {
        let mut children: Vec<Agency> = self
            .snapshot
            .agencies
            .iter()
            .filter(|a| a.parent_id.as_deref() == Some(id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn agency_nodes(&self, id: &str) -> Result<Vec<RegulationNode>> {
        Ok(self
            .snapshot
            .mappings
            .iter()
            .filter(|(agency_id, _)| agency_id == id)
            .filter_map(|(_, node_id)| self.get(node_id).cloned())
            .collect())
    }

    async fn corrections_between(&self, filter: &CorrectionFilter) -> Result<Vec<Correction>> {
        let mut matching: Vec<Correction> = self
            .snapshot
            .corrections
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        newest_first(&mut matching);
        Ok(matching)
    }

    async fn node_corrections(&self, node_id: &str, limit: usize) -> Result<Vec<Correction>> {
        let mut matching: Vec<Correction> = self
            .snapshot
            .corrections
            .iter()
            .filter(|c| c.node_id == node_id)
            .cloned()
            .collect();
        newest_first(&mut matching);
        matching.truncate(limit);
        Ok(matching)
    }

    async fn all_corrections(&self) -> Result<Vec<Correction>> {
        let mut all = self.snapshot.corrections.clone();
        newest_first(&mut all);
        Ok(all)
    }

    async fn top_nodes_by_corrections(&self, limit: usize) -> Result<Vec<NamedCount>> {
        let mut counts: Vec<NamedCount> = self
            .snapshot
            .nodes
            .iter()
            .filter_map(|n| {
                n.num_corrections.map(|count| NamedCount {
                    name: n.node_name.clone(),
                    count: i64::from(count),
                })
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        counts.truncate(limit);
        Ok(counts)
    }
}
