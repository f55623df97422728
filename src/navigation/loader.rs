//! Fetch a bounded number of hierarchy levels and build them into a forest
//!
//! One store round trip per level: the ids of level `k` are handed to
//! `children_of_many` to fetch level `k + 1`.

use tracing::debug;

use super::path::{BrowsePath, PathSegment};
use super::tree::{build_nav_tree_with, BuildOptions, BuildReport, NavNode};
use crate::error::{AnalyzerError, Result};
use crate::models::FlatNode;
use crate::store::RegulationStore;

/// Deepest prefetch a single navigation request may ask for
pub const MAX_LEVELS: usize = 3;

/// Browse path of `id`, built from its ancestor chain and the node itself
pub async fn path_of<S>(store: &S, node: &FlatNode) -> Result<BrowsePath>
where
    S: RegulationStore + ?Sized,
{
    let mut chain = store.ancestors(&node.id).await?;
    chain.push(node.clone());
    let segments = chain
        .into_iter()
        .map(|n| PathSegment::new(n.level_type, n.number))
        .filter(PathSegment::is_routable)
        .collect();
    Ok(BrowsePath::new(segments))
}

/// Load `levels` levels below `parent` (or from the roots when `None`).
///
/// Levels outside `1..=MAX_LEVELS` are clamped. Every level but the last is
/// marked expanded. An unknown `parent` is a `NodeNotFound` error.
pub async fn load_forest<S>(
    store: &S,
    parent: Option<&str>,
    levels: usize,
) -> Result<(Vec<NavNode>, BuildReport)>
where
    S: RegulationStore + ?Sized,
{
    let levels = levels.clamp(1, MAX_LEVELS);

    let (mut frontier, options) = match parent {
        None => (
            store.root_nodes().await?,
            BuildOptions {
                expand_depth: levels - 1,
                ..BuildOptions::default()
            },
        ),
        Some(parent_id) => {
            let parent = store
                .node(parent_id)
                .await?
                .ok_or_else(|| AnalyzerError::node_not_found(parent_id))?
                .flat();
            let base_path = path_of(store, &parent).await?;
            let options = BuildOptions {
                expand_depth: levels - 1,
                ..BuildOptions::scoped(parent.id.clone(), base_path)
            };
            (store.children(&parent.id).await?, options)
        }
    };

    let mut nodes: Vec<FlatNode> = Vec::with_capacity(frontier.len());
    for level in 1..levels {
        if frontier.is_empty() {
            break;
        }
        let ids: Vec<String> = frontier.iter().map(|n| n.id.clone()).collect();
        let next = store.children_of_many(&ids).await?;
        debug!(level, parents = ids.len(), children = next.len(), "prefetched level");
        nodes.append(&mut frontier);
        frontier = next;
    }
    nodes.append(&mut frontier);

    Ok(build_nav_tree_with(nodes, &options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LevelType, NodeType, RegulationNode};
    use crate::store::{MemoryStore, Snapshot};

    fn node(id: &str, parent: Option<&str>, level: &str, number: &str) -> RegulationNode {
        RegulationNode {
            id: id.to_string(),
            citation: String::new(),
            link: String::new(),
            node_type: NodeType::Structure,
            level_type: LevelType::from(level),
            number: number.to_string(),
            node_name: format!("{} {}", level, number),
            parent: parent.map(str::to_string),
            depth: id.matches('/').count() as i32,
            num_corrections: None,
            metadata: None,
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(Snapshot {
            nodes: vec![
                node("t4", None, "title", "4"),
                node("t4/c1", Some("t4"), "chapter", "I"),
                node("t4/c1/p21", Some("t4/c1"), "part", "21"),
                node("t4/c1/p21/s1", Some("t4/c1/p21"), "section", "21.1"),
                node("t5", None, "title", "5"),
            ],
            ..Snapshot::default()
        })
    }

    #[tokio::test]
    async fn test_roots_only_by_default() {
        let (forest, report) = load_forest(&store(), None, 1).await.unwrap();
        assert_eq!(forest.len(), 2);
        assert!(forest.iter().all(|n| n.children.is_empty() && !n.expanded));
        assert_eq!(report.roots, 2);
    }

    #[tokio::test]
    async fn test_levels_prefetch_and_clamp() {
        let (forest, _) = load_forest(&store(), None, 9).await.unwrap();
        let t4 = &forest[0];
        assert!(t4.expanded);
        assert_eq!(t4.children[0].children[0].id, "t4/c1/p21");
        assert!(t4.children[0].children[0].children.is_empty());
        assert!(!t4.children[0].children[0].expanded);
    }

    #[tokio::test]
    async fn test_scoped_to_parent_with_paths() {
        let (forest, _) = load_forest(&store(), Some("t4/c1"), 1).await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, "t4/c1/p21");
        assert_eq!(forest[0].path, "/browse/title=4/chapter=I/part=21");
    }

    #[tokio::test]
    async fn test_unknown_parent() {
        let err = load_forest(&store(), Some("missing"), 1).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::NodeNotFound { .. }));
    }
}
