//! Lazy expansion over an owned, id-keyed navigation tree
//!
//! `NavTree` is an arena of entries keyed by node id. Expanding a node whose
//! children were never fetched moves it to `Loading` and hands the caller a
//! fetch to perform; the result is merged back with `apply_children`, which
//! only ever rewrites the children of that one node. Fetches for different
//! nodes can therefore complete in any order.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::path::BrowsePath;
use super::tree::{build_nav_tree, compare_siblings, NavNode};
use crate::error::{AnalyzerError, Result};
use crate::models::{FlatNode, LevelType};

/// Source of a node's direct children
#[async_trait]
pub trait ChildLoader: Send + Sync {
    async fn fetch_children(&self, parent_id: &str) -> Result<Vec<FlatNode>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildState {
    /// Never fetched
    Unloaded,
    /// Fetch in flight
    Loading,
    /// Fetched; ids in sibling order
    Loaded(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct NavEntry {
    pub id: String,
    pub parent: Option<String>,
    pub level_type: LevelType,
    pub number: String,
    pub name: String,
    pub path: BrowsePath,
    pub children: ChildState,
    pub expanded: bool,
    pub error: Option<String>,
}

impl NavEntry {
    fn from_flat(node: FlatNode, parent_path: &BrowsePath) -> Self {
        let path = parent_path.child(node.level_type.clone(), node.number.clone());
        Self {
            id: node.id,
            parent: node.parent,
            level_type: node.level_type,
            number: node.number,
            name: node.name,
            path,
            children: ChildState::Unloaded,
            expanded: false,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.children == ChildState::Loading
    }

    fn flat(&self) -> FlatNode {
        FlatNode {
            id: self.id.clone(),
            parent: self.parent.clone(),
            level_type: self.level_type.clone(),
            number: self.number.clone(),
            name: self.name.clone(),
        }
    }
}

/// Outcome of an expand or toggle request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandAction {
    /// Children must be fetched with `parent_id` as the filter
    Fetch { parent_id: String },
    /// Children were cached; the node is now expanded
    Expanded,
    AlreadyExpanded,
    /// A fetch for this node is already in flight
    Pending,
    Collapsed,
}

/// One row of the rendered sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleRow {
    pub id: String,
    pub depth: usize,
    pub label: String,
    pub path: String,
    pub expanded: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NavTree {
    entries: HashMap<String, NavEntry>,
    roots: Vec<String>,
}

impl NavTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from flat records; nodes that arrive with children are `Loaded`,
    /// the rest stay `Unloaded` until expanded.
    pub fn from_flat(nodes: Vec<FlatNode>) -> Self {
        Self::from_forest(build_nav_tree(nodes))
    }

    pub fn from_forest(forest: Vec<NavNode>) -> Self {
        let mut tree = Self::default();
        for root in forest {
            tree.roots.push(root.id.clone());
            tree.insert_subtree(root, None, &BrowsePath::default());
        }
        tree
    }

    fn insert_subtree(&mut self, node: NavNode, parent: Option<&str>, parent_path: &BrowsePath) {
        let path = parent_path.child(node.level_type.clone(), node.number.clone());
        let child_ids: Vec<String> = node.children.iter().map(|c| c.id.clone()).collect();
        let children = if child_ids.is_empty() {
            ChildState::Unloaded
        } else {
            ChildState::Loaded(child_ids)
        };
        let expanded = node.expanded && matches!(children, ChildState::Loaded(_));

        for child in node.children {
            self.insert_subtree(child, Some(&node.id), &path);
        }

        self.entries.insert(
            node.id.clone(),
            NavEntry {
                id: node.id,
                parent: parent.map(str::to_string),
                level_type: node.level_type,
                number: node.number,
                name: node.name,
                path,
                children,
                expanded,
                error: None,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn get(&self, id: &str) -> Option<&NavEntry> {
        self.entries.get(id)
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut NavEntry> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| AnalyzerError::node_not_found(id))
    }

    pub fn expand(&mut self, id: &str) -> Result<ExpandAction> {
        let entry = self.entry_mut(id)?;
        let action = match entry.children {
            ChildState::Loaded(_) if entry.expanded => ExpandAction::AlreadyExpanded,
            ChildState::Loaded(_) => ExpandAction::Expanded,
            ChildState::Loading => ExpandAction::Pending,
            ChildState::Unloaded => {
                entry.children = ChildState::Loading;
                entry.error = None;
                ExpandAction::Fetch {
                    parent_id: entry.id.clone(),
                }
            }
        };
        entry.expanded = true;
        Ok(action)
    }

    /// Local toggle; cached children are kept for re-expansion
    pub fn collapse(&mut self, id: &str) -> Result<()> {
        self.entry_mut(id)?.expanded = false;
        Ok(())
    }

    pub fn toggle(&mut self, id: &str) -> Result<ExpandAction> {
        if self.entry_mut(id)?.expanded {
            self.collapse(id)?;
            return Ok(ExpandAction::Collapsed);
        }
        self.expand(id)
    }

    /// Replace the children of `parent_id` with a freshly fetched batch.
    ///
    /// Children already in the arena keep their own cached subtree and
    /// expansion state; children missing from the batch are evicted. A child
    /// that is `parent_id` itself or one of its ancestors is skipped, and a
    /// child cached under another parent is detached from it first.
    pub fn apply_children(&mut self, parent_id: &str, children: Vec<FlatNode>) -> Result<()> {
        let parent = self
            .entries
            .get(parent_id)
            .ok_or_else(|| AnalyzerError::node_not_found(parent_id))?;
        if !parent.is_loading() {
            debug!(parent_id, "children applied to a node that was not loading");
        }
        let parent_path = parent.path.clone();
        let previous = match &parent.children {
            ChildState::Loaded(ids) => ids.clone(),
            _ => Vec::new(),
        };
        let lineage = self.lineage(parent_id);

        let mut batch: Vec<FlatNode> = children
            .into_iter()
            .filter(|child| {
                if child.parent.as_deref() != Some(parent_id) {
                    warn!(parent_id, child = %child.id, "ignoring child fetched under another parent");
                    return false;
                }
                if lineage.contains(child.id.as_str()) {
                    warn!(parent_id, child = %child.id, "ignoring child that would close a parent cycle");
                    return false;
                }
                true
            })
            .collect();
        batch.sort_by(compare_siblings);
        let mut seen = HashSet::new();
        batch.retain(|child| seen.insert(child.id.clone()));

        let ids: Vec<String> = batch.iter().map(|c| c.id.clone()).collect();
        for stale in previous.iter().filter(|id| !ids.contains(*id)) {
            self.evict(stale, parent_id);
        }

        for child in batch {
            let moved_from = match self.entries.get(&child.id) {
                Some(existing) if existing.parent.as_deref() != Some(parent_id) => {
                    Some(existing.parent.clone())
                }
                _ => None,
            };
            if let Some(old_parent) = moved_from {
                debug!(parent_id, child = %child.id, from = ?old_parent, "re-parenting cached node");
                self.detach(&child.id, old_parent.as_deref());
            }

            match self.entries.get_mut(&child.id) {
                Some(existing) => {
                    existing.level_type = child.level_type.clone();
                    existing.number = child.number.clone();
                    existing.name = child.name.clone();
                    existing.parent = Some(parent_id.to_string());
                    existing.path = parent_path.child(child.level_type, child.number);
                    let id = existing.id.clone();
                    self.repath_descendants(&id);
                }
                None => {
                    let entry = NavEntry::from_flat(child, &parent_path);
                    self.entries.insert(entry.id.clone(), entry);
                }
            }
        }

        let parent = self.entry_mut(parent_id)?;
        parent.children = ChildState::Loaded(ids);
        parent.error = None;
        Ok(())
    }

    /// `id` and every ancestor reachable through cached parent links
    fn lineage(&self, id: &str) -> HashSet<String> {
        let mut lineage = HashSet::new();
        let mut current = Some(id.to_string());
        while let Some(node) = current {
            if !lineage.insert(node.clone()) {
                break;
            }
            current = self.entries.get(&node).and_then(|e| e.parent.clone());
        }
        lineage
    }

    /// Recompute browse paths below `id` after it was renumbered or moved
    fn repath_descendants(&mut self, id: &str) {
        let mut pending = vec![id.to_string()];
        let mut visited = HashSet::new();
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(entry) = self.entries.get(&current) else {
                continue;
            };
            let ChildState::Loaded(kids) = &entry.children else {
                continue;
            };
            let (path, kids) = (entry.path.clone(), kids.clone());
            for kid in kids {
                if let Some(child) = self.entries.get_mut(&kid) {
                    if child.parent.as_deref() == Some(current.as_str()) {
                        child.path = path.child(child.level_type.clone(), child.number.clone());
                        pending.push(kid);
                    }
                }
            }
        }
    }

    /// Drop `id` from its current parent's child list, or from the roots
    fn detach(&mut self, id: &str, old_parent: Option<&str>) {
        match old_parent {
            Some(old) => {
                if let Some(ChildState::Loaded(ids)) =
                    self.entries.get_mut(old).map(|e| &mut e.children)
                {
                    ids.retain(|c| c != id);
                }
            }
            None => self.roots.retain(|r| r != id),
        }
    }

    /// Record a failed fetch: the error becomes visible and the node
    /// returns to collapsed so the user can retry.
    pub fn fail_children(&mut self, parent_id: &str, message: impl Into<String>) -> Result<()> {
        let entry = self.entry_mut(parent_id)?;
        if entry.is_loading() {
            entry.children = ChildState::Unloaded;
        }
        entry.expanded = false;
        entry.error = Some(message.into());
        Ok(())
    }

    /// Remove `id` and its cached subtree, but only while `owner` is still
    /// its parent; a node that moved elsewhere stays with its new parent.
    fn evict(&mut self, id: &str, owner: &str) {
        let mut pending = vec![(id.to_string(), owner.to_string())];
        while let Some((id, owner)) = pending.pop() {
            let owned = self
                .entries
                .get(&id)
                .is_some_and(|e| e.parent.as_deref() == Some(owner.as_str()));
            if !owned {
                continue;
            }
            if let Some(entry) = self.entries.remove(&id) {
                if let ChildState::Loaded(children) = entry.children {
                    pending.extend(children.into_iter().map(|child| (child, id.clone())));
                }
            }
        }
    }

    /// Expand `id`, fetching through `loader` when needed
    pub async fn expand_with<L>(&mut self, loader: &L, id: &str) -> Result<ExpandAction>
    where
        L: ChildLoader + ?Sized,
    {
        let action = self.expand(id)?;
        if let ExpandAction::Fetch { parent_id } = &action {
            match loader.fetch_children(parent_id).await {
                Ok(children) => self.apply_children(parent_id, children)?,
                Err(err) => {
                    self.fail_children(parent_id, err.to_string())?;
                    return Err(err);
                }
            }
        }
        Ok(action)
    }

    /// Snapshot as a serialisable forest; unfetched children render empty
    pub fn to_forest(&self) -> Vec<NavNode> {
        self.roots
            .iter()
            .filter_map(|id| self.snapshot(id))
            .collect()
    }

    fn snapshot(&self, id: &str) -> Option<NavNode> {
        let entry = self.entries.get(id)?;
        let children = match &entry.children {
            ChildState::Loaded(ids) => ids.iter().filter_map(|c| self.snapshot(c)).collect(),
            _ => Vec::new(),
        };
        Some(NavNode {
            id: entry.id.clone(),
            level_type: entry.level_type.clone(),
            number: entry.number.clone(),
            name: entry.name.clone(),
            path: entry.path.to_url(),
            expanded: entry.expanded,
            children,
        })
    }

    /// Pre-order walk of what an expandable sidebar would show
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        for root in &self.roots {
            self.collect_rows(root, 0, &mut rows);
        }
        rows
    }

    fn collect_rows(&self, id: &str, depth: usize, rows: &mut Vec<VisibleRow>) {
        let Some(entry) = self.entries.get(id) else {
            return;
        };
        let label = {
            let head = format!("{} {}", entry.level_type.label(), entry.number);
            if entry.name.is_empty() {
                head.trim().to_string()
            } else {
                format!("{}: {}", head.trim(), entry.name)
            }
        };
        rows.push(VisibleRow {
            id: entry.id.clone(),
            depth,
            label,
            path: entry.path.to_url(),
            expanded: entry.expanded,
            loading: entry.is_loading(),
            error: entry.error.clone(),
        });
        if let (true, ChildState::Loaded(children)) = (entry.expanded, &entry.children) {
            for child in children {
                self.collect_rows(child, depth + 1, rows);
            }
        }
    }

    /// Flat records for every cached node
    pub fn flat_nodes(&self) -> Vec<FlatNode> {
        let mut nodes: Vec<FlatNode> = self.entries.values().map(NavEntry::flat).collect();
        nodes.sort_by(compare_siblings);
        nodes
    }
}
