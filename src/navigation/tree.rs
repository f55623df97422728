//! Navigation tree construction from flat parent-pointer records
//!
//! The builder resolves every record's parent inside the batch, decides what
//! happens to records whose parent is missing, breaks parent cycles, and
//! sorts every sibling list by level rank and then by number.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::path::BrowsePath;
use crate::models::{FlatNode, LevelType};

/// Presentation node of the navigation tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavNode {
    pub id: String,
    #[serde(rename = "type")]
    pub level_type: LevelType,
    pub number: String,
    pub name: String,
    pub path: String,
    pub expanded: bool,
    pub children: Vec<NavNode>,
}

impl NavNode {
    pub fn find(&self, id: &str) -> Option<&NavNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes in this subtree, including `self`
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(NavNode::size).sum::<usize>()
    }

    /// Sidebar label, e.g. "Title 4: Accounts"
    pub fn display_label(&self) -> String {
        let head = format!("{} {}", self.level_type.label(), self.number);
        if self.name.is_empty() {
            head.trim().to_string()
        } else {
            format!("{}: {}", head.trim(), self.name)
        }
    }
}

/// What to do with a record whose parent is not in the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Promote to root and log a warning
    #[default]
    Promote,
    /// Leave the record (and anything below it) out of the tree
    Drop,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub orphan_policy: OrphanPolicy,
    /// Nodes shallower than this are marked `expanded`
    pub expand_depth: usize,
    /// Records whose parent is this id are roots of the result
    pub root_parent: Option<String>,
    /// Path of the (implicit) parent of the roots
    pub base_path: BrowsePath,
}

impl BuildOptions {
    /// Options for a subtree fetched below `parent_id`
    pub fn scoped(parent_id: impl Into<String>, base_path: BrowsePath) -> Self {
        Self {
            orphan_policy: OrphanPolicy::Drop,
            root_parent: Some(parent_id.into()),
            base_path,
            ..Self::default()
        }
    }
}

/// What the builder did with records that did not fit cleanly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub roots: usize,
    pub nodes: usize,
    pub promoted: Vec<String>,
    pub dropped: Vec<String>,
    pub cycles: Vec<String>,
    pub duplicates: Vec<String>,
}

/// Compare two `number` fields: integers numerically when both parse,
/// otherwise a natural comparison over digit and non-digit runs.
pub fn compare_numbers(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.trim(), b.trim());
    if let (Ok(x), Ok(y)) = (a.parse::<u64>(), b.parse::<u64>()) {
        return x.cmp(&y).then_with(|| a.cmp(b));
    }
    natural_cmp(a, b)
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a).into_iter();
    let mut right = chunks(b).into_iter();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Digits(x), Chunk::Digits(y)) => {
                        let (xs, ys) = (x.trim_start_matches('0'), y.trim_start_matches('0'));
                        xs.len().cmp(&ys.len()).then_with(|| xs.cmp(ys))
                    }
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Text(x), Chunk::Text(y)) => x
                        .to_lowercase()
                        .cmp(&y.to_lowercase())
                        .then_with(|| x.cmp(y)),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;
    for (idx, ch) in s.char_indices() {
        let is_digit = ch.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                out.push(make_chunk(&s[start..idx], prev));
                start = idx;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(prev) = in_digits {
        out.push(make_chunk(&s[start..], prev));
    }
    out
}

fn make_chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(s)
    } else {
        Chunk::Text(s)
    }
}

/// Total sibling order: level rank, number, name, then id
pub fn compare_siblings(a: &FlatNode, b: &FlatNode) -> Ordering {
    a.level_type
        .rank()
        .cmp(&b.level_type.rank())
        .then_with(|| compare_numbers(&a.number, &b.number))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort a list of flat records in sibling order
pub fn sort_siblings(nodes: &mut [FlatNode]) {
    nodes.sort_by(compare_siblings);
}

/// Build a forest with default options (orphans promoted, nothing expanded)
pub fn build_nav_tree(nodes: Vec<FlatNode>) -> Vec<NavNode> {
    build_nav_tree_with(nodes, &BuildOptions::default()).0
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Link {
    Root,
    Child(String),
    Dropped,
}

pub fn build_nav_tree_with(
    nodes: Vec<FlatNode>,
    options: &BuildOptions,
) -> (Vec<NavNode>, BuildReport) {
    let mut report = BuildReport::default();
    if nodes.is_empty() {
        return (Vec::new(), report);
    }

    let by_id = dedupe(nodes, &mut report);

    // Process in sibling order so every decision is independent of input order
    let mut ordered: Vec<&FlatNode> = by_id.values().collect();
    ordered.sort_by(|a, b| compare_siblings(a, b));

    let mut links: HashMap<&str, Link> = HashMap::with_capacity(by_id.len());
    for node in &ordered {
        let link = match node.parent.as_deref() {
            None => Link::Root,
            Some(parent) if options.root_parent.as_deref() == Some(parent) => Link::Root,
            Some(parent) if by_id.contains_key(parent) => Link::Child(parent.to_string()),
            Some(parent) if node.level_type.is_top_level() => {
                debug!(id = %node.id, parent, "top-level node with unresolved parent treated as root");
                Link::Root
            }
            Some(parent) => match options.orphan_policy {
                OrphanPolicy::Promote => {
                    warn!(id = %node.id, parent, "orphaned node promoted to root");
                    report.promoted.push(node.id.clone());
                    Link::Root
                }
                OrphanPolicy::Drop => {
                    warn!(id = %node.id, parent, "orphaned node dropped");
                    report.dropped.push(node.id.clone());
                    Link::Dropped
                }
            },
        };
        links.insert(node.id.as_str(), link);
    }

    let attached = resolve_chains(&ordered, &by_id, &mut links, options, &mut report);

    let mut children: HashMap<&str, Vec<&FlatNode>> = HashMap::new();
    let mut roots: Vec<&FlatNode> = Vec::new();
    for node in &ordered {
        if !attached.contains(node.id.as_str()) {
            continue;
        }
        match links.get(node.id.as_str()) {
            Some(Link::Root) => roots.push(node),
            Some(Link::Child(parent)) => children.entry(parent.as_str()).or_default().push(node),
            _ => {}
        }
    }

    // `ordered` is already sorted, so every bucket is sorted as pushed
    let forest: Vec<NavNode> = roots
        .iter()
        .map(|root| assemble(root, &children, &options.base_path, 0, options.expand_depth))
        .collect();

    report.roots = forest.len();
    report.nodes = forest.iter().map(NavNode::size).sum();
    (forest, report)
}

fn dedupe(nodes: Vec<FlatNode>, report: &mut BuildReport) -> BTreeMap<String, FlatNode> {
    let mut by_id: BTreeMap<String, FlatNode> = BTreeMap::new();
    for node in nodes {
        match by_id.get_mut(&node.id) {
            Some(existing) => {
                warn!(id = %node.id, "duplicate node id in batch");
                report.duplicates.push(node.id.clone());
                // Keep the smaller record so the winner does not depend on input order
                if compare_record(&node, existing) == Ordering::Less {
                    *existing = node;
                }
            }
            None => {
                by_id.insert(node.id.clone(), node);
            }
        }
    }
    report.duplicates.sort();
    report.duplicates.dedup();
    by_id
}

fn compare_record(a: &FlatNode, b: &FlatNode) -> Ordering {
    compare_siblings(a, b).then_with(|| a.parent.cmp(&b.parent))
}

/// Walk every parent chain; returns the ids that end at a root.
/// Chains that loop are broken at their smallest member (promote) or
/// removed entirely (drop).
fn resolve_chains<'a>(
    ordered: &[&'a FlatNode],
    by_id: &'a BTreeMap<String, FlatNode>,
    links: &mut HashMap<&'a str, Link>,
    options: &BuildOptions,
    report: &mut BuildReport,
) -> HashSet<&'a str> {
    let mut resolved: HashMap<&'a str, bool> = HashMap::with_capacity(ordered.len());

    for start in ordered {
        let mut trail: Vec<&'a str> = Vec::new();
        let mut on_trail: HashSet<&'a str> = HashSet::new();
        let mut current: &'a str = start.id.as_str();

        let outcome = loop {
            if let Some(&known) = resolved.get(current) {
                break known;
            }
            match links.get(current) {
                Some(Link::Root) => {
                    resolved.insert(current, true);
                    break true;
                }
                Some(Link::Dropped) | None => {
                    resolved.insert(current, false);
                    break false;
                }
                Some(Link::Child(parent)) => {
                    let parent = parent.clone();
                    if !on_trail.insert(current) {
                        break handle_cycle(current, &trail, by_id, links, options, report);
                    }
                    trail.push(current);
                    match by_id.get_key_value(parent.as_str()) {
                        Some((key, _)) => current = key.as_str(),
                        None => break false,
                    }
                }
            }
        };

        for id in trail {
            resolved.insert(id, outcome);
        }
    }

    resolved
        .into_iter()
        .filter_map(|(id, ok)| ok.then_some(id))
        .collect()
}

fn handle_cycle<'a>(
    entry: &'a str,
    trail: &[&'a str],
    by_id: &'a BTreeMap<String, FlatNode>,
    links: &mut HashMap<&'a str, Link>,
    options: &BuildOptions,
    report: &mut BuildReport,
) -> bool {
    let start = trail.iter().position(|id| *id == entry).unwrap_or(0);
    let mut members: Vec<&'a FlatNode> = trail[start..]
        .iter()
        .filter_map(|id| by_id.get(*id))
        .collect();
    members.sort_by(|a, b| compare_siblings(a, b));

    let mut ids: Vec<String> = members.iter().map(|n| n.id.clone()).collect();
    warn!(members = ?ids, policy = ?options.orphan_policy, "parent cycle detected");
    report.cycles.append(&mut ids);

    match (options.orphan_policy, members.first()) {
        (OrphanPolicy::Promote, Some(head)) => {
            links.insert(head.id.as_str(), Link::Root);
            report.promoted.push(head.id.clone());
            true
        }
        _ => {
            for member in &members {
                links.insert(member.id.as_str(), Link::Dropped);
                report.dropped.push(member.id.clone());
            }
            false
        }
    }
}

fn assemble(
    node: &FlatNode,
    children: &HashMap<&str, Vec<&FlatNode>>,
    parent_path: &BrowsePath,
    depth: usize,
    expand_depth: usize,
) -> NavNode {
    let path = parent_path.child(node.level_type.clone(), node.number.clone());
    let kids = children
        .get(node.id.as_str())
        .map(|list| {
            list.iter()
                .map(|child| assemble(child, children, &path, depth + 1, expand_depth))
                .collect()
        })
        .unwrap_or_default();

    NavNode {
        id: node.id.clone(),
        level_type: node.level_type.clone(),
        number: node.number.clone(),
        name: node.name.clone(),
        path: path.to_url(),
        expanded: depth < expand_depth,
        children: kids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, level: &str, number: &str) -> FlatNode {
        FlatNode::new(id, parent, level, number, format!("{} {}", level, number))
    }

    #[test]
    fn test_empty_input() {
        let (forest, report) = build_nav_tree_with(Vec::new(), &BuildOptions::default());
        assert!(forest.is_empty());
        assert_eq!(report, BuildReport::default());
    }

    #[test]
    fn test_single_title_with_chapter() {
        let forest = build_nav_tree(vec![
            FlatNode::new("t4", None, "title", "4", "Accounts"),
            FlatNode::new("c1", Some("t4"), "chapter", "I", "GAO"),
        ]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, "t4");
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].id, "c1");
        assert!(forest[0].children[0].children.is_empty());
        assert_eq!(forest[0].children[0].path, "/browse/title=4/chapter=I");
    }

    #[test]
    fn test_compare_numbers() {
        assert_eq!(compare_numbers("21", "100"), Ordering::Less);
        assert_eq!(compare_numbers("100", "21"), Ordering::Greater);
        assert_eq!(compare_numbers("21-29", "100"), Ordering::Less);
        assert_eq!(compare_numbers("21-29", "21"), Ordering::Greater);
        assert_eq!(compare_numbers("21.10", "21.9"), Ordering::Greater);
        assert_eq!(compare_numbers("A", "B"), Ordering::Less);
        assert_eq!(compare_numbers("", "1"), Ordering::Less);
        assert_eq!(compare_numbers("007", "7"), Ordering::Less);
    }

    #[test]
    fn test_level_rank_before_number() {
        let forest = build_nav_tree(vec![
            node("t1", None, "title", "1"),
            node("s5", Some("t1"), "section", "1"),
            node("p9", Some("t1"), "part", "900"),
            node("x", Some("t1"), "appendix", "A"),
            node("c2", Some("t1"), "chapter", "II"),
        ]);
        let order: Vec<&str> = forest[0].children.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["c2", "p9", "s5", "x"]);
    }

    #[test]
    fn test_missing_level_and_number_sort_last_without_panic() {
        let forest = build_nav_tree(vec![
            node("t1", None, "title", "1"),
            FlatNode::new("blank", Some("t1"), "", "", ""),
            node("p1", Some("t1"), "part", "1"),
        ]);
        let order: Vec<&str> = forest[0].children.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["p1", "blank"]);
    }

    #[test]
    fn test_orphan_promoted_by_default() {
        let (forest, report) = build_nav_tree_with(
            vec![node("t1", None, "title", "1"), node("p7", Some("gone"), "part", "7")],
            &BuildOptions::default(),
        );
        assert_eq!(forest.len(), 2);
        assert_eq!(report.promoted, vec!["p7".to_string()]);
    }

    #[test]
    fn test_orphan_dropped_with_descendants() {
        let options = BuildOptions {
            orphan_policy: OrphanPolicy::Drop,
            ..BuildOptions::default()
        };
        let (forest, report) = build_nav_tree_with(
            vec![
                node("t1", None, "title", "1"),
                node("p7", Some("gone"), "part", "7"),
                node("s7", Some("p7"), "section", "7.1"),
            ],
            &options,
        );
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].size(), 1);
        assert_eq!(report.dropped, vec!["p7".to_string()]);
    }

    #[test]
    fn test_title_with_missing_parent_is_root_not_orphan() {
        let options = BuildOptions {
            orphan_policy: OrphanPolicy::Drop,
            ..BuildOptions::default()
        };
        let (forest, report) =
            build_nav_tree_with(vec![node("t9", Some("cfr"), "title", "9")], &options);
        assert_eq!(forest.len(), 1);
        assert!(report.dropped.is_empty());
        assert!(report.promoted.is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let (forest, report) = build_nav_tree_with(
            vec![
                node("a", Some("b"), "part", "2"),
                node("b", Some("a"), "part", "1"),
                node("c", Some("a"), "section", "1"),
            ],
            &BuildOptions::default(),
        );
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, "b");
        assert_eq!(forest[0].size(), 3);
        assert_eq!(report.cycles.len(), 2);

        let drop = BuildOptions {
            orphan_policy: OrphanPolicy::Drop,
            ..BuildOptions::default()
        };
        let (forest, _) = build_nav_tree_with(
            vec![node("a", Some("b"), "part", "2"), node("b", Some("a"), "part", "1")],
            &drop,
        );
        assert!(forest.is_empty());
    }

    #[test]
    fn test_scoped_build_and_expand_depth() {
        let options = BuildOptions {
            expand_depth: 1,
            ..BuildOptions::scoped("t4", BrowsePath::parse("title=4").unwrap())
        };
        let (forest, _) = build_nav_tree_with(
            vec![
                node("c1", Some("t4"), "chapter", "I"),
                node("p21", Some("c1"), "part", "21"),
            ],
            &options,
        );
        assert_eq!(forest.len(), 1);
        assert!(forest[0].expanded);
        assert!(!forest[0].children[0].expanded);
        assert_eq!(forest[0].children[0].path, "/browse/title=4/chapter=I/part=21");
    }

    #[test]
    fn test_duplicate_ids_resolved_deterministically() {
        let a = vec![
            node("t1", None, "title", "1"),
            FlatNode::new("p1", Some("t1"), "part", "1", "B"),
            FlatNode::new("p1", Some("t1"), "part", "1", "A"),
        ];
        let mut b = a.clone();
        b.reverse();
        let (fa, ra) = build_nav_tree_with(a, &BuildOptions::default());
        let (fb, _) = build_nav_tree_with(b, &BuildOptions::default());
        assert_eq!(fa, fb);
        assert_eq!(fa[0].children[0].name, "A");
        assert_eq!(ra.duplicates, vec!["p1".to_string()]);
    }

    #[test]
    fn test_display_label() {
        let forest = build_nav_tree(vec![FlatNode::new("t4", None, "title", "4", "Accounts")]);
        assert_eq!(forest[0].display_label(), "Title 4: Accounts");
    }
}
