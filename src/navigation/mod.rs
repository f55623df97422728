//! Navigation over the regulation hierarchy
//!
//! - `tree`: rebuild a sorted forest from flat parent-pointer records
//! - `expansion`: owned arena with per-node lazy expansion
//! - `path`: browse paths and breadcrumbs
//! - `loader`: level-at-a-time prefetch from a store
//!
//! ## Usage Example
//!
//! ```
//! use ecfr_analyzer::models::FlatNode;
//! use ecfr_analyzer::navigation::build_nav_tree;
//!
//! let forest = build_nav_tree(vec![
//!     FlatNode::new("t4", None, "title", "4", "Accounts"),
//!     FlatNode::new("c1", Some("t4"), "chapter", "I", "GAO"),
//! ]);
//! assert_eq!(forest[0].children[0].path, "/browse/title=4/chapter=I");
//! ```

pub mod expansion;
pub mod loader;
pub mod path;
pub mod tree;

pub use expansion::{ChildLoader, ChildState, ExpandAction, NavEntry, NavTree, VisibleRow};
pub use loader::{load_forest, path_of, MAX_LEVELS};
pub use path::{Breadcrumb, BrowsePath, PathSegment};
pub use tree::{
    build_nav_tree, build_nav_tree_with, compare_numbers, compare_siblings, sort_siblings,
    BuildOptions, BuildReport, NavNode, OrphanPolicy,
};
