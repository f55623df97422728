//! eCFR Analyzer - browse, search and analyse the Code of Federal Regulations
//!
//! The regulation hierarchy (title, chapter, part, section) is stored as flat
//! parent-pointer rows. This crate rebuilds it into sorted navigation trees,
//! expands it lazily one node at a time, merges exact and full-text search
//! hits, and serves the whole corpus over a read-only JSON API.
//!
//! ## Quick Start
//!
//! ```rust
//! use ecfr_analyzer::models::FlatNode;
//! use ecfr_analyzer::navigation::NavTree;
//!
//! let mut tree = NavTree::from_flat(vec![FlatNode::new("t4", None, "title", "4", "Accounts")]);
//! tree.expand("t4").unwrap();
//! tree.apply_children("t4", vec![FlatNode::new("c1", Some("t4"), "chapter", "I", "GAO")])
//!     .unwrap();
//! assert_eq!(tree.visible_rows().len(), 2);
//! ```

// Core error handling
pub mod error;

pub mod config;

// Records as stored
pub mod models;

// Tree construction, lazy expansion, browse paths
pub mod navigation;

// Query validation and result merging
pub mod search;

pub mod analytics;

// Storage seam and the in-memory implementation
pub mod store;

// Postgres integration (when enabled)
#[cfg(feature = "database")]
pub mod database;

// REST API (when enabled)
#[cfg(feature = "server")]
pub mod api;

pub use error::{AnalyzerError, ErrorKind, Result};
pub use navigation::{build_nav_tree, NavNode, NavTree};
pub use search::{merge_results, run_search, SearchQuery, SearchResponse};
pub use store::{MemoryStore, RegulationStore, Snapshot};

#[cfg(feature = "database")]
pub use database::{DatabaseConfig, DatabaseManager, PgRegulationStore};
