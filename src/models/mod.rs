//! Boundary records for the regulation corpus
//!
//! Rows arrive from the store loosely typed; everything in here is the
//! validated shape the rest of the crate works with.

pub mod agency;
pub mod correction;
pub mod regulation;

pub use agency::{Agency, AgencyReference};
pub use correction::{Correction, CorrectionFilter};
pub use regulation::{
    ContentChunk, FlatNode, LevelType, NodeType, RawNodeRow, RegulationNode, TitleSummary,
};
