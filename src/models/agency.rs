//! Agency metadata and agency → node references

use serde::{Deserialize, Serialize};

use super::regulation::RegulationNode;

/// An issuing agency with its precomputed corpus metrics
///
/// Metric columns may be null in the store; queries coalesce them to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Agency {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub num_sections: i64,
    #[serde(default)]
    pub num_words: i64,
    #[serde(default)]
    pub num_corrections: i64,
    #[serde(default)]
    pub num_children: i64,
    #[serde(default)]
    pub num_cfr: i64,
}

impl Agency {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: parent_id.map(str::to_string),
            num_sections: 0,
            num_words: 0,
            num_corrections: 0,
            num_children: 0,
            num_cfr: 0,
        }
    }
}

/// A node an agency is responsible for, in mapping order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyReference {
    pub id: String,
    pub agency_id: String,
    pub node_id: String,
    pub ordinal: usize,
    pub node: RegulationNode,
}

impl AgencyReference {
    /// Number mapped nodes in the order the store returned them
    pub fn from_nodes(agency_id: &str, nodes: Vec<RegulationNode>) -> Vec<Self> {
        nodes
            .into_iter()
            .enumerate()
            .map(|(ordinal, node)| Self {
                id: format!("{}_{}", agency_id, node.id),
                agency_id: agency_id.to_string(),
                node_id: node.id.clone(),
                ordinal,
                node,
            })
            .collect()
    }
}
