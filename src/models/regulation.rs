//! Regulation hierarchy records: nodes, level types and content chunks

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};

/// Hierarchical classification of a node
///
/// Ordering of the known variants is the sibling ordering used by the
/// navigation tree. Anything the corpus carries that is not recognised lands
/// in `Other` and sorts after `Section`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LevelType {
    Title,
    Chapter,
    Subchapter,
    Part,
    Subpart,
    Section,
    Other(String),
}

impl LevelType {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Title => 0,
            Self::Chapter => 1,
            Self::Subchapter => 2,
            Self::Part => 3,
            Self::Subpart => 4,
            Self::Section => 5,
            Self::Other(_) => 6,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Title => "title",
            Self::Chapter => "chapter",
            Self::Subchapter => "subchapter",
            Self::Part => "part",
            Self::Subpart => "subpart",
            Self::Section => "section",
            Self::Other(raw) => raw,
        }
    }

    /// Human label used in breadcrumbs and sidebars ("Title", "Subchapter")
    pub fn label(&self) -> String {
        let raw = self.as_str();
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// True for the topmost classification
    pub fn is_top_level(&self) -> bool {
        matches!(self, Self::Title)
    }
}

impl From<&str> for LevelType {
    fn from(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "title" => Self::Title,
            "chapter" => Self::Chapter,
            "subchapter" => Self::Subchapter,
            "part" => Self::Part,
            "subpart" => Self::Subpart,
            "section" => Self::Section,
            _ => Self::Other(trimmed.to_string()),
        }
    }
}

impl From<String> for LevelType {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<LevelType> for String {
    fn from(level: LevelType) -> Self {
        level.as_str().to_string()
    }
}

impl FromStr for LevelType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for LevelType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl PartialOrd for LevelType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LevelType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.as_str().cmp(other.as_str()))
    }
}

/// Whether a node carries text (`content`) or only groups other nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Structure,
    Content,
}

impl From<&str> for NodeType {
    fn from(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("content") {
            Self::Content
        } else {
            Self::Structure
        }
    }
}

/// A `nodes` row exactly as the store returns it
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct RawNodeRow {
    pub id: String,
    pub parent: Option<String>,
    pub level_type: Option<String>,
    pub number: Option<String>,
    pub node_name: Option<String>,
    pub citation: Option<String>,
    pub link: Option<String>,
    pub node_type: Option<String>,
    pub depth: Option<i32>,
    pub num_corrections: Option<i32>,
    pub metadata: Option<serde_json::Value>,
}

impl RawNodeRow {
    fn checked_id(&self) -> Result<String> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(AnalyzerError::malformed("node row with empty id"));
        }
        Ok(id.to_string())
    }

    fn normalized_parent(&self) -> Option<String> {
        self.parent
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }
}

/// One row of hierarchical data: a parent reference, no children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatNode {
    pub id: String,
    pub parent: Option<String>,
    #[serde(default)]
    pub level_type: LevelType,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub name: String,
}

impl FlatNode {
    pub fn new(
        id: impl Into<String>,
        parent: Option<&str>,
        level_type: impl Into<LevelType>,
        number: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent: parent.map(str::to_string),
            level_type: level_type.into(),
            number: number.into(),
            name: name.into(),
        }
    }
}

impl TryFrom<RawNodeRow> for FlatNode {
    type Error = AnalyzerError;

    fn try_from(row: RawNodeRow) -> Result<Self> {
        let id = row.checked_id()?;
        let parent = row.normalized_parent();
        if parent.as_deref() == Some(id.as_str()) {
            return Err(AnalyzerError::malformed(format!(
                "node '{}' lists itself as parent",
                id
            )));
        }
        Ok(Self {
            id,
            parent,
            level_type: row.level_type.map(LevelType::from).unwrap_or_default(),
            number: row.number.unwrap_or_default(),
            name: row.node_name.unwrap_or_default(),
        })
    }
}

/// Full node detail served by the regulation endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationNode {
    pub id: String,
    pub citation: String,
    pub link: String,
    pub node_type: NodeType,
    pub level_type: LevelType,
    pub number: String,
    pub node_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub depth: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_corrections: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RegulationNode {
    pub fn flat(&self) -> FlatNode {
        FlatNode {
            id: self.id.clone(),
            parent: self.parent.clone(),
            level_type: self.level_type.clone(),
            number: self.number.clone(),
            name: self.node_name.clone(),
        }
    }
}

impl TryFrom<RawNodeRow> for RegulationNode {
    type Error = AnalyzerError;

    fn try_from(row: RawNodeRow) -> Result<Self> {
        let id = row.checked_id()?;
        let parent = row.normalized_parent();
        Ok(Self {
            id,
            parent,
            citation: row.citation.unwrap_or_default(),
            link: row.link.unwrap_or_default(),
            node_type: row.node_type.as_deref().map(NodeType::from).unwrap_or_default(),
            level_type: row.level_type.map(LevelType::from).unwrap_or_default(),
            number: row.number.unwrap_or_default(),
            node_name: row.node_name.unwrap_or_default(),
            depth: row.depth.unwrap_or_default(),
            num_corrections: row.num_corrections,
            metadata: row.metadata,
        })
    }
}

/// Depth-0 listing entry for the titles endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct TitleSummary {
    pub number: String,
    pub node_name: String,
}

/// A slice of a section's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ContentChunk {
    pub id: String,
    pub section_id: String,
    pub content: String,
    pub chunk_number: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_type_parsing() {
        assert_eq!(LevelType::from("Title"), LevelType::Title);
        assert_eq!(LevelType::from(" subpart "), LevelType::Subpart);
        assert_eq!(
            LevelType::from("appendix"),
            LevelType::Other("appendix".into())
        );
        assert_eq!(LevelType::from(""), LevelType::default());
    }

    #[test]
    fn test_level_type_rank_order() {
        let mut levels = vec![
            LevelType::Other("appendix".into()),
            LevelType::Section,
            LevelType::Title,
            LevelType::Part,
            LevelType::Chapter,
        ];
        levels.sort();
        assert_eq!(
            levels,
            vec![
                LevelType::Title,
                LevelType::Chapter,
                LevelType::Part,
                LevelType::Section,
                LevelType::Other("appendix".into()),
            ]
        );
    }

    #[test]
    fn test_level_type_serde_as_string() {
        let json = serde_json::to_string(&LevelType::Subchapter).unwrap();
        assert_eq!(json, "\"subchapter\"");
        let parsed: LevelType = serde_json::from_str("\"PART\"").unwrap();
        assert_eq!(parsed, LevelType::Part);
        assert_eq!(LevelType::Subchapter.label(), "Subchapter");
    }

    #[test]
    fn test_flat_node_from_row_defaults_missing_fields() {
        let row = RawNodeRow {
            id: "t4".into(),
            parent: Some("".into()),
            ..Default::default()
        };
        let node = FlatNode::try_from(row).unwrap();
        assert_eq!(node.parent, None);
        assert_eq!(node.level_type, LevelType::default());
        assert_eq!(node.number, "");
    }

    #[test]
    fn test_flat_node_rejects_malformed_rows() {
        let empty_id = RawNodeRow {
            id: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(
            FlatNode::try_from(empty_id),
            Err(AnalyzerError::MalformedRecord { .. })
        ));

        let self_parent = RawNodeRow {
            id: "t4".into(),
            parent: Some("t4".into()),
            ..Default::default()
        };
        assert!(FlatNode::try_from(self_parent).is_err());
    }

    #[test]
    fn test_regulation_node_from_row() {
        let row = RawNodeRow {
            id: "us/federal/ecfr/title=4/chapter=I/part=21/section=21.1".into(),
            parent: Some("us/federal/ecfr/title=4/chapter=I/part=21".into()),
            level_type: Some("section".into()),
            number: Some("21.1".into()),
            node_name: Some("Purpose".into()),
            citation: Some("4 CFR 21.1".into()),
            node_type: Some("content".into()),
            depth: Some(3),
            ..Default::default()
        };
        let node = RegulationNode::try_from(row).unwrap();
        assert_eq!(node.node_type, NodeType::Content);
        assert_eq!(node.level_type, LevelType::Section);
        assert_eq!(node.flat().name, "Purpose");
    }
}
