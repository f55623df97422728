//! Browse paths (`/browse/title=4/chapter=I/part=21`) and breadcrumbs

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};
use crate::models::LevelType;

pub const BROWSE_PREFIX: &str = "/browse";

fn segment_regex() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| {
        Regex::new(r"^(?P<level>[A-Za-z_]+)=(?P<number>[^=/]+)$").expect("valid segment regex")
    })
}

/// One `level=number` step of a browse path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub level_type: LevelType,
    pub number: String,
}

impl PathSegment {
    pub fn new(level_type: LevelType, number: impl Into<String>) -> Self {
        Self {
            level_type,
            number: number.into(),
        }
    }

    /// True when the segment renders to something `BrowsePath::parse` accepts
    pub fn is_routable(&self) -> bool {
        let level = self.level_type.as_str();
        let number = self.number.trim();
        !level.is_empty()
            && level.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
            && !number.is_empty()
            && !number.contains(['=', '/'])
    }

    /// "Title 4", "Chapter I", "Sections 21-29"
    pub fn label(&self) -> String {
        let mut level = self.level_type.label();
        if self.level_type == LevelType::Section && self.number.contains('-') {
            level.push('s');
        }
        if level.is_empty() {
            self.number.clone()
        } else {
            format!("{} {}", level, self.number)
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.level_type, self.number)
    }
}

/// A breadcrumb entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub label: String,
    pub path: String,
}

/// Ordered `level=number` segments from the root title downwards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsePath {
    segments: Vec<PathSegment>,
}

impl BrowsePath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse a browse path. The `/browse` prefix and empty segments are
    /// ignored; every remaining segment must be `level=number`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix(BROWSE_PREFIX)
            .unwrap_or(trimmed)
            .trim_matches('/');

        let mut segments = Vec::new();
        for part in body.split('/').filter(|p| !p.is_empty()) {
            let caps = segment_regex()
                .captures(part)
                .ok_or_else(|| AnalyzerError::InvalidPath {
                    segment: part.to_string(),
                })?;
            segments.push(PathSegment::new(
                LevelType::from(&caps["level"]),
                caps["number"].trim(),
            ));
        }
        Ok(Self { segments })
    }

    /// Extract the browse path embedded in a node id such as
    /// `us/federal/ecfr/title=4/chapter=I`; non `level=number` parts are skipped.
    pub fn from_node_id(id: &str) -> Self {
        let segments = id
            .split('/')
            .filter_map(|part| segment_regex().captures(part))
            .map(|caps| PathSegment::new(LevelType::from(&caps["level"]), caps["number"].trim()))
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Extend by one step; a segment that would not parse back is skipped
    /// and the parent path is returned unchanged.
    pub fn child(&self, level_type: LevelType, number: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        let segment = PathSegment::new(level_type, number);
        if segment.is_routable() {
            segments.push(segment);
        }
        Self { segments }
    }

    /// Path without the `/browse` prefix, as the store's path lookup expects
    pub fn relative(&self) -> String {
        self.segments
            .iter()
            .map(PathSegment::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn to_url(&self) -> String {
        if self.segments.is_empty() {
            return BROWSE_PREFIX.to_string();
        }
        format!("{}/{}", BROWSE_PREFIX, self.relative())
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        (1..=self.segments.len())
            .map(|len| {
                let prefix = Self::new(self.segments[..len].to_vec());
                Breadcrumb {
                    label: self.segments[len - 1].label(),
                    path: prefix.to_url(),
                }
            })
            .collect()
    }

    /// Heading text: breadcrumb labels joined with " › "
    pub fn title(&self) -> String {
        if self.segments.is_empty() {
            return "Code of Federal Regulations".to_string();
        }
        self.segments
            .iter()
            .map(PathSegment::label)
            .collect::<Vec<_>>()
            .join(" › ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_prefix() {
        let a = BrowsePath::parse("/browse/title=4/chapter=I/subchapter=B").unwrap();
        let b = BrowsePath::parse("title=4/chapter=I//subchapter=B/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.segments().len(), 3);
        assert_eq!(a.segments()[1], PathSegment::new(LevelType::Chapter, "I"));
    }

    #[test]
    fn test_parse_rejects_bare_segment() {
        let err = BrowsePath::parse("title=4/chapterI").unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidPath { segment } if segment == "chapterI"));
    }

    #[test]
    fn test_child_skips_unroutable_segments() {
        let base = BrowsePath::parse("title=4").unwrap();
        assert_eq!(base.child(LevelType::Chapter, ""), base);
        assert_eq!(base.child(LevelType::from(""), "I"), base);
        assert_eq!(base.child(LevelType::from("appendix-a"), "1"), base);
        assert_eq!(base.child(LevelType::Part, "2/3"), base);

        let child = base.child(LevelType::Chapter, "I");
        assert_eq!(child.to_url(), "/browse/title=4/chapter=I");
        assert_eq!(BrowsePath::parse(&child.to_url()).unwrap(), child);
    }

    #[test]
    fn test_empty_path() {
        let path = BrowsePath::parse("/browse").unwrap();
        assert!(path.is_empty());
        assert_eq!(path.to_url(), "/browse");
        assert_eq!(path.title(), "Code of Federal Regulations");
    }

    #[test]
    fn test_breadcrumbs() {
        let path = BrowsePath::parse("title=4/chapter=I/subchapter=B/section=21-29").unwrap();
        let crumbs = path.breadcrumbs();
        assert_eq!(crumbs.len(), 4);
        assert_eq!(crumbs[0].label, "Title 4");
        assert_eq!(crumbs[0].path, "/browse/title=4");
        assert_eq!(crumbs[3].label, "Sections 21-29");
        assert_eq!(
            crumbs[3].path,
            "/browse/title=4/chapter=I/subchapter=B/section=21-29"
        );
        assert_eq!(
            path.title(),
            "Title 4 › Chapter I › Subchapter B › Sections 21-29"
        );
    }

    #[test]
    fn test_from_node_id() {
        let path = BrowsePath::from_node_id("us/federal/ecfr/title=4/chapter=I");
        assert_eq!(path.to_url(), "/browse/title=4/chapter=I");
        assert_eq!(path.relative(), "title=4/chapter=I");
    }
}
