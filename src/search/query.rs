//! Search request validation and citation detection

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use crate::error::{AnalyzerError, Result};

fn citation_regex() -> &'static Regex {
    static CITATION: OnceLock<Regex> = OnceLock::new();
    CITATION.get_or_init(|| {
        Regex::new(
            r"(?ix)^
            (?:(?P<title>\d+)\s*c\.?\s*f\.?\s*r\.?\s*)?   # optional '4 CFR'
            (?:(?:§|sec\.?|section|part)\s*)*             # optional section marker
            (?P<number>\d+[A-Za-z]?(?:[.\-]\d+[A-Za-z0-9\-]*)?)
            $",
        )
        .expect("valid citation regex")
    })
}

/// A query that names a node directly, e.g. "4 CFR § 21.1" or "21.1"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationQuery {
    pub title: Option<String>,
    pub number: String,
}

impl CitationQuery {
    pub fn parse(q: &str) -> Option<Self> {
        let caps = citation_regex().captures(q.trim())?;
        Some(Self {
            title: caps.name("title").map(|m| m.as_str().to_string()),
            number: caps["number"].to_string(),
        })
    }
}

/// Validated search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    /// Title numbers to scope the search to; empty means every title
    pub titles: Vec<String>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(q: Option<&str>, titles: Vec<String>, limit: Option<usize>) -> Result<Self> {
        let q = q.map(str::trim).unwrap_or_default();
        if q.is_empty() {
            return Err(AnalyzerError::MissingParameter {
                name: "Search query",
            });
        }
        let mut titles: Vec<String> = titles
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        titles.sort();
        titles.dedup();

        let limit = match limit {
            Some(0) => {
                return Err(AnalyzerError::InvalidParameter {
                    name: "limit",
                    reason: "must be at least 1".to_string(),
                })
            }
            Some(n) => n.min(MAX_SEARCH_LIMIT),
            None => DEFAULT_SEARCH_LIMIT,
        };

        Ok(Self {
            q: q.to_string(),
            titles,
            limit,
        })
    }

    pub fn citation(&self) -> Option<CitationQuery> {
        CitationQuery::parse(&self.q)
    }

    /// Whether a hit inside `title` passes the title scope
    pub fn in_scope(&self, title: Option<&str>) -> bool {
        if self.titles.is_empty() {
            return true;
        }
        title.is_some_and(|t| self.titles.iter().any(|s| s == t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_query() {
        assert!(matches!(
            SearchQuery::new(None, vec![], None),
            Err(AnalyzerError::MissingParameter { .. })
        ));
        assert!(SearchQuery::new(Some("   "), vec![], None).is_err());
    }

    #[test]
    fn test_limit_clamped() {
        let q = SearchQuery::new(Some("bid protest"), vec![], Some(5000)).unwrap();
        assert_eq!(q.limit, MAX_SEARCH_LIMIT);
        let q = SearchQuery::new(Some("bid protest"), vec![], None).unwrap();
        assert_eq!(q.limit, DEFAULT_SEARCH_LIMIT);
        assert!(SearchQuery::new(Some("x"), vec![], Some(0)).is_err());
    }

    #[test]
    fn test_title_scope() {
        let q = SearchQuery::new(
            Some("protest"),
            vec!["4".into(), " 4 ".into(), "".into(), "48".into()],
            None,
        )
        .unwrap();
        assert_eq!(q.titles, vec!["4".to_string(), "48".to_string()]);
        assert!(q.in_scope(Some("48")));
        assert!(!q.in_scope(Some("5")));
        assert!(!q.in_scope(None));
    }

    #[test]
    fn test_citation_detection() {
        assert_eq!(
            CitationQuery::parse("4 CFR § 21.1"),
            Some(CitationQuery {
                title: Some("4".into()),
                number: "21.1".into()
            })
        );
        assert_eq!(
            CitationQuery::parse("21.1").map(|c| c.number),
            Some("21.1".into())
        );
        assert_eq!(
            CitationQuery::parse("part 21").map(|c| c.number),
            Some("21".into())
        );
        assert!(CitationQuery::parse("bid protest").is_none());
    }
}
