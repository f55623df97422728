//! Corrections change-log entries

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};

/// One correction, joined with the node and agency it touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Correction {
    pub id: String,
    pub node_id: String,
    pub agency_id: Option<String>,
    pub title: Option<String>,
    pub error_occurred: NaiveDate,
    pub error_corrected: Option<NaiveDate>,
    /// Days between the error and its correction
    pub correction_duration: Option<i64>,
    pub node_name: Option<String>,
    pub citation: Option<String>,
    pub level_type: Option<String>,
    pub number: Option<String>,
    pub agency_name: Option<String>,
}

impl Correction {
    /// `YYYY-MM` bucket key
    pub fn month_key(&self) -> String {
        self.error_occurred.format("%Y-%m").to_string()
    }

    pub fn in_range(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.error_occurred >= start && self.error_occurred <= end
    }
}

/// Validated parameters of the time-ranged corrections listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionFilter {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Agency ids; empty means every agency
    pub agencies: Vec<String>,
    pub title: Option<String>,
}

impl CorrectionFilter {
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        agencies: Vec<String>,
        title: Option<&str>,
    ) -> Result<Self> {
        let (Some(start), Some(end)) = (
            start.map(str::trim).filter(|s| !s.is_empty()),
            end.map(str::trim).filter(|s| !s.is_empty()),
        ) else {
            return Err(AnalyzerError::MissingParameter {
                name: "Start and end dates",
            });
        };
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        if end < start {
            return Err(AnalyzerError::InvalidParameter {
                name: "end_date",
                reason: format!("{} is before start_date {}", end, start),
            });
        }
        Ok(Self {
            start,
            end,
            agencies: agencies
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            title: title.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string),
        })
    }

    pub fn matches(&self, correction: &Correction) -> bool {
        correction.in_range(self.start, self.end)
            && (self.agencies.is_empty()
                || correction
                    .agency_id
                    .as_ref()
                    .is_some_and(|a| self.agencies.contains(a)))
            && self
                .title
                .as_ref()
                .map_or(true, |t| correction.title.as_ref() == Some(t))
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    // Accept full timestamps too; only the date part matters
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| AnalyzerError::InvalidDate {
        value: raw.to_string(),
    })
}
