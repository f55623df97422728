//! Aggregations behind the analytics sidebars
//!
//! Everything here is pure: the store hands over rows, these functions fold
//! them into the JSON shapes the endpoints serve.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Agency, Correction};

/// Size of every "top N" list
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct NamedCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyTotals {
    pub total_agencies: usize,
    pub total_sections: i64,
    pub total_words: i64,
    pub total_corrections: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyAnalytics {
    pub total_metrics: AgencyTotals,
    pub top_agencies_by_corrections: Vec<NamedCount>,
    pub top_agencies_by_sections: Vec<NamedCount>,
}

impl AgencyAnalytics {
    pub fn compute(agencies: &[Agency]) -> Self {
        let total_metrics = agencies.iter().fold(
            AgencyTotals {
                total_agencies: agencies.len(),
                ..AgencyTotals::default()
            },
            |mut acc, agency| {
                acc.total_sections += agency.num_sections;
                acc.total_words += agency.num_words;
                acc.total_corrections += agency.num_corrections;
                acc
            },
        );

        Self {
            total_metrics,
            top_agencies_by_corrections: top_by(agencies, |a| a.num_corrections, TOP_N),
            top_agencies_by_sections: top_by(agencies, |a| a.num_sections, TOP_N),
        }
    }
}

/// Largest `n` agencies by `metric`, ties broken by name
pub fn top_by(agencies: &[Agency], metric: impl Fn(&Agency) -> i64, n: usize) -> Vec<NamedCount> {
    let mut counts: Vec<NamedCount> = agencies
        .iter()
        .map(|a| NamedCount {
            name: a.name.clone(),
            count: metric(a),
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    counts.truncate(n);
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongestCorrection {
    pub duration: i64,
    pub title: String,
    pub agency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionTotals {
    pub total_corrections: usize,
    pub average_duration: f64,
    pub most_active_month: Option<MonthCount>,
    pub longest_correction: Option<LongestCorrection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionAnalytics {
    pub total_metrics: CorrectionTotals,
    pub top_agencies: Vec<NamedCount>,
    pub top_nodes: Vec<NamedCount>,
    pub longest_corrections: Vec<LongestCorrection>,
    pub corrections_by_month: BTreeMap<String, usize>,
}

impl CorrectionAnalytics {
    pub fn compute(agencies: &[Agency], top_nodes: Vec<NamedCount>, corrections: &[Correction]) -> Self {
        let by_month = corrections_by_month(corrections);
        let longest = longest_corrections(corrections, TOP_N);

        let durations: Vec<i64> = corrections
            .iter()
            .filter_map(|c| c.correction_duration)
            .collect();
        let average_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<i64>() as f64 / durations.len() as f64
        };

        let mut top_nodes = top_nodes;
        top_nodes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        top_nodes.truncate(TOP_N);

        Self {
            total_metrics: CorrectionTotals {
                total_corrections: corrections.len(),
                average_duration,
                most_active_month: most_active_month(&by_month),
                longest_correction: longest.first().cloned(),
            },
            top_agencies: top_by(agencies, |a| a.num_corrections, TOP_N),
            top_nodes,
            longest_corrections: longest,
            corrections_by_month: by_month,
        }
    }
}

/// Count corrections per `YYYY-MM` of `error_occurred`
pub fn corrections_by_month(corrections: &[Correction]) -> BTreeMap<String, usize> {
    let mut months = BTreeMap::new();
    for correction in corrections {
        *months.entry(correction.month_key()).or_insert(0) += 1;
    }
    months
}

/// Busiest month; the most recent month wins a tie
pub fn most_active_month(by_month: &BTreeMap<String, usize>) -> Option<MonthCount> {
    by_month
        .iter()
        .max_by(|(ma, ca), (mb, cb)| ca.cmp(cb).then_with(|| ma.cmp(mb)))
        .map(|(month, count)| MonthCount {
            month: month.clone(),
            count: *count,
        })
}

/// Corrections with the longest known duration; unknown durations are skipped
pub fn longest_corrections(corrections: &[Correction], n: usize) -> Vec<LongestCorrection> {
    let mut with_duration: Vec<&Correction> = corrections
        .iter()
        .filter(|c| c.correction_duration.is_some())
        .collect();
    with_duration.sort_by(|a, b| {
        b.correction_duration
            .cmp(&a.correction_duration)
            .then_with(|| a.id.cmp(&b.id))
    });
    with_duration
        .into_iter()
        .take(n)
        .map(|c| LongestCorrection {
            duration: c.correction_duration.unwrap_or_default(),
            title: c
                .title
                .as_deref()
                .map(|t| format!("Title {}", t))
                .unwrap_or_else(|| c.node_name.clone().unwrap_or_default()),
            agency: c.agency_name.clone(),
        })
        .collect()
}

/// Agency listing order, from the `sortBy` query value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgencySort {
    #[default]
    Name,
    NumCfr,
    NumChildren,
    NumSections,
    NumWords,
    NumCorrections,
}

impl AgencySort {
    /// Unknown values fall back to `Name`
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("num_cfr") => Self::NumCfr,
            Some("num_children") => Self::NumChildren,
            Some("num_sections") => Self::NumSections,
            Some("num_words") => Self::NumWords,
            Some("num_corrections") => Self::NumCorrections,
            _ => Self::Name,
        }
    }

    fn metric(self, agency: &Agency) -> i64 {
        match self {
            Self::Name => 0,
            Self::NumCfr => agency.num_cfr,
            Self::NumChildren => agency.num_children,
            Self::NumSections => agency.num_sections,
            Self::NumWords => agency.num_words,
            Self::NumCorrections => agency.num_corrections,
        }
    }

    fn compare(self, a: &Agency, b: &Agency) -> Ordering {
        let by_name = || {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        };
        match self {
            Self::Name => by_name(),
            _ => self.metric(b).cmp(&self.metric(a)).then_with(by_name),
        }
    }
}

/// Name ascending, every metric descending
pub fn sort_agencies(agencies: &mut [Agency], sort: AgencySort) {
    agencies.sort_by(|a, b| sort.compare(a, b));
}
