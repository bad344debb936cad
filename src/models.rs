//! Core data models used throughout the triage pipeline.
//!
//! These types represent the feedback items, category clusters, and reports
//! that flow from ingestion through aggregation to the dashboard.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamps above this magnitude are assumed to be epoch-milliseconds.
///
/// External producers occasionally send millisecond timestamps; everything
/// persisted by this crate is epoch-seconds. [`normalize_timestamp`] applies
/// this threshold so mixed-unit input never corrupts day bucketing.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Normalize an epoch timestamp to seconds.
///
/// Values above [`MILLIS_THRESHOLD`] are treated as milliseconds and divided
/// by 1000. Never fails; plausible second values pass through unchanged.
pub fn normalize_timestamp(ts: i64) -> i64 {
    if ts > MILLIS_THRESHOLD {
        ts / 1000
    } else {
        ts
    }
}

/// Origin channel of a feedback item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Social,
    CodeForge,
    Chat,
    Forum,
    GenericForum,
}

impl Source {
    /// All source channels, used for uniform random selection in the generator.
    pub const ALL: [Source; 5] = [
        Source::Social,
        Source::CodeForge,
        Source::Chat,
        Source::Forum,
        Source::GenericForum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Social => "social",
            Source::CodeForge => "code-forge",
            Source::Chat => "chat",
            Source::Forum => "forum",
            Source::GenericForum => "generic-forum",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "social" => Ok(Source::Social),
            "code-forge" => Ok(Source::CodeForge),
            "chat" => Ok(Source::Chat),
            "forum" => Ok(Source::Forum),
            "generic-forum" => Ok(Source::GenericForum),
            other => anyhow::bail!("Unknown feedback source: '{}'", other),
        }
    }
}

/// Feedback category. One cluster exists per category per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bug,
    Feature,
    Docs,
    Performance,
    Billing,
    Outage,
    Praise,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Bug,
        Category::Feature,
        Category::Docs,
        Category::Performance,
        Category::Billing,
        Category::Outage,
        Category::Praise,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bug => "bug",
            Category::Feature => "feature",
            Category::Docs => "docs",
            Category::Performance => "performance",
            Category::Billing => "billing",
            Category::Outage => "outage",
            Category::Praise => "praise",
            Category::Other => "other",
        }
    }

    /// The deterministic cluster id for this category: `cluster-<category>`.
    pub fn cluster_id(&self) -> String {
        format!("cluster-{}", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    /// Unknown category strings map to [`Category::Other`] rather than
    /// failing; "other" is the catch-all bucket by contract.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "bug" => Category::Bug,
            "feature" => Category::Feature,
            "docs" => Category::Docs,
            "performance" => Category::Performance,
            "billing" => Category::Billing,
            "outage" => Category::Outage,
            "praise" => Category::Praise,
            _ => Category::Other,
        })
    }
}

/// A single piece of short text feedback.
///
/// Created by the generator or an external ingestion path, then classified
/// exactly once (filling `sentiment`, `urgency`, `category`, `cluster_id`)
/// before aggregation. Persisted by upsert on `id`; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: String,
    pub source: Source,
    /// Epoch seconds.
    pub created_at: i64,
    pub raw_text: String,
    /// Sentiment in [-1, 1]; `None` until classified.
    pub sentiment: Option<f64>,
    /// Urgency in [1, 5]; `None` until classified.
    pub urgency: Option<i64>,
    pub category: Option<Category>,
    /// Deterministic `cluster-<category>`; set at classification time.
    pub cluster_id: Option<String>,
}

/// Aggregate statistics for the set of feedback items sharing one category.
///
/// At most one record exists per category; the table is replaced wholesale
/// on every pipeline run, never merged incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// Deterministic `cluster-<category>`.
    pub id: String,
    /// Human-readable label: `"<category> issues (<k> reports)"`.
    pub summary: String,
    pub category: Category,
    pub avg_sentiment: f64,
    pub avg_urgency: f64,
    /// Member count of the current run.
    pub count_today: i64,
    /// Trailing 7-day count from persisted history (seeded with
    /// `count_today` by the aggregator, backfilled by the pipeline).
    pub count_7d: i64,
    /// Step-function proxy for "getting worse": 0.3 / 0.1 / -0.1.
    pub trend_score: f64,
    pub escalated: bool,
}

/// Timestamped digest of one pipeline run. Immutable, append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    /// Epoch seconds.
    pub created_at: i64,
    pub summary: String,
    pub clusters: Vec<ClusterRecord>,
    pub escalated_clusters: Vec<ClusterRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timestamp_seconds_passthrough() {
        assert_eq!(normalize_timestamp(1_756_000_000), 1_756_000_000);
        assert_eq!(normalize_timestamp(0), 0);
    }

    #[test]
    fn test_normalize_timestamp_millis() {
        assert_eq!(normalize_timestamp(1_756_000_000_000), 1_756_000_000);
    }

    #[test]
    fn test_category_roundtrip() {
        for cat in Category::ALL {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
        }
    }

    #[test]
    fn test_category_unknown_is_other() {
        assert_eq!("complaint".parse::<Category>().unwrap(), Category::Other);
        assert_eq!("".parse::<Category>().unwrap(), Category::Other);
    }

    #[test]
    fn test_source_roundtrip() {
        for src in Source::ALL {
            assert_eq!(src.as_str().parse::<Source>().unwrap(), src);
        }
        assert!("email".parse::<Source>().is_err());
    }

    #[test]
    fn test_cluster_id_shape() {
        assert_eq!(Category::Bug.cluster_id(), "cluster-bug");
        assert_eq!(Category::Outage.cluster_id(), "cluster-outage");
    }
}
