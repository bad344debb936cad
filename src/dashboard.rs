//! Dashboard read-model projection.
//!
//! Derives presentation aggregates (stats, trend series, source breakdown,
//! activity feed) from the persisted feedback/cluster tables. Pure read-side
//! transform: no writes, no hidden state, re-derivable at any time.
//!
//! # Synthetic trend filler
//!
//! The 7-day trend series fills empty day buckets with random values
//! (sentiment in [-0.3, 0.1], volume in [5, 15)) so sparse databases still
//! render a continuous line. This is presentation filler, not a statistic;
//! filled entries carry `synthetic: true` so consumers can tell them apart.
//! Everything else in the projection is deterministic for unchanged input.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use rand::Rng;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::config::Config;
use crate::db;
use crate::models::{normalize_timestamp, Category, ClusterRecord, FeedbackItem, Source};

/// Number of day buckets in the trend series.
const TREND_DAYS: i64 = 7;
/// Maximum escalated items surfaced on the dashboard.
const ESCALATED_ITEM_CAP: i64 = 10;
/// Length of the recent-activity feed.
const ACTIVITY_FEED_LEN: usize = 15;

/// The full projected view model consumed by the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub stats: DashboardStats,
    pub source_breakdown: Vec<SourceCount>,
    /// Oldest-to-newest, one entry per trailing day.
    pub sentiment_trend: Vec<TrendPoint>,
    pub volume_trend: Vec<TrendPoint>,
    /// Clusters with `avg_urgency >= 3`.
    pub urgent_issues: Vec<ClusterRecord>,
    /// Items with urgency >= 4 or category == outage; most-recent first.
    pub escalated_items: Vec<FeedbackItem>,
    pub recent_activity: Vec<ActivityEntry>,
    /// Member-item counts grouped by `(cluster_id, source)`.
    pub cluster_sources: Vec<ClusterSourceCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Global count, not limited to the activity window.
    pub total_feedback: i64,
    pub escalated_clusters: i64,
    /// Mean sentiment over the windowed feedback set.
    pub avg_sentiment: f64,
    pub cluster_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceCount {
    pub source: Source,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    /// Day label, `YYYY-MM-DD` (UTC).
    pub day: String,
    pub value: f64,
    /// True when the bucket was empty and the value is presentation filler.
    pub synthetic: bool,
}

/// Derived activity tag, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Escalated,
    Alert,
    Positive,
    Processed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: String,
    pub source: Source,
    pub created_at: i64,
    pub raw_text: String,
    pub action: ActivityAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSourceCount {
    pub cluster_id: String,
    pub source: Source,
    pub count: i64,
}

/// Tag an item for the activity feed. Priority: urgency >= 4 → escalated,
/// outage → alert, positive sentiment → positive, else processed.
pub fn action_for(item: &FeedbackItem) -> ActivityAction {
    if item.urgency.unwrap_or(0) >= 4 {
        ActivityAction::Escalated
    } else if item.category == Some(Category::Outage) {
        ActivityAction::Alert
    } else if item.sentiment.unwrap_or(0.0) > 0.0 {
        ActivityAction::Positive
    } else {
        ActivityAction::Processed
    }
}

/// Project the dashboard view model from persisted state.
pub async fn project_dashboard(pool: &SqlitePool, window: i64) -> Result<DashboardView> {
    let total_feedback: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
        .fetch_one(pool)
        .await?;

    let windowed = fetch_feedback(
        pool,
        "SELECT id, source, created_at, raw_text, sentiment, urgency, category, cluster_id
         FROM feedback ORDER BY created_at DESC LIMIT ?",
        window,
    )
    .await?;

    let clusters = fetch_clusters(pool).await?;

    let sentiments: Vec<f64> = windowed.iter().filter_map(|i| i.sentiment).collect();
    let avg_sentiment = if sentiments.is_empty() {
        0.0
    } else {
        sentiments.iter().sum::<f64>() / sentiments.len() as f64
    };

    let stats = DashboardStats {
        total_feedback,
        escalated_clusters: clusters.iter().filter(|c| c.escalated).count() as i64,
        avg_sentiment,
        cluster_count: clusters.len() as i64,
    };

    let mut source_counts: BTreeMap<&'static str, (Source, i64)> = BTreeMap::new();
    for item in &windowed {
        source_counts
            .entry(item.source.as_str())
            .or_insert((item.source, 0))
            .1 += 1;
    }
    let source_breakdown = source_counts
        .into_values()
        .map(|(source, count)| SourceCount { source, count })
        .collect();

    let (sentiment_trend, volume_trend) = trend_series(&windowed, Utc::now().timestamp());

    let urgent_issues = clusters
        .iter()
        .filter(|c| c.avg_urgency >= 3.0)
        .cloned()
        .collect();

    let escalated_items = fetch_feedback(
        pool,
        "SELECT id, source, created_at, raw_text, sentiment, urgency, category, cluster_id
         FROM feedback WHERE urgency >= 4 OR category = 'outage'
         ORDER BY created_at DESC LIMIT ?",
        ESCALATED_ITEM_CAP,
    )
    .await?;

    let recent_activity = windowed
        .iter()
        .take(ACTIVITY_FEED_LEN)
        .map(|item| ActivityEntry {
            id: item.id.clone(),
            source: item.source,
            created_at: item.created_at,
            raw_text: item.raw_text.clone(),
            action: action_for(item),
        })
        .collect();

    let cluster_sources = fetch_cluster_sources(pool).await?;

    Ok(DashboardView {
        stats,
        source_breakdown,
        sentiment_trend,
        volume_trend,
        urgent_issues,
        escalated_items,
        recent_activity,
        cluster_sources,
    })
}

/// Build the 7-entry sentiment and volume series, oldest first.
///
/// Buckets are UTC calendar days. Empty buckets get the documented random
/// filler and are flagged synthetic.
fn trend_series(items: &[FeedbackItem], now: i64) -> (Vec<TrendPoint>, Vec<TrendPoint>) {
    let mut rng = rand::thread_rng();
    let today = Utc
        .timestamp_opt(now, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .date_naive();

    let mut sentiment_trend = Vec::with_capacity(TREND_DAYS as usize);
    let mut volume_trend = Vec::with_capacity(TREND_DAYS as usize);

    for offset in (0..TREND_DAYS).rev() {
        let day = today - chrono::Duration::days(offset);
        let label = day.format("%Y-%m-%d").to_string();

        let bucket: Vec<&FeedbackItem> = items
            .iter()
            .filter(|i| {
                Utc.timestamp_opt(i.created_at, 0)
                    .single()
                    .map(|dt| dt.date_naive() == day)
                    .unwrap_or(false)
            })
            .collect();

        if bucket.is_empty() {
            sentiment_trend.push(TrendPoint {
                day: label.clone(),
                value: rng.gen_range(-0.3..0.1),
                synthetic: true,
            });
            volume_trend.push(TrendPoint {
                day: label,
                value: rng.gen_range(5..15) as f64,
                synthetic: true,
            });
        } else {
            let mean = bucket
                .iter()
                .map(|i| i.sentiment.unwrap_or(0.0))
                .sum::<f64>()
                / bucket.len() as f64;
            sentiment_trend.push(TrendPoint {
                day: label.clone(),
                value: mean,
                synthetic: false,
            });
            volume_trend.push(TrendPoint {
                day: label,
                value: bucket.len() as f64,
                synthetic: false,
            });
        }
    }

    (sentiment_trend, volume_trend)
}

async fn fetch_feedback(pool: &SqlitePool, query: &str, limit: i64) -> Result<Vec<FeedbackItem>> {
    let rows = sqlx::query(query).bind(limit).fetch_all(pool).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let source_str: String = row.get("source");
        let category: Option<String> = row.get("category");

        items.push(FeedbackItem {
            id: row.get("id"),
            source: Source::from_str(&source_str)?,
            // Defensive: older producers may have written milliseconds.
            created_at: normalize_timestamp(row.get("created_at")),
            raw_text: row.get("raw_text"),
            sentiment: row.get("sentiment"),
            urgency: row.get("urgency"),
            category: category.map(|c| c.parse().unwrap_or(Category::Other)),
            cluster_id: row.get("cluster_id"),
        });
    }

    Ok(items)
}

async fn fetch_clusters(pool: &SqlitePool) -> Result<Vec<ClusterRecord>> {
    let rows = sqlx::query(
        "SELECT id, summary, category, avg_sentiment, avg_urgency, count_today, count_7d, trend_score, escalated
         FROM clusters ORDER BY category",
    )
    .fetch_all(pool)
    .await?;

    let mut clusters = Vec::with_capacity(rows.len());
    for row in rows {
        let category: String = row.get("category");
        clusters.push(ClusterRecord {
            id: row.get("id"),
            summary: row.get("summary"),
            category: category.parse().unwrap_or(Category::Other),
            avg_sentiment: row.get("avg_sentiment"),
            avg_urgency: row.get("avg_urgency"),
            count_today: row.get("count_today"),
            count_7d: row.get("count_7d"),
            trend_score: row.get("trend_score"),
            escalated: row.get("escalated"),
        });
    }

    Ok(clusters)
}

async fn fetch_cluster_sources(pool: &SqlitePool) -> Result<Vec<ClusterSourceCount>> {
    let rows = sqlx::query(
        "SELECT cluster_id, source, COUNT(*) AS count FROM feedback
         WHERE cluster_id IS NOT NULL
         GROUP BY cluster_id, source
         ORDER BY cluster_id, source",
    )
    .fetch_all(pool)
    .await?;

    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let source_str: String = row.get("source");
        result.push(ClusterSourceCount {
            cluster_id: row.get("cluster_id"),
            source: Source::from_str(&source_str)?,
            count: row.get("count"),
        });
    }

    Ok(result)
}

/// Run the dashboard command: project the view and print it.
pub async fn run_dashboard(config: &Config, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let view = project_dashboard(&pool, config.triage.activity_window).await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Feedback Triage — Dashboard");
    println!("===========================");
    println!();
    println!("  Feedback:   {} total", view.stats.total_feedback);
    println!(
        "  Clusters:   {} ({} escalated)",
        view.stats.cluster_count, view.stats.escalated_clusters
    );
    println!("  Sentiment:  {:+.2} (recent window)", view.stats.avg_sentiment);

    if !view.source_breakdown.is_empty() {
        println!();
        println!("  By source:");
        for s in &view.source_breakdown {
            println!("    {:<16} {}", s.source, s.count);
        }
    }

    println!();
    println!("  Trends (7 days, oldest first; ~ marks synthetic filler):");
    println!("    {:<12} {:>10} {:>8}", "DAY", "SENTIMENT", "VOLUME");
    for (s, v) in view.sentiment_trend.iter().zip(&view.volume_trend) {
        let marker = if s.synthetic { "~" } else { " " };
        println!(
            "    {:<12} {:>9.2}{} {:>7.0}{}",
            s.day, s.value, marker, v.value, marker
        );
    }

    if !view.urgent_issues.is_empty() {
        println!();
        println!("  Urgent clusters:");
        for c in &view.urgent_issues {
            println!(
                "    {:<24} urgency {:.2}{}",
                c.id,
                c.avg_urgency,
                if c.escalated { "  [ESCALATED]" } else { "" }
            );
        }
    }

    if !view.recent_activity.is_empty() {
        println!();
        println!("  Recent activity:");
        for entry in &view.recent_activity {
            println!(
                "    [{:<9}] {:<13} {}",
                format!("{:?}", entry.action).to_lowercase(),
                entry.source,
                truncate(&entry.raw_text, 60)
            );
        }
    }

    println!();
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(
        category: Option<Category>,
        sentiment: Option<f64>,
        urgency: Option<i64>,
        created_at: i64,
    ) -> FeedbackItem {
        FeedbackItem {
            id: uuid::Uuid::new_v4().to_string(),
            source: Source::Chat,
            created_at,
            raw_text: "text".to_string(),
            sentiment,
            urgency,
            category,
            cluster_id: category.map(|c| c.cluster_id()),
        }
    }

    #[test]
    fn test_action_priority_order() {
        let now = 1_756_000_000;

        // urgency >= 4 wins even for outage/positive items
        let a = item(Some(Category::Outage), Some(0.5), Some(4), now);
        assert_eq!(action_for(&a), ActivityAction::Escalated);

        // outage beats positive sentiment
        let b = item(Some(Category::Outage), Some(0.5), Some(2), now);
        assert_eq!(action_for(&b), ActivityAction::Alert);

        let c = item(Some(Category::Praise), Some(0.7), Some(3), now);
        assert_eq!(action_for(&c), ActivityAction::Positive);

        let d = item(Some(Category::Docs), Some(0.0), Some(3), now);
        assert_eq!(action_for(&d), ActivityAction::Processed);

        // Unclassified items default to processed
        let e = item(None, None, None, now);
        assert_eq!(action_for(&e), ActivityAction::Processed);
    }

    #[test]
    fn test_trend_series_shape() {
        let now = 1_756_400_000; // fixed instant for reproducible buckets
        let (sentiment, volume) = trend_series(&[], now);

        assert_eq!(sentiment.len(), 7);
        assert_eq!(volume.len(), 7);
        // Oldest to newest
        assert!(sentiment.first().unwrap().day < sentiment.last().unwrap().day);

        // Empty buckets are synthetic and within the documented ranges
        for p in &sentiment {
            assert!(p.synthetic);
            assert!(p.value >= -0.3 && p.value < 0.1);
        }
        for p in &volume {
            assert!(p.synthetic);
            assert!(p.value >= 5.0 && p.value < 15.0);
        }
    }

    #[test]
    fn test_trend_series_real_buckets_are_deterministic() {
        let now = 1_756_400_000;
        let items = vec![
            item(Some(Category::Bug), Some(-0.6), Some(4), now - 100),
            item(Some(Category::Bug), Some(-0.2), Some(4), now - 200),
            item(Some(Category::Praise), Some(0.7), Some(3), now - 86_400),
        ];

        let (s1, v1) = trend_series(&items, now);
        let (s2, v2) = trend_series(&items, now);

        // Today's bucket: two items, mean -0.4
        let today_s = s1.last().unwrap();
        assert!(!today_s.synthetic);
        assert!((today_s.value + 0.4).abs() < 1e-9);
        let today_v = v1.last().unwrap();
        assert_eq!(today_v.value, 2.0);

        // Yesterday's bucket: one item
        let yesterday = &v1[5];
        assert!(!yesterday.synthetic);
        assert_eq!(yesterday.value, 1.0);

        // Idempotent except for synthetic filler
        for (a, b) in s1.iter().zip(&s2).chain(v1.iter().zip(&v2)) {
            assert_eq!(a.synthetic, b.synthetic);
            if !a.synthetic {
                assert_eq!(a.value, b.value);
            }
        }
    }
}
