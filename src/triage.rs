//! Cluster aggregation and escalation scoring.
//!
//! The heart of the triage pipeline: partitions classified feedback by
//! category, computes per-cluster averages, a coarse trend score, and the
//! escalation decision.
//!
//! # Escalation rule
//!
//! ```text
//! escalation_score = 0.5·avg_urgency + 0.3·volume_spike + 0.2·sentiment_drop
//! escalated        = escalation_score > 3.5   (strict)
//! ```
//!
//! `volume_spike` and `sentiment_drop` are step functions of member count
//! and average sentiment; `trend_score` is a step function of average
//! urgency standing in for a historical delta.

use std::collections::BTreeMap;

use crate::models::{Category, ClusterRecord, FeedbackItem};

/// Escalation threshold; scores strictly above this escalate.
pub const ESCALATION_THRESHOLD: f64 = 3.5;

/// Step-function trend proxy derived from average urgency.
pub fn trend_score(avg_urgency: f64) -> f64 {
    if avg_urgency > 3.5 {
        0.3
    } else if avg_urgency > 2.5 {
        0.1
    } else {
        -0.1
    }
}

/// Volume component of the escalation score.
pub fn volume_spike(count: usize) -> f64 {
    if count > 5 {
        4.0
    } else if count > 2 {
        2.0
    } else {
        1.0
    }
}

/// Sentiment component of the escalation score.
pub fn sentiment_drop(avg_sentiment: f64) -> f64 {
    if avg_sentiment < -0.5 {
        4.0
    } else if avg_sentiment < 0.0 {
        2.0
    } else {
        0.0
    }
}

/// Weighted escalation score. Monotonically non-decreasing in each input.
pub fn escalation_score(avg_urgency: f64, volume_spike: f64, sentiment_drop: f64) -> f64 {
    0.5 * avg_urgency + 0.3 * volume_spike + 0.2 * sentiment_drop
}

/// Group classified feedback into one cluster per distinct category.
///
/// Items without a category are skipped; categories absent from the input
/// produce no cluster. An empty input yields an empty cluster list.
/// `count_7d` is seeded with the current-run count; the pipeline backfills
/// it from persisted history.
pub fn aggregate(items: &[FeedbackItem]) -> Vec<ClusterRecord> {
    let mut partitions: BTreeMap<Category, Vec<&FeedbackItem>> = BTreeMap::new();
    for item in items {
        if let Some(category) = item.category {
            partitions.entry(category).or_default().push(item);
        }
    }

    partitions
        .into_iter()
        .map(|(category, members)| {
            let k = members.len();
            // Unclassified fields count as 0 toward the mean.
            let avg_sentiment =
                members.iter().map(|m| m.sentiment.unwrap_or(0.0)).sum::<f64>() / k as f64;
            let avg_urgency =
                members.iter().map(|m| m.urgency.unwrap_or(0) as f64).sum::<f64>() / k as f64;

            let score = escalation_score(avg_urgency, volume_spike(k), sentiment_drop(avg_sentiment));

            ClusterRecord {
                id: category.cluster_id(),
                summary: format!("{} issues ({} reports)", category, k),
                category,
                avg_sentiment,
                avg_urgency,
                count_today: k as i64,
                count_7d: k as i64,
                trend_score: trend_score(avg_urgency),
                escalated: score > ESCALATION_THRESHOLD,
            }
        })
        .collect()
}
