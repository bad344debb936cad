//! Report construction and retrieval.

use anyhow::Result;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::{ClusterRecord, ReportRecord};

/// Package cluster aggregates and the escalated subset into a report.
///
/// Pure apart from id and timestamp assignment; persistence is the
/// pipeline's concern.
pub fn build_report(clusters: &[ClusterRecord], item_count: usize) -> ReportRecord {
    let escalated_clusters: Vec<ClusterRecord> =
        clusters.iter().filter(|c| c.escalated).cloned().collect();

    let summary = format!(
        "Daily Triage Report: {} feedback items processed, {} clusters identified, {} escalated.",
        item_count,
        clusters.len(),
        escalated_clusters.len()
    );

    ReportRecord {
        id: Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now().timestamp(),
        summary,
        clusters: clusters.to_vec(),
        escalated_clusters,
    }
}

/// Fetch the most recent persisted report, if any.
pub async fn latest_report(pool: &sqlx::SqlitePool) -> Result<Option<ReportRecord>> {
    let row: Option<String> =
        sqlx::query_scalar("SELECT json FROM reports ORDER BY created_at DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    match row {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Run the report command: print the latest report.
pub async fn run_report(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let report = latest_report(&pool).await?;
    pool.close().await;

    let Some(report) = report else {
        println!("No reports yet. Run `triage run` first.");
        return Ok(());
    };

    println!("Report {}", report.id);
    println!("  created: {}", format_ts(report.created_at));
    println!("  {}", report.summary);

    if !report.clusters.is_empty() {
        println!();
        println!(
            "  {:<24} {:>6} {:>6} {:>10} {:>9} {:>7}   ESCALATED",
            "CLUSTER", "TODAY", "7D", "SENTIMENT", "URGENCY", "TREND"
        );
        for c in &report.clusters {
            println!(
                "  {:<24} {:>6} {:>6} {:>10.2} {:>9.2} {:>7.1}   {}",
                c.id,
                c.count_today,
                c.count_7d,
                c.avg_sentiment,
                c.avg_urgency,
                c.trend_score,
                if c.escalated { "yes" } else { "no" }
            );
        }
    }

    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
