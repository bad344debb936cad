//! Database statistics and health overview.
//!
//! Provides a quick summary of the persisted triage state: feedback counts,
//! classification coverage, cluster and report counts, and a per-source
//! breakdown. Used by `triage stats` to give confidence that runs are
//! landing as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Per-source breakdown of feedback counts.
struct SourceStats {
    source: String,
    count: i64,
    escalated: i64,
    last_seen_ts: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_feedback: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
        .fetch_one(&pool)
        .await?;

    let classified: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM feedback WHERE category IS NOT NULL")
            .fetch_one(&pool)
            .await?;

    let total_clusters: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clusters")
        .fetch_one(&pool)
        .await?;

    let escalated_clusters: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM clusters WHERE escalated = 1")
            .fetch_one(&pool)
            .await?;

    let total_reports: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports")
        .fetch_one(&pool)
        .await?;

    let last_report_ts: Option<i64> =
        sqlx::query_scalar("SELECT MAX(created_at) FROM reports")
            .fetch_one(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Feedback Triage — Database Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  Feedback:    {} ({} classified, {}%)",
        total_feedback,
        classified,
        if total_feedback > 0 {
            (classified * 100) / total_feedback
        } else {
            0
        }
    );
    println!(
        "  Clusters:    {} ({} escalated)",
        total_clusters, escalated_clusters
    );
    println!("  Reports:     {}", total_reports);
    println!(
        "  Last run:    {}",
        match last_report_ts {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );

    // Per-source breakdown
    let source_rows = sqlx::query(
        r#"
        SELECT
            source,
            COUNT(*) AS count,
            SUM(CASE WHEN urgency >= 4 OR category = 'outage' THEN 1 ELSE 0 END) AS escalated,
            MAX(created_at) AS last_seen
        FROM feedback
        GROUP BY source
        ORDER BY count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let source_stats: Vec<SourceStats> = source_rows
        .iter()
        .map(|row| SourceStats {
            source: row.get("source"),
            count: row.get("count"),
            escalated: row.get("escalated"),
            last_seen_ts: row.get("last_seen"),
        })
        .collect();

    if !source_stats.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<16} {:>6} {:>10}   {}",
            "SOURCE", "COUNT", "ESCALATED", "LAST SEEN"
        );
        println!("  {}", "-".repeat(52));

        for s in &source_stats {
            let seen_display = match s.last_seen_ts {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<16} {:>6} {:>10}   {}",
                s.source, s.count, s.escalated, seen_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
