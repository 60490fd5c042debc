//! Performance aggregator: daily KPI recomputation.
//!
//! Snapshots the closed day's counts in one pass, derives the five KPIs with
//! a pure function, and upserts one row per (metric_name, date). Rerunning
//! for the same closed day produces identical rows.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use sqlx::PgPool;
use tokio::sync::watch;

use crate::errors::AppError;
use crate::models::metrics::{
    PerformanceMetric, DETECTION_RATE, FALSE_POSITIVE_RATE, MTTD_SECONDS, MTTR_SECONDS,
    PREVENTION_RATE,
};

/// Counts and latencies snapshotted from one day's records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayCounts {
    /// Normalized events plus quarantined records: total ingress attempts.
    pub ingress: i64,
    pub scored: i64,
    pub blocked: i64,
    /// Actions the operator marked benign after an auto-block.
    pub benign_after_block: i64,
    /// High-tier classifications: all positive classifications.
    pub high_classifications: i64,
    /// Mean seconds from event occurrence to score creation.
    pub mean_detect_secs: Option<f64>,
    /// Mean seconds from score creation to the action's terminal state.
    pub mean_respond_secs: Option<f64>,
}

/// Derive the KPI values from a day snapshot. Pure; a ratio with a zero
/// denominator yields 0 rather than an error.
pub fn compute_metrics(counts: &DayCounts) -> Vec<(&'static str, f64)> {
    vec![
        (DETECTION_RATE, rate(counts.scored, counts.ingress)),
        (PREVENTION_RATE, rate(counts.blocked, counts.scored)),
        (
            FALSE_POSITIVE_RATE,
            rate(counts.benign_after_block, counts.high_classifications),
        ),
        (MTTD_SECONDS, counts.mean_detect_secs.unwrap_or(0.0)),
        (MTTR_SECONDS, counts.mean_respond_secs.unwrap_or(0.0)),
    ]
}

fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

/// Snapshot one day's counts from the store.
///
/// The window is the closed interval [date 00:00, date+1 00:00); concurrent
/// inserts for later instants never shift these sums.
pub async fn snapshot_day(pool: &PgPool, date: NaiveDate) -> Result<DayCounts, AppError> {
    let start: DateTime<Utc> = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::Internal(format!("invalid date {date}")))?;
    let end = start + ChronoDuration::days(1);

    let (events, quarantined, scored, high, blocked, benign, mean_detect, mean_respond) = tokio::try_join!(
        count(
            pool,
            "SELECT COUNT(*) FROM security_events WHERE created_at >= $1 AND created_at < $2",
            start,
            end
        ),
        count(
            pool,
            "SELECT COUNT(*) FROM quarantined_records WHERE created_at >= $1 AND created_at < $2",
            start,
            end
        ),
        count(
            pool,
            "SELECT COUNT(*) FROM threat_scores WHERE created_at >= $1 AND created_at < $2",
            start,
            end
        ),
        count(
            pool,
            "SELECT COUNT(*) FROM threat_scores WHERE severity = 'High' AND created_at >= $1 AND created_at < $2",
            start,
            end
        ),
        // Anything past Pending reached the enforcement point, even if the
        // block was later rolled back.
        count(
            pool,
            "SELECT COUNT(*) FROM response_actions WHERE state IN ('Blocked', 'Rollback_Requested', 'Rolled_Back') AND created_at >= $1 AND created_at < $2",
            start,
            end
        ),
        count(
            pool,
            "SELECT COUNT(*) FROM response_actions WHERE marked_benign AND created_at >= $1 AND created_at < $2",
            start,
            end
        ),
        mean(
            pool,
            r#"
            SELECT AVG(EXTRACT(EPOCH FROM (ts.created_at - e.occurred_at)))::double precision
            FROM threat_scores ts
            JOIN security_events e ON e.id = ts.event_id
            WHERE ts.created_at >= $1 AND ts.created_at < $2
            "#,
            start,
            end
        ),
        mean(
            pool,
            r#"
            SELECT AVG(EXTRACT(EPOCH FROM (ra.resolved_at - ts.created_at)))::double precision
            FROM response_actions ra
            JOIN threat_scores ts ON ts.event_id = ra.event_id
            WHERE ra.resolved_at IS NOT NULL
              AND ra.created_at >= $1 AND ra.created_at < $2
            "#,
            start,
            end
        ),
    )?;

    Ok(DayCounts {
        ingress: events + quarantined,
        scored,
        blocked,
        benign_after_block: benign,
        high_classifications: high,
        mean_detect_secs: mean_detect,
        mean_respond_secs: mean_respond,
    })
}

/// Recompute and upsert all KPIs for one day.
pub async fn recompute_day(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<Vec<PerformanceMetric>, AppError> {
    let counts = snapshot_day(pool, date).await?;
    let metrics = compute_metrics(&counts);

    let mut tx = pool.begin().await?;
    for (name, value) in &metrics {
        sqlx::query(
            r#"
            INSERT INTO performance_metrics (metric_name, value, date)
            VALUES ($1, $2, $3)
            ON CONFLICT (metric_name, date) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(date)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(%date, "recomputed performance metrics");

    Ok(metrics
        .into_iter()
        .map(|(name, value)| PerformanceMetric {
            metric_name: name.to_string(),
            value,
            date,
        })
        .collect())
}

/// Latest value per metric.
pub async fn latest(pool: &PgPool) -> Result<Vec<PerformanceMetric>, AppError> {
    let metrics = sqlx::query_as::<_, PerformanceMetric>(
        r#"
        SELECT DISTINCT ON (metric_name) metric_name, value, date
        FROM performance_metrics
        ORDER BY metric_name, date DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(metrics)
}

/// Periodic batch pass recomputing today's KPIs until shutdown.
pub fn spawn_periodic(
    pool: PgPool,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(interval) => {
                    let today = Utc::now().date_naive();
                    if let Err(e) = recompute_day(&pool, today).await {
                        tracing::error!(error = %e, "periodic metric recomputation failed");
                    }
                }
            }
        }
    })
}

async fn count(
    pool: &PgPool,
    sql: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<i64, AppError> {
    let n = sqlx::query_scalar::<_, i64>(sql)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;
    Ok(n)
}

async fn mean(
    pool: &PgPool,
    sql: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Option<f64>, AppError> {
    let v = sqlx::query_scalar::<_, Option<f64>>(sql)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_day() -> DayCounts {
        DayCounts {
            ingress: 200,
            scored: 180,
            blocked: 12,
            benign_after_block: 3,
            high_classifications: 15,
            mean_detect_secs: Some(4.5),
            mean_respond_secs: Some(30.0),
        }
    }

    #[test]
    fn worked_example() {
        let metrics = compute_metrics(&busy_day());
        let get = |name: &str| {
            metrics
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .unwrap()
        };
        assert_eq!(get(DETECTION_RATE), 90.0); // 180/200
        assert!((get(PREVENTION_RATE) - 12.0 / 180.0 * 100.0).abs() < 1e-9);
        assert_eq!(get(FALSE_POSITIVE_RATE), 20.0); // 3/15
        assert_eq!(get(MTTD_SECONDS), 4.5);
        assert_eq!(get(MTTR_SECONDS), 30.0);
    }

    #[test]
    fn zero_denominators_yield_zero() {
        let metrics = compute_metrics(&DayCounts::default());
        for (name, value) in metrics {
            assert_eq!(value, 0.0, "{name} on an empty day");
        }
    }

    #[test]
    fn recomputation_is_deterministic() {
        let counts = busy_day();
        assert_eq!(compute_metrics(&counts), compute_metrics(&counts));
    }

    #[test]
    fn all_five_metrics_present_once() {
        let metrics = compute_metrics(&busy_day());
        assert_eq!(metrics.len(), 5);
        let mut names: Vec<_> = metrics.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }
}
