//! Event persistence: canonical events, quarantine, and the scored-event
//! read surface.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::event::{EventSource, NewSecurityEvent, RawRecord, SecurityEvent};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::score::{ScoredEvent, SeverityTier};

/// Optional query-string filters for the scored-event list.
#[derive(Debug, Default, Deserialize)]
pub struct ThreatFilters {
    pub source: Option<EventSource>,
    pub severity: Option<SeverityTier>,
    pub event_type: Option<String>,
}

/// Insert a normalized event. Append-only; the row is never updated.
pub async fn insert(pool: &PgPool, event: &NewSecurityEvent) -> Result<SecurityEvent, AppError> {
    let stored = sqlx::query_as::<_, SecurityEvent>(
        r#"
        INSERT INTO security_events (
            source, src_ip, dest_ip, event_type, raw_severity,
            protocol, rule_id, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(event.source)
    .bind(event.src_ip.to_string())
    .bind(event.dest_ip.to_string())
    .bind(&event.event_type)
    .bind(event.raw_severity)
    .bind(&event.protocol)
    .bind(&event.rule_id)
    .bind(event.occurred_at)
    .fetch_one(pool)
    .await?;
    Ok(stored)
}

/// Preserve a malformed record for forensic review.
pub async fn quarantine(pool: &PgPool, record: &RawRecord, reason: &str) -> Result<Uuid, AppError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO quarantined_records (source, payload, reason)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(record.source)
    .bind(&record.payload)
    .bind(reason)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// List scored events with filters, most recently scored first.
pub async fn list_scored(
    pool: &PgPool,
    filters: &ThreatFilters,
    pagination: &Pagination,
) -> Result<PagedResult<ScoredEvent>, AppError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_index = 0u32;

    if filters.source.is_some() {
        param_index += 1;
        conditions.push(format!("e.source = ${param_index}"));
    }
    if filters.severity.is_some() {
        param_index += 1;
        conditions.push(format!("ts.severity = ${param_index}"));
    }
    if filters.event_type.is_some() {
        param_index += 1;
        // Normalizers store event types lowercased.
        conditions.push(format!("e.event_type = LOWER(${param_index})"));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!(
        "SELECT COUNT(*) FROM threat_scores ts \
         JOIN security_events e ON e.id = ts.event_id {where_clause}"
    );
    let data_sql = format!(
        "SELECT ts.id, ts.event_id, e.source, e.src_ip, e.dest_ip, e.event_type, \
         ts.score, ts.severity, ts.ai_context, e.occurred_at, ts.created_at \
         FROM threat_scores ts \
         JOIN security_events e ON e.id = ts.event_id {where_clause} \
         ORDER BY ts.created_at DESC \
         LIMIT {} OFFSET {}",
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, ScoredEvent>(&data_sql);

    macro_rules! bind_both {
        ($val:expr) => {
            count_query = count_query.bind($val);
            data_query = data_query.bind($val);
        };
    }

    if let Some(source) = filters.source {
        bind_both!(source);
    }
    if let Some(severity) = filters.severity {
        bind_both!(severity);
    }
    if let Some(ref event_type) = filters.event_type {
        bind_both!(event_type);
    }

    let total = count_query.fetch_one(pool).await?;
    let items = data_query.fetch_all(pool).await?;

    Ok(PagedResult::new(items, total, pagination))
}
