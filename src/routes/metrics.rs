//! KPI routes: latest snapshot per metric and on-demand recomputation.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::models::metrics::PerformanceMetric;
use crate::services::aggregator;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecomputeParams {
    /// Day to recompute (YYYY-MM-DD). Defaults to today (UTC).
    pub date: Option<NaiveDate>,
}

/// GET /api/v1/metrics/latest — most recent value of each KPI.
pub async fn latest(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PerformanceMetric>>>, AppError> {
    let metrics = aggregator::latest(&state.db).await?;
    Ok(ApiResponse::success(metrics))
}

/// POST /api/v1/metrics/recompute — recompute and store one day's KPIs.
pub async fn recompute(
    State(state): State<AppState>,
    Query(params): Query<RecomputeParams>,
) -> Result<Json<ApiResponse<Vec<PerformanceMetric>>>, AppError> {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let metrics = aggregator::recompute_day(&state.db, date).await?;
    Ok(ApiResponse::success(metrics))
}
