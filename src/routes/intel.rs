//! Threat intelligence routes: feed refresh and lookup of known indicators.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiResponse, AppError};
use crate::models::reputation::{ReputationEntry, ReputationRecord};
use crate::services::reputation;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct FeedResult {
    pub upserted: usize,
}

#[derive(Debug, Deserialize)]
pub struct IntelParams {
    pub limit: Option<i64>,
}

/// PUT /api/v1/intel — refresh the reputation store from a feed batch.
pub async fn refresh(
    State(state): State<AppState>,
    Json(entries): Json<Vec<ReputationEntry>>,
) -> Result<Json<ApiResponse<FeedResult>>, AppError> {
    let upserted = reputation::upsert_feed(&state.db, &entries).await?;
    tracing::info!(upserted, "reputation feed refreshed");
    Ok(ApiResponse::success(FeedResult { upserted }))
}

/// GET /api/v1/intel — list known indicators, most recently seen first.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<IntelParams>,
) -> Result<Json<ApiResponse<Vec<ReputationRecord>>>, AppError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let records = reputation::list(&state.db, limit).await?;
    Ok(ApiResponse::success(records))
}
