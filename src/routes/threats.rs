//! Threat routes: scored events, newest first.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::errors::{ApiResponse, AppError};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::score::ScoredEvent;
use crate::services::events::{self, ThreatFilters};
use crate::AppState;

/// GET /api/v1/threats — list scored events with filters and pagination.
pub async fn list(
    State(state): State<AppState>,
    Query(filters): Query<ThreatFilters>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<PagedResult<ScoredEvent>>>, AppError> {
    let result = events::list_scored(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}
