//! Response action routes: listing, operator rollback, and benign review.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::response::ResponseAction;
use crate::services::response;
use crate::AppState;

/// GET /api/v1/responses — list response actions, newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<PagedResult<ResponseAction>>>, AppError> {
    let result = response::list(&state.db, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/responses/:id — get a response action by ID.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ResponseAction>>, AppError> {
    let action = response::get(&state.db, id).await?;
    Ok(ApiResponse::success(action))
}

/// POST /api/v1/responses/:id/rollback — unblock the IP behind an action.
///
/// Only valid for actions currently in `Blocked`. Goes through the shared
/// controller, so a rollback never interleaves with an in-flight block of
/// the same address.
pub async fn rollback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ResponseAction>>, AppError> {
    let action = state.responder.request_rollback(id).await?;
    Ok(ApiResponse::success(action))
}

/// PATCH /api/v1/responses/:id/benign — flag a block as a false positive.
pub async fn mark_benign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ResponseAction>>, AppError> {
    let action = response::mark_benign(&state.db, id).await?;
    Ok(ApiResponse::success(action))
}
