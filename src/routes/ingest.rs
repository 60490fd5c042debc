//! Push ingestion: accept raw telemetry batches over HTTP.
//!
//! Records are queued for the pipeline as-is; normalization (and therefore
//! rejection into quarantine) happens asynchronously, so this route only
//! validates the source name and counts what it accepted.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiResponse, AppError};
use crate::models::event::{EventSource, RawRecord};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    /// Raw records: JSON strings (e.g. CSV lines) or objects, passed to the
    /// source's normalizer verbatim.
    pub records: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct IngestResult {
    pub accepted: usize,
}

/// POST /api/v1/ingest/:source — queue a batch of raw records.
pub async fn push(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(body): Json<IngestBody>,
) -> Result<Json<ApiResponse<IngestResult>>, AppError> {
    let source: EventSource = source.parse().map_err(AppError::Validation)?;

    let mut accepted = 0;
    for record in body.records {
        let payload = match record {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        state
            .pipeline
            .submit(RawRecord { source, payload })
            .await?;
        accepted += 1;
    }

    tracing::info!(source = %source, accepted, "queued ingestion batch");
    Ok(ApiResponse::success(IngestResult { accepted }))
}
