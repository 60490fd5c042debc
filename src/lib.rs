pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod normalizers;
pub mod routes;
pub mod services;
pub mod sources;

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::enforcement::HttpEnforcement;
use crate::services::frequency::FrequencyIndex;
use crate::services::pipeline::PipelineHandle;
use crate::services::response::ResponseController;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: config::AppConfig,
    pub frequency: Arc<FrequencyIndex>,
    pub pipeline: PipelineHandle,
    /// One controller for the process; the pipeline and the rollback route
    /// share it so per-IP ordering holds across both paths.
    pub responder: Arc<ResponseController<HttpEnforcement>>,
}
