//! PostgreSQL connection pool for the event store.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create the connection pool shared by the pipeline and the HTTP surface.
///
/// A bounded acquire timeout keeps a saturated store from stalling the
/// intake loop indefinitely; the pipeline treats the resulting error as
/// fatal for the pass and redelivers the record.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}
