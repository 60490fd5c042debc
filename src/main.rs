use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rampart::config::AppConfig;
use rampart::models::event::EventSource;
use rampart::routes;
use rampart::services::ai::HttpAiAssessor;
use rampart::services::enforcement::{HttpEnforcement, RetryPolicy};
use rampart::services::frequency::FrequencyIndex;
use rampart::services::pipeline::{self, Pipeline};
use rampart::services::response::{IpLocks, ResponseController};
use rampart::services::aggregator;
use rampart::sources::{self, HttpSource};
use rampart::AppState;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rampart=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env()?;

    let pool = rampart::db::create_pool(&config.database_url, config.database_max_connections)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let frequency = Arc::new(FrequencyIndex::new(config.frequency_window_secs));
    let locks = IpLocks::new();
    let (pipeline_handle, intake_rx) = pipeline::channel(config.pipeline_buffer);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let responder = Arc::new(ResponseController::new(
        pool.clone(),
        HttpEnforcement::from_config(&config),
        locks,
        RetryPolicy::from_config(&config),
    ));
    let pipeline_task = tokio::spawn(
        Pipeline::new(
            pool.clone(),
            frequency.clone(),
            HttpAiAssessor::from_config(&config),
            Duration::from_secs(config.ai_timeout_secs),
            responder.clone(),
            pipeline_handle.clone(),
            Duration::from_millis(config.redelivery_delay_ms),
        )
        .run(intake_rx, shutdown_rx.clone()),
    );

    let aggregator_task = aggregator::spawn_periodic(
        pool.clone(),
        Duration::from_secs(config.metrics_interval_secs),
        shutdown_rx.clone(),
    );

    let poll = Duration::from_secs(config.source_poll_secs);
    let pull_sources = [
        (EventSource::Firewall, config.firewall_pull_url.clone()),
        (EventSource::Ids, config.ids_pull_url.clone()),
        (EventSource::Siem, config.siem_pull_url.clone()),
    ];
    for (kind, url) in pull_sources {
        if let Some(url) = url {
            tracing::info!(source = %kind, url, "subscribing to pull source");
            sources::subscribe(
                HttpSource::new(kind, url),
                pipeline_handle.clone(),
                poll,
                shutdown_rx.clone(),
            );
        }
    }

    let state = AppState {
        db: pool,
        config: config.clone(),
        frequency,
        pipeline: pipeline_handle,
        responder,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    use axum::routing::{get, patch, post, put};
    let api = axum::Router::new()
        .route("/threats", get(routes::threats::list))
        .route("/responses", get(routes::responses::list))
        .route("/responses/{id}", get(routes::responses::get_by_id))
        .route("/responses/{id}/rollback", post(routes::responses::rollback))
        .route("/responses/{id}/benign", patch(routes::responses::mark_benign))
        .route("/metrics/latest", get(routes::metrics::latest))
        .route("/metrics/recompute", post(routes::metrics::recompute))
        .route("/ingest/{source}", post(routes::ingest::push))
        .route(
            "/intel",
            put(routes::intel::refresh).get(routes::intel::list),
        );

    let app = axum::Router::new()
        .route("/health/live", get(routes::health::live))
        .route("/health/ready", get(routes::health::ready))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(host = %addr, "Starting Rampart API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
        })
        .await?;

    // Stop intake, then let the pipeline drain in-flight work.
    shutdown_tx.send(true).ok();
    pipeline_task.await.ok();
    aggregator_task.await.ok();

    Ok(())
}
