use std::env;

/// Application configuration loaded from environment variables.
///
/// Loaded once at startup and never mutated during a pipeline run;
/// reconfiguration requires a restart.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub ai_endpoint: String,
    pub ai_api_key: Option<String>,
    pub ai_timeout_secs: u64,
    pub enforcement_endpoint: String,
    pub enforcement_api_key: Option<String>,
    pub enforcement_retry_attempts: u32,
    pub enforcement_retry_base_ms: u64,
    pub frequency_window_secs: i64,
    pub pipeline_buffer: usize,
    pub redelivery_delay_ms: u64,
    pub source_poll_secs: u64,
    /// Polling endpoints for pull-based telemetry. Sources without a URL
    /// are push-only via the ingest route.
    pub firewall_pull_url: Option<String>,
    pub ids_pull_url: Option<String>,
    pub siem_pull_url: Option<String>,
    pub metrics_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("RAMPART_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("RAMPART_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            ai_endpoint: env::var("AI_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:8011/v1/assess".to_string()),
            ai_api_key: env::var("AI_API_KEY").ok(),
            ai_timeout_secs: env::var("AI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            enforcement_endpoint: env::var("ENFORCEMENT_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:8443/api".to_string()),
            enforcement_api_key: env::var("ENFORCEMENT_API_KEY").ok(),
            enforcement_retry_attempts: env::var("ENFORCEMENT_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            enforcement_retry_base_ms: env::var("ENFORCEMENT_RETRY_BASE_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
            frequency_window_secs: env::var("FREQUENCY_WINDOW_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86400),
            pipeline_buffer: env::var("PIPELINE_BUFFER")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap_or(1024),
            redelivery_delay_ms: env::var("REDELIVERY_DELAY_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
            source_poll_secs: env::var("SOURCE_POLL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            firewall_pull_url: env::var("FIREWALL_PULL_URL").ok(),
            ids_pull_url: env::var("IDS_PULL_URL").ok(),
            siem_pull_url: env::var("SIEM_PULL_URL").ok(),
            metrics_interval_secs: env::var("METRICS_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
        })
    }
}
