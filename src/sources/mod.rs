//! Pull-based telemetry sources.
//!
//! Each configured source endpoint is polled on a fixed interval and every
//! payload it returns is handed to the pipeline as an opaque raw record.
//! Parsing happens downstream in the normalizers, so a source that returns
//! garbage fills the quarantine table instead of stalling the poll loop.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::models::event::{EventSource, RawRecord};
use crate::services::pipeline::PipelineHandle;

/// A pollable telemetry endpoint.
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> EventSource;

    /// Fetch the next batch of raw payloads.
    fn pull(&self) -> impl std::future::Future<Output = Result<Vec<String>, AppError>> + Send;
}

/// HTTP source adapter. A JSON array response yields one record per element;
/// anything else is split into non-empty lines (firewall exports are
/// newline-delimited CSV).
pub struct HttpSource {
    kind: EventSource,
    url: String,
    client: Client,
}

impl HttpSource {
    pub fn new(kind: EventSource, url: String) -> Self {
        Self {
            kind,
            url,
            client: Client::new(),
        }
    }
}

/// Split a response body into individual record payloads.
pub fn payloads_from_body(body: &str) -> Vec<String> {
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(body) {
        return items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
    }
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl SourceAdapter for HttpSource {
    fn kind(&self) -> EventSource {
        self.kind
    }

    async fn pull(&self) -> Result<Vec<String>, AppError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("source {}: {e}", self.kind)))?
            .error_for_status()
            .map_err(|e| AppError::DependencyUnavailable(format!("source {}: {e}", self.kind)))?;
        let body = response
            .text()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("source {}: {e}", self.kind)))?;
        Ok(payloads_from_body(&body))
    }
}

/// Poll a source on a fixed interval until shutdown, feeding the pipeline.
pub fn subscribe<S>(
    source: S,
    pipeline: PipelineHandle,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: SourceAdapter + 'static,
{
    tokio::spawn(async move {
        let kind = source.kind();
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            match source.pull().await {
                Ok(payloads) => {
                    let count = payloads.len();
                    for payload in payloads {
                        if pipeline
                            .submit(RawRecord { source: kind, payload })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    if count > 0 {
                        tracing::debug!(source = %kind, count, "pulled telemetry batch");
                    }
                }
                Err(e) => {
                    tracing::warn!(source = %kind, error = %e, "source poll failed, will retry next tick");
                }
            }
        }
        tracing::info!(source = %kind, "source subscription stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array_yields_one_payload_per_element() {
        let payloads = payloads_from_body(r#"[{"src_ip": "10.0.0.5"}, "raw,csv,line"]"#);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], r#"{"src_ip":"10.0.0.5"}"#);
        assert_eq!(payloads[1], "raw,csv,line");
    }

    #[test]
    fn plain_text_splits_into_nonempty_lines() {
        let payloads = payloads_from_body("a,b,c\n\n  \nd,e,f\n");
        assert_eq!(payloads, vec!["a,b,c".to_string(), "d,e,f".to_string()]);
    }

    #[test]
    fn empty_body_yields_nothing() {
        assert!(payloads_from_body("").is_empty());
        assert!(payloads_from_body("[]").is_empty());
    }
}
