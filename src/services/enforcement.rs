//! Enforcement adapter for the perimeter blocking point, with bounded retry.
//!
//! The adapter side is idempotent: repeating `block` for an already-blocked
//! IP is a no-op success. Transient failures are retried with exponential
//! backoff a fixed number of times before surfacing an `Enforcement` error.

use std::future::Future;
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::AppError;

/// Capability interface over the perimeter enforcement point.
pub trait EnforcementAdapter: Send + Sync {
    fn block(&self, ip: &str) -> impl Future<Output = Result<(), AppError>> + Send;
    fn rollback(&self, ip: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Bounded exponential backoff policy for enforcement calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            attempts: config.enforcement_retry_attempts.max(1),
            base_delay: Duration::from_millis(config.enforcement_retry_base_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Run `op` under the retry policy: up to `attempts` tries, sleeping
/// `base_delay * 2^(n-1)` between consecutive tries.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut delay = policy.base_delay;
    let mut last_err = None;

    for attempt in 1..=policy.attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(
                    op = op_name,
                    attempt,
                    max_attempts = policy.attempts,
                    error = %e,
                    "enforcement call failed"
                );
                last_err = Some(e);
                if attempt < policy.attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AppError::Enforcement(format!("{op_name}: no attempts made"))))
}

/// HTTP adapter for a pfSense-style enforcement REST API.
#[derive(Clone)]
pub struct HttpEnforcement {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpEnforcement {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.enforcement_endpoint.clone(),
            config.enforcement_api_key.clone(),
        )
    }

    async fn call(&self, action: &str, ip: &str) -> Result<(), AppError> {
        let mut request = self
            .client
            .post(format!("{}/{action}", self.endpoint))
            .json(&serde_json::json!({ "ip": ip }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Enforcement(format!("{action} {ip}: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Enforcement(format!(
                "{action} {ip}: enforcement point returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

impl EnforcementAdapter for HttpEnforcement {
    async fn block(&self, ip: &str) -> Result<(), AppError> {
        self.call("block", ip).await
    }

    async fn rollback(&self, ip: &str) -> Result<(), AppError> {
        self.call("rollback", ip).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "block", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AppError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "block", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::Enforcement("transient".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(), "rollback", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Enforcement("still down".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(AppError::Enforcement(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
