//! AI assessment adapter: an untrusted, possibly-slow, possibly-failing
//! dependency wrapped behind a narrow trait.
//!
//! Callers apply their own timeout (`scoring::resolve_ai_component`); any
//! failure degrades the AI component to neutral instead of blocking the
//! pipeline.

use serde::Deserialize;

use crate::config::AppConfig;
use crate::errors::AppError;

/// Result of a phishing-likelihood assessment.
#[derive(Debug, Clone, Deserialize)]
pub struct AiAssessment {
    /// Phishing likelihood in [0, 1].
    pub confidence: f32,
    /// Narrative summary of the suspicious behavior.
    pub summary: String,
    /// Suggested response action.
    #[serde(default)]
    pub action_hint: String,
}

/// Capability interface over the external assessment model.
pub trait AiAssessor: Send + Sync {
    fn assess(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<AiAssessment, AppError>> + Send;
}

/// HTTP adapter for a Mistral-style assessment endpoint.
#[derive(Clone)]
pub struct HttpAiAssessor {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpAiAssessor {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.ai_endpoint.clone(), config.ai_api_key.clone())
    }
}

impl AiAssessor for HttpAiAssessor {
    async fn assess(&self, text: &str) -> Result<AiAssessment, AppError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "input": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("AI endpoint: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::DependencyUnavailable(format!(
                "AI endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<AiAssessment>()
            .await
            .map_err(|e| AppError::DependencyUnavailable(format!("AI response body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assessment_deserialization() {
        let a: AiAssessment = serde_json::from_str(
            r#"{"confidence": 0.92, "summary": "credential lure", "action_hint": "block"}"#,
        )
        .unwrap();
        assert!((a.confidence - 0.92).abs() < f32::EPSILON);
        assert_eq!(a.summary, "credential lure");
        assert_eq!(a.action_hint, "block");
    }

    #[test]
    fn action_hint_defaults_to_empty() {
        let a: AiAssessment =
            serde_json::from_str(r#"{"confidence": 0.1, "summary": "benign"}"#).unwrap();
        assert!(a.action_hint.is_empty());
    }
}
