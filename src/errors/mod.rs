//! Unified error handling with consistent API response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error detail in the API response envelope.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Consistent JSON envelope for all API responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a successful result in the envelope.
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            data: Some(data),
            error: None,
        })
    }

    /// Wrap an error in the envelope.
    pub fn error(code: &str, message: &str) -> Json<Self> {
        Json(Self {
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        })
    }
}

/// Application error taxonomy.
///
/// The pipeline variants carry their recovery contract: `Normalization`
/// quarantines and continues, `DependencyUnavailable` degrades the affected
/// score component to neutral, `Enforcement` surfaces a `Failed` action after
/// bounded retry, and `Database` is fatal for the current pass (the record is
/// redelivered, not dropped).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Normalization error: {0}")]
    Normalization(String),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Enforcement error: {0}")]
    Enforcement(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Check if this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error is fatal for the current pipeline pass.
    ///
    /// Fatal errors require redelivery of the record; the rest are recovered
    /// in place (quarantine or component degradation).
    pub fn is_fatal_for_pass(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::InvalidTransition(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_TRANSITION", msg.clone())
            }
            AppError::Normalization(msg) => {
                (StatusCode::BAD_REQUEST, "NORMALIZATION_ERROR", msg.clone())
            }
            AppError::DependencyUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DEPENDENCY_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Enforcement(msg) => {
                (StatusCode::BAD_GATEWAY, "ENFORCEMENT_ERROR", msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()> {
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message,
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_response_success() {
        let response = ApiResponse::success("hello");
        let json = serde_json::to_value(&response.0).unwrap();
        assert_eq!(json["data"], "hello");
        assert!(json["error"].is_null());
    }

    #[test]
    fn api_response_error() {
        let response = ApiResponse::<()>::error("NOT_FOUND", "Action not found");
        let json = serde_json::to_value(&response.0).unwrap();
        assert!(json["data"].is_null());
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Action not found");
    }

    #[test]
    fn app_error_is_not_found() {
        let err = AppError::NotFound("action".to_string());
        assert!(err.is_not_found());
    }

    #[test]
    fn app_error_display() {
        let err = AppError::Normalization("src_ip is not a valid address".to_string());
        assert_eq!(
            err.to_string(),
            "Normalization error: src_ip is not a valid address"
        );
    }

    #[test]
    fn app_error_from_sqlx() {
        let sqlx_err = sqlx::Error::RowNotFound;
        let err: AppError = sqlx_err.into();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn fatal_classification() {
        assert!(AppError::Database(sqlx::Error::RowNotFound).is_fatal_for_pass());
        assert!(!AppError::Normalization("bad ip".to_string()).is_fatal_for_pass());
        assert!(!AppError::DependencyUnavailable("ai timeout".to_string()).is_fatal_for_pass());
        assert!(!AppError::Enforcement("block failed".to_string()).is_fatal_for_pass());
    }
}
