use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::infrastructure::auth::AuthFailure;

#[derive(Debug)]
pub enum AppError {
    /// A write payload broke a structural rule (cross-article parent, unknown referenced entity).
    Validation(String),
    /// The primary entity addressed by the request does not exist.
    NotFound(String),
    /// The actor is known but the authorization rules refused the action.
    PermissionDenied(String),
    /// No usable actor: credential missing, expired or malformed.
    Unauthenticated(AuthFailure),
    Database(String),
    Internal(String),
    Configuration(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            AppError::Unauthenticated(failure) => write!(f, "Unauthenticated: {}", failure),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Internal(_) | AppError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                json!({ "error": "Internal server error", "status": status.as_u16() })
            }
            AppError::Internal(msg) | AppError::Configuration(msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({ "error": "Internal server error", "status": status.as_u16() })
            }
            AppError::Unauthenticated(failure) => json!({
                "error": failure.to_string(),
                "code": failure.code(),
                "status": status.as_u16()
            }),
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::PermissionDenied(msg) => {
                json!({ "error": msg, "status": status.as_u16() })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Validation(format!("Duplicate value: {}", db_err.message()))
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound(format!("Referenced row does not exist: {}", db_err.message()))
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_permission_denied_stay_distinct() {
        assert_eq!(
            AppError::NotFound("comment 7".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::PermissionDenied("comment 7".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_unauthenticated_maps_to_401() {
        let err = AppError::Unauthenticated(AuthFailure::Expired);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Unauthenticated: Token has expired");
    }

    #[test]
    fn test_row_not_found_becomes_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
