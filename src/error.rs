use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application-level error taxonomy. Each variant maps one-to-one to an
/// HTTP status; services return these unchanged and the API layer renders
/// the `{"detail": ...}` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    StaleReconciliation(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::StaleReconciliation(_) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    /// Translates store-level constraint violations into domain kinds so
    /// upper layers never have to inspect SQLSTATE codes themselves.
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => {
                    return AppError::Conflict(format!(
                        "uniqueness constraint violated: {}",
                        db_err.constraint().unwrap_or("unknown")
                    ));
                }
                // foreign_key_violation
                Some("23503") => {
                    return AppError::Validation(format!(
                        "referenced entity does not exist: {}",
                        db_err.constraint().unwrap_or("unknown")
                    ));
                }
                // check_violation
                Some("23514") => {
                    return AppError::Validation(format!(
                        "value rejected by constraint: {}",
                        db_err.constraint().unwrap_or("unknown")
                    ));
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal failures are logged with full detail but never leak
        // internals to the client.
        let detail = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "database failure");
                "An internal error occurred".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal failure");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("missing".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::StaleReconciliation("stale".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Auth("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("role".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_row_not_found_stays_internal() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
    }
}
