use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use n3_core::error::{
    CoreError, ErrorKind, ALREADY_EXISTS, ALREADY_LOCKED, INTERNAL_ERROR, NOT_FOUND, THREAD_CLOSED,
};

/// Application-level error type for HTTP handlers and the engine.
///
/// Wraps [`CoreError`] for domain errors and adds the database and internal variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `n3_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

impl AppError {
    /// HTTP status, stable error code and client-facing message.
    pub fn describe(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => {
                let status = match core.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::Precondition | ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::Limit => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::Internal => {
                        tracing::error!(error = %core, "Internal core error");
                        return internal();
                    }
                };
                (status, core.code(), core.message())
            }

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }

    /// Coarse error class reported alongside the code, e.g. in a failed
    /// proposal attempt.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Core(core) => core.kind(),
            AppError::InternalError(_) => ErrorKind::Internal,
            AppError::Database(_) => match self.describe().0 {
                StatusCode::NOT_FOUND => ErrorKind::NotFound,
                StatusCode::CONFLICT => ErrorKind::Conflict,
                _ => ErrorKind::Internal,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.describe();

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        INTERNAL_ERROR,
        "An internal error occurred".to_string(),
    )
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map
///   to 409, with a domain code for the constraints that back a one-per-run
///   rule.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            NOT_FOUND,
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    let (code, message) = match constraint {
                        "uq_readiness_snapshots_run_id" => {
                            (ALREADY_LOCKED, "Run readiness is already locked".to_string())
                        }
                        "uq_execution_handoffs_run_id" => (
                            ALREADY_EXISTS,
                            "An execution handoff already exists for this run".to_string(),
                        ),
                        "uq_schedule_proposal_events_terminal" => (
                            THREAD_CLOSED,
                            "Schedule negotiation is closed".to_string(),
                        ),
                        _ => (
                            "CONFLICT",
                            format!("Duplicate value violates unique constraint: {constraint}"),
                        ),
                    };
                    return (StatusCode::CONFLICT, code, message);
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use n3_core::error::{LIMIT_EXCEEDED, NOT_ELIGIBLE};

    #[test]
    fn core_kinds_map_to_statuses() {
        let cases = [
            (
                CoreError::NotFound {
                    entity: "ServiceRun",
                    id: 1,
                },
                StatusCode::NOT_FOUND,
            ),
            (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                CoreError::precondition(NOT_ELIGIBLE, "nope"),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::limit(LIMIT_EXCEEDED, "too many"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CoreError::conflict(THREAD_CLOSED, "closed"),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::Core(err).describe().0, expected);
        }
    }

    #[test]
    fn internal_messages_are_sanitized() {
        let (_, code, message) = AppError::InternalError("secret path".into()).describe();
        assert_eq!(code, INTERNAL_ERROR);
        assert!(!message.contains("secret"));
    }

    #[test]
    fn row_not_found_is_404() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.describe().0, StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
