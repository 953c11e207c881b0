use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::Serialize;

use crate::ordering::PlanError;

/// Seconds a client should wait before retrying after a transient failure.
const TRANSIENT_RETRY_AFTER_SECS: u64 = 1;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `NOT_FOUND`,
    /// `CONFLICT`, `CAPACITY_EXCEEDED`, `REMOTE_ASSET_ERROR`,
    /// `TRANSIENT_STORAGE_ERROR`, `TIMEOUT`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Position must be a positive integer")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    /// The scope already holds `limit` items.
    CapacityExceeded {
        scope: String,
        limit: usize,
    },
    /// The remote asset store failed on a path that cannot tolerate it.
    RemoteAsset(String),
    /// Serialization conflict or deadlock; the same request is safe to retry.
    TransientStorage(String),
    /// A transaction profile's timeout elapsed.
    Timeout(String),
    /// Dense ordering was observed broken. Always a bug.
    InvariantViolation(String),
    Internal(String),
}

impl AppError {
    /// Whether a fresh transaction may succeed with identical inputs.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientStorage(_))
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::CapacityExceeded { scope, limit } => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CAPACITY_EXCEEDED",
                    message: format!("{scope} is limited to {limit} items"),
                },
            ),
            AppError::RemoteAsset(detail) => {
                tracing::warn!("Remote asset error: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        code: "REMOTE_ASSET_ERROR",
                        message: format!("Asset storage failed: {detail}"),
                    },
                )
            }
            AppError::TransientStorage(detail) => {
                tracing::warn!("Transient storage error: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "TRANSIENT_STORAGE_ERROR",
                        message: "The request conflicted with a concurrent change, please retry"
                            .into(),
                    },
                )
            }
            AppError::Timeout(detail) => {
                tracing::warn!("Transaction timeout: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "TIMEOUT",
                        message: "The operation timed out".into(),
                    },
                )
            }
            AppError::InvariantViolation(detail) => {
                tracing::error!("Ordering invariant violated: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let transient = self.is_transient();
        let (status, body) = self.status_and_body();

        if transient {
            (
                status,
                [("Retry-After", TRANSIENT_RETRY_AFTER_SECS.to_string())],
                Json(body),
            )
                .into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

/// SQLSTATE classes a fresh transaction can get past: `serialization_failure`
/// and `deadlock_detected`.
fn is_retryable_sqlstate(code: &str) -> bool {
    matches!(code, "40001" | "40P01")
}

/// The SQLSTATE the database attached to `err`, if it came from the driver.
fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e))
        | DbErr::Conn(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return AppError::Conflict(format!("Duplicate value: {detail}"));
        }
        let retryable = sqlstate(&err).is_some_and(|code| is_retryable_sqlstate(&code));
        let message = err.to_string();
        if retryable {
            AppError::TransientStorage(message)
        } else {
            AppError::Internal(message)
        }
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::CapacityExceeded { limit, .. } => AppError::CapacityExceeded {
                scope: "Collection".into(),
                limit,
            },
            PlanError::NotFound(_) => AppError::NotFound(err.to_string()),
            PlanError::SelfSwap(_) | PlanError::ReorderMismatch => {
                AppError::Validation(err.to_string())
            }
            PlanError::NotDense(_) => AppError::InvariantViolation(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        if err.is_client_error() {
            AppError::Validation(err.to_string())
        } else {
            AppError::RemoteAsset(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_and_deadlock_codes_are_retryable() {
        assert!(is_retryable_sqlstate("40001"));
        assert!(is_retryable_sqlstate("40P01"));
        assert!(!is_retryable_sqlstate("23505"));
        assert!(!is_retryable_sqlstate("57014"));
    }

    #[test]
    fn message_text_alone_is_not_transient() {
        // Only the driver's SQLSTATE counts, not wording in the message.
        let err: AppError = DbErr::Custom(
            "could not serialize access due to read/write dependencies among transactions".into(),
        )
        .into();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn other_db_errors_are_internal() {
        let err: AppError = DbErr::Custom("connection reset".into()).into();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn transient_response_carries_retry_after() {
        let response = AppError::TransientStorage("40001".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["Retry-After"], "1");
    }

    #[test]
    fn capacity_maps_to_conflict_status() {
        let response = AppError::CapacityExceeded {
            scope: "Slider".into(),
            limit: 15,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_image_is_a_validation_error() {
        let err: AppError = StorageError::InvalidImage("truncated".into()).into();
        assert!(matches!(err, AppError::Validation(_)));

        let err: AppError = StorageError::Remote("503".into()).into();
        assert!(matches!(err, AppError::RemoteAsset(_)));
    }

    #[test]
    fn self_swap_is_a_validation_error() {
        let err: AppError = PlanError::SelfSwap(4).into();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
