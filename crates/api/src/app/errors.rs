use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use opsforge_rbac::RbacError;

/// Map each domain error kind to a stable HTTP status.
///
/// `Storage` is deliberately a 500 with a generic message: lower-level
/// failures must not be mistaken for a domain validation failure, and their
/// details stay in the logs.
pub fn rbac_error_to_response(err: RbacError) -> axum::response::Response {
    match err {
        RbacError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        RbacError::DuplicateName { .. } => {
            json_error(StatusCode::CONFLICT, "duplicate_name", err.to_string())
        }
        RbacError::AlreadyAssigned(msg) => {
            json_error(StatusCode::CONFLICT, "already_assigned", msg)
        }
        RbacError::NotAssigned(msg) => json_error(StatusCode::NOT_FOUND, "not_assigned", msg),
        RbacError::Referential(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "referential_error", msg)
        }
        RbacError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        RbacError::Storage(detail) => {
            tracing::error!(detail = %detail, "storage failure surfaced to API");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
