use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use chartgate_authz::Denial;
use chartgate_principal::AuthError;

/// HTTP-facing rejection. 401 for every authentication failure (fail-secure
/// — an unreachable account store is a 401, not an open gate), 403 for
/// authorization, 500 only for faults inside the subsystem itself.
#[derive(Debug)]
pub enum GuardError {
    Unauthenticated(AuthError),
    Forbidden(Denial),
    Internal,
}

impl From<AuthError> for GuardError {
    fn from(err: AuthError) -> Self {
        GuardError::Unauthenticated(err)
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        match self {
            GuardError::Unauthenticated(err) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
            GuardError::Forbidden(denial) => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Insufficient permissions",
                    "required": denial.required,
                    "current": denial.current_role,
                })),
            )
                .into_response(),
            GuardError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Authorization check failed" })),
            )
                .into_response(),
        }
    }
}
