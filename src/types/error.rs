use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::problem_details::ProblemDetails;
use crate::storage::StoreError;

/// Error taxonomy surfaced by the registry, discovery and heartbeat
/// components. Delivery failures never appear here; the notification
/// dispatcher absorbs them.
#[derive(Debug, thiserror::Error)]
pub enum NrfError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Identity mismatch between the request path and body.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// If-Match version tag did not match the current resource.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid patch: {0}")]
    BadPatch(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for NrfError {
    fn into_response(self) -> Response {
        let (status, title) = match &self {
            NrfError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            NrfError::Conflict(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            NrfError::PreconditionFailed(_) => {
                (StatusCode::PRECONDITION_FAILED, "Precondition Failed")
            }
            NrfError::BadPatch(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            NrfError::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            NrfError::Storage(_) | NrfError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        let detail = self.to_string();
        ProblemDetails::new(status.as_u16(), title, &detail).into_response()
    }
}

impl From<serde_json::Error> for NrfError {
    fn from(err: serde_json::Error) -> Self {
        NrfError::Internal(format!("codec error: {err}"))
    }
}

impl From<anyhow::Error> for NrfError {
    fn from(err: anyhow::Error) -> Self {
        NrfError::Internal(err.to_string())
    }
}

pub type NrfResult<T> = Result<T, NrfError>;
