use crate::coordinator::SwapError;
use crate::identity::ResolveError;
use crate::registry::RegistryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Control-plane error type that maps to structured HTTP responses.
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown swap or identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The request races or contradicts the swap's current state
    /// (conflicting tx ref, terminal swap, expired swap, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<SwapError> for AppError {
    fn from(e: SwapError) -> Self {
        match &e {
            SwapError::Resolve(ResolveError::NotFound { .. }) => AppError::NotFound(e.to_string()),
            SwapError::Registry(RegistryError::NotFound(_)) => AppError::NotFound(e.to_string()),
            SwapError::Validation(_) | SwapError::UnknownChain { .. } => {
                AppError::Validation(e.to_string())
            }
            _ => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        AppError::NotFound(e.to_string())
    }
}
