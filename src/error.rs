//! Gateway error types with HTTP status code mapping.
//!
//! [`KeepsakeError`] is the central error type for the read path and for
//! synchronous request validation. Each variant maps to a specific HTTP
//! status code and structured JSON error response. Write-path failures are
//! never returned through this type to the writer; they travel on the
//! asynchronous write-error bus (see [`crate::sync::WriteErrorBus`]).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "no page matches this access code",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Whether the client can reasonably retry the same request.
    pub retryable: bool,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category             | HTTP Status                  |
/// |-----------|----------------------|------------------------------|
/// | 1000–1999 | Validation           | 400 Bad Request              |
/// | 2000–2099 | Not Found            | 404 Not Found                |
/// | 2100–2199 | Authorization        | 403 Forbidden                |
/// | 3000–3999 | Server / Transient   | 500 / 503                    |
#[derive(Debug, thiserror::Error)]
pub enum KeepsakeError {
    /// Page with the given ID was not found.
    #[error("page not found: {0}")]
    PageNotFound(uuid::Uuid),

    /// Timeline event with the given ID was not found.
    #[error("event not found: {0}")]
    EventNotFound(uuid::Uuid),

    /// No page matches the supplied access code.
    #[error("no page matches this access code")]
    CodeNotFound,

    /// The acting identity does not own the resolved page.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The store refused the operation for the acting identity.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The supplied string is not a well-formed access code.
    #[error("invalid access code: {0}")]
    InvalidAccessCode(String),

    /// The store or the suggestion service could not be reached.
    #[error("service temporarily unavailable: {0}")]
    Transient(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KeepsakeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidAccessCode(_) => 1002,
            Self::PageNotFound(_) => 2001,
            Self::EventNotFound(_) => 2002,
            Self::CodeNotFound => 2003,
            Self::Unauthorized(_) => 2101,
            Self::PermissionDenied(_) => 2102,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Transient(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidAccessCode(_) => StatusCode::BAD_REQUEST,
            Self::PageNotFound(_) | Self::EventNotFound(_) | Self::CodeNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::Unauthorized(_) | Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` when retrying the same request may succeed.
    ///
    /// Not-found is recoverable by the user trying a different code, so it
    /// is not reported as retryable; only transient failures are.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<StoreError> for KeepsakeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PageNotFound(id) => Self::PageNotFound(*id.as_uuid()),
            StoreError::EventNotFound(id) => Self::EventNotFound(*id.as_uuid()),
            StoreError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            StoreError::Unavailable(msg) => Self::Transient(msg),
            StoreError::Backend(msg) => Self::PersistenceError(msg),
        }
    }
}

impl IntoResponse for KeepsakeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                retryable: self.is_retryable(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
