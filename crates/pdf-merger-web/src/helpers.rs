//! Helper types and traits for cleaner route handlers.
//!
//! Every failure leaves a handler as an [`ApiError`], which renders the JSON
//! error body `{success: false, errorKind, detail}` with a status derived
//! from the error kind.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pdf_merger_core::{Error as CoreError, ErrorKind};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Standard result type for route handlers.
pub type RouteResult<T> = Result<T, ApiError>;

/// An error as reported to clients.
#[derive(Debug, Error)]
#[error("{kind}: {detail}")]
pub struct ApiError {
    kind: ErrorKind,
    detail: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    success: bool,
    error_kind: ErrorKind,
    detail: &'a str,
}

impl ApiError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, detail)
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, "internal error")
    }

    pub const fn status(&self) -> StatusCode {
        status_for(self.kind)
    }
}

/// HTTP status for each error kind.
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest | ErrorKind::EmptySelection => StatusCode::BAD_REQUEST,
        ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InconsistentManifest | ErrorKind::DanglingReference => StatusCode::CONFLICT,
        ErrorKind::InvalidDocument => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::AssemblyFailed | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        if e.kind() == ErrorKind::Internal {
            error!("Internal error: {}", e);
        }
        Self::new(e.kind(), e.detail())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error_kind: self.kind,
            detail: &self.detail,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to an internal error, logging the cause.
    fn or_internal_error(self) -> RouteResult<T>;

    /// Converts the error to 400 Bad Request.
    fn or_bad_request(self) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| {
            error!("Internal error: {}", e);
            ApiError::internal()
        })
    }

    fn or_bad_request(self) -> RouteResult<T> {
        self.map_err(|e| ApiError::bad_request(e.to_string()))
    }
}

/// Run blocking core work (parsing, assembly, disk I/O) off the async runtime.
pub async fn blocking<T, F>(work: F) -> RouteResult<T>
where
    F: FnOnce() -> pdf_merger_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .or_internal_error()?
        .map_err(ApiError::from)
}
