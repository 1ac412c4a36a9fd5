//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use souschef_core::{Error, ErrorKind};
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A status code plus a message, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match (e.kind(), e) {
            (_, Error::NotFound(message)) => Self::new(StatusCode::NOT_FOUND, message),
            (_, Error::Validation(message)) => Self::bad_request(message),
            (ErrorKind::Validation, e) => Self::bad_request(e.to_string()),
            (ErrorKind::Upstream, e) => {
                error!(error = %e, "Upstream service failed");
                Self::new(StatusCode::BAD_GATEWAY, e.to_string())
            }
            (_, e) => {
                error!(error = %e, "Request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}
