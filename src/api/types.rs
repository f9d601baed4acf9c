//! Wire types shared by the HTTP routers and the HTTP client.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, GridError};

/// Header carrying the shared-secret credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// JSON error body returned on every failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Error category, used by clients to rebuild the error.
    pub kind: ErrorKind,
}

/// A [`GridError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub GridError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Precondition => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(GridError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.0.detail(),
            kind: self.0.kind(),
        };
        (self.status(), Json(body)).into_response()
    }
}
