use crate::service::{ErrorKind, ServiceError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("X-API-Token header missing")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(e) => status_for(e.kind()),
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken => StatusCode::FORBIDDEN,
        }
    }
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidRequest | ErrorKind::Extraction => StatusCode::BAD_REQUEST,
        ErrorKind::Io
        | ErrorKind::PermissionDenied
        | ErrorKind::StreamAborted
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::Service(e) => {
                let failure = e.to_failure();
                if status.is_server_error() {
                    tracing::error!(kind = %failure.kind, error = %failure.message, "request failed");
                }
                json!(failure)
            }
            ApiError::InvalidRequest(message) => json!({
                "kind": ErrorKind::InvalidRequest,
                "message": message,
            }),
            ApiError::MissingToken | ApiError::InvalidToken => json!({
                "kind": "AuthenticationError",
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
