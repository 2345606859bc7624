use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bmessage_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("File too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The request body hit the router's body limit before it was read.
    #[error("Request body too large")]
    BodyTooLarge,

    #[error("Upload storage error: {0}")]
    UploadStorage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized => ServerError::Unauthorized,
            CoreError::NotFound(what) => ServerError::NotFound(what),
            CoreError::Forbidden(reason) => ServerError::Forbidden(reason),
            CoreError::Validation(reason) => ServerError::BadRequest(reason),
            CoreError::Persist(e) => ServerError::Internal(e.to_string()),
            CoreError::Internal(reason) => ServerError::Internal(reason),
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::BodyTooLarge
        } else {
            ServerError::BadRequest(format!("Multipart error: {}", err.body_text()))
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(err: JsonRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::BodyTooLarge
        } else {
            ServerError::BadRequest(err.body_text())
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::PayloadTooLarge { .. } | ServerError::BodyTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::UploadStorage(_) => {
                tracing::error!(error = %self, "upload storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Upload storage error".to_string())
            }
            ServerError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
