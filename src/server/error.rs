use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ClassifierError;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Well-formed request with unusable content, e.g. blank text.
    #[error("{0}")]
    InvalidInput(String),

    /// The body did not deserialize into the expected shape.
    #[error("{0}")]
    SchemaValidation(String),

    /// The body could not be read at all, e.g. it exceeded the size limit.
    #[error("{1}")]
    Body(StatusCode, String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::SchemaValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Body(status, _) => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::BytesRejection(_) => {
                ApiError::Body(rejection.status(), rejection.body_text())
            }
            _ => ApiError::SchemaValidation(rejection.body_text()),
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        tracing::error!(error = %err, "classification failed");
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
