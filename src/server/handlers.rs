use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::classifier::ClassificationResult;

pub const LIVENESS_MESSAGE: &str = "InnerVoice API is running";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

/// `GET /`
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: LIVENESS_MESSAGE.to_string(),
    })
}

/// `POST /analyze`
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ClassificationResult>, ApiError> {
    let Json(request) = payload?;

    if request.text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }

    let result = state.classifier.classify(&request.text).await?;
    Ok(Json(result))
}
