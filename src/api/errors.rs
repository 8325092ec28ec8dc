// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON body of every error response: `{"error": "<message>"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failures surfaced by the HTTP layer.
///
/// Messages are fixed strings; request text and library error details are
/// logged by the handler and never placed in a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Body missing, unparseable, or `text` empty after trimming
    #[error("Text is required")]
    TextRequired,

    /// The model failed to load at startup
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// The model returned an error while encoding
    #[error("Failed to generate embedding")]
    EmbeddingFailed,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::TextRequired => StatusCode::BAD_REQUEST,
            ApiError::ModelNotLoaded | ApiError::EmbeddingFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_response())).into_response()
    }
}
