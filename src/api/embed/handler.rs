// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embedding HTTP handler

use crate::api::embed::{EmbedRequest, EmbedResponse};
use crate::api::http_server::AppState;
use crate::api::ApiError;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Characters of input text included in log lines
const LOG_PREVIEW_CHARS: usize = 50;

/// POST /embedding handler
///
/// Order of checks:
/// 1. Body must parse and carry non-blank `text` (400 otherwise, whatever the
///    model state)
/// 2. Model must be loaded (500 "Model not loaded")
/// 3. One inference call on the blocking pool (500 on any failure)
///
/// # Request Body
/// ```json
/// { "text": "hello world" }
/// ```
///
/// # Response Body
/// ```json
/// { "embedding": [0.1, 0.2, ...] }
/// ```
pub async fn embed_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Rejected embedding request body: {}", rejection);
        ApiError::TextRequired
    })?;
    let text = request.validate()?.to_owned();

    let Some(model) = state.model_holder.get() else {
        warn!("Embedding requested but model is not loaded");
        return Err(ApiError::ModelNotLoaded);
    };

    let preview = log_preview(&text);
    let expected_dimension = model.dimension();

    let outcome = tokio::task::spawn_blocking(move || model.encode(&text)).await;

    match outcome {
        Ok(Ok(embedding)) if embedding.len() == expected_dimension => {
            info!("Generated embedding for text: {}...", preview);
            Ok(Json(EmbedResponse::from(embedding)))
        }
        Ok(Ok(embedding)) => {
            error!(
                "Failed to generate embedding for text '{}...': got {} dimensions (expected {})",
                preview,
                embedding.len(),
                expected_dimension
            );
            Err(ApiError::EmbeddingFailed)
        }
        Ok(Err(e)) => {
            error!("Failed to generate embedding for text '{}...': {:#}", preview, e);
            Err(ApiError::EmbeddingFailed)
        }
        Err(e) => {
            error!("Embedding task for text '{}...' did not complete: {}", preview, e);
            Err(ApiError::EmbeddingFailed)
        }
    }
}

fn log_preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}
