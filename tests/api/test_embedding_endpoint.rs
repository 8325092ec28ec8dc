// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /embedding tests
//!
//! Drive the full router with a fake encoder:
//! - Success returns exactly the model's dimension
//! - Missing / blank text is a 400 whatever the model state
//! - An unloaded model is a 500 "Model not loaded"
//! - Inference faults are a 500 that never echoes the input

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use embedding_server::api::create_app;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use crate::mock_encoder::{loaded_state, unloaded_state, FakeEncoder};

/// Helper: POST `body` to /embedding and return status + parsed JSON body
async fn post_embedding(app: Router, body: Body, json_content_type: bool) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(Method::POST).uri("/embedding");
    if json_content_type {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder.body(body).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap();
    (status, body)
}

fn loaded_app() -> Router {
    create_app(loaded_state(Arc::new(FakeEncoder::new(384))))
}

#[cfg(test)]
mod embedding_endpoint_tests {
    use super::*;

    // ========== SUCCESS CASES ==========

    #[tokio::test]
    async fn test_hello_world_returns_384_floats() {
        let (status, body) =
            post_embedding(loaded_app(), Body::from(r#"{"text": "hello world"}"#), true).await;

        assert_eq!(status, StatusCode::OK);
        let embedding = body["embedding"].as_array().expect("embedding array");
        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|v| v.is_number()));
        assert_eq!(body.as_object().unwrap().len(), 1, "only the embedding field");
    }

    #[tokio::test]
    async fn test_same_text_same_vector() {
        let encoder = Arc::new(FakeEncoder::new(384));
        let app = create_app(loaded_state(encoder.clone()));

        let (_, first) =
            post_embedding(app.clone(), Body::from(r#"{"text": "repeat me"}"#), true).await;
        let (_, second) = post_embedding(app, Body::from(r#"{"text": "repeat me"}"#), true).await;

        assert_eq!(first["embedding"], second["embedding"]);
        assert_eq!(encoder.calls(), 2, "one inference call per request, no caching");
    }

    #[tokio::test]
    async fn test_different_text_different_vector() {
        let app = loaded_app();
        let (_, a) = post_embedding(app.clone(), Body::from(r#"{"text": "cats"}"#), true).await;
        let (_, b) = post_embedding(app, Body::from(r#"{"text": "spreadsheets"}"#), true).await;
        assert_ne!(a["embedding"], b["embedding"]);
    }

    #[tokio::test]
    async fn test_dimension_follows_model() {
        let app = create_app(loaded_state(Arc::new(FakeEncoder::new(8))));
        let (status, body) = post_embedding(app, Body::from(r#"{"text": "tiny"}"#), true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["embedding"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_unicode_text() {
        let (status, body) = post_embedding(
            loaded_app(),
            Body::from(r#"{"text": "こんにちは世界 🌍"}"#),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["embedding"].as_array().unwrap().len(), 384);
    }

    // ========== INPUT ERRORS ==========

    #[tokio::test]
    async fn test_empty_text_is_400() {
        let (status, body) =
            post_embedding(loaded_app(), Body::from(r#"{"text": ""}"#), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "Text is required"}));
    }

    #[tokio::test]
    async fn test_whitespace_text_is_400() {
        let (status, body) =
            post_embedding(loaded_app(), Body::from(r#"{"text": "   \n\t"}"#), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");
    }

    #[tokio::test]
    async fn test_missing_field_is_400() {
        let (status, body) =
            post_embedding(loaded_app(), Body::from(r#"{"prompt": "hi"}"#), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");
    }

    #[tokio::test]
    async fn test_no_body_is_400() {
        let (status, body) = post_embedding(loaded_app(), Body::empty(), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");

        let (status, body) = post_embedding(loaded_app(), Body::empty(), false).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let (status, body) =
            post_embedding(loaded_app(), Body::from(r#"{"text": "#), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");
    }

    #[tokio::test]
    async fn test_non_string_text_is_400() {
        let (status, body) =
            post_embedding(loaded_app(), Body::from(r#"{"text": 42}"#), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");
    }

    #[tokio::test]
    async fn test_input_error_wins_over_unloaded_model() {
        let app = create_app(unloaded_state());
        let (status, body) = post_embedding(app, Body::from(r#"{"text": ""}"#), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");
    }

    // ========== SERVER ERRORS ==========

    #[tokio::test]
    async fn test_unloaded_model_is_500() {
        let app = create_app(unloaded_state());
        let (status, body) =
            post_embedding(app, Body::from(r#"{"text": "hello world"}"#), true).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Model not loaded"}));
    }

    #[tokio::test]
    async fn test_inference_failure_is_500_without_echo() {
        let app = create_app(loaded_state(Arc::new(FakeEncoder::failing_on(
            384,
            "secret-token",
        ))));

        let (status, body) = post_embedding(
            app,
            Body::from(r#"{"text": "my secret-token value"}"#),
            true,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Failed to generate embedding"}));
        assert!(!body.to_string().contains("secret-token"));
    }

    #[tokio::test]
    async fn test_failure_does_not_poison_later_requests() {
        let app = create_app(loaded_state(Arc::new(FakeEncoder::failing_on(384, "bad"))));

        let (status, _) = post_embedding(app.clone(), Body::from(r#"{"text": "bad"}"#), true).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = post_embedding(app, Body::from(r#"{"text": "good"}"#), true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["embedding"].as_array().unwrap().len(), 384);
    }

    #[tokio::test]
    async fn test_panicking_encoder_is_500_and_recovers() {
        let encoder = Arc::new(FakeEncoder::panicking_on(384, "boom"));
        let app = create_app(loaded_state(encoder.clone()));

        let (status, body) =
            post_embedding(app.clone(), Body::from(r#"{"text": "boom goes the worker"}"#), true).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Failed to generate embedding"}));
        assert!(!body.to_string().contains("boom"));

        // The panic stays inside the blocking task; the server keeps serving
        let (status, body) = post_embedding(app, Body::from(r#"{"text": "calm input"}"#), true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["embedding"].as_array().unwrap().len(), 384);
        assert_eq!(encoder.calls(), 2);
    }

    // ========== CONCURRENCY ==========

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_model() {
        let encoder = Arc::new(FakeEncoder::new(384));
        let app = create_app(loaded_state(encoder.clone()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                let body = Body::from(format!(r#"{{"text": "request {}"}}"#, i));
                post_embedding(app, body, true).await
            }));
        }

        for handle in handles {
            let (status, body) = handle.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["embedding"].as_array().unwrap().len(), 384);
        }
        assert_eq!(encoder.calls(), 16);
    }
}
