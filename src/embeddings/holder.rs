// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding model holder
//!
//! Owns the one encoder instance for the lifetime of the process. The holder
//! starts unloaded and moves to loaded at most once; there is no reload path.
//! A failed load leaves it unloaded so the node keeps serving /health.

use crate::embeddings::{resolve_model_files, EmbeddingModelConfig, OnnxEmbeddingModel, TextEncoder};
use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

/// Load-once, read-many slot for the embedding model
#[derive(Default)]
pub struct ModelHolder {
    model: OnceLock<Arc<dyn TextEncoder>>,
}

impl std::fmt::Debug for ModelHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHolder")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl ModelHolder {
    /// Creates an unloaded holder
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a holder that already owns `model`
    pub fn loaded(model: Arc<dyn TextEncoder>) -> Self {
        let holder = Self::new();
        holder.install(Ok(model));
        holder
    }

    /// Resolves the model files, builds the ONNX model and publishes it.
    ///
    /// Returns whether the holder is loaded afterwards. Failures are logged,
    /// never propagated.
    pub async fn load(&self, config: &EmbeddingModelConfig) -> bool {
        info!("Loading embedding model: {}", config.name);
        let result = build_model(config).await;
        self.install(result)
    }

    /// Publishes the outcome of a model build.
    ///
    /// `Err` leaves the holder as it was. A second successful install is
    /// ignored and the first model stays.
    pub fn install(&self, result: Result<Arc<dyn TextEncoder>>) -> bool {
        match result {
            Ok(model) => {
                let dimension = model.dimension();
                if self.model.set(model).is_err() {
                    warn!("Embedding model already loaded; ignoring new instance");
                } else {
                    info!("✅ Embedding model loaded ({} dimensions)", dimension);
                }
            }
            Err(e) => {
                error!("❌ Failed to load embedding model: {:#}", e);
                error!("   POST /embedding will answer 500 until the process is restarted");
            }
        }
        self.is_loaded()
    }

    /// Whether a model has been published
    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// The model, if loaded
    pub fn get(&self) -> Option<Arc<dyn TextEncoder>> {
        self.model.get().cloned()
    }
}

async fn build_model(config: &EmbeddingModelConfig) -> Result<Arc<dyn TextEncoder>> {
    let files = resolve_model_files(config).await?;

    let name = config.name.clone();
    let intra_threads = config.intra_threads;
    let model = tokio::task::spawn_blocking(move || {
        OnnxEmbeddingModel::new(name, files.model_path, files.tokenizer_path, intra_threads)
    })
    .await
    .context("Model loading task failed")??;

    if model.dimension() != config.dimensions {
        anyhow::bail!(
            "Model {} dimension mismatch: expected {}, got {}",
            config.name,
            config.dimensions,
            model.dimension()
        );
    }

    Ok(Arc::new(model))
}
