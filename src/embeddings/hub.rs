// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model file resolution
//!
//! Local files win. When they are missing the ONNX export and tokenizer are
//! pulled from the HuggingFace Hub into the hub cache, unless running offline.

use crate::embeddings::EmbeddingModelConfig;
use anyhow::{Context, Result};
use hf_hub::api::sync::ApiBuilder;
use std::path::{Path, PathBuf};
use tracing::info;

/// File inside the hub repository holding the ONNX graph
const HUB_MODEL_FILE: &str = "onnx/model.onnx";

/// File inside the hub repository holding the tokenizer
const HUB_TOKENIZER_FILE: &str = "tokenizer.json";

/// On-disk locations of everything needed to build the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

/// Finds (or downloads) the model and tokenizer files for `config`.
///
/// Downloading blocks, so it runs on the blocking thread pool.
pub async fn resolve_model_files(config: &EmbeddingModelConfig) -> Result<ModelFiles> {
    if let Some(files) = local_files(config) {
        info!(
            "Using local model files: {} / {}",
            files.model_path.display(),
            files.tokenizer_path.display()
        );
        return Ok(files);
    }

    if config.offline {
        anyhow::bail!(
            "Model files not found ({} / {}) and downloads are disabled",
            config.model_path,
            config.tokenizer_path
        );
    }

    let repo = config.repo.clone();
    let cache_dir = config.cache_dir.clone();
    tokio::task::spawn_blocking(move || download_from_hub(&repo, cache_dir.as_deref()))
        .await
        .context("Model download task failed")?
}

/// Returns the configured local files if both exist
fn local_files(config: &EmbeddingModelConfig) -> Option<ModelFiles> {
    let model_path = Path::new(&config.model_path);
    let tokenizer_path = Path::new(&config.tokenizer_path);

    if model_path.is_file() && tokenizer_path.is_file() {
        Some(ModelFiles {
            model_path: model_path.to_path_buf(),
            tokenizer_path: tokenizer_path.to_path_buf(),
        })
    } else {
        None
    }
}

fn download_from_hub(repo: &str, cache_dir: Option<&str>) -> Result<ModelFiles> {
    info!("Fetching {} from the HuggingFace Hub", repo);

    let mut builder = ApiBuilder::new().with_progress(false);
    if let Some(dir) = cache_dir {
        builder = builder.with_cache_dir(PathBuf::from(dir));
    }
    let api = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HuggingFace Hub client: {}", e))?;
    let repo_api = api.model(repo.to_string());

    let model_path = repo_api
        .get(HUB_MODEL_FILE)
        .map_err(|e| anyhow::anyhow!("Failed to fetch {} from {}: {}", HUB_MODEL_FILE, repo, e))?;
    let tokenizer_path = repo_api.get(HUB_TOKENIZER_FILE).map_err(|e| {
        anyhow::anyhow!("Failed to fetch {} from {}: {}", HUB_TOKENIZER_FILE, repo, e)
    })?;

    info!("✅ Model files cached at {}", model_path.display());

    Ok(ModelFiles {
        model_path,
        tokenizer_path,
    })
}
