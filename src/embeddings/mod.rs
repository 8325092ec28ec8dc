// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Sentence embedding model layer
//!
//! - `TextEncoder`: the seam between the HTTP layer and whatever produces vectors
//! - `OnnxEmbeddingModel`: all-MiniLM-L6-v2 on ONNX Runtime
//! - `ModelHolder`: load-once, read-many ownership of the encoder
//! - `hub`: locating model files on disk or on the HuggingFace Hub

pub mod holder;
pub mod hub;
pub mod onnx_model;

pub use holder::ModelHolder;
pub use hub::{resolve_model_files, ModelFiles};
pub use onnx_model::OnnxEmbeddingModel;

use anyhow::Result;

/// Default model served by this node
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// HuggingFace Hub repository holding the ONNX export of the default model
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Output dimension of all-MiniLM-L6-v2
pub const EMBEDDING_DIMENSION: usize = 384;

/// Maximum sequence length of all-MiniLM-L6-v2 (longer inputs are truncated)
pub const MAX_SEQUENCE_LENGTH: usize = 256;

/// Anything that turns one string into one fixed-length vector.
///
/// Implementations must be safe to call from several threads at once; the
/// HTTP layer shares a single instance across all in-flight requests.
#[cfg_attr(test, mockall::automock)]
pub trait TextEncoder: Send + Sync {
    /// Encodes `text` into a vector of exactly `dimension()` floats.
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector returned by `encode`.
    fn dimension(&self) -> usize;
}

/// Configuration for loading the embedding model
#[derive(Debug, Clone)]
pub struct EmbeddingModelConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub name: String,
    /// HuggingFace Hub repository used when local files are missing
    pub repo: String,
    /// Path to ONNX model file
    pub model_path: String,
    /// Path to tokenizer JSON file
    pub tokenizer_path: String,
    /// Override for the hub cache directory
    pub cache_dir: Option<String>,
    /// Never touch the network
    pub offline: bool,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Expected embedding dimensions (must be 384)
    pub dimensions: usize,
}

impl Default for EmbeddingModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL_NAME.to_string(),
            repo: DEFAULT_MODEL_REPO.to_string(),
            model_path: "./models/all-MiniLM-L6-v2-onnx/model.onnx".to_string(),
            tokenizer_path: "./models/all-MiniLM-L6-v2-onnx/tokenizer.json".to_string(),
            cache_dir: None,
            offline: false,
            intra_threads: 4,
            dimensions: EMBEDDING_DIMENSION,
        }
    }
}
