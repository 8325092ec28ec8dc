// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Server configuration
//!
//! Every flag can also come from the environment (or a `.env` file loaded
//! before parsing).

use crate::embeddings::{
    EmbeddingModelConfig, DEFAULT_MODEL_NAME, DEFAULT_MODEL_REPO, EMBEDDING_DIMENSION,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};

/// Sentence embedding HTTP server
#[derive(Parser, Debug, Clone)]
#[command(name = "embedding-server")]
#[command(version)]
#[command(about = "Serves all-MiniLM-L6-v2 sentence embeddings over HTTP", long_about = None)]
pub struct ServerConfig {
    /// Interface to listen on
    #[arg(long, env = "EMBEDDING_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "EMBEDDING_PORT", default_value_t = 8001)]
    pub port: u16,

    /// Model name reported in logs
    #[arg(long, env = "EMBEDDING_MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub model_name: String,

    /// HuggingFace Hub repository to download from when local files are missing
    #[arg(long, env = "EMBEDDING_MODEL_REPO", default_value = DEFAULT_MODEL_REPO)]
    pub model_repo: String,

    /// Path to the ONNX model file
    #[arg(
        long,
        env = "EMBEDDING_MODEL_PATH",
        default_value = "./models/all-MiniLM-L6-v2-onnx/model.onnx"
    )]
    pub model_path: String,

    /// Path to the tokenizer JSON file
    #[arg(
        long,
        env = "EMBEDDING_TOKENIZER_PATH",
        default_value = "./models/all-MiniLM-L6-v2-onnx/tokenizer.json"
    )]
    pub tokenizer_path: String,

    /// HuggingFace Hub cache directory (the `hub/` dir under `HF_HOME`, not
    /// `HF_HOME` itself)
    #[arg(long, env = "HF_HUB_CACHE")]
    pub hf_cache_dir: Option<String>,

    /// Never download model files
    #[arg(long, env = "EMBEDDING_OFFLINE")]
    pub offline: bool,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "EMBEDDING_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,
}

impl ServerConfig {
    /// Address the HTTP listener binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid listen host: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Model loading settings derived from the flags
    pub fn model_config(&self) -> EmbeddingModelConfig {
        EmbeddingModelConfig {
            name: self.model_name.clone(),
            repo: self.model_repo.clone(),
            model_path: self.model_path.clone(),
            tokenizer_path: self.tokenizer_path.clone(),
            cache_dir: self.hf_cache_dir.clone(),
            offline: self.offline,
            intra_threads: self.intra_threads.max(1),
            dimensions: EMBEDDING_DIMENSION,
        }
    }
}
