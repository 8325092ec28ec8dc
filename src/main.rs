// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use embedding_server::{start_server, AppState, ModelHolder, ServerConfig};
use std::{env, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::parse();
    let addr = config.socket_addr()?;

    info!("🚀 Starting embedding server v{}", env!("CARGO_PKG_VERSION"));
    info!("📦 Model: {} ({})", config.model_name, config.model_repo);

    // Load once, before accepting connections
    let holder = ModelHolder::new();
    if !holder.load(&config.model_config()).await {
        warn!("⚠️  Continuing without a model: /health reports model_loaded=false");
    }

    info!("  Health:    GET  http://{}/health", addr);
    info!("  Embedding: POST http://{}/embedding", addr);

    start_server(Arc::new(AppState::new(holder)), addr).await
}
