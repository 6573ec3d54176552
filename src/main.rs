// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use fabstir_ocr_node::{
    api::{start_server, AppState},
    cli::Cli,
    config::NodeConfig,
    vision::{ModelCache, OnnxModelLoader},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .init();

    info!("🚀 Starting {}", fabstir_ocr_node::version::get_version_string());

    let mut config = NodeConfig::from_env();
    cli.apply(&mut config);
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    info!(
        "Models: east={}, crnn={}, cache capacity {}",
        config.models.east_model_dir.display(),
        config.models.crnn_model_dir.display(),
        config.models.cache_capacity
    );
    info!("Saving sessions under {}", config.save_dir.display());

    let loader = Arc::new(OnnxModelLoader::new(config.onnx_config()));
    let models = Arc::new(ModelCache::new(loader, config.models.cache_capacity));
    let state = AppState::new(&config, models);

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_addr()))?;

    start_server(state, addr).await
}
