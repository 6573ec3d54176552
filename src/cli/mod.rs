// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::NodeConfig;

/// Fabstir OCR Node
#[derive(Parser, Debug, Default)]
#[command(name = "fabstir-ocr-node")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Scene-text OCR service (EAST detection + CRNN recognition)", long_about = None)]
pub struct Cli {
    /// Port to listen on (overrides API_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind (overrides API_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Directory for session artifacts (overrides OCR_SAVE_DIR)
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the environment configuration
    pub fn apply(&self, config: &mut NodeConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(save_dir) = &self.save_dir {
            config.save_dir = save_dir.clone();
        }
    }

    pub fn default_log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    /// Log filter from `RUST_LOG`, falling back to [`Cli::default_log_level`]
    pub fn log_filter(&self) -> EnvFilter {
        self.log_filter_from(std::env::var("RUST_LOG").ok().as_deref())
    }

    fn log_filter_from(&self, directives: Option<&str>) -> EnvFilter {
        directives
            .filter(|d| !d.trim().is_empty())
            .and_then(|d| EnvFilter::try_new(d).ok())
            .unwrap_or_else(|| EnvFilter::new(self.default_log_level()))
    }
}
