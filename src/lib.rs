// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod host;
pub mod storage;
pub mod version;
pub mod vision;

pub use config::NodeConfig;
pub use host::HostInfo;
pub use storage::{ResultStore, StorageError};
pub use vision::ocr::{InferenceResult, Pipeline};
pub use vision::{ModelCache, OcrError};
