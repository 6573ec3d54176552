// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! Everything is read once at startup from environment variables (a `.env`
//! file is honored by the binary) and then passed explicitly to the cache,
//! pipeline and store.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::storage::DEFAULT_SAVE_DIR;
use crate::vision::model_cache::DEFAULT_CACHE_CAPACITY;
use crate::vision::ocr::detection::DEFAULT_MIN_EDGE_PX;
use crate::vision::ocr::preprocessing::DEFAULT_MAX_SIDE_LEN;
use crate::vision::ocr::DetectionConfig;
use crate::vision::onnx::crnn::{DEFAULT_DICT_FILE, DEFAULT_INPUT_HEIGHT, DEFAULT_INPUT_WIDTH};
use crate::vision::onnx::{CrnnConfig, EastConfig, OnnxConfig, DEFAULT_INTRA_THREADS};

pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 8769;

/// HTTP listener
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Model locations and runtime
#[derive(Debug, Clone, PartialEq)]
pub struct ModelsConfig {
    /// EAST checkpoint file or directory
    pub east_model_dir: PathBuf,
    /// CRNN checkpoint file or directory
    pub crnn_model_dir: PathBuf,
    /// Maximum number of cached models
    pub cache_capacity: usize,
    /// ONNX Runtime intra-op threads per session
    pub intra_threads: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub max_side_len: u32,
    pub min_edge_px: f64,
    pub score_thresh: f32,
    pub box_thresh: f32,
    pub nms_thresh: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionSettings {
    pub input_width: u32,
    pub input_height: u32,
    pub dict_file: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub server: ServerConfig,
    /// Root directory for session artifacts
    pub save_dir: PathBuf,
    pub models: ModelsConfig,
    pub detection: DetectionSettings,
    pub recognition: RecognitionSettings,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl NodeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server: ServerConfig {
                host: env::var("API_HOST").unwrap_or(defaults.server.host),
                port: env_or("API_PORT", defaults.server.port),
            },
            save_dir: env::var("OCR_SAVE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.save_dir),
            models: ModelsConfig {
                east_model_dir: env::var("EAST_MODEL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.models.east_model_dir),
                crnn_model_dir: env::var("CRNN_MODEL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.models.crnn_model_dir),
                cache_capacity: env_or("MODEL_CACHE_CAPACITY", defaults.models.cache_capacity),
                intra_threads: env_or("ORT_INTRA_THREADS", defaults.models.intra_threads),
            },
            detection: DetectionSettings {
                max_side_len: env_or("OCR_MAX_SIDE_LEN", defaults.detection.max_side_len),
                min_edge_px: env_or("OCR_MIN_EDGE_PX", defaults.detection.min_edge_px),
                score_thresh: env_or("EAST_SCORE_THRESH", defaults.detection.score_thresh),
                box_thresh: env_or("EAST_BOX_THRESH", defaults.detection.box_thresh),
                nms_thresh: env_or("EAST_NMS_THRESH", defaults.detection.nms_thresh),
            },
            recognition: RecognitionSettings {
                input_width: env_or("CRNN_INPUT_WIDTH", defaults.recognition.input_width),
                input_height: env_or("CRNN_INPUT_HEIGHT", defaults.recognition.input_height),
                dict_file: env::var("CRNN_DICT_FILE").unwrap_or(defaults.recognition.dict_file),
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("API port must be greater than 0".to_string());
        }
        if self.save_dir.as_os_str().is_empty() {
            return Err("Save directory must not be empty".to_string());
        }
        if self.models.east_model_dir.as_os_str().is_empty() {
            return Err("EAST model directory must not be empty".to_string());
        }
        if self.models.crnn_model_dir.as_os_str().is_empty() {
            return Err("CRNN model directory must not be empty".to_string());
        }
        if self.models.cache_capacity == 0 {
            return Err("Model cache capacity must be greater than 0".to_string());
        }
        if self.models.intra_threads == 0 {
            return Err("ORT intra threads must be greater than 0".to_string());
        }
        if self.detection.max_side_len < 32 {
            return Err("Max side length must be at least 32".to_string());
        }
        if self.detection.min_edge_px.is_nan() || self.detection.min_edge_px < 0.0 {
            return Err("Minimum edge length must be non-negative".to_string());
        }
        for (name, value) in [
            ("score", self.detection.score_thresh as f64),
            ("box", self.detection.box_thresh as f64),
            ("NMS", self.detection.nms_thresh),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("EAST {} threshold must be within [0, 1]", name));
            }
        }
        if self.recognition.input_width == 0 || self.recognition.input_height == 0 {
            return Err("CRNN input size must be non-zero".to_string());
        }
        if self.recognition.dict_file.is_empty() {
            return Err("CRNN dictionary file must not be empty".to_string());
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn detection_config(&self) -> DetectionConfig {
        DetectionConfig {
            max_side_len: self.detection.max_side_len,
            min_edge_px: self.detection.min_edge_px,
        }
    }

    pub fn onnx_config(&self) -> OnnxConfig {
        OnnxConfig {
            intra_threads: self.models.intra_threads,
            east: EastConfig {
                score_thresh: self.detection.score_thresh,
                box_thresh: self.detection.box_thresh,
                nms_thresh: self.detection.nms_thresh,
            },
            crnn: CrnnConfig {
                input_width: self.recognition.input_width,
                input_height: self.recognition.input_height,
                dict_file: self.recognition.dict_file.clone(),
            },
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        let east = EastConfig::default();
        Self {
            server: ServerConfig {
                host: DEFAULT_API_HOST.to_string(),
                port: DEFAULT_API_PORT,
            },
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            models: ModelsConfig {
                east_model_dir: PathBuf::from("models/east"),
                crnn_model_dir: PathBuf::from("models/crnn"),
                cache_capacity: DEFAULT_CACHE_CAPACITY,
                intra_threads: DEFAULT_INTRA_THREADS,
            },
            detection: DetectionSettings {
                max_side_len: DEFAULT_MAX_SIDE_LEN,
                min_edge_px: DEFAULT_MIN_EDGE_PX,
                score_thresh: east.score_thresh,
                box_thresh: east.box_thresh,
                nms_thresh: east.nms_thresh,
            },
            recognition: RecognitionSettings {
                input_width: DEFAULT_INPUT_WIDTH,
                input_height: DEFAULT_INPUT_HEIGHT,
                dict_file: DEFAULT_DICT_FILE.to_string(),
            },
        }
    }
}
