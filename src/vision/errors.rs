// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the OCR pipeline
//!
//! Every variant is fatal for the request that raised it. The only non-error
//! outcomes are an empty detection (no lines) and an empty crop (empty text).

use std::path::PathBuf;

use thiserror::Error;

use super::model_cache::ModelKind;
use crate::storage::StorageError;

/// Model acquisition failures. Never cached.
#[derive(Error, Debug, Clone)]
pub enum ModelLoadError {
    #[error("Checkpoint path is empty")]
    EmptyPath,

    #[error("No checkpoint found at {}", path.display())]
    CheckpointNotFound { path: PathBuf },

    #[error("Checkpoint at {} does not match the {kind} architecture: {reason}", path.display())]
    ArchitectureMismatch {
        kind: ModelKind,
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to restore {kind} from {}: {reason}", path.display())]
    RestoreFailed {
        kind: ModelKind,
        path: PathBuf,
        reason: String,
    },
}

/// Failures from the detector capability or its input
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid input image: {0}")]
    InvalidImage(String),

    #[error("Detection inference failed: {0}")]
    Inference(String),

    #[error("Box decoding failed: {0}")]
    Decode(String),
}

/// Failures from the recognizer capability
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Recognition inference failed: {0}")]
    Inference(String),

    #[error("Sequence decoding failed: {0}")]
    Decode(String),
}

/// Top-level error for one OCR request
#[derive(Error, Debug)]
pub enum OcrError {
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Expected a {expected} handle, got a {actual} handle")]
    ModelKindMismatch { expected: ModelKind, actual: ModelKind },
}
