// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime backend for the detector and recognizer capabilities
//!
//! Both models run on CPU. A checkpoint location may be either a model file or
//! a directory; see [`resolve_checkpoint`].

pub mod crnn;
pub mod east;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::{debug, info};

use crate::vision::errors::ModelLoadError;
use crate::vision::model_cache::ModelKind;
use crate::vision::ocr::capability::{ModelLoader, TextDetector, TextRecognizer};

pub use crnn::{CrnnConfig, CrnnRecognizer};
pub use east::{EastConfig, EastDetector};

/// Index file naming the current checkpoint inside a model directory
pub const CHECKPOINT_INDEX: &str = "checkpoint";

/// Model file used when a directory has no usable index
pub const DEFAULT_MODEL_FILE: &str = "model.onnx";

/// Default ONNX Runtime intra-op threads per session
pub const DEFAULT_INTRA_THREADS: usize = 4;

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    pub intra_threads: usize,
    pub east: EastConfig,
    pub crnn: CrnnConfig,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            intra_threads: DEFAULT_INTRA_THREADS,
            east: EastConfig::default(),
            crnn: CrnnConfig::default(),
        }
    }
}

/// Loads EAST detectors and CRNN recognizers from ONNX checkpoints
#[derive(Debug, Clone, Default)]
pub struct OnnxModelLoader {
    config: OnnxConfig,
}

impl OnnxModelLoader {
    pub fn new(config: OnnxConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load_detector(&self, checkpoint: &Path) -> Result<Arc<dyn TextDetector>, ModelLoadError> {
        let model_path = resolve_checkpoint(checkpoint)?;
        let session = build_session(ModelKind::Detector, &model_path, self.config.intra_threads)?;
        let detector = EastDetector::from_session(session, &model_path, self.config.east.clone())?;
        Ok(Arc::new(detector))
    }

    fn load_recognizer(
        &self,
        checkpoint: &Path,
    ) -> Result<Arc<dyn TextRecognizer>, ModelLoadError> {
        let model_path = resolve_checkpoint(checkpoint)?;
        let dict_path = model_dir(checkpoint, &model_path).join(&self.config.crnn.dict_file);
        let dictionary = crnn::load_dictionary(&dict_path)?;
        let session =
            build_session(ModelKind::Recognizer, &model_path, self.config.intra_threads)?;
        let recognizer = CrnnRecognizer::from_session(
            session,
            &model_path,
            dictionary,
            self.config.crnn.clone(),
        )?;
        Ok(Arc::new(recognizer))
    }
}

/// Resolve a checkpoint location to a concrete model file
///
/// A file path is used as-is. For a directory, the `checkpoint` index is read
/// first: the basename of its `model_checkpoint_path` entry is looked up inside
/// the directory, with and without an `.onnx` suffix. Without an index entry
/// the directory's `model.onnx` is used.
pub fn resolve_checkpoint(checkpoint: &Path) -> Result<PathBuf, ModelLoadError> {
    if checkpoint.as_os_str().is_empty() {
        return Err(ModelLoadError::EmptyPath);
    }
    if checkpoint.is_file() {
        return Ok(checkpoint.to_path_buf());
    }
    if !checkpoint.is_dir() {
        return Err(ModelLoadError::CheckpointNotFound {
            path: checkpoint.to_path_buf(),
        });
    }

    if let Some(name) = read_checkpoint_index(&checkpoint.join(CHECKPOINT_INDEX)) {
        let candidate = checkpoint.join(&name);
        if candidate.is_file() {
            debug!("Checkpoint index points at {}", candidate.display());
            return Ok(candidate);
        }
        let with_ext = checkpoint.join(format!("{}.onnx", name));
        if with_ext.is_file() {
            debug!("Checkpoint index points at {}", with_ext.display());
            return Ok(with_ext);
        }
    }

    let fallback = checkpoint.join(DEFAULT_MODEL_FILE);
    if fallback.is_file() {
        return Ok(fallback);
    }

    Err(ModelLoadError::CheckpointNotFound {
        path: checkpoint.to_path_buf(),
    })
}

/// Basename from a `model_checkpoint_path: "..."` line, if present
fn read_checkpoint_index(index: &Path) -> Option<String> {
    let contents = fs::read_to_string(index).ok()?;
    contents.lines().find_map(|line| {
        let value = line.trim().strip_prefix("model_checkpoint_path:")?;
        let value = value.trim().trim_matches('"');
        Path::new(value)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
    })
}

/// Directory holding the model's side files (dictionary)
fn model_dir(checkpoint: &Path, model_path: &Path) -> PathBuf {
    if checkpoint.is_dir() {
        checkpoint.to_path_buf()
    } else {
        model_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

fn restore_failed<E: std::fmt::Display>(
    kind: ModelKind,
    path: &Path,
) -> impl Fn(E) -> ModelLoadError + '_ {
    move |e| ModelLoadError::RestoreFailed {
        kind,
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// CPU-only ONNX Runtime session
fn build_session(
    kind: ModelKind,
    model_path: &Path,
    intra_threads: usize,
) -> Result<Session, ModelLoadError> {
    info!("Restoring {} from {}", kind, model_path.display());

    let session = Session::builder()
        .map_err(restore_failed(kind, model_path))?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .map_err(restore_failed(kind, model_path))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(restore_failed(kind, model_path))?
        .with_intra_threads(intra_threads.max(1))
        .map_err(restore_failed(kind, model_path))?
        .commit_from_file(model_path)
        .map_err(restore_failed(kind, model_path))?;

    debug!(
        "{} session: inputs {:?}, outputs {:?}",
        kind,
        session.inputs.iter().map(|i| &i.name).collect::<Vec<_>>(),
        session.outputs.iter().map(|o| &o.name).collect::<Vec<_>>()
    );
    Ok(session)
}

/// Check the input/output counts of a restored session
fn check_arity(
    session: &Session,
    kind: ModelKind,
    model_path: &Path,
    outputs: usize,
) -> Result<String, ModelLoadError> {
    let mismatch = |reason: String| ModelLoadError::ArchitectureMismatch {
        kind,
        path: model_path.to_path_buf(),
        reason,
    };

    let input = session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .ok_or_else(|| mismatch("model has no inputs".to_string()))?;

    if session.outputs.len() != outputs {
        return Err(mismatch(format!(
            "expected {} outputs, found {}",
            outputs,
            session.outputs.len()
        )));
    }
    Ok(input)
}
