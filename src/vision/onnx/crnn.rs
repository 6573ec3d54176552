// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! CRNN text recognizer
//!
//! Each crop is resized to the fixed network input (100x32 by default) and fed
//! as NHWC float. The output is per-timestep class scores; the last class is
//! the CTC blank.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ndarray::{ArrayViewD, IxDyn};
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::check_arity;
use crate::vision::errors::{ModelLoadError, RecognitionError};
use crate::vision::model_cache::ModelKind;
use crate::vision::ocr::capability::TextRecognizer;
use crate::vision::ocr::preprocessing::{resize_for_recognition, to_nhwc_tensor};

/// Default recognizer input width
pub const DEFAULT_INPUT_WIDTH: u32 = 100;

/// Default recognizer input height
pub const DEFAULT_INPUT_HEIGHT: u32 = 32;

/// Default dictionary file name inside the checkpoint directory
pub const DEFAULT_DICT_FILE: &str = "char_dict.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct CrnnConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub dict_file: String,
}

impl Default for CrnnConfig {
    fn default() -> Self {
        Self {
            input_width: DEFAULT_INPUT_WIDTH,
            input_height: DEFAULT_INPUT_HEIGHT,
            dict_file: DEFAULT_DICT_FILE.to_string(),
        }
    }
}

pub struct CrnnRecognizer {
    session: Mutex<Session>,
    input_name: String,
    dictionary: Vec<String>,
    config: CrnnConfig,
}

impl std::fmt::Debug for CrnnRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrnnRecognizer")
            .field("input_name", &self.input_name)
            .field("dictionary_size", &self.dictionary.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CrnnRecognizer {
    /// Wrap a restored session, checking it has a single output
    pub fn from_session(
        session: Session,
        model_path: &Path,
        dictionary: Vec<String>,
        config: CrnnConfig,
    ) -> Result<Self, ModelLoadError> {
        let input_name = check_arity(&session, ModelKind::Recognizer, model_path, 1)?;
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            dictionary,
            config,
        })
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }
}

impl TextRecognizer for CrnnRecognizer {
    fn transcribe(&self, crop: &RgbImage) -> Result<Vec<String>, RecognitionError> {
        let resized =
            resize_for_recognition(crop, self.config.input_width, self.config.input_height);
        let input = Value::from_array(to_nhwc_tensor(&resized))
            .map_err(|e| RecognitionError::Inference(format!("input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| RecognitionError::Inference("recognizer session poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input])
            .map_err(|e| RecognitionError::Inference(e.to_string()))?;
        let logits = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| RecognitionError::Inference(e.to_string()))?;

        let text = ctc_greedy_decode(&logits, &self.dictionary)?;
        Ok(vec![text])
    }
}

/// Load a character dictionary, one entry per line
///
/// Class `i` maps to line `i`; the blank class comes after the last entry.
pub fn load_dictionary(path: &Path) -> Result<Vec<String>, ModelLoadError> {
    let unreadable = |reason: String| ModelLoadError::RestoreFailed {
        kind: ModelKind::Recognizer,
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ModelLoadError::CheckpointNotFound {
                path: path.to_path_buf(),
            }
        } else {
            unreadable(format!("cannot open dictionary: {}", e))
        }
    })?;

    let mut dictionary = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| unreadable(format!("cannot read dictionary: {}", e)))?;
        let entry = line.trim_end_matches('\r');
        if !entry.is_empty() {
            dictionary.push(entry.to_string());
        }
    }

    if dictionary.is_empty() {
        return Err(unreadable("dictionary is empty".to_string()));
    }
    info!("Loaded character dictionary with {} entries", dictionary.len());
    Ok(dictionary)
}

/// Greedy CTC decoding: best class per step, repeats collapsed, blanks dropped
///
/// Accepts `[T, C]`, batch-major `[1, T, C]` or time-major `[T, 1, C]` output.
pub fn ctc_greedy_decode(
    logits: &ArrayViewD<f32>,
    dictionary: &[String],
) -> Result<String, RecognitionError> {
    let shape = logits.shape();
    let (steps, classes, index): (usize, usize, fn(usize, usize) -> IxDyn) = match shape {
        &[t, c] => (t, c, |t, c| IxDyn(&[t, c])),
        &[1, t, c] => (t, c, |t, c| IxDyn(&[0, t, c])),
        &[t, 1, c] => (t, c, |t, c| IxDyn(&[t, 0, c])),
        _ => {
            return Err(RecognitionError::Decode(format!(
                "unexpected output shape {:?}",
                shape
            )))
        }
    };
    if classes == 0 {
        return Err(RecognitionError::Decode("output has no classes".to_string()));
    }
    let blank = classes - 1;

    let mut text = String::new();
    let mut prev: Option<usize> = None;
    for t in 0..steps {
        let mut best = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..classes {
            let v = logits[index(t, c)];
            if v > best_score {
                best_score = v;
                best = c;
            }
        }

        if best != blank && Some(best) != prev {
            let entry = dictionary.get(best).ok_or_else(|| {
                RecognitionError::Decode(format!(
                    "class {} outside dictionary of {} entries",
                    best,
                    dictionary.len()
                ))
            })?;
            text.push_str(entry);
        }
        prev = (best != blank).then_some(best);
    }

    debug!("CTC decoded {} steps into {:?}", steps, text);
    Ok(text)
}
