// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session result storage
//!
//! Every successful OCR request is written to its own directory under the
//! configured root:
//!
//! ```text
//! <root>/<session_id>/input.png
//! <root>/<session_id>/output.png
//! <root>/<session_id>/result.json
//! ```
//!
//! Sessions are write-once and complete: a failed write removes the session
//! directory. Nothing is kept in memory after `persist` returns.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::StorageError;
use super::illustration::draw_illustration;
use crate::vision::ocr::InferenceResult;

/// Default storage root, relative to the working directory
pub const DEFAULT_SAVE_DIR: &str = "static/results";

/// Files written for each session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Input,
    Output,
    Result,
}

impl Artifact {
    pub const ALL: [Artifact; 3] = [Artifact::Input, Artifact::Output, Artifact::Result];

    pub fn file_name(&self) -> &'static str {
        match self {
            Artifact::Input => "input.png",
            Artifact::Output => "output.png",
            Artifact::Result => "result.json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Artifact::Input | Artifact::Output => "image/png",
            Artifact::Result => "application/json",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

impl FromStr for Artifact {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Artifact::ALL
            .into_iter()
            .find(|a| a.file_name() == s)
            .ok_or_else(|| StorageError::UnknownArtifact(s.to_string()))
    }
}

#[derive(Serialize)]
struct PersistedResult<'a> {
    #[serde(flatten)]
    result: &'a InferenceResult,
    session_id: Uuid,
}

/// A session's `result.json`, read back
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredSession {
    #[serde(flatten)]
    pub result: InferenceResult,
    pub session_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.root.join(session_id.to_string())
    }

    pub fn artifact_path(&self, session_id: Uuid, artifact: Artifact) -> PathBuf {
        self.session_dir(session_id).join(artifact.file_name())
    }

    /// Write the three session artifacts and return the new session id
    ///
    /// Blocking; call from a blocking worker.
    pub fn persist(
        &self,
        image: &RgbImage,
        result: &InferenceResult,
    ) -> Result<Uuid, StorageError> {
        fs::create_dir_all(&self.root).map_err(|source| StorageError::CreateDir {
            path: self.root.clone(),
            source,
        })?;

        let session_id = Uuid::new_v4();
        self.persist_as(session_id, image, result)?;
        Ok(session_id)
    }

    /// Write a session under a caller-chosen id
    ///
    /// Fails with `SessionExists` if the directory is already present.
    pub fn persist_as(
        &self,
        session_id: Uuid,
        image: &RgbImage,
        result: &InferenceResult,
    ) -> Result<(), StorageError> {
        let dir = self.session_dir(session_id);
        fs::create_dir(&dir).map_err(|source| {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                StorageError::SessionExists { path: dir.clone() }
            } else {
                StorageError::CreateDir {
                    path: dir.clone(),
                    source,
                }
            }
        })?;

        if let Err(e) = Self::write_artifacts(&dir, session_id, image, result) {
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                warn!(
                    "Failed to remove incomplete session {}: {}",
                    dir.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        info!(
            "💾 Saved session {} ({} text lines)",
            session_id,
            result.text_lines.len()
        );
        Ok(())
    }

    fn write_artifacts(
        dir: &Path,
        session_id: Uuid,
        image: &RgbImage,
        result: &InferenceResult,
    ) -> Result<(), StorageError> {
        let input_path = dir.join(Artifact::Input.file_name());
        image
            .save_with_format(&input_path, ImageFormat::Png)
            .map_err(|source| StorageError::WriteImage {
                path: input_path.clone(),
                source,
            })?;

        let output_path = dir.join(Artifact::Output.file_name());
        draw_illustration(image, result.quads())
            .save_with_format(&output_path, ImageFormat::Png)
            .map_err(|source| StorageError::WriteImage {
                path: output_path.clone(),
                source,
            })?;

        let json_path = dir.join(Artifact::Result.file_name());
        let io_err = |source| StorageError::Io {
            path: json_path.clone(),
            source,
        };
        let file = File::create(&json_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(
            &mut writer,
            &PersistedResult {
                result,
                session_id,
            },
        )?;
        writer.flush().map_err(io_err)?;

        Ok(())
    }

    /// Read one artifact's bytes
    pub async fn read_artifact(
        &self,
        session_id: Uuid,
        artifact: Artifact,
    ) -> Result<Vec<u8>, StorageError> {
        let path = self.artifact_path(session_id, artifact);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Serving {} for session {}", artifact, session_id);
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Artifact {} missing for session {}", artifact, session_id);
                Err(StorageError::SessionNotFound(session_id))
            }
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Parse a session's `result.json`
    pub fn load_result(&self, session_id: Uuid) -> Result<StoredSession, StorageError> {
        let path = self.artifact_path(session_id, Artifact::Result);
        let file = File::open(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::SessionNotFound(session_id)
            } else {
                StorageError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
