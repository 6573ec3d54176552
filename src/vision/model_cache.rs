// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded model cache with single-flight loading
//!
//! A key that is not loaded yet gets an in-flight attempt: a `OnceCell` that
//! every concurrent caller for the key awaits. The lock is only held to look up
//! or publish, so loads of different keys never block each other. Only
//! finished, successful loads enter the bounded LRU.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use super::errors::{ModelLoadError, OcrError};
use super::ocr::capability::{ModelLoader, TextDetector, TextRecognizer};

/// Default number of cached models
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Detector,
    Recognizer,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Detector => write!(f, "detector"),
            ModelKind::Recognizer => write!(f, "recognizer"),
        }
    }
}

/// Cache key: model kind plus checkpoint location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub kind: ModelKind,
    pub checkpoint: PathBuf,
}

impl ModelKey {
    pub fn new(kind: ModelKind, checkpoint: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            checkpoint: checkpoint.into(),
        }
    }
}

enum LoadedModel {
    Detector(Arc<dyn TextDetector>),
    Recognizer(Arc<dyn TextRecognizer>),
}

struct HandleInner {
    key: ModelKey,
    model: LoadedModel,
}

/// Cloneable reference to a loaded model
///
/// Clones share the same underlying capability; use [`ModelHandle::same_instance`]
/// to check identity.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("kind", &self.inner.key.kind)
            .field("checkpoint", &self.inner.key.checkpoint)
            .finish()
    }
}

impl ModelHandle {
    pub fn from_detector(checkpoint: impl Into<PathBuf>, detector: Arc<dyn TextDetector>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                key: ModelKey::new(ModelKind::Detector, checkpoint),
                model: LoadedModel::Detector(detector),
            }),
        }
    }

    pub fn from_recognizer(
        checkpoint: impl Into<PathBuf>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                key: ModelKey::new(ModelKind::Recognizer, checkpoint),
                model: LoadedModel::Recognizer(recognizer),
            }),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.inner.key.kind
    }

    pub fn checkpoint(&self) -> &Path {
        &self.inner.key.checkpoint
    }

    pub fn detector(&self) -> Result<&dyn TextDetector, OcrError> {
        match &self.inner.model {
            LoadedModel::Detector(d) => Ok(d.as_ref()),
            LoadedModel::Recognizer(_) => Err(OcrError::ModelKindMismatch {
                expected: ModelKind::Detector,
                actual: ModelKind::Recognizer,
            }),
        }
    }

    pub fn recognizer(&self) -> Result<&dyn TextRecognizer, OcrError> {
        match &self.inner.model {
            LoadedModel::Recognizer(r) => Ok(r.as_ref()),
            LoadedModel::Detector(_) => Err(OcrError::ModelKindMismatch {
                expected: ModelKind::Recognizer,
                actual: ModelKind::Detector,
            }),
        }
    }

    /// True when both handles came from the same load
    pub fn same_instance(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub failed_loads: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    failed_loads: AtomicU64,
    evictions: AtomicU64,
}

/// One load of a key, shared by every caller that arrives while it runs
type Attempt = Arc<OnceCell<Result<ModelHandle, ModelLoadError>>>;

/// Loaded handles live in the LRU; loads in progress live outside it and are
/// never evicted.
struct Slots {
    loaded: LruCache<ModelKey, ModelHandle>,
    loading: HashMap<ModelKey, Attempt>,
}

enum Lookup {
    Hit(ModelHandle),
    Pending(Attempt),
}

pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    slots: Mutex<Slots>,
    capacity: NonZeroUsize,
    counters: Counters,
}

impl ModelCache {
    /// Create a cache holding at most `capacity` models (minimum 1)
    pub fn new(loader: Arc<dyn ModelLoader>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            loader,
            slots: Mutex::new(Slots {
                loaded: LruCache::new(capacity),
                loading: HashMap::new(),
            }),
            capacity,
            counters: Counters::default(),
        }
    }

    /// Return the handle for `(kind, checkpoint)`, loading it on first use
    ///
    /// Concurrent callers for an uncached key share one load and all receive
    /// its outcome, including its error. A failed load leaves nothing behind,
    /// so a later call starts from scratch.
    pub async fn acquire(
        &self,
        kind: ModelKind,
        checkpoint: impl AsRef<Path>,
    ) -> Result<ModelHandle, ModelLoadError> {
        let checkpoint = checkpoint.as_ref();
        if checkpoint.as_os_str().is_empty() {
            return Err(ModelLoadError::EmptyPath);
        }
        let key = ModelKey::new(kind, checkpoint);

        let attempt = match self.lookup(&key).await {
            Lookup::Hit(handle) => return Ok(handle),
            Lookup::Pending(attempt) => attempt,
        };
        attempt
            .get_or_init(|| self.run_attempt(&key, &attempt))
            .await
            .clone()
    }

    /// Whether a loaded handle for the key is currently cached
    pub async fn contains(&self, kind: ModelKind, checkpoint: impl AsRef<Path>) -> bool {
        let key = ModelKey::new(kind, checkpoint.as_ref());
        self.slots.lock().await.loaded.contains(&key)
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.slots.lock().await.loaded.len();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            failed_loads: self.counters.failed_loads.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries,
            capacity: self.capacity.get(),
        }
    }

    async fn lookup(&self, key: &ModelKey) -> Lookup {
        let mut slots = self.slots.lock().await;
        if let Some(handle) = slots.loaded.get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Lookup::Hit(handle.clone());
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let attempt = slots
            .loading
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        Lookup::Pending(attempt)
    }

    /// Run the load for `attempt` and publish its outcome
    ///
    /// The attempt leaves `loading` and, on success, the handle enters the LRU
    /// under one lock, so a caller arriving afterwards either hits or starts a
    /// fresh attempt.
    async fn run_attempt(
        &self,
        key: &ModelKey,
        attempt: &Attempt,
    ) -> Result<ModelHandle, ModelLoadError> {
        let result = self.load(key.clone()).await;

        let mut slots = self.slots.lock().await;
        let current = slots
            .loading
            .get(key)
            .is_some_and(|pending| Arc::ptr_eq(pending, attempt));
        if current {
            slots.loading.remove(key);
        }
        if let Ok(handle) = &result {
            match slots.loaded.push(key.clone(), handle.clone()) {
                Some((evicted, _)) if evicted != *key => {
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Evicted {} {} from model cache",
                        evicted.kind,
                        evicted.checkpoint.display()
                    );
                }
                _ => {}
            }
        }
        result
    }

    async fn load(&self, key: ModelKey) -> Result<ModelHandle, ModelLoadError> {
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        info!("Loading {} from {}", key.kind, key.checkpoint.display());

        let loader = self.loader.clone();
        let task_key = key.clone();
        let joined = tokio::task::spawn_blocking(move || -> Result<ModelHandle, ModelLoadError> {
            let handle = match task_key.kind {
                ModelKind::Detector => {
                    let detector = loader.load_detector(&task_key.checkpoint)?;
                    ModelHandle::from_detector(task_key.checkpoint.clone(), detector)
                }
                ModelKind::Recognizer => {
                    let recognizer = loader.load_recognizer(&task_key.checkpoint)?;
                    ModelHandle::from_recognizer(task_key.checkpoint.clone(), recognizer)
                }
            };
            Ok(handle)
        })
        .await;

        let result = joined.unwrap_or_else(|e| {
            Err(ModelLoadError::RestoreFailed {
                kind: key.kind,
                path: key.checkpoint.clone(),
                reason: format!("load task failed: {}", e),
            })
        });

        match &result {
            Ok(_) => info!(
                "✅ Loaded {} from {} in {}ms",
                key.kind,
                key.checkpoint.display(),
                start.elapsed().as_millis()
            ),
            Err(e) => {
                self.counters.failed_loads.fetch_add(1, Ordering::Relaxed);
                warn!("⚠️ Failed to load {}: {}", key.kind, e);
            }
        }
        result
    }
}
