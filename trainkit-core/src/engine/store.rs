//! Path-keyed checkpoint storage backends.
//!
//! Provides a trait-based abstraction over blob storage with two implementations:
//! - `InMemoryCheckpointStore`: a process-local map, the default backend.
//! - `FileCheckpointStore`: one file per path under a root directory, with a
//!   digest manifest that is checked on every load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::EngineError;
use crate::persistence;

/// Storage backend for encoded checkpoints.
///
/// `put` overwrites whatever was stored at `path`; `get` fails with
/// [`EngineError::CheckpointNotFound`] for a path that was never written.
pub trait CheckpointStore: Send + Sync + fmt::Debug {
    fn put(&self, path: &str, blob: &[u8]) -> Result<(), EngineError>;

    fn get(&self, path: &str) -> Result<Vec<u8>, EngineError>;

    fn contains(&self, path: &str) -> bool;
}

/// In-memory checkpoint store. Does not persist across process restarts.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn put(&self, path: &str, blob: &[u8]) -> Result<(), EngineError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), blob.to_vec());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, EngineError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::not_found(path))
    }

    fn contains(&self, path: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}

/// Manifest record for one stored checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub file: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
    pub saved_at: DateTime<Utc>,
}

const MANIFEST_FILE: &str = "manifest.json";
const CHECKPOINT_SUFFIX: &str = ".ckpt.json";

/// Filesystem checkpoint store rooted at a directory.
///
/// Checkpoint `runs/best` lands at `<root>/runs/best.ckpt.json`.
#[derive(Debug)]
pub struct FileCheckpointStore {
    root: PathBuf,
    manifest_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All manifest entries, ordered by path.
    pub fn list(&self) -> Result<Vec<ManifestEntry>, EngineError> {
        Ok(self.read_manifest()?.into_values().collect())
    }

    /// Manifest entry for `path`, looked up by its canonical key.
    pub fn entry(&self, path: &str) -> Result<Option<ManifestEntry>, EngineError> {
        let key = Self::canonical_key(path)?;
        Ok(self.read_manifest()?.remove(&key))
    }

    /// Normalized `a/b/c` form of `path`. Spellings such as `runs//best` and
    /// `runs/./best` share one key, file and manifest entry.
    fn canonical_key(path: &str) -> Result<String, EngineError> {
        let mut parts = Vec::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                    EngineError::InvalidPath {
                        path: path.to_string(),
                    }
                })?),
                Component::CurDir => {}
                _ => {
                    return Err(EngineError::InvalidPath {
                        path: path.to_string(),
                    });
                }
            }
        }
        if parts.is_empty() {
            return Err(EngineError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(parts.join("/"))
    }

    fn checkpoint_file(key: &str) -> PathBuf {
        PathBuf::from(format!("{key}{CHECKPOINT_SUFFIX}"))
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    fn read_manifest(&self) -> Result<BTreeMap<String, ManifestEntry>, EngineError> {
        let path = self.manifest_path();
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| EngineError::serialization(MANIFEST_FILE, e))
    }

    fn write_manifest(&self, manifest: &BTreeMap<String, ManifestEntry>) -> Result<(), EngineError> {
        let raw = serde_json::to_vec_pretty(manifest)
            .map_err(|e| EngineError::serialization(MANIFEST_FILE, e))?;
        persistence::atomic_write(&self.manifest_path(), &raw)?;
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn put(&self, path: &str, blob: &[u8]) -> Result<(), EngineError> {
        let key = Self::canonical_key(path)?;
        let file = Self::checkpoint_file(&key);
        let _guard = self
            .manifest_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        persistence::atomic_write(&self.root.join(&file), blob)?;

        let mut manifest = self.read_manifest()?;
        manifest.insert(
            key.clone(),
            ManifestEntry {
                path: key,
                file,
                sha256: persistence::sha256_hex(blob),
                size_bytes: blob.len() as u64,
                saved_at: Utc::now(),
            },
        );
        self.write_manifest(&manifest)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, EngineError> {
        let key = Self::canonical_key(path)?;
        let file = self.root.join(Self::checkpoint_file(&key));
        if !file.exists() {
            return Err(EngineError::not_found(path));
        }
        let blob = std::fs::read(&file)?;

        if let Some(entry) = self.read_manifest()?.remove(&key) {
            let actual = persistence::sha256_hex(&blob);
            if actual != entry.sha256 {
                return Err(EngineError::Integrity {
                    path: path.to_string(),
                    expected: entry.sha256,
                    actual,
                });
            }
        }
        Ok(blob)
    }

    fn contains(&self, path: &str) -> bool {
        Self::canonical_key(path)
            .map(|key| self.root.join(Self::checkpoint_file(&key)).exists())
            .unwrap_or(false)
    }
}
