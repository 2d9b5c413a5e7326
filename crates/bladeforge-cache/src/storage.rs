//! Cache storage backends

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{artifact::CompiledArtifact, CacheError, Result};

/// Extension of artifact files written by [`DiskStorage`]
const ARTIFACT_EXTENSION: &str = "json";

/// Storage backend for compiled artifacts, keyed by source path
pub trait ArtifactStorage<T>: Send + Sync {
    /// Retrieve the artifact stored for `key`
    fn get(&self, key: &Path) -> Result<Option<Arc<CompiledArtifact<T>>>>;

    /// Store an artifact, replacing any previous one
    fn set(&self, key: &Path, artifact: Arc<CompiledArtifact<T>>) -> Result<()>;

    /// Remove the artifact stored for `key`
    fn remove(&self, key: &Path) -> Result<bool>;

    /// Remove all artifacts
    fn clear(&self) -> Result<()>;

    /// Number of stored artifacts
    fn len(&self) -> Result<usize>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// In-memory artifact storage
pub struct MemoryStorage<T> {
    data: RwLock<HashMap<PathBuf, Arc<CompiledArtifact<T>>>>,
}

impl<T> MemoryStorage<T> {
    /// Create new in-memory storage
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> ArtifactStorage<T> for MemoryStorage<T> {
    fn get(&self, key: &Path) -> Result<Option<Arc<CompiledArtifact<T>>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &Path, artifact: Arc<CompiledArtifact<T>>) -> Result<()> {
        self.data.write().insert(key.to_path_buf(), artifact);
        Ok(())
    }

    fn remove(&self, key: &Path) -> Result<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.data.write().clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.data.read().len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Disk-based artifact storage.
///
/// Each artifact lives in `<base>/<sha256(source path)>.json`. Files that
/// cannot be read back are treated as absent and deleted.
pub struct DiskStorage {
    base_path: PathBuf,
    write_counter: AtomicU64,
}

impl DiskStorage {
    /// Create new disk storage with base path
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_counter: AtomicU64::new(0),
        }
    }

    /// Directory holding the artifact files
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get file path for a key
    pub fn key_path(&self, key: &Path) -> PathBuf {
        let digest = Sha256::digest(key.to_string_lossy().as_bytes());
        self.base_path
            .join(format!("{}.{}", hex::encode(digest), ARTIFACT_EXTENSION))
    }

    fn ensure_base_dir(&self) -> Result<()> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)?;
        }
        Ok(())
    }

    fn artifact_files(&self) -> Result<Vec<PathBuf>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn discard(&self, file_path: &Path, reason: &str) {
        warn!("Discarding unreadable cache file {}: {}", file_path.display(), reason);
        if let Err(e) = fs::remove_file(file_path) {
            debug!("Could not remove {}: {}", file_path.display(), e);
        }
    }
}

impl<T> ArtifactStorage<T> for DiskStorage
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, key: &Path) -> Result<Option<Arc<CompiledArtifact<T>>>> {
        let file_path = self.key_path(key);

        let json_data = match fs::read_to_string(&file_path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                self.discard(&file_path, &e.to_string());
                return Ok(None);
            }
        };

        match serde_json::from_str::<CompiledArtifact<T>>(&json_data) {
            Ok(artifact) if artifact.source_path == key => Ok(Some(Arc::new(artifact))),
            Ok(artifact) => {
                self.discard(
                    &file_path,
                    &format!("belongs to {}", artifact.source_path.display()),
                );
                Ok(None)
            }
            Err(e) => {
                self.discard(&file_path, &e.to_string());
                Ok(None)
            }
        }
    }

    fn set(&self, key: &Path, artifact: Arc<CompiledArtifact<T>>) -> Result<()> {
        self.ensure_base_dir()?;

        let file_path = self.key_path(key);
        let json_data =
            serde_json::to_string(artifact.as_ref()).map_err(|e| CacheError::Serialization {
                message: e.to_string(),
            })?;

        // Readers never observe a half-written file.
        let sequence = self.write_counter.fetch_add(1, Ordering::Relaxed);
        let temp_path =
            file_path.with_extension(format!("{}.{}.tmp", std::process::id(), sequence));
        fs::write(&temp_path, json_data)?;
        if let Err(e) = fs::rename(&temp_path, &file_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::Storage {
                path: file_path,
                message: e.to_string(),
            });
        }
        Ok(())
    }

    fn remove(&self, key: &Path) -> Result<bool> {
        let file_path = self.key_path(key);
        match fs::remove_file(&file_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<()> {
        for path in self.artifact_files()? {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.artifact_files()?.len())
    }

    fn name(&self) -> &str {
        "disk"
    }
}
