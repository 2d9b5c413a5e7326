//! Compilation cache with memory and disk tiers

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::{
    artifact::{CompiledArtifact, SourceState},
    metrics::{CacheMetrics, CacheStats},
    storage::{ArtifactStorage, DiskStorage, MemoryStorage},
    strategy::{InvalidationStrategy, SourceChangeStrategy},
    Result,
};

/// Cache of compiled templates keyed by absolute source path.
///
/// The memory tier is always present; the disk tier survives restarts.
/// Lookups never fail: unreadable disk entries count as misses.
pub struct CompilationCache<T> {
    memory: MemoryStorage<T>,
    disk: Option<DiskStorage>,
    strategy: Arc<dyn InvalidationStrategy>,
    metrics: CacheMetrics,
    compile_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl<T> CompilationCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Create a memory-only cache
    pub fn in_memory() -> Self {
        CacheBuilder::new().build()
    }

    /// Create a cache persisting artifacts under `dir`
    pub fn with_disk(dir: impl AsRef<Path>) -> Self {
        CacheBuilder::new().disk_path(dir).build()
    }

    /// Get cache metrics
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Directory of the disk tier, if any
    pub fn disk_path(&self) -> Option<&Path> {
        self.disk.as_ref().map(DiskStorage::base_path)
    }

    /// Return the stored artifact for `path` if it was built from `state`.
    ///
    /// Stale entries are removed from every tier.
    pub fn get_fresh(&self, path: &Path, state: &SourceState) -> Option<Arc<CompiledArtifact<T>>> {
        if let Ok(Some(artifact)) = self.memory.get(path) {
            if self.is_stale(&artifact, state) {
                debug!(
                    strategy = self.strategy.name(),
                    "Memory entry for {} is stale",
                    path.display()
                );
                let _ = self.memory.remove(path);
                self.metrics.record_invalidation();
            } else {
                self.metrics.record_hit();
                return Some(artifact);
            }
        }

        if let Some(disk) = &self.disk {
            match ArtifactStorage::<T>::get(disk, path) {
                Ok(Some(artifact)) if !self.is_stale(&artifact, state) => {
                    debug!(
                        tier = ArtifactStorage::<T>::name(disk),
                        "Loaded {} from disk cache",
                        path.display()
                    );
                    let _ = self.memory.set(path, artifact.clone());
                    self.metrics.record_hit();
                    return Some(artifact);
                }
                Ok(Some(_)) => {
                    debug!(
                        strategy = self.strategy.name(),
                        "Disk entry for {} is stale",
                        path.display()
                    );
                    let _ = ArtifactStorage::<T>::remove(disk, path);
                    self.metrics.record_invalidation();
                }
                Ok(None) => {}
                Err(e) => warn!("Disk cache lookup failed for {}: {}", path.display(), e),
            }
        }

        self.metrics.record_miss();
        None
    }

    /// Return a fresh artifact for `path`, compiling it when needed.
    ///
    /// Callers racing on the same path serialize on a per-path lock, so a
    /// stale template is compiled and written once.
    pub fn get_or_compile<F, E>(
        &self,
        path: &Path,
        state: &SourceState,
        compile: F,
    ) -> std::result::Result<Arc<CompiledArtifact<T>>, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let lock = self.compile_lock(path);
        let _guard = lock.lock();

        if let Some(artifact) = self.get_fresh(path, state) {
            return Ok(artifact);
        }

        let compiled = compile()?;
        self.metrics.record_compilation();
        Ok(self.put(CompiledArtifact::new(path, state, compiled)))
    }

    /// Store `artifact` unconditionally, replacing any previous entry
    pub fn store(&self, artifact: CompiledArtifact<T>) -> Result<Arc<CompiledArtifact<T>>> {
        let path = artifact.source_path.clone();
        let lock = self.compile_lock(&path);
        let _guard = lock.lock();

        let artifact = Arc::new(artifact);
        self.memory.set(&path, artifact.clone())?;
        if let Some(disk) = &self.disk {
            disk.set(&path, artifact.clone())?;
        }
        self.metrics.record_compilation();
        Ok(artifact)
    }

    /// Remove the entry for `path` from every tier
    pub fn remove(&self, path: &Path) -> Result<bool> {
        let mut removed = self.memory.remove(path)?;
        if let Some(disk) = &self.disk {
            removed |= ArtifactStorage::<T>::remove(disk, path)?;
        }
        Ok(removed)
    }

    /// Remove every entry from every tier
    pub fn clear(&self) -> Result<()> {
        self.memory.clear()?;
        if let Some(disk) = &self.disk {
            ArtifactStorage::<T>::clear(disk)?;
        }
        self.compile_locks.lock().clear();
        Ok(())
    }

    /// Number of entries in the memory tier
    pub fn len(&self) -> usize {
        self.memory.len().unwrap_or(0)
    }

    /// Whether the memory tier is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot cache statistics
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len())
    }

    fn put(&self, artifact: CompiledArtifact<T>) -> Arc<CompiledArtifact<T>> {
        let path = artifact.source_path.clone();
        let artifact = Arc::new(artifact);
        let _ = self.memory.set(&path, artifact.clone());

        // A failed disk write only costs a recompile in the next process.
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.set(&path, artifact.clone()) {
                warn!("Failed to persist compiled {}: {}", path.display(), e);
            }
        }
        artifact
    }

    fn is_stale(&self, artifact: &CompiledArtifact<T>, state: &SourceState) -> bool {
        self.strategy
            .should_invalidate(artifact.source_modified, &artifact.fingerprint, state)
    }

    fn compile_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.compile_locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }
}

/// Builder for [`CompilationCache`]
#[derive(Default)]
pub struct CacheBuilder {
    disk_path: Option<PathBuf>,
    strategy: Option<Arc<dyn InvalidationStrategy>>,
}

impl CacheBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist artifacts under `path`
    pub fn disk_path(mut self, path: impl AsRef<Path>) -> Self {
        self.disk_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set invalidation strategy
    pub fn strategy(mut self, strategy: Arc<dyn InvalidationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Build the cache
    pub fn build<T>(self) -> CompilationCache<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        CompilationCache {
            memory: MemoryStorage::new(),
            disk: self.disk_path.map(DiskStorage::new),
            strategy: self
                .strategy
                .unwrap_or_else(|| Arc::new(SourceChangeStrategy::new())),
            metrics: CacheMetrics::new(),
            compile_locks: Mutex::new(HashMap::new()),
        }
    }
}
