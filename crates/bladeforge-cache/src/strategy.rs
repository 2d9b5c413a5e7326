//! Cache invalidation strategies

use std::time::SystemTime;

use crate::artifact::SourceState;

/// Decides whether a stored artifact may still be served
pub trait InvalidationStrategy: Send + Sync {
    /// Check if an artifact built at `source_modified` with `fingerprint`
    /// must be rebuilt for the source in `current`
    fn should_invalidate(
        &self,
        source_modified: SystemTime,
        fingerprint: &str,
        current: &SourceState,
    ) -> bool;

    /// Get strategy name for debugging
    fn name(&self) -> &str;
}

/// Source change detection strategy.
///
/// Any difference in modification time invalidates, not only a newer one: a
/// file restored from a backup has an older mtime but different content. A
/// different compiler fingerprint invalidates too.
#[derive(Debug, Clone, Default)]
pub struct SourceChangeStrategy;

impl SourceChangeStrategy {
    /// Create a strategy that checks both mtime and compiler fingerprint
    pub fn new() -> Self {
        Self
    }
}

impl InvalidationStrategy for SourceChangeStrategy {
    fn should_invalidate(
        &self,
        source_modified: SystemTime,
        fingerprint: &str,
        current: &SourceState,
    ) -> bool {
        source_modified != current.modified || fingerprint != current.fingerprint
    }

    fn name(&self) -> &str {
        "source_change"
    }
}
