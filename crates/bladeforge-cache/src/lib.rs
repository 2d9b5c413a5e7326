//! # Bladeforge Cache
//!
//! Compilation cache for Bladeforge templates. Compiled artifacts are keyed by
//! the absolute path of their source file and stamped with the source
//! modification time and the compiler fingerprint they were built with.
//!
//! ## Features
//!
//! - **Two tiers**: an in-memory map and an optional on-disk store (one JSON
//!   file per template, named after a SHA-256 of the source path)
//! - **Freshness checks**: entries whose stamp no longer matches the source are
//!   dropped and rebuilt, never served
//! - **Per-path locking**: concurrent callers compiling the same stale template
//!   compile it once
//! - **Metrics**: hit, miss, invalidation and compilation counters

pub mod artifact;
pub mod cache;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod strategy;

pub use artifact::{CompiledArtifact, SourceState};
pub use cache::{CacheBuilder, CompilationCache};
pub use error::CacheError;
pub use metrics::{CacheMetrics, CacheStats};
pub use storage::{ArtifactStorage, DiskStorage, MemoryStorage};
pub use strategy::{InvalidationStrategy, SourceChangeStrategy};

/// Re-export commonly used types
pub type Result<T> = std::result::Result<T, CacheError>;
