//! Cached compilation output and the source stamp it was built from

use std::{path::PathBuf, time::SystemTime};

use serde::{Deserialize, Serialize};

/// State of a template source at lookup time.
///
/// An artifact is only served when it was built from exactly this state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceState {
    /// Current modification time of the source file
    pub modified: SystemTime,
    /// Fingerprint of the compiler that would build the artifact now
    pub fingerprint: String,
}

impl SourceState {
    /// Create a new source state
    pub fn new(modified: SystemTime, fingerprint: impl Into<String>) -> Self {
        Self {
            modified,
            fingerprint: fingerprint.into(),
        }
    }
}

/// Compiled output of one template source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledArtifact<T> {
    /// Absolute path of the source file
    pub source_path: PathBuf,
    /// Source modification time at compile time
    pub source_modified: SystemTime,
    /// Fingerprint of the compiler that produced `compiled`
    pub fingerprint: String,
    /// When the artifact was built
    pub compiled_at: SystemTime,
    /// The compiled output
    pub compiled: T,
}

impl<T> CompiledArtifact<T> {
    /// Create an artifact for `source_path` built from `state`
    pub fn new(source_path: impl Into<PathBuf>, state: &SourceState, compiled: T) -> Self {
        Self {
            source_path: source_path.into(),
            source_modified: state.modified,
            fingerprint: state.fingerprint.clone(),
            compiled_at: SystemTime::now(),
            compiled,
        }
    }
}
