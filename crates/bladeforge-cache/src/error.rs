//! Cache-related error types

use std::path::PathBuf;

use thiserror::Error;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Storage error at {path}: {message}")]
    Storage { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
