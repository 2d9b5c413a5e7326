//! Bladeforge configuration
//!
//! Loads [`BladeConfig`] from an optional TOML file, then applies overrides
//! from `BLADE_*` environment variables.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::{ConfigManager, DEFAULT_ENV_PREFIX};
pub use types::BladeConfig;
