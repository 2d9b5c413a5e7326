// CLI error types

use bladeforge_config::ConfigError;
use bladeforge_templates::TemplateError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Invalid view data: {0}")]
    Data(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
