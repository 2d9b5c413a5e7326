// Bladeforge CLI library
// Argument parsing, engine setup and command handlers for the `blade` binary

pub mod commands;
pub mod error;
pub mod logging;
pub mod router;

pub use error::{CliError, CliResult};
pub use router::{Cli, CommandRouter, Commands};
