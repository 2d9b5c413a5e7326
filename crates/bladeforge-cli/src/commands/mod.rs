// Command handlers for the blade CLI

pub mod check;
pub mod compile;
pub mod render;

pub use check::CheckCommand;
pub use compile::CompileCommand;
pub use render::RenderCommand;

use bladeforge_views::Blade;

use crate::error::CliResult;

/// Trait for command handlers
pub trait Command {
    /// Run against `blade`, returning the text to print
    fn execute(&self, blade: &Blade) -> CliResult<String>;
}
