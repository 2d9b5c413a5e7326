// Precompile templates into the cache

use std::path::PathBuf;

use bladeforge_views::Blade;

use super::Command;
use crate::error::CliResult;

/// Compile every template below a directory
pub struct CompileCommand {
    path: Option<PathBuf>,
}

impl CompileCommand {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl Command for CompileCommand {
    fn execute(&self, blade: &Blade) -> CliResult<String> {
        let compiled = blade.compile_all(self.path.as_deref())?;
        let noun = if compiled.len() == 1 { "template" } else { "templates" };
        Ok(format!("Compiled {} {}", compiled.len(), noun))
    }
}
