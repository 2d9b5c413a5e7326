// Check that a view compiles

use bladeforge_views::Blade;
use serde_json::Value;

use super::Command;
use crate::error::CliResult;

/// Compile a view and its static dependencies without rendering it
pub struct CheckCommand {
    view: String,
}

impl CheckCommand {
    pub fn new(view: impl Into<String>) -> Self {
        Self { view: view.into() }
    }
}

impl Command for CheckCommand {
    fn execute(&self, blade: &Blade) -> CliResult<String> {
        let view = blade.make(&self.view, Value::Null, Value::Null)?;
        let dependencies = view.template().dependencies().count();
        Ok(format!(
            "{}: ok ({}, {} direct dependencies)",
            self.view,
            view.path().display(),
            dependencies
        ))
    }
}
