// Render a view

use std::path::PathBuf;

use bladeforge_views::Blade;
use serde_json::Value;
use tracing::debug;

use super::Command;
use crate::error::{CliError, CliResult};

/// Render one view with data from the command line
pub struct RenderCommand {
    view: String,
    data: Option<String>,
    data_file: Option<PathBuf>,
}

impl RenderCommand {
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            data: None,
            data_file: None,
        }
    }

    /// Inline JSON data
    pub fn with_data(mut self, data: Option<String>) -> Self {
        self.data = data;
        self
    }

    /// JSON data file
    pub fn with_data_file(mut self, path: Option<PathBuf>) -> Self {
        self.data_file = path;
        self
    }

    fn load_data(&self) -> CliResult<Value> {
        let raw = match (&self.data, &self.data_file) {
            (Some(json), _) => json.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => return Ok(Value::Null),
        };

        match serde_json::from_str(&raw)? {
            value @ (Value::Object(_) | Value::Null) => Ok(value),
            _ => Err(CliError::InvalidArgument {
                message: "view data must be a JSON object".to_string(),
            }),
        }
    }
}

impl Command for RenderCommand {
    fn execute(&self, blade: &Blade) -> CliResult<String> {
        let data = self.load_data()?;
        let output = blade.render(&self.view, data, Value::Null)?;

        let stats = blade.factory().cache().stats();
        debug!(
            hits = stats.hits,
            compilations = stats.compilations,
            hit_rate = stats.hit_rate(),
            "Rendered {}",
            self.view
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_data_must_be_an_object() {
        let command = RenderCommand::new("home").with_data(Some("[1, 2]".to_string()));
        assert!(matches!(
            command.load_data(),
            Err(CliError::InvalidArgument { .. })
        ));

        let command = RenderCommand::new("home").with_data(Some("{oops".to_string()));
        assert!(matches!(command.load_data(), Err(CliError::Data(_))));
    }

    #[test]
    fn test_data_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"{"items": ["a", "b"]}"#).unwrap();
        fs::write(
            dir.path().join("list.blade.html"),
            "@foreach($items as $item){{ $item }};@endforeach",
        )
        .unwrap();

        let blade = Blade::new([dir.path()], dir.path().join("cache"));
        let output = RenderCommand::new("list")
            .with_data_file(Some(path))
            .execute(&blade)
            .unwrap();
        assert_eq!(output, "a;b;");
    }
}
