//! View handles

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use bladeforge_templates::{render_view, CompiledTemplate, LoadedView, Result, ViewData};
use serde_json::Value;

use crate::factory::ViewFactory;

/// A resolved, compiled view bound to its data.
///
/// Obtained from [`ViewFactory::make`]. Rendering runs the composers for the
/// view name, then its creators on the first render of this handle only.
pub struct View<'f> {
    factory: &'f ViewFactory,
    name: String,
    path: PathBuf,
    template: Arc<CompiledTemplate>,
    data: ViewData,
    created: bool,
}

impl<'f> View<'f> {
    pub(crate) fn new(
        factory: &'f ViewFactory,
        name: impl Into<String>,
        path: PathBuf,
        template: Arc<CompiledTemplate>,
        data: ViewData,
    ) -> Self {
        Self {
            factory,
            name: name.into(),
            path,
            template,
            data,
            created: false,
        }
    }

    /// Name the view was requested by
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved source file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compiled template
    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }

    /// Factory that made this view
    pub fn factory(&self) -> &'f ViewFactory {
        self.factory
    }

    /// Data bound to the view
    pub fn data(&self) -> &ViewData {
        &self.data
    }

    /// Look up one variable
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Add a variable, replacing any previous value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Add every entry of `data`
    pub fn with_data(mut self, data: ViewData) -> Self {
        self.data.extend(data);
        self
    }

    /// Set a variable in place (for composers and creators)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Render the view to a string
    pub fn render(&mut self) -> Result<String> {
        self.prepare();
        let loaded = self.to_loaded();
        render_view(self.factory, loaded)
    }

    pub(crate) fn prepare(&mut self) {
        for composer in self.factory.composers().matching(&self.name) {
            composer(self);
        }
        if !self.created {
            self.created = true;
            for creator in self.factory.creators().matching(&self.name) {
                creator(self);
            }
        }
    }

    pub(crate) fn to_loaded(&self) -> LoadedView {
        LoadedView {
            name: self.name.clone(),
            template: self.template.clone(),
            data: self.data.clone(),
        }
    }
}

impl fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("data", &self.data)
            .field("created", &self.created)
            .finish()
    }
}
