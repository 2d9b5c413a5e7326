//! View factory
//!
//! Ties the finder, compiler and compilation cache together. The factory
//! resolves view names, serves compiled templates from the cache, binds view
//! data (shared data, merge data, call data) and loads nested views for the
//! renderer.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bladeforge_cache::{CompilationCache, CompiledArtifact, SourceState};
use bladeforge_templates::{
    Compiler, CompiledTemplate, FileViewFinder, LoadedView, Result, TemplateError, ViewData,
    ViewLoader,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    callbacks::{CallbackRegistry, ViewCallback},
    view::View,
};

/// Creates views from names and data
pub struct ViewFactory {
    finder: FileViewFinder,
    compiler: Compiler,
    cache: CompilationCache<Arc<CompiledTemplate>>,
    shared: RwLock<ViewData>,
    composers: CallbackRegistry,
    creators: CallbackRegistry,
}

impl ViewFactory {
    /// Create a factory from its parts
    pub fn new(
        finder: FileViewFinder,
        compiler: Compiler,
        cache: CompilationCache<Arc<CompiledTemplate>>,
    ) -> Self {
        Self {
            finder,
            compiler,
            cache,
            shared: RwLock::new(ViewData::new()),
            composers: CallbackRegistry::new(),
            creators: CallbackRegistry::new(),
        }
    }

    /// View finder
    pub fn finder(&self) -> &FileViewFinder {
        &self.finder
    }

    /// Template compiler
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Compilation cache
    pub fn cache(&self) -> &CompilationCache<Arc<CompiledTemplate>> {
        &self.cache
    }

    /// Resolve and compile `name`, binding `shared ∪ merge_data ∪ data`.
    ///
    /// `data` and `merge_data` must be JSON objects or null. Static
    /// `@extends` and `@include` dependencies are compiled as well; a layout
    /// chain that returns to one of its own views fails here.
    pub fn make(&self, name: &str, data: Value, merge_data: Value) -> Result<View<'_>> {
        let data = into_view_data(data)?;
        let merge_data = into_view_data(merge_data)?;

        let mut chain = Vec::new();
        let (path, template) = self.compile_tree(name, &mut chain)?;

        let mut context = self.shared.read().clone();
        context.extend(merge_data);
        context.extend(data);
        Ok(View::new(self, name, path, template, context))
    }

    /// [`make`](Self::make) without merge data
    pub fn view(&self, name: &str, data: Value) -> Result<View<'_>> {
        self.make(name, data, Value::Null)
    }

    /// Make and render `name` in one step
    pub fn render(&self, name: &str, data: Value, merge_data: Value) -> Result<String> {
        self.make(name, data, merge_data)?.render()
    }

    /// Whether `name` resolves to a file
    pub fn exists(&self, name: &str) -> bool {
        self.finder.exists(name)
    }

    /// Share a variable with every view
    pub fn share(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.shared.write().insert(key.into(), value.into());
    }

    /// Share every entry of `data`
    pub fn share_many(&self, data: ViewData) {
        self.shared.write().extend(data);
    }

    /// Snapshot of the shared data
    pub fn shared(&self) -> ViewData {
        self.shared.read().clone()
    }

    /// Run `callback` every time a matching view renders
    pub fn composer<I, S, F>(&self, views: I, callback: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&mut View<'_>) + Send + Sync + 'static,
    {
        let callback: ViewCallback = Arc::new(callback);
        self.composers.register(views, callback);
    }

    /// Run `callback` on the first render of every matching view
    pub fn creator<I, S, F>(&self, views: I, callback: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&mut View<'_>) + Send + Sync + 'static,
    {
        let callback: ViewCallback = Arc::new(callback);
        self.creators.register(views, callback);
    }

    pub(crate) fn composers(&self) -> &CallbackRegistry {
        &self.composers
    }

    pub(crate) fn creators(&self) -> &CallbackRegistry {
        &self.creators
    }

    /// Append directories to a namespace
    pub fn add_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.finder.add_namespace(namespace, dirs);
    }

    /// Put directories in front of a namespace
    pub fn prepend_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.finder.prepend_namespace(namespace, dirs);
    }

    /// Replace the directories of a namespace
    pub fn replace_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.finder.replace_namespace(namespace, dirs);
    }

    /// Append a default search path
    pub fn add_location(&self, path: impl Into<PathBuf>) {
        self.finder.add_location(path);
    }

    /// Put a default search path in front of the others
    pub fn prepend_location(&self, path: impl Into<PathBuf>) {
        self.finder.prepend_location(path);
    }

    /// Try `extension` before the configured ones
    pub fn add_extension(&self, extension: &str) {
        self.finder.add_extension(extension);
    }

    /// Register a custom directive.
    ///
    /// Templates compiled before the registration are recompiled on next use.
    pub fn directive<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.compiler.directive(name, handler)
    }

    /// Register a source extension
    pub fn extend<F>(&self, hook: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.compiler.extend(hook);
    }

    /// Compile every templated file below `root` into the cache.
    ///
    /// A file path compiles its directory; `None` compiles the first view
    /// path. Returns the compiled source paths, stopping at the first error.
    pub fn compile_all(&self, root: Option<&Path>) -> Result<Vec<PathBuf>> {
        let root = match root {
            Some(path) if path.is_file() => path.parent().unwrap_or(path).to_path_buf(),
            Some(path) => path.to_path_buf(),
            None => match self.finder.paths().into_iter().next() {
                Some(path) => path,
                None => return Ok(Vec::new()),
            },
        };

        let fingerprint = self.compiler.fingerprint();
        let mut compiled = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(&root, e))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !self.finder.is_templated(path) {
                continue;
            }

            let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            let state = SourceState::new(modified(&path)?, fingerprint.clone());
            let source = read_source(&path)?;
            let template = self.compiler.compile(&source)?;
            self.cache
                .store(CompiledArtifact::new(&path, &state, Arc::new(template)))?;
            debug!(path = %path.display(), "Precompiled template");
            compiled.push(path);
        }

        info!(
            root = %root.display(),
            count = compiled.len(),
            "Compiled templates"
        );
        Ok(compiled)
    }

    /// Resolve `name` and return its compiled template, from the cache when
    /// the cached artifact is still fresh
    pub fn load_template(&self, name: &str) -> Result<(PathBuf, Arc<CompiledTemplate>)> {
        let path = self.finder.find(name)?;
        if !self.finder.is_templated(&path) {
            let content = read_source(&path)?;
            return Ok((path, Arc::new(CompiledTemplate::from_static(content))));
        }

        let state = SourceState::new(modified(&path)?, self.compiler.fingerprint());
        let artifact = self.cache.get_or_compile(&path, &state, || {
            debug!(view = name, path = %path.display(), "Compiling template");
            let source = read_source(&path)?;
            self.compiler.compile(&source).map(Arc::new)
        })?;
        Ok((path, artifact.compiled.clone()))
    }

    /// Compile `name` and its static dependencies.
    ///
    /// `chain` holds the views currently being walked. Reaching one of them
    /// again through `@extends` is a cycle. Through `@include` it may be a
    /// guarded recursion, so the walk stops there and leaves the decision to
    /// the renderer's depth limit.
    fn compile_tree(
        &self,
        name: &str,
        chain: &mut Vec<String>,
    ) -> Result<(PathBuf, Arc<CompiledTemplate>)> {
        let (path, template) = self.load_template(name)?;
        chain.push(name.to_string());
        let walked = self.compile_dependencies(&template, chain);
        chain.pop();
        walked.map(|_| (path, template))
    }

    fn compile_dependencies(&self, template: &CompiledTemplate, chain: &mut Vec<String>) -> Result<()> {
        if let Some(layout) = &template.layout {
            if chain.contains(&layout.name) {
                let mut cycle = chain.clone();
                cycle.push(layout.name.clone());
                return Err(TemplateError::CircularTemplateReference { chain: cycle });
            }
            self.compile_tree(&layout.name, chain)?;
        }

        for include in &template.includes {
            if chain.contains(include) {
                continue;
            }
            // Missing includes may sit behind a condition or `@includeIf`
            match self.compile_tree(include, chain) {
                Ok(_) | Err(TemplateError::ViewNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl ViewLoader for ViewFactory {
    fn load_view(&self, name: &str, data: ViewData) -> Result<LoadedView> {
        let (path, template) = self.load_template(name)?;
        let mut context = self.shared.read().clone();
        context.extend(data);

        let mut view = View::new(self, name, path, template, context);
        view.prepare();
        Ok(view.to_loaded())
    }

    fn view_exists(&self, name: &str) -> bool {
        self.exists(name)
    }
}

impl std::fmt::Debug for ViewFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewFactory")
            .field("finder", &self.finder)
            .field("compiler", &self.compiler)
            .field("shared", &*self.shared.read())
            .field("composers", &self.composers)
            .field("creators", &self.creators)
            .finish()
    }
}

fn into_view_data(value: Value) -> Result<ViewData> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ViewData::new()),
        other => Err(TemplateError::InvalidData(format!(
            "view data must be an object, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn modified(path: &Path) -> Result<std::time::SystemTime> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| TemplateError::io(path, e))
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))
}

fn walk_error(root: &Path, err: walkdir::Error) -> TemplateError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
    TemplateError::io(path, source)
}
