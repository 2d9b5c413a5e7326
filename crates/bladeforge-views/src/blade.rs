//! Blade facade

use std::path::{Path, PathBuf};

use bladeforge_cache::CompilationCache;
use bladeforge_config::BladeConfig;
use bladeforge_templates::{Compiler, FileViewFinder, Result, ViewData};
use serde_json::Value;
use tracing::debug;

use crate::{factory::ViewFactory, view::View};

/// Entry point bundling a configured [`ViewFactory`]
#[derive(Debug)]
pub struct Blade {
    factory: ViewFactory,
}

impl Blade {
    /// Engine searching `view_paths`, persisting compiled templates under
    /// `cache_path`
    pub fn new<I, P>(view_paths: I, cache_path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::with_factory(ViewFactory::new(
            FileViewFinder::new(view_paths),
            Compiler::new(),
            CompilationCache::with_disk(cache_path),
        ))
    }

    /// Wrap an existing factory
    pub fn with_factory(factory: ViewFactory) -> Self {
        Self { factory }
    }

    /// Build an engine from configuration
    pub fn from_config(config: &BladeConfig) -> Self {
        let finder = FileViewFinder::new(config.view_paths.iter().cloned())
            .with_extensions(config.extensions.iter().cloned())
            .with_template_marker(config.template_marker.clone());
        for (namespace, dirs) in &config.namespaces {
            finder.add_namespace(namespace, dirs.iter().cloned());
        }

        let compiler = Compiler::new();
        if let Some(version) = &config.compiler_version {
            compiler.set_version(version.clone());
        }

        let cache = if config.disk_cache {
            CompilationCache::with_disk(&config.cache_path)
        } else {
            CompilationCache::in_memory()
        };
        debug!(
            views = config.view_paths.len(),
            namespaces = config.namespaces.len(),
            disk_cache = config.disk_cache,
            "Configured engine"
        );
        Self::with_factory(ViewFactory::new(finder, compiler, cache))
    }

    /// The view factory
    pub fn factory(&self) -> &ViewFactory {
        &self.factory
    }

    /// The template compiler
    pub fn compiler(&self) -> &Compiler {
        self.factory.compiler()
    }

    /// Render `name` with `data` layered over `merge_data` and shared data
    pub fn render(&self, name: &str, data: Value, merge_data: Value) -> Result<String> {
        self.factory.render(name, data, merge_data)
    }

    /// Create a view handle
    pub fn make(&self, name: &str, data: Value, merge_data: Value) -> Result<View<'_>> {
        self.factory.make(name, data, merge_data)
    }

    /// Create a view handle without merge data
    pub fn view(&self, name: &str, data: Value) -> Result<View<'_>> {
        self.factory.view(name, data)
    }

    /// Whether `name` resolves to a file
    pub fn exists(&self, name: &str) -> bool {
        self.factory.exists(name)
    }

    /// Share a variable with every view
    pub fn share(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.factory.share(key, value);
    }

    /// Share every entry of `data`
    pub fn share_many(&self, data: ViewData) {
        self.factory.share_many(data);
    }

    /// Register a composer for `views`
    pub fn composer<I, S, F>(&self, views: I, callback: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&mut View<'_>) + Send + Sync + 'static,
    {
        self.factory.composer(views, callback);
    }

    /// Register a creator for `views`
    pub fn creator<I, S, F>(&self, views: I, callback: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&mut View<'_>) + Send + Sync + 'static,
    {
        self.factory.creator(views, callback);
    }

    /// Append directories to a namespace
    pub fn add_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.factory.add_namespace(namespace, dirs);
    }

    /// Put directories in front of a namespace
    pub fn prepend_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.factory.prepend_namespace(namespace, dirs);
    }

    /// Replace the directories of a namespace
    pub fn replace_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.factory.replace_namespace(namespace, dirs);
    }

    /// Append a default search path
    pub fn add_location(&self, path: impl Into<PathBuf>) {
        self.factory.add_location(path);
    }

    /// Register a custom directive
    pub fn directive<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.factory.directive(name, handler)
    }

    /// Register a source extension
    pub fn extend<F>(&self, hook: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.factory.extend(hook);
    }

    /// Precompile every templated file below `root`
    pub fn compile_all(&self, root: Option<&Path>) -> Result<Vec<PathBuf>> {
        self.factory.compile_all(root)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_disk_cache_survives_a_new_engine() {
        let views = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        fs::write(views.path().join("home.blade.html"), "Hi {{ $name }}").unwrap();

        let first = Blade::new([views.path()], cache.path());
        assert_eq!(first.render("home", json!({"name": "Ada"}), Value::Null).unwrap(), "Hi Ada");

        let second = Blade::new([views.path()], cache.path());
        assert_eq!(second.render("home", json!({"name": "Bo"}), Value::Null).unwrap(), "Hi Bo");
        let stats = second.factory().cache().stats();
        assert_eq!(stats.compilations, 0);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_compiler_version_rebuilds_persisted_templates() {
        let views = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        fs::write(views.path().join("price.blade.html"), "@money(5)").unwrap();

        let engine = |symbol: &'static str, version: &str| {
            let config = BladeConfig {
                view_paths: vec![views.path().to_path_buf()],
                cache_path: cache.path().to_path_buf(),
                compiler_version: Some(version.to_string()),
                ..Default::default()
            };
            let blade = Blade::from_config(&config);
            blade
                .directive("money", move |args| format!("{symbol}{{{{ {args} }}}}"))
                .unwrap();
            blade
        };

        let first = engine("$", "1");
        assert_eq!(first.render("price", Value::Null, Value::Null).unwrap(), "$5");

        let same_version = engine("EUR ", "1");
        assert_eq!(same_version.render("price", Value::Null, Value::Null).unwrap(), "$5");

        let bumped = engine("EUR ", "2");
        assert_eq!(bumped.render("price", Value::Null, Value::Null).unwrap(), "EUR 5");
        assert_eq!(bumped.factory().cache().stats().compilations, 1);
    }

    #[test]
    fn test_from_config() {
        let views = TempDir::new().unwrap();
        let mail = TempDir::new().unwrap();
        fs::write(views.path().join("page.tpl.htm"), "[{{ $x }}]").unwrap();
        fs::write(mail.path().join("welcome.tpl.htm"), "welcome").unwrap();

        let mut config = BladeConfig {
            view_paths: vec![views.path().to_path_buf()],
            extensions: vec!["tpl.htm".to_string()],
            template_marker: "tpl".to_string(),
            disk_cache: false,
            ..Default::default()
        };
        config
            .namespaces
            .insert("mail".to_string(), vec![mail.path().to_path_buf()]);

        let blade = Blade::from_config(&config);
        assert_eq!(blade.render("page", json!({"x": 1}), Value::Null).unwrap(), "[1]");
        assert_eq!(blade.render("mail::welcome", Value::Null, Value::Null).unwrap(), "welcome");
        assert!(blade.factory().cache().disk_path().is_none());
    }

    #[test]
    fn test_facade_delegates_registration() {
        let views = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        fs::write(views.path().join("page.blade.html"), "@upper('x') {{ $site }}").unwrap();

        let blade = Blade::new([views.path()], cache.path());
        blade.share("site", "docs");
        blade.directive("upper", |args| format!("{{{{ strtoupper({args}) }}}}")).unwrap();
        assert_eq!(blade.compiler().directive_names(), vec!["upper".to_string()]);
        assert_eq!(blade.render("page", Value::Null, Value::Null).unwrap(), "X docs");
        assert!(blade.exists("page"));
        assert!(!blade.exists("other"));
    }
}
