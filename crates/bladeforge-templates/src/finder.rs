//! Template source locator
//!
//! Maps logical view names (`admin.users.index`, `mail::welcome`) to files in
//! the configured view directories.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use tracing::trace;

use crate::error::{Result, TemplateError};

/// Separates a namespace from the view name
pub const HINT_PATH_DELIMITER: &str = "::";

/// Extensions tried for every view, in order
pub const DEFAULT_EXTENSIONS: &[&str] = &["blade.html", "blade.txt", "html", "txt"];

/// Inner extension that marks a file as template source
pub const DEFAULT_TEMPLATE_MARKER: &str = "blade";

#[derive(Debug, Clone)]
struct FinderState {
    paths: Vec<PathBuf>,
    hints: HashMap<String, Vec<PathBuf>>,
    extensions: Vec<String>,
    marker: String,
}

/// Resolves view names against directories and namespaces
#[derive(Debug)]
pub struct FileViewFinder {
    state: RwLock<FinderState>,
    found: RwLock<HashMap<String, PathBuf>>,
}

impl FileViewFinder {
    /// Create a finder searching `paths` in order
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            state: RwLock::new(FinderState {
                paths: paths.into_iter().map(|p| normalize_dir(p.into())).collect(),
                hints: HashMap::new(),
                extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
                marker: DEFAULT_TEMPLATE_MARKER.to_string(),
            }),
            found: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the extension list
    pub fn with_extensions<I, S>(self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.write().extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_string())
            .collect();
        self
    }

    /// Replace the template marker
    pub fn with_template_marker(self, marker: impl Into<String>) -> Self {
        self.state.write().marker = marker.into();
        self
    }

    /// Resolve a view name to an absolute file path
    pub fn find(&self, name: &str) -> Result<PathBuf> {
        let name = name.trim();
        if let Some(path) = self.found.read().get(name) {
            return Ok(path.clone());
        }

        let path = {
            let state = self.state.read();
            match name.split_once(HINT_PATH_DELIMITER) {
                Some((namespace, view)) => {
                    let Some(hinted) = state.hints.get(namespace) else {
                        return Err(TemplateError::ViewNotFound {
                            name: name.to_string(),
                            searched: Vec::new(),
                        });
                    };
                    let dirs: Vec<PathBuf> =
                        hinted.iter().chain(state.paths.iter()).cloned().collect();
                    find_in_paths(name, view, &dirs, &state.extensions)?
                }
                None => find_in_paths(name, name, &state.paths, &state.extensions)?,
            }
        };

        trace!(view = name, path = %path.display(), "Resolved view");
        self.found.write().insert(name.to_string(), path.clone());
        Ok(path)
    }

    /// Whether `name` resolves to a file
    pub fn exists(&self, name: &str) -> bool {
        self.find(name).is_ok()
    }

    /// Append a search directory
    pub fn add_location(&self, path: impl Into<PathBuf>) {
        self.state.write().paths.push(normalize_dir(path.into()));
        self.flush();
    }

    /// Prepend a search directory
    pub fn prepend_location(&self, path: impl Into<PathBuf>) {
        self.state.write().paths.insert(0, normalize_dir(path.into()));
        self.flush();
    }

    /// Append directories to a namespace
    pub fn add_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().map(|d| normalize_dir(d.into())).collect();
        self.state
            .write()
            .hints
            .entry(namespace.to_string())
            .or_default()
            .extend(dirs);
        self.flush();
    }

    /// Prepend directories to a namespace, keeping their order
    pub fn prepend_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut dirs: Vec<PathBuf> = dirs.into_iter().map(|d| normalize_dir(d.into())).collect();
        {
            let mut state = self.state.write();
            let existing = state.hints.entry(namespace.to_string()).or_default();
            dirs.append(existing);
            *existing = dirs;
        }
        self.flush();
    }

    /// Replace a namespace's directories
    pub fn replace_namespace<I, P>(&self, namespace: &str, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().map(|d| normalize_dir(d.into())).collect();
        self.state.write().hints.insert(namespace.to_string(), dirs);
        self.flush();
    }

    /// Register an extension, tried before the existing ones
    pub fn add_extension(&self, extension: &str) {
        let extension = extension.trim_start_matches('.').to_string();
        {
            let mut state = self.state.write();
            state.extensions.retain(|e| *e != extension);
            state.extensions.insert(0, extension);
        }
        self.flush();
    }

    /// Forget memoised lookups
    pub fn flush(&self) {
        self.found.write().clear();
    }

    /// Search directories, in order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.read().paths.clone()
    }

    /// Directories registered for a namespace
    pub fn namespace_paths(&self, namespace: &str) -> Vec<PathBuf> {
        self.state
            .read()
            .hints
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Extensions, in lookup order
    pub fn extensions(&self) -> Vec<String> {
        self.state.read().extensions.clone()
    }

    /// Whether the file at `path` is template source (`<stem>.<marker>.<ext>`)
    pub fn is_templated(&self, path: &Path) -> bool {
        let marker = self.state.read().marker.clone();
        has_marker(path, &marker)
    }
}

fn normalize_dir(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

fn has_marker(path: &Path, marker: &str) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let parts: Vec<&str> = file_name.split('.').collect();
    parts.len() >= 3 && parts[parts.len() - 2] == marker
}

fn find_in_paths(
    name: &str,
    view: &str,
    dirs: &[PathBuf],
    extensions: &[String],
) -> Result<PathBuf> {
    let not_found = || TemplateError::ViewNotFound {
        name: name.to_string(),
        searched: dirs.to_vec(),
    };
    if view.is_empty() || view.split('.').any(str::is_empty) {
        return Err(not_found());
    }

    let relative = view.replace('.', "/");
    for dir in dirs {
        for extension in extensions {
            let candidate = dir.join(format!("{relative}.{extension}"));
            if candidate.is_file() {
                return Ok(candidate.canonicalize().unwrap_or(candidate));
            }
        }
    }
    Err(not_found())
}
