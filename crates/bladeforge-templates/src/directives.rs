//! Directive registry
//!
//! Holds the custom directives and source extensions registered on a
//! compiler. The registry only grows: names cannot be re-registered and
//! built-in names are reserved.

use std::{collections::HashMap, fmt, sync::Arc};

use sha2::{Digest, Sha256};

use crate::error::{Result, TemplateError};

/// Bumped whenever the compiled node format changes
pub const COMPILER_FORMAT_VERSION: u32 = 1;

/// Custom directive handler: raw argument string in, template fragment out
pub type DirectiveHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Source-rewrite hook run over the whole template before compiling
pub type ExtensionHook = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Built-in directives that take a parenthesised argument
pub const DIRECTIVES_WITH_ARGS: &[&str] = &[
    "if",
    "elseif",
    "unless",
    "isset",
    "empty",
    "foreach",
    "forelse",
    "break",
    "continue",
    "include",
    "includeIf",
    "extends",
    "section",
    "yield",
    "json",
];

/// Built-in directives that never take an argument
pub const DIRECTIVES_WITHOUT_ARGS: &[&str] = &[
    "else",
    "endif",
    "endunless",
    "endisset",
    "endempty",
    "endforeach",
    "endforelse",
    "endsection",
    "stop",
    "show",
    "parent",
    "verbatim",
    "endverbatim",
];

/// Whether `name` is a built-in directive
pub fn is_builtin(name: &str) -> bool {
    DIRECTIVES_WITH_ARGS.contains(&name) || DIRECTIVES_WITHOUT_ARGS.contains(&name)
}

/// Custom directives and extensions of one compiler
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    handlers: HashMap<String, DirectiveHandler>,
    order: Vec<String>,
    extensions: Vec<ExtensionHook>,
    version: Option<String>,
}

impl DirectiveRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom directive
    pub fn register(&mut self, name: &str, handler: DirectiveHandler) -> Result<()> {
        if name.is_empty() || !name.chars().all(|c| c == '_' || c.is_alphanumeric()) {
            return Err(conflict(name, "name must consist of letters, digits and underscores"));
        }
        if is_builtin(name) {
            return Err(conflict(name, "name is reserved by a built-in directive"));
        }
        if self.handlers.contains_key(name) {
            return Err(conflict(name, "directive is already registered"));
        }

        self.handlers.insert(name.to_string(), handler);
        self.order.push(name.to_string());
        Ok(())
    }

    /// Add a source extension; extensions run in registration order
    pub fn extend(&mut self, hook: ExtensionHook) {
        self.extensions.push(hook);
    }

    /// Handler for a custom directive
    pub fn get(&self, name: &str) -> Option<&DirectiveHandler> {
        self.handlers.get(name)
    }

    /// Whether `name` is built-in or registered
    pub fn is_known(&self, name: &str) -> bool {
        is_builtin(name) || self.handlers.contains_key(name)
    }

    /// Custom directive names in registration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Set the caller's version of its directive handlers and extensions
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    /// Caller-supplied handler version
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Number of registered extensions
    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    /// Run every extension over `source`
    pub fn apply_extensions(&self, source: &str) -> String {
        self.extensions
            .iter()
            .fold(source.to_string(), |current, hook| hook(&current))
    }

    /// Hash of everything that influences compiled output.
    ///
    /// Handlers are identified by name only; a handler whose output changes
    /// under the same name needs a new [`set_version`](Self::set_version).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(COMPILER_FORMAT_VERSION.to_le_bytes());
        for name in &self.order {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update((self.extensions.len() as u64).to_le_bytes());
        if let Some(version) = &self.version {
            hasher.update([1u8]);
            hasher.update(version.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("directives", &self.order)
            .field("extensions", &self.extensions.len())
            .field("version", &self.version)
            .finish()
    }
}

fn conflict(name: &str, reason: &str) -> TemplateError {
    TemplateError::DirectiveConflict {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
