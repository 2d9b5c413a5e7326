//! Error types for template location, compilation and rendering

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while evaluating an embedded expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Variable is not defined in any scope
    #[error("Undefined variable ${0}")]
    UndefinedVariable(String),

    /// Property or key missing on an object
    #[error("Undefined array key \"{0}\"")]
    UndefinedKey(String),

    /// Index out of range on a list
    #[error("Undefined array key {0}")]
    UndefinedIndex(i64),

    /// Operation applied to a value of the wrong type
    #[error("{0}")]
    TypeMismatch(String),

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Built-in function called with bad arguments
    #[error("{function}(): {message}")]
    InvalidArgument {
        /// Function name
        function: String,
        /// What was wrong
        message: String,
    },
}

/// Errors that can occur while locating, compiling or rendering templates
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No file matched the view name
    #[error("View [{name}] not found{}", searched_suffix(.searched))]
    ViewNotFound {
        /// Requested view name
        name: String,
        /// Directories that were searched
        searched: Vec<PathBuf>,
    },

    /// Block directive without its counterpart, or unterminated echo/comment
    #[error("Unbalanced directive at line {line}: {message}")]
    UnbalancedDirective {
        /// Line number where the problem was detected
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// A view extends (directly or transitively) one of its own ancestors
    #[error("Circular template reference: {}", .chain.join(" -> "))]
    CircularTemplateReference {
        /// View names from the outermost view to the repeated one
        chain: Vec<String>,
    },

    /// Embedded expression could not be parsed
    #[error("Invalid expression `{expression}` at line {line}: {message}")]
    InvalidExpression {
        /// Expression source text
        expression: String,
        /// Line number of the expression
        line: usize,
        /// Parser message
        message: String,
    },

    /// Directive used with missing or malformed arguments
    #[error("Invalid @{name} directive at line {line}: {message}")]
    InvalidDirective {
        /// Directive name
        name: String,
        /// Line number of the directive
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// Custom directive kept expanding into itself
    #[error("Directive @{name} expanded more than {limit} levels deep")]
    DirectiveRecursion {
        /// Directive name
        name: String,
        /// Expansion depth limit
        limit: usize,
    },

    /// Directive name rejected by the registry
    #[error("Cannot register directive @{name}: {reason}")]
    DirectiveConflict {
        /// Directive name
        name: String,
        /// Why registration failed
        reason: String,
    },

    /// Evaluating an embedded expression failed
    #[error("Error rendering `{expression}` in view [{view}] at line {line}: {cause}")]
    RenderError {
        /// View being rendered
        view: String,
        /// Expression source text
        expression: String,
        /// Line number of the expression
        line: usize,
        /// Underlying evaluation failure
        #[source]
        cause: EvalError,
    },

    /// View data was not a key/value map
    #[error("Invalid view data: {0}")]
    InvalidData(String),

    /// Compilation cache write failed
    #[error("Cache error: {0}")]
    Cache(#[from] bladeforge_cache::CacheError),

    /// IO error
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl TemplateError {
    /// Whether callers can reasonably recover (e.g. by showing a fallback view)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TemplateError::ViewNotFound { .. })
    }

    /// I/O failure while accessing `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TemplateError::Io {
            path: path.into(),
            source,
        }
    }
}

fn searched_suffix(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        return String::new();
    }
    let dirs: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
    format!(" in [{}]", dirs.join(", "))
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_not_found_lists_searched_dirs() {
        let err = TemplateError::ViewNotFound {
            name: "home".to_string(),
            searched: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        assert_eq!(err.to_string(), "View [home] not found in [/a, /b]");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_circular_reference_message() {
        let err = TemplateError::CircularTemplateReference {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Circular template reference: a -> b -> a");
        assert!(!err.is_recoverable());
    }
}
