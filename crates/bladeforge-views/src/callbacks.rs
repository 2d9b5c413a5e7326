//! Composer and creator registrations
//!
//! Callbacks are registered against view names or `*` wildcard patterns and
//! returned in registration order.

use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use regex::Regex;

use crate::view::View;

/// Callback run against a view before it renders
pub type ViewCallback = Arc<dyn Fn(&mut View<'_>) + Send + Sync>;

/// View name matcher
#[derive(Debug, Clone)]
enum ViewPattern {
    Exact(String),
    Wildcard(Regex),
}

impl ViewPattern {
    fn new(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if !pattern.contains('*') {
            return Self::Exact(pattern.to_string());
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        match Regex::new(&format!("^{body}$")) {
            Ok(regex) => Self::Wildcard(regex),
            Err(_) => Self::Exact(pattern.to_string()),
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Wildcard(regex) => regex.is_match(name),
        }
    }
}

struct Registration {
    pattern: ViewPattern,
    callback: ViewCallback,
}

/// Ordered list of view callbacks
#[derive(Default)]
pub struct CallbackRegistry {
    entries: RwLock<Vec<Registration>>,
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every pattern in `views`
    pub fn register<I, S>(&self, views: I, callback: ViewCallback)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = self.entries.write();
        for view in views {
            entries.push(Registration {
                pattern: ViewPattern::new(view.as_ref()),
                callback: callback.clone(),
            });
        }
    }

    /// Callbacks registered for `name`, in registration order.
    ///
    /// The callbacks are cloned out so they can run without holding the lock.
    pub fn matching(&self, name: &str) -> Vec<ViewCallback> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.pattern.matches(name))
            .map(|entry| entry.callback.clone())
            .collect()
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<String> = self
            .entries
            .read()
            .iter()
            .map(|entry| match &entry.pattern {
                ViewPattern::Exact(name) => name.clone(),
                ViewPattern::Wildcard(regex) => regex.as_str().to_string(),
            })
            .collect();
        f.debug_struct("CallbackRegistry")
            .field("patterns", &patterns)
            .finish()
    }
}
