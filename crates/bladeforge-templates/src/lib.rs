//! # Bladeforge Templates
//!
//! Blade-style template language: locating template files, compiling them to
//! a serializable node tree and rendering that tree against JSON view data.
//!
//! ## Features
//!
//! - **View finder**: dotted view names, `namespace::view` hints, ordered
//!   search paths and extensions
//! - **Compiler**: echoes, comments, conditionals, loops, includes, layouts
//!   with sections, custom directives and source extensions
//! - **Expressions**: a small PHP-flavoured language parsed at compile time
//! - **Renderer**: scoped loop variables with `$loop`, section inheritance and
//!   nested views loaded through [`ViewLoader`]

pub mod compiler;
pub mod directives;
pub mod error;
pub mod expression;
pub mod finder;
pub mod functions;
mod lexer;
pub mod nodes;
pub mod renderer;
pub mod value;

pub use compiler::{Compiler, MAX_BLOCK_DEPTH};
pub use directives::{DirectiveHandler, DirectiveRegistry, ExtensionHook};
pub use error::{EvalError, Result, TemplateError};
pub use expression::MAX_NESTING_DEPTH;
pub use finder::{FileViewFinder, DEFAULT_EXTENSIONS, DEFAULT_TEMPLATE_MARKER, HINT_PATH_DELIMITER};
pub use lexer::MAX_EXPANSION_DEPTH;
pub use nodes::{CompiledTemplate, Node, TemplateKind};
pub use renderer::{render_view, LoadedView, Renderer, ViewData, ViewLoader, MAX_VIEW_DEPTH};
