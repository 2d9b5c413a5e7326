//! # Bladeforge Views
//!
//! View factory for Bladeforge templates: resolves view names, compiles
//! templates through the compilation cache and renders them with shared
//! data, composers and creators.
//!
//! ```no_run
//! use bladeforge_views::Blade;
//! use serde_json::json;
//!
//! let blade = Blade::new(["views"], "cache");
//! blade.share("site", "Docs");
//! let html = blade.render("pages.home", json!({"title": "Welcome"}), json!(null))?;
//! # Ok::<(), bladeforge_templates::TemplateError>(())
//! ```

pub mod blade;
pub mod callbacks;
pub mod factory;
pub mod view;

pub use blade::Blade;
pub use callbacks::{CallbackRegistry, ViewCallback};
pub use factory::ViewFactory;
pub use view::View;

pub use bladeforge_templates::{Result, TemplateError, ViewData};
