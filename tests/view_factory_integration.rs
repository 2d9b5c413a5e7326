//! Integration tests for view resolution and rendering through the facade
//!
//! Covers namespace resolution order, layout inheritance with sections,
//! circular layout detection, data precedence, composers and creators.

use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use bladeforge_templates::TemplateError;
use bladeforge_views::Blade;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn blade(views: &TempDir, cache: &TempDir) -> Blade {
    Blade::new([views.path()], cache.path())
}

#[test]
fn test_namespace_directories_resolve_in_registration_order() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(first.path(), "dash.blade.html", "from a");
    write(second.path(), "dash.blade.html", "from b");
    write(second.path(), "only_b.blade.html", "only b");

    let blade = blade(&views, &cache);
    blade.add_namespace("admin", [first.path(), second.path()]);
    assert_eq!(blade.render("admin::dash", Value::Null, Value::Null).unwrap(), "from a");
    assert_eq!(blade.render("admin::only_b", Value::Null, Value::Null).unwrap(), "only b");

    blade.prepend_namespace("admin", [second.path()]);
    assert_eq!(blade.render("admin::dash", Value::Null, Value::Null).unwrap(), "from b");

    let missing = blade.render("shop::dash", Value::Null, Value::Null).unwrap_err();
    assert!(missing.is_recoverable());
}

#[test]
fn test_layout_sections_and_parent() {
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(
        views.path(),
        "layouts/app.blade.html",
        "<title>@yield('title', 'Site')</title>\n<main>@yield('content')</main>\n@section('sidebar')[base]@show",
    );
    write(
        views.path(),
        "pages/home.blade.html",
        "@extends('layouts.app')\n@section('title', $title)\n@section('content')\nHello {{ $user }}\n@endsection\n@section('sidebar')@parent+extra @endsection",
    );

    let blade = blade(&views, &cache);
    let out = blade
        .render("pages.home", json!({"title": "Home & Co", "user": "<ada>"}), Value::Null)
        .unwrap();

    assert!(out.contains("<title>Home &amp; Co</title>"), "{out}");
    assert!(out.contains("Hello &lt;ada&gt;"), "{out}");
    assert!(out.contains("[base]+extra"), "{out}");
    assert!(!out.contains("@"), "{out}");
}

#[test]
fn test_circular_layouts_are_rejected() {
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(views.path(), "a.blade.html", "@extends('b')");
    write(views.path(), "b.blade.html", "@extends('c')");
    write(views.path(), "c.blade.html", "@extends('a')");

    let blade = blade(&views, &cache);
    match blade.make("a", Value::Null, Value::Null) {
        Err(TemplateError::CircularTemplateReference { chain }) => {
            assert_eq!(chain, vec!["a", "b", "c", "a"]);
        }
        other => panic!("expected CircularTemplateReference, got {other:?}"),
    }
}

#[test]
fn test_data_precedence() {
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(views.path(), "show.blade.html", "{{ $x }}");
    let blade = blade(&views, &cache);

    blade.share("x", "shared");
    assert_eq!(blade.render("show", Value::Null, Value::Null).unwrap(), "shared");
    assert_eq!(
        blade.render("show", Value::Null, json!({"x": "merge"})).unwrap(),
        "merge"
    );
    assert_eq!(
        blade
            .render("show", json!({"x": "data"}), json!({"x": "merge"}))
            .unwrap(),
        "data"
    );

    let view = blade.view("show", Value::Null).unwrap().with("x", "with");
    assert_eq!(view.get("x"), Some(&json!("with")));
}

#[test]
fn test_includes_see_parent_variables_and_shared_data() {
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(
        views.path(),
        "list.blade.html",
        "@foreach($items as $item)<@include('partials.item', ['suffix' => '!'])>@endforeach",
    );
    write(views.path(), "partials/item.blade.html", "{{ $prefix }}{{ $item }}{{ $suffix }}");

    let blade = blade(&views, &cache);
    blade.share("prefix", "#");
    let out = blade
        .render("list", json!({"items": ["a", "b"]}), Value::Null)
        .unwrap();
    assert_eq!(out, "<#a!><#b!>");
}

#[test]
fn test_composer_and_creator_order() {
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(views.path(), "admin/panel.blade.html", "{{ implode(',', $trail) }}");
    let blade = blade(&views, &cache);
    let creations = Arc::new(AtomicUsize::new(0));

    blade.composer(["admin.*"], |view| push_trail(view, "composer"));
    let counter = creations.clone();
    blade.creator(["admin.panel"], move |view| {
        counter.fetch_add(1, Ordering::SeqCst);
        push_trail(view, "creator");
    });

    let mut view = blade
        .make("admin.panel", json!({"trail": []}), Value::Null)
        .unwrap();
    assert_eq!(view.render().unwrap(), "composer,creator");
    assert_eq!(view.render().unwrap(), "composer,creator,composer");

    blade.render("admin.panel", json!({"trail": []}), Value::Null).unwrap();
    assert_eq!(creations.load(Ordering::SeqCst), 2);
}

fn push_trail(view: &mut bladeforge_views::View<'_>, entry: &str) {
    let mut trail = view.get("trail").cloned().unwrap_or_else(|| json!([]));
    if let Value::Array(items) = &mut trail {
        items.push(json!(entry));
    }
    view.set("trail", trail);
}

#[test]
fn test_render_errors_name_the_view_and_line() {
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write(views.path(), "broken.blade.html", "line one\n{{ $n / 0 }}");
    let blade = blade(&views, &cache);

    match blade.render("broken", json!({"n": 4}), Value::Null) {
        Err(TemplateError::RenderError { view, line, .. }) => {
            assert_eq!(view, "broken");
            assert_eq!(line, 2);
        }
        other => panic!("expected RenderError, got {other:?}"),
    }
}
