//! Property-based tests for compilation cache freshness
//!
//! A compiled template is only reused while its source modification time and
//! the compiler's directive registry are unchanged. A newer source always
//! regenerates, in memory and on disk.

use std::{
    fs::{self, File},
    path::Path,
    time::{Duration, SystemTime},
};

use bladeforge_views::Blade;
use proptest::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn write_at(path: &Path, content: &str, secs: u64) {
    fs::write(path, content).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000 + secs))
        .unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_render_reflects_latest_source(
        versions in prop::collection::vec("[a-z ]{1,20}", 1..5),
    ) {
        let views = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let path = views.path().join("page.blade.html");
        let blade = Blade::new([views.path()], cache.path());

        for (step, content) in versions.iter().enumerate() {
            write_at(&path, content, step as u64);
            let rendered = blade.render("page", Value::Null, Value::Null).unwrap();
            prop_assert_eq!(&rendered, content);
        }
        prop_assert_eq!(blade.factory().cache().stats().compilations, versions.len() as u64);
    }

    #[test]
    fn prop_unchanged_source_compiles_once(renders in 1usize..6) {
        let views = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_at(&views.path().join("page.blade.html"), "{{ 1 + 1 }}", 0);
        let blade = Blade::new([views.path()], cache.path());

        for _ in 0..renders {
            prop_assert_eq!(blade.render("page", Value::Null, Value::Null).unwrap(), "2");
        }
        let stats = blade.factory().cache().stats();
        prop_assert_eq!(stats.compilations, 1);
        prop_assert_eq!(stats.hits, renders as u64 - 1);
    }
}

#[test]
fn test_stale_disk_entry_is_not_served_to_a_new_engine() {
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let path = views.path().join("page.blade.html");

    write_at(&path, "old", 0);
    let first = Blade::new([views.path()], cache.path());
    assert_eq!(first.render("page", Value::Null, Value::Null).unwrap(), "old");

    write_at(&path, "new", 10);
    let second = Blade::new([views.path()], cache.path());
    assert_eq!(second.render("page", Value::Null, Value::Null).unwrap(), "new");
    assert_eq!(second.factory().cache().stats().invalidations, 1);
}

#[test]
fn test_directive_registration_invalidates_compiled_templates() {
    let views = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_at(&views.path().join("page.blade.html"), "<@datetime($when)>", 0);

    let blade = Blade::new([views.path()], cache.path());
    blade.compile_all(None).unwrap();
    assert_eq!(
        blade.render("page", Value::Null, Value::Null).unwrap(),
        "<@datetime($when)>"
    );

    blade
        .directive("datetime", |args| format!("{{{{ {args} ?? 'now' }}}}"))
        .unwrap();
    assert_eq!(blade.render("page", Value::Null, Value::Null).unwrap(), "<now>");
}
