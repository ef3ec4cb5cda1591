//! Filesystem discovery tests for `brewery_loader`.

use std::fs;
use std::path::Path;

use brewery_loader::{ComponentKind, ComponentLoader, Discovered, DiscoveryError, FsLoader};
use serde_json::json;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn locations(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn keyed_discovery_is_recursive_and_named_by_stem() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app/users/CreateUser.toml", "factory = \"CreateUser\"");
    write(dir.path(), "app/users/GetUser.usecase.json", "{}");
    write(dir.path(), "app/ListPosts.toml", "");

    let loader = FsLoader::new(dir.path());
    let found = loader
        .discover(ComponentKind::UseCase, &locations(&["app"]), true)
        .unwrap()
        .into_keyed();

    let mut names: Vec<_> = found.keys().cloned().collect();
    names.sort();
    assert_eq!(names, ["CreateUser", "GetUser", "ListPosts"]);
    assert_eq!(found["CreateUser"].str_field("factory"), Some("CreateUser"));
}

#[test]
fn later_location_wins_for_keyed_discovery() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "base/userRepository.toml", "model = \"User\"");
    write(dir.path(), "override/userRepository.toml", "model = \"Account\"");

    let loader = FsLoader::new(dir.path());
    let found = loader
        .discover(
            ComponentKind::Repository,
            &locations(&["base", "override"]),
            true,
        )
        .unwrap()
        .into_keyed();

    assert_eq!(found.len(), 1);
    assert_eq!(found["userRepository"].str_field("model"), Some("Account"));
}

#[test]
fn sequence_discovery_preserves_location_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "one/b.toml", "name = \"b\"");
    write(dir.path(), "one/a.toml", "name = \"a\"");
    write(dir.path(), "two/c.toml", "name = \"c\"");

    let loader = FsLoader::new(dir.path());
    let found = loader
        .discover(
            ComponentKind::ModelDefinition,
            &locations(&["two", "one"]),
            false,
        )
        .unwrap();

    let Discovered::Sequence(list) = found else {
        panic!("expected a sequence");
    };
    let names: Vec<_> = list
        .iter()
        .map(|descriptor| descriptor.manifest["name"].clone())
        .collect();
    assert_eq!(names, [json!("c"), json!("a"), json!("b")]);
    assert!(list.iter().all(|descriptor| descriptor.name.is_none()));
}

#[test]
fn hidden_entries_are_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "controllers/UsersController.toml", "");
    write(dir.path(), "controllers/.DS_Store", "junk");
    write(dir.path(), "controllers/.cache/stale.bin", "junk");

    let loader = FsLoader::new(dir.path());
    let found = loader
        .discover_kind(ComponentKind::Controller, &locations(&["controllers"]))
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[test]
fn stray_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "middleware/auth.toml", "");
    write(dir.path(), "middleware/notes.txt", "remember the milk");

    let loader = FsLoader::new(dir.path());
    let err = loader
        .discover(ComponentKind::Middleware, &locations(&["middleware"]), true)
        .unwrap_err();

    match err {
        DiscoveryError::InvalidEntry { path, location } => {
            assert!(path.ends_with("notes.txt"));
            assert_eq!(location, "middleware");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_and_empty_locations_name_the_location() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("empty/nested")).unwrap();

    let loader = FsLoader::new(dir.path());

    let err = loader
        .discover(ComponentKind::DatasourceSpec, &locations(&["nowhere"]), false)
        .unwrap_err();
    assert_eq!(err.location(), Some("nowhere"));
    assert!(matches!(err, DiscoveryError::MissingLocation { .. }));

    let err = loader
        .discover(ComponentKind::DatasourceSpec, &locations(&["empty"]), false)
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::EmptyLocation { ref location } if location == "empty"));
}

#[test]
fn no_locations_discovers_nothing() {
    let dir = TempDir::new().unwrap();
    let loader = FsLoader::new(dir.path());
    let found = loader
        .discover_kind(ComponentKind::Middleware, &[])
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn single_file_location_loads_router() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/router.toml", "factory = \"api\"");

    let loader = FsLoader::new(dir.path());
    let router = loader
        .load_single(ComponentKind::Router, "src/router.toml")
        .unwrap();
    assert_eq!(router.name.as_deref(), Some("router"));
    assert_eq!(router.str_field("factory"), Some("api"));

    write(dir.path(), "src/router.txt", "");
    let err = loader
        .load_single(ComponentKind::Router, "src/router.txt")
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidEntry { .. }));
}

#[test]
fn absolute_locations_ignore_root() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "datasources/main.json", r#"{ "name": "db", "connector": "memory" }"#);

    let loader = FsLoader::new("/definitely/not/here");
    let absolute = dir.path().join("datasources");
    let found = loader
        .discover(
            ComponentKind::DatasourceSpec,
            &[absolute.to_string_lossy().into_owned()],
            false,
        )
        .unwrap()
        .into_sequence();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].str_field("connector"), Some("memory"));
}
