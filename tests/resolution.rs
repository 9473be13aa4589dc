// tests/resolution.rs

//! Dependency resolution against in-memory metadata and install state.

mod common;

use common::{FakeAur, FakeDb, aur};
use pmt::progress::{CallbackProgress, SilentProgress};
use pmt::{BuildPlan, DependencyResolver, PackageRecord, ResolveError};
use std::collections::HashMap;
use std::sync::Mutex;

fn names(order: &[PackageRecord]) -> Vec<&str> {
    order.iter().map(|r| r.name.as_str()).collect()
}

#[test]
fn test_installed_versioned_dependency_is_satisfied() {
    let metadata = FakeAur::new().with(aur("foo", "1.0-1", &["bar>=1.0"]));
    let db = FakeDb::new().installed("bar", "1.2-1");

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let resolution = resolver.resolve("foo", &SilentProgress).unwrap();

    assert_eq!(resolution.satisfied_deps, vec!["bar>=1.0".to_string()]);
    assert_eq!(names(&resolution.build_order), vec!["foo"]);
    assert!(resolution.repo_deps.is_empty());
}

#[test]
fn test_too_old_installed_version_is_not_satisfied() {
    let metadata = FakeAur::new()
        .with(aur("foo", "1.0-1", &["bar>=2.0"]))
        .with(aur("bar", "2.1-1", &[]));
    let db = FakeDb::new().installed("bar", "1.2-1");

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let resolution = resolver.resolve("foo", &SilentProgress).unwrap();

    assert!(resolution.satisfied_deps.is_empty());
    assert_eq!(names(&resolution.build_order), vec!["bar", "foo"]);
}

#[test]
fn test_virtual_dependency_resolved_through_provider() {
    let mut thing = aur("thing-git", "r10.abc-1", &[]);
    thing.provides = vec!["libthing=2.0".to_string()];
    let metadata = FakeAur::new()
        .with(aur("foo", "1.0-1", &["libthing"]))
        .with(thing);
    let db = FakeDb::new();

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let resolution = resolver.resolve("foo", &SilentProgress).unwrap();

    assert_eq!(names(&resolution.build_order), vec!["thing-git", "foo"]);
    assert_eq!(*metadata.provider_calls.lock().unwrap(), vec!["libthing".to_string()]);
}

#[test]
fn test_repository_dependencies_are_not_built() {
    let mut foo = aur("foo", "1.0-1", &["glibc", "python>=3"]);
    foo.makedepends = vec!["cmake".to_string()];
    let metadata = FakeAur::new().with(foo);
    let db = FakeDb::new()
        .installed("glibc", "2.39-1")
        .in_repo("python")
        .in_repo("cmake");

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let resolution = resolver.resolve("foo", &SilentProgress).unwrap();

    assert_eq!(names(&resolution.build_order), vec!["foo"]);
    assert_eq!(resolution.satisfied_deps, vec!["glibc".to_string()]);
    assert_eq!(
        resolution.repo_deps,
        vec!["python>=3".to_string(), "cmake".to_string()]
    );
}

#[test]
fn test_cycle_is_reported() {
    let metadata = FakeAur::new()
        .with(aur("a", "1-1", &["b"]))
        .with(aur("b", "1-1", &["a"]));
    let db = FakeDb::new();

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let err = resolver.resolve("a", &SilentProgress).unwrap_err();

    match err {
        ResolveError::Cycle { name } => assert!(name == "a" || name == "b"),
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn test_optional_cycle_is_ignored() {
    let mut a = aur("a", "1-1", &[]);
    a.optdepends = vec!["b: extra features".to_string()];
    let b = aur("b", "1-1", &["a"]);
    let metadata = FakeAur::new().with(a).with(b);
    let db = FakeDb::new();

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let resolution = resolver.resolve("b", &SilentProgress).unwrap();
    assert_eq!(names(&resolution.build_order), vec!["a", "b"]);
}

#[test]
fn test_missing_dependency_names_requirer() {
    let metadata = FakeAur::new()
        .with(aur("foo", "1.0-1", &["bar"]))
        .with(aur("bar", "1.0-1", &["nowhere>=1"]));
    let db = FakeDb::new();

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let err = resolver.resolve("foo", &SilentProgress).unwrap_err();

    assert_eq!(
        err,
        ResolveError::Unresolvable {
            dependency: "nowhere>=1".to_string(),
            required_by: "bar".to_string(),
        }
    );
}

#[test]
fn test_unknown_root_is_not_found() {
    let metadata = FakeAur::new();
    let db = FakeDb::new();
    let mut resolver = DependencyResolver::new(&metadata, &db);
    assert_eq!(
        resolver.resolve("ghost", &SilentProgress).unwrap_err(),
        ResolveError::NotFound {
            name: "ghost".to_string()
        }
    );
}

#[test]
fn test_installed_root_is_up_to_date() {
    let metadata = FakeAur::new().with(aur("foo", "1.0-1", &["bar"]));
    let db = FakeDb::new().installed("foo", "1.0-1");

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let resolution = resolver.resolve("foo", &SilentProgress).unwrap();
    assert!(resolution.is_up_to_date());
    assert!(BuildPlan::from_resolution(resolution).summary("foo").is_up_to_date());
}

#[test]
fn test_split_packages_build_once() {
    let mut liba = aur("liba", "2.0-1", &[]);
    liba.pkgbase = Some("libs".to_string());
    let mut libb = aur("libb", "2.0-1", &[]);
    libb.pkgbase = Some("libs".to_string());
    let metadata = FakeAur::new()
        .with(aur("app", "1.0-1", &["liba", "libb"]))
        .with(liba)
        .with(libb);
    let db = FakeDb::new();

    let messages = Mutex::new(Vec::new());
    let progress = CallbackProgress::new(|m: &str| messages.lock().unwrap().push(m.to_string()));
    let mut resolver = DependencyResolver::new(&metadata, &db);
    let resolution = resolver.resolve("app", &progress).unwrap();

    assert_eq!(names(&resolution.build_order), vec!["liba", "app"]);
    assert!(
        messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m == "Skipping libb (split package, already building libs)")
    );
}

#[test]
fn test_resolution_is_idempotent() {
    let mut c = aur("c", "1-1", &["zlib"]);
    c.makedepends = vec!["go".to_string()];
    let metadata = FakeAur::new()
        .with(aur("a", "1-1", &["b", "c"]))
        .with(aur("b", "1-1", &["c", "glibc"]))
        .with(c);
    let db = FakeDb::new().installed("glibc", "2.39-1").in_repo("zlib").in_repo("go");

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let first = resolver.resolve("a", &SilentProgress).unwrap();
    let second = resolver.resolve("a", &SilentProgress).unwrap();
    assert_eq!(first, second);

    let mut fresh = DependencyResolver::new(&metadata, &db);
    assert_eq!(fresh.resolve("a", &SilentProgress).unwrap(), first);
}

#[test]
fn test_failed_resolution_does_not_leak_into_next_call() {
    let metadata = FakeAur::new()
        .with(aur("broken", "1-1", &["shared", "missing"]))
        .with(aur("shared", "1-1", &[]))
        .with(aur("ok", "1-1", &["shared"]));
    let db = FakeDb::new();

    let mut resolver = DependencyResolver::new(&metadata, &db);
    assert!(resolver.resolve("broken", &SilentProgress).is_err());

    let resolution = resolver.resolve("ok", &SilentProgress).unwrap();
    assert_eq!(names(&resolution.build_order), vec!["shared", "ok"]);
}

/// Every source dependency of an entry comes before it in the build order
#[test]
fn test_build_order_is_topological() {
    let graph: &[(&str, &[&str])] = &[
        ("top", &["left", "right", "base-devel"]),
        ("left", &["shared", "leaf1"]),
        ("right", &["shared", "leaf2>=1.0"]),
        ("shared", &["leaf1", "openssl"]),
        ("leaf1", &[]),
        ("leaf2", &["leaf1"]),
    ];
    let mut metadata = FakeAur::new();
    for (name, deps) in graph {
        metadata = metadata.with(aur(name, "1.0-1", deps));
    }
    let db = FakeDb::new().in_repo("base-devel").installed("openssl", "3.2-1");

    let mut resolver = DependencyResolver::new(&metadata, &db);
    let resolution = resolver.resolve("top", &SilentProgress).unwrap();

    let position: HashMap<&str, usize> = resolution
        .build_order
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.as_str(), i))
        .collect();
    assert_eq!(position.len(), graph.len());
    for record in &resolution.build_order {
        for dep in &record.depends {
            let dep_name = pmt::package::strip_version(dep);
            if let Some(&dep_pos) = position.get(dep_name) {
                assert!(
                    dep_pos < position[record.name.as_str()],
                    "{dep_name} must come before {}",
                    record.name
                );
            }
        }
    }
    assert_eq!(resolution.build_order.last().unwrap().name, "top");
}

#[test]
fn test_dependencies_fetched_in_one_batch() {
    let metadata = FakeAur::new()
        .with(aur("top", "1-1", &["a", "b", "c"]))
        .with(aur("a", "1-1", &[]))
        .with(aur("b", "1-1", &["a"]))
        .with(aur("c", "1-1", &[]));
    let db = FakeDb::new();

    let mut resolver = DependencyResolver::new(&metadata, &db);
    resolver.resolve("top", &SilentProgress).unwrap();

    // "top" by info, then a, b and c once each in a single batch
    assert_eq!(metadata.info_count(), 4);
}
