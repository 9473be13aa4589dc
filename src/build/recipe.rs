// src/build/recipe.rs

//! Static inspection of PKGBUILD recipes
//!
//! Reads the top-level `epoch=`, `pkgver=` and `pkgrel=` assignments without
//! evaluating the script. A recipe with a `pkgver()` function computes its
//! version at build time, so its static fields may be stale.

use std::path::Path;

/// Recipe file name inside a package group's working copy
pub const RECIPE_FILE: &str = "PKGBUILD";

/// Version declared by the static fields, as `[epoch:]pkgver[-pkgrel]`
///
/// Returns `None` when there is no `pkgver=` assignment.
pub fn static_version(recipe: &str) -> Option<String> {
    let mut epoch = None;
    let mut pkgver = None;
    let mut pkgrel = None;

    for line in recipe.lines() {
        let line = line.trim_start();
        if line.starts_with('#') {
            continue;
        }
        if pkgver.is_none() {
            pkgver = assignment(line, "pkgver");
        }
        if pkgrel.is_none() {
            pkgrel = assignment(line, "pkgrel");
        }
        if epoch.is_none() {
            epoch = assignment(line, "epoch");
        }
    }

    let pkgver = pkgver?;
    let mut version = match epoch {
        Some(epoch) if epoch != "0" => format!("{epoch}:{pkgver}"),
        _ => pkgver,
    };
    if let Some(pkgrel) = pkgrel {
        version.push('-');
        version.push_str(&pkgrel);
    }
    Some(version)
}

/// Read the static version from a recipe file on disk
pub fn static_version_of(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| static_version(&text))
}

/// Whether the recipe computes its version with `pkgver()`
pub fn has_dynamic_version(recipe: &str) -> bool {
    recipe.contains("pkgver()")
}

fn assignment(line: &str, key: &str) -> Option<String> {
    let value = line.strip_prefix(key)?.strip_prefix('=')?;
    let value = value.trim_end();
    let value = value.strip_prefix(['\'', '"']).unwrap_or(value);
    let value = value.strip_suffix(['\'', '"']).unwrap_or(value);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
