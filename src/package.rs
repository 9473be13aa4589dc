// src/package.rs

//! Package records shared by the metadata client, resolver and orchestrator

use std::fmt;

/// Where a package record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PackageSource {
    /// A configured binary repository
    #[default]
    Sync,
    /// The local install database
    Local,
    /// The AUR (built from source)
    Aur,
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageSource::Sync => write!(f, "sync"),
            PackageSource::Local => write!(f, "local"),
            PackageSource::Aur => write!(f, "aur"),
        }
    }
}

/// Metadata for one package
///
/// Records are treated as immutable once built; several records may share
/// a `pkgbase` when they come from one split-package recipe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub description: String,
    pub url: String,
    pub pkgbase: Option<String>,
    pub repo: String,
    pub depends: Vec<String>,
    pub makedepends: Vec<String>,
    pub optdepends: Vec<String>,
    pub provides: Vec<String>,
    pub conflicts: Vec<String>,
    pub licenses: Vec<String>,
    pub maintainer: Option<String>,
    pub votes: i64,
    pub out_of_date: bool,
    pub source: PackageSource,
}

impl PackageRecord {
    /// Create a record with just a name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>, source: PackageSource) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source,
            ..Default::default()
        }
    }

    /// Key under which split packages share one recipe and one build
    pub fn group_key(&self) -> &str {
        match self.pkgbase.as_deref() {
            Some(base) if !base.is_empty() => base,
            _ => &self.name,
        }
    }

    /// Runtime and build-time dependencies, in declaration order
    ///
    /// Optional dependencies never take part in resolution.
    pub fn build_dependencies(&self) -> impl Iterator<Item = &String> {
        self.depends.iter().chain(self.makedepends.iter())
    }
}

/// Strip a version constraint from a dependency string
///
/// `"foo>=1.2"` becomes `"foo"`; strings without an operator are returned
/// unchanged.
pub fn strip_version(depstring: &str) -> &str {
    match depstring.find(['<', '>', '=']) {
        Some(pos) => &depstring[..pos],
        None => depstring,
    }
}

/// Classify a package name as building from a live VCS checkout
pub fn is_vcs_package(name: &str) -> bool {
    const VCS_SUFFIXES: [&str; 6] = ["-git", "-svn", "-hg", "-bzr", "-fossil", "-cvs"];
    VCS_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
