// src/resolver/mod.rs

//! Dependency resolution for source packages
//!
//! Given a package name, walk its `depends` and `makedepends` depth-first
//! and classify every edge as already installed, provided by a binary
//! repository, or needing a source build. Source builds come out in
//! post-order (dependencies first) with split packages collapsed onto the
//! first member of their group.
//!
//! Edge classification, in precedence order:
//! 1. satisfied by installed packages
//! 2. available in a binary repository
//! 3. a source package with that exact name
//! 4. a source package whose `provides` names it
//!
//! Anything else fails the resolution.

mod plan;

pub use plan::{BuildPlan, PlanSummary, Resolution};

use crate::alpm::PackageDatabase;
use crate::error::ResolveError;
use crate::package::{PackageRecord, strip_version};
use crate::progress::ProgressSink;
use crate::rpc::MetadataSource;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Traversal status of one package name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// On the current recursion path
    InProgress,
    /// Fully resolved
    Done,
}

/// Working state of one `resolve` call
///
/// Reset at the start of every call, so after a failure it still describes
/// how far the failed call got.
#[derive(Debug, Default)]
pub struct ResolutionState {
    nodes: HashMap<String, NodeState>,
    build_order: Vec<PackageRecord>,
    repo_deps: Vec<String>,
    satisfied_deps: Vec<String>,
    records: HashMap<String, PackageRecord>,
    /// Virtual name to provider; `None` caches "no provider"
    providers: HashMap<String, Option<String>>,
}

impl ResolutionState {
    pub fn node(&self, name: &str) -> Option<NodeState> {
        self.nodes.get(name).copied()
    }

    /// Names still on the recursion path, sorted
    pub fn in_progress(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, state)| **state == NodeState::InProgress)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Build order before split-package deduplication
    pub fn build_order(&self) -> &[PackageRecord] {
        &self.build_order
    }

    pub fn repo_deps(&self) -> &[String] {
        &self.repo_deps
    }

    pub fn satisfied_deps(&self) -> &[String] {
        &self.satisfied_deps
    }

    fn record_repo(&mut self, dep: &str) {
        if !self.repo_deps.iter().any(|d| d == dep) {
            self.repo_deps.push(dep.to_string());
        }
    }

    fn record_satisfied(&mut self, dep: &str) {
        if !self.satisfied_deps.iter().any(|d| d == dep) {
            self.satisfied_deps.push(dep.to_string());
        }
    }
}

/// Depth-first resolver over a metadata source and a package database
///
/// Calls must be serialized; a resolver holds the state of its latest call.
pub struct DependencyResolver<'a> {
    metadata: &'a dyn MetadataSource,
    db: &'a dyn PackageDatabase,
    state: ResolutionState,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(metadata: &'a dyn MetadataSource, db: &'a dyn PackageDatabase) -> Self {
        Self {
            metadata,
            db,
            state: ResolutionState::default(),
        }
    }

    /// State left behind by the most recent call
    pub fn state(&self) -> &ResolutionState {
        &self.state
    }

    /// Resolve `root` into a build order
    pub fn resolve(
        &mut self,
        root: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Resolution, ResolveError> {
        self.state = ResolutionState::default();
        self.run(root, progress)
    }

    /// Resolve starting from an already known record
    ///
    /// Used when the caller knows better than the metadata service, e.g. a
    /// VCS package whose probed version is newer than the published one.
    pub fn resolve_record(
        &mut self,
        root: PackageRecord,
        progress: &dyn ProgressSink,
    ) -> Result<Resolution, ResolveError> {
        self.state = ResolutionState::default();
        let name = root.name.clone();
        self.state.records.insert(name.clone(), root);
        self.run(&name, progress)
    }

    fn run(&mut self, root: &str, progress: &dyn ProgressSink) -> Result<Resolution, ResolveError> {
        progress.status(&format!("Resolving dependencies for {root}..."));

        self.visit(root, progress)?;

        let mut groups = HashSet::new();
        let mut build_order = Vec::with_capacity(self.state.build_order.len());
        for record in &self.state.build_order {
            let group = record.group_key();
            if groups.insert(group.to_string()) {
                build_order.push(record.clone());
            } else {
                progress.status(&format!(
                    "Skipping {} (split package, already building {})",
                    record.name, group
                ));
            }
        }

        Ok(Resolution {
            build_order,
            repo_deps: self.state.repo_deps.clone(),
            satisfied_deps: self.state.satisfied_deps.clone(),
        })
    }

    fn visit(&mut self, name: &str, progress: &dyn ProgressSink) -> Result<(), ResolveError> {
        match self.state.node(name) {
            Some(NodeState::Done) => return Ok(()),
            Some(NodeState::InProgress) => {
                return Err(ResolveError::Cycle {
                    name: name.to_string(),
                });
            }
            None => {}
        }
        self.state.nodes.insert(name.to_string(), NodeState::InProgress);

        progress.status(&format!("Fetching AUR info for {name}..."));
        let pkg = self.fetch(name)?;

        if self
            .db
            .is_dependency_satisfied(&format!("{}={}", pkg.name, pkg.version))
        {
            progress.status(&format!("Skipping {name} ({} already installed)", pkg.version));
            self.state.nodes.insert(name.to_string(), NodeState::Done);
            return Ok(());
        }

        let deps: Vec<String> = pkg.build_dependencies().cloned().collect();
        self.prefetch(&deps, progress);

        for dep in &deps {
            let dep_name = strip_version(dep);

            if self.db.is_dependency_satisfied(dep) {
                self.state.record_satisfied(dep);
                continue;
            }

            if self.db.is_dependency_available_in_repos(dep) {
                self.state.record_repo(dep);
                continue;
            }

            if self.state.nodes.contains_key(dep_name) || self.state.records.contains_key(dep_name) {
                self.visit(dep_name, progress)?;
                continue;
            }

            match self.find_provider(dep_name, progress)? {
                Some(provider) => self.visit(&provider, progress)?,
                None => {
                    return Err(ResolveError::Unresolvable {
                        dependency: dep.clone(),
                        required_by: name.to_string(),
                    });
                }
            }
        }

        self.state.nodes.insert(name.to_string(), NodeState::Done);
        self.state.build_order.push(pkg);
        progress.status(&format!("Resolved: {name}"));
        Ok(())
    }

    /// Metadata for `name`, from the per-call cache when possible
    fn fetch(&mut self, name: &str) -> Result<PackageRecord, ResolveError> {
        if let Some(record) = self.state.records.get(name) {
            return Ok(record.clone());
        }
        match self.metadata.info(name) {
            Ok(Some(record)) => {
                self.state.records.insert(name.to_string(), record.clone());
                Ok(record)
            }
            Ok(None) => Err(ResolveError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(ResolveError::Metadata(format!("Failed to fetch {name}: {e}"))),
        }
    }

    /// Fetch every not-yet-known source dependency in one batch
    fn prefetch(&mut self, deps: &[String], progress: &dyn ProgressSink) {
        let mut unknown: Vec<String> = Vec::new();
        for dep in deps {
            let dep_name = strip_version(dep);
            if self.state.nodes.contains_key(dep_name)
                || self.state.records.contains_key(dep_name)
                || unknown.iter().any(|n| n == dep_name)
            {
                continue;
            }
            if self.db.is_dependency_satisfied(dep) || self.db.is_dependency_available_in_repos(dep) {
                continue;
            }
            unknown.push(dep_name.to_string());
        }

        if unknown.is_empty() {
            return;
        }

        progress.status(&format!("Batch-fetching {} AUR dependencies...", unknown.len()));
        for record in self.metadata.info_batch(&unknown) {
            self.state.records.insert(record.name.clone(), record);
        }
    }

    /// Find a source package whose `provides` names `dep_name`
    fn find_provider(
        &mut self,
        dep_name: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Option<String>, ResolveError> {
        if let Some(cached) = self.state.providers.get(dep_name) {
            return Ok(cached.clone());
        }

        progress.status(&format!("Searching AUR for provider of {dep_name}..."));
        let candidates = self.metadata.search_by_provides(dep_name).map_err(|e| {
            ResolveError::Metadata(format!("Provider search for {dep_name} failed: {e}"))
        })?;

        let provider = candidates.into_iter().find(|candidate| {
            candidate
                .provides
                .iter()
                .any(|provided| strip_version(provided) == dep_name)
        });

        let name = provider.map(|record| {
            progress.status(&format!("Found: {} provides {}", record.name, dep_name));
            let name = record.name.clone();
            self.state.records.insert(name.clone(), record);
            name
        });

        if name.is_none() {
            debug!("No provider for {}", dep_name);
        }
        self.state.providers.insert(dep_name.to_string(), name.clone());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::package::PackageSource;
    use crate::progress::SilentProgress;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Aur {
        packages: Vec<PackageRecord>,
        provider_searches: Mutex<usize>,
    }

    impl MetadataSource for Aur {
        fn search(&self, _query: &str) -> Result<Vec<PackageRecord>> {
            Ok(Vec::new())
        }

        fn info(&self, name: &str) -> Result<Option<PackageRecord>> {
            Ok(self.packages.iter().find(|p| p.name == name).cloned())
        }

        fn search_by_provides(&self, name: &str) -> Result<Vec<PackageRecord>> {
            *self.provider_searches.lock().unwrap() += 1;
            Ok(self
                .packages
                .iter()
                .filter(|p| p.provides.iter().any(|v| strip_version(v) == name))
                .cloned()
                .collect())
        }

        fn info_batch(&self, names: &[String]) -> Vec<PackageRecord> {
            self.packages
                .iter()
                .filter(|p| names.contains(&p.name))
                .cloned()
                .collect()
        }
    }

    /// Nothing installed, every name in `repo` is in the binary repositories
    struct Db {
        repo: Vec<&'static str>,
    }

    impl PackageDatabase for Db {
        fn is_dependency_satisfied(&self, _dep: &str) -> bool {
            false
        }

        fn is_dependency_available_in_repos(&self, dep: &str) -> bool {
            self.repo.contains(&strip_version(dep))
        }

        fn search(&self, _query: &str) -> Result<Vec<PackageRecord>> {
            Ok(Vec::new())
        }

        fn list_foreign(&self) -> Result<Vec<PackageRecord>> {
            Ok(Vec::new())
        }

        fn install_as_dependencies(&self, _names: &[String], _log: &Path) -> Result<()> {
            Ok(())
        }

        fn install_built_artifacts(&self, _paths: &[PathBuf], _log: &Path) -> Result<()> {
            Ok(())
        }

        fn reload(&self) -> Result<()> {
            Ok(())
        }
    }

    fn aur(name: &str, depends: &[&str]) -> PackageRecord {
        let mut record = PackageRecord::new(name, "1.0-1", PackageSource::Aur);
        record.depends = depends.iter().map(|d| d.to_string()).collect();
        record
    }

    #[test]
    fn test_chain_is_post_order() {
        let metadata = Aur {
            packages: vec![aur("a", &["b", "gcc"]), aur("b", &["c"]), aur("c", &[])],
            ..Default::default()
        };
        let db = Db { repo: vec!["gcc"] };

        let mut resolver = DependencyResolver::new(&metadata, &db);
        let result = resolver.resolve("a", &SilentProgress).unwrap();

        let names: Vec<&str> = result.build_order.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
        assert_eq!(result.repo_deps, vec!["gcc"]);
    }

    #[test]
    fn test_cycle_detected() {
        let metadata = Aur {
            packages: vec![aur("a", &["b"]), aur("b", &["a"])],
            ..Default::default()
        };
        let db = Db { repo: vec![] };

        let mut resolver = DependencyResolver::new(&metadata, &db);
        let err = resolver.resolve("a", &SilentProgress).unwrap_err();
        assert_eq!(err, ResolveError::Cycle { name: "a".to_string() });

        // The failed path stays inspectable
        assert_eq!(resolver.state().in_progress(), vec!["a", "b"]);
    }

    #[test]
    fn test_optional_dependencies_ignored() {
        let mut a = aur("a", &[]);
        a.optdepends = vec!["b: extra".to_string()];
        let metadata = Aur {
            packages: vec![a, aur("b", &["a"])],
            ..Default::default()
        };
        let db = Db { repo: vec![] };

        let result = DependencyResolver::new(&metadata, &db)
            .resolve("a", &SilentProgress)
            .unwrap();
        assert_eq!(result.build_order.len(), 1);
    }

    #[test]
    fn test_missing_root() {
        let metadata = Aur::default();
        let db = Db { repo: vec![] };
        let err = DependencyResolver::new(&metadata, &db)
            .resolve("ghost", &SilentProgress)
            .unwrap_err();
        assert_eq!(err.to_string(), "Package not found in AUR: ghost");
    }

    #[test]
    fn test_unresolvable_dependency_names_both_ends() {
        let metadata = Aur {
            packages: vec![aur("a", &["nowhere>=2"])],
            ..Default::default()
        };
        let db = Db { repo: vec![] };
        let err = DependencyResolver::new(&metadata, &db)
            .resolve("a", &SilentProgress)
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::Unresolvable {
                dependency: "nowhere>=2".to_string(),
                required_by: "a".to_string(),
            }
        );
    }

    #[test]
    fn test_negative_provider_lookup_cached_within_call() {
        let metadata = Aur {
            packages: vec![aur("a", &["virt"])],
            ..Default::default()
        };
        let db = Db { repo: vec![] };

        let mut resolver = DependencyResolver::new(&metadata, &db);
        assert!(resolver.resolve("a", &SilentProgress).is_err());
        assert_eq!(*metadata.provider_searches.lock().unwrap(), 1);
        assert_eq!(resolver.state().providers.get("virt"), Some(&None));

        // A new call starts from scratch
        assert!(resolver.resolve("a", &SilentProgress).is_err());
        assert_eq!(*metadata.provider_searches.lock().unwrap(), 2);
    }
}
