// tests/common/mod.rs

//! Shared fakes for integration tests: an in-memory metadata service, an
//! in-memory package database, a process runner that plays git and
//! makepkg, and a scripted reviewer.

#![allow(dead_code)]

use pmt::build::recipe::{RECIPE_FILE, static_version};
use pmt::build::{ReviewArtifact, Reviewer};
use pmt::process::{ProcessOutcome, ProcessRunner, ProcessSpec};
use pmt::version::DepSpec;
use pmt::{MetadataSource, PackageDatabase, PackageRecord, PackageSource, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Build an AUR record with the given dependencies
pub fn aur(name: &str, version: &str, depends: &[&str]) -> PackageRecord {
    let mut record = PackageRecord::new(name, version, PackageSource::Aur);
    record.depends = depends.iter().map(|d| d.to_string()).collect();
    record
}

/// In-memory metadata service
#[derive(Default)]
pub struct FakeAur {
    records: HashMap<String, PackageRecord>,
    pub info_calls: Mutex<Vec<String>>,
    pub provider_calls: Mutex<Vec<String>>,
}

impl FakeAur {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, record: PackageRecord) -> Self {
        self.records.insert(record.name.clone(), record);
        self
    }

    pub fn info_count(&self) -> usize {
        self.info_calls.lock().unwrap().len()
    }
}

impl MetadataSource for FakeAur {
    fn search(&self, query: &str) -> Result<Vec<PackageRecord>> {
        let mut hits: Vec<PackageRecord> = self
            .records
            .values()
            .filter(|r| r.name.contains(query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(hits)
    }

    fn info(&self, name: &str) -> Result<Option<PackageRecord>> {
        self.info_calls.lock().unwrap().push(name.to_string());
        Ok(self.records.get(name).cloned())
    }

    fn search_by_provides(&self, name: &str) -> Result<Vec<PackageRecord>> {
        self.provider_calls.lock().unwrap().push(name.to_string());
        let mut hits: Vec<PackageRecord> = self
            .records
            .values()
            .filter(|r| r.provides.iter().any(|p| DepSpec::parse(p).name == name))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(hits)
    }

    fn info_batch(&self, names: &[String]) -> Vec<PackageRecord> {
        self.info_calls.lock().unwrap().extend(names.iter().cloned());
        names
            .iter()
            .filter_map(|name| self.records.get(name).cloned())
            .collect()
    }
}

/// In-memory package database that records mutating calls
#[derive(Default)]
pub struct FakeDb {
    installed: Mutex<HashMap<String, String>>,
    repo: HashSet<String>,
    foreign: Vec<PackageRecord>,
    fail_installs: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed(self, name: &str, version: &str) -> Self {
        self.installed
            .lock()
            .unwrap()
            .insert(name.to_string(), version.to_string());
        self
    }

    pub fn in_repo(mut self, name: &str) -> Self {
        self.repo.insert(name.to_string());
        self
    }

    /// An installed package that no repository provides
    pub fn foreign(mut self, name: &str, version: &str) -> Self {
        self.foreign
            .push(PackageRecord::new(name, version, PackageSource::Local));
        self.installed(name, version)
    }

    pub fn failing_installs(mut self) -> Self {
        self.fail_installs = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn installed_version(&self, name: &str) -> Option<String> {
        self.installed.lock().unwrap().get(name).cloned()
    }
}

impl PackageDatabase for FakeDb {
    fn is_dependency_satisfied(&self, dep: &str) -> bool {
        let spec = DepSpec::parse(dep);
        self.installed
            .lock()
            .unwrap()
            .iter()
            .any(|(name, version)| spec.is_satisfied_by(name, version, &[]))
    }

    fn is_dependency_available_in_repos(&self, dep: &str) -> bool {
        self.repo.contains(&DepSpec::parse(dep).name)
    }

    fn search(&self, query: &str) -> Result<Vec<PackageRecord>> {
        let mut hits: Vec<PackageRecord> = self
            .repo
            .iter()
            .filter(|name| name.contains(query))
            .map(|name| PackageRecord::new(name.as_str(), "1.0-1", PackageSource::Sync))
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(hits)
    }

    fn list_foreign(&self) -> Result<Vec<PackageRecord>> {
        Ok(self.foreign.clone())
    }

    fn install_as_dependencies(&self, names: &[String], _log: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("deps {}", names.join(" ")));
        if self.fail_installs {
            return Err(pmt::Error::InstallFailed("pacman -S failed".to_string()));
        }
        Ok(())
    }

    fn install_built_artifacts(&self, paths: &[PathBuf], _log: &Path) -> Result<()> {
        let names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        self.calls
            .lock()
            .unwrap()
            .push(format!("install {}", names.join(" ")));
        if self.fail_installs {
            return Err(pmt::Error::InstallFailed("pacman -U failed".to_string()));
        }
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        self.calls.lock().unwrap().push("reload".to_string());
        Ok(())
    }
}

/// Plays git and makepkg against a temporary build cache
///
/// `git clone` writes the group's recipe; `makepkg -s` writes one artifact
/// per package of the group at the recipe's version.
#[derive(Default)]
pub struct FakeTools {
    recipes: HashMap<String, String>,
    packages: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    probed: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group with its recipe and package names
    pub fn group(mut self, group: &str, version: &str, packages: &[&str]) -> Self {
        let (pkgver, pkgrel) = version.rsplit_once('-').unwrap_or((version, "1"));
        self.recipes.insert(
            group.to_string(),
            format!("pkgbase={group}\npkgver={pkgver}\npkgrel={pkgrel}\n"),
        );
        self.packages.insert(
            group.to_string(),
            packages.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    /// Register a VCS group whose `pkgver()` step yields `probed`
    pub fn vcs_group(mut self, group: &str, pkgver: &str, probed: &str) -> Self {
        self.recipes.insert(
            group.to_string(),
            format!("pkgname={group}\npkgver={pkgver}\npkgrel=1\npkgver() {{\n  git describe\n}}\n"),
        );
        self.packages.insert(group.to_string(), vec![group.to_string()]);
        self.probed.insert(group.to_string(), probed.to_string());
        self
    }

    pub fn failing(mut self, group: &str) -> Self {
        self.failing.insert(group.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(program))
            .count()
    }

    fn group_of(dir: &Path) -> String {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl ProcessRunner for FakeTools {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome> {
        self.calls.lock().unwrap().push(spec.display());
        match spec.program.as_str() {
            "git" if spec.args.first().map(String::as_str) == Some("clone") => {
                let dir = PathBuf::from(spec.args.last().unwrap());
                let Some(recipe) = self.recipes.get(&Self::group_of(&dir)) else {
                    return Ok(ProcessOutcome::Exited(128));
                };
                std::fs::create_dir_all(dir.join(".git")).unwrap();
                std::fs::write(dir.join(RECIPE_FILE), recipe).unwrap();
                Ok(ProcessOutcome::Exited(0))
            }
            "makepkg" => {
                let dir = spec.cwd.clone().unwrap();
                let group = Self::group_of(&dir);
                if self.failing.contains(&group) {
                    return Ok(ProcessOutcome::Exited(4));
                }
                let recipe = std::fs::read_to_string(dir.join(RECIPE_FILE)).unwrap();
                if spec.args.iter().any(|a| a == "--nobuild") {
                    if let Some(probed) = self.probed.get(&group) {
                        let rewritten: Vec<String> = recipe
                            .lines()
                            .map(|line| {
                                if line.starts_with("pkgver=") {
                                    format!("pkgver={probed}")
                                } else {
                                    line.to_string()
                                }
                            })
                            .collect();
                        std::fs::write(dir.join(RECIPE_FILE), rewritten.join("\n")).unwrap();
                    }
                    return Ok(ProcessOutcome::Exited(0));
                }
                let version = static_version(&recipe).unwrap();
                for name in self.packages.get(&group).into_iter().flatten() {
                    let file = format!("{name}-{version}-x86_64.pkg.tar.zst");
                    std::fs::write(dir.join(file), b"pkg").unwrap();
                }
                Ok(ProcessOutcome::Exited(0))
            }
            _ => Ok(ProcessOutcome::Exited(0)),
        }
    }

    fn capture(&self, spec: &ProcessSpec) -> Result<(ProcessOutcome, String)> {
        Ok((self.run(spec)?, String::new()))
    }
}

/// Answers reviews from a fixed script and remembers what it saw
pub struct ScriptedReviewer {
    accept: bool,
    pub seen: Mutex<Vec<ReviewArtifact>>,
}

impl ScriptedReviewer {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<ReviewArtifact> {
        self.seen.lock().unwrap().clone()
    }
}

impl Reviewer for ScriptedReviewer {
    fn review(&self, artifact: &ReviewArtifact) -> bool {
        self.seen.lock().unwrap().push(artifact.clone());
        self.accept
    }
}
