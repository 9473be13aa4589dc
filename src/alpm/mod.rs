// src/alpm/mod.rs

//! Binary repository package database
//!
//! The resolver only needs two questions answered (is this dependency
//! already installed, can the binary repositories provide it) and the build
//! orchestrator needs three transactions (install repo dependencies, install
//! built artifacts, reload). [`PackageDatabase`] is that seam; [`PacmanCli`]
//! implements it on top of the `pacman` binary.

use crate::error::{Error, Result};
use crate::package::{PackageRecord, PackageSource};
use crate::process::{ProcessRunner, ProcessSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Installed-state oracle and transaction engine for binary packages
pub trait PackageDatabase: Send + Sync {
    /// Whether an installed package satisfies `dep` (constraint included)
    fn is_dependency_satisfied(&self, dep: &str) -> bool;

    /// Whether some binary repository can satisfy `dep`
    fn is_dependency_available_in_repos(&self, dep: &str) -> bool;

    /// Search the binary repositories by name and description
    fn search(&self, query: &str) -> Result<Vec<PackageRecord>>;

    /// Installed packages that no binary repository provides
    fn list_foreign(&self) -> Result<Vec<PackageRecord>>;

    /// Install repository packages, marked as installed as dependencies
    fn install_as_dependencies(&self, names: &[String], log: &Path) -> Result<()>;

    /// Install built package files, overwriting conflicting files
    fn install_built_artifacts(&self, paths: &[PathBuf], log: &Path) -> Result<()>;

    /// Drop any cached state so later queries see completed transactions
    fn reload(&self) -> Result<()>;
}

/// `PackageDatabase` backed by the pacman command-line tool
pub struct PacmanCli {
    runner: Arc<dyn ProcessRunner>,
    satisfied: Mutex<HashMap<String, bool>>,
    available: Mutex<HashMap<String, bool>>,
}

impl PacmanCli {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            satisfied: Mutex::new(HashMap::new()),
            available: Mutex::new(HashMap::new()),
        }
    }

    fn query_exit_ok(&self, args: &[&str]) -> bool {
        let spec = ProcessSpec::new("pacman").args(args.iter().copied());
        match self.runner.capture(&spec) {
            Ok((outcome, _)) => outcome.success(),
            Err(e) => {
                debug!("pacman query failed: {}", e);
                false
            }
        }
    }

    fn cached(
        cache: &Mutex<HashMap<String, bool>>,
        dep: &str,
        query: impl FnOnce() -> bool,
    ) -> bool {
        if let Some(&hit) = cache.lock().unwrap_or_else(|e| e.into_inner()).get(dep) {
            return hit;
        }
        let answer = query();
        cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(dep.to_string(), answer);
        answer
    }

    fn transaction(&self, spec: ProcessSpec, what: &str) -> Result<()> {
        info!("Running {}", spec.display());
        let outcome = self.runner.run(&spec)?;
        if outcome.success() {
            Ok(())
        } else {
            Err(Error::InstallFailed(format!(
                "{what} failed ({outcome:?}); see log for details"
            )))
        }
    }
}

impl PackageDatabase for PacmanCli {
    fn is_dependency_satisfied(&self, dep: &str) -> bool {
        Self::cached(&self.satisfied, dep, || self.query_exit_ok(&["-T", dep]))
    }

    fn is_dependency_available_in_repos(&self, dep: &str) -> bool {
        Self::cached(&self.available, dep, || {
            self.query_exit_ok(&["-Sp", "--print-format", "%n", dep])
        })
    }

    fn search(&self, query: &str) -> Result<Vec<PackageRecord>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let spec = ProcessSpec::new("pacman").args(["-Ss", query]);
        let (outcome, stdout) = self.runner.capture(&spec)?;
        // Exit status 1 means no matches
        match outcome.code() {
            Some(0) => Ok(parse_search_output(&stdout)),
            Some(1) => Ok(Vec::new()),
            _ => Err(Error::CommandFailed(format!("pacman -Ss failed: {outcome:?}"))),
        }
    }

    fn list_foreign(&self) -> Result<Vec<PackageRecord>> {
        let spec = ProcessSpec::new("pacman").arg("-Qm");
        let (outcome, stdout) = self.runner.capture(&spec)?;
        match outcome.code() {
            Some(0) => Ok(parse_foreign_output(&stdout)),
            Some(1) => Ok(Vec::new()),
            _ => Err(Error::CommandFailed(format!("pacman -Qm failed: {outcome:?}"))),
        }
    }

    fn install_as_dependencies(&self, names: &[String], log: &Path) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let spec = ProcessSpec::new("pacman")
            .args(["-S", "--needed", "--noconfirm", "--asdeps"])
            .args(names.iter().cloned())
            .output(log);
        self.transaction(spec, "Repository dependency installation")?;
        self.reload()
    }

    fn install_built_artifacts(&self, paths: &[PathBuf], log: &Path) -> Result<()> {
        if paths.is_empty() {
            return Err(Error::InstallFailed("No package files to install".to_string()));
        }
        let spec = ProcessSpec::new("pacman")
            .args(["-U", "--noconfirm", "--overwrite", "*"])
            .args(paths.iter().map(|p| p.display().to_string()))
            .output(log);
        self.transaction(spec, "Package installation")?;
        self.reload()
    }

    fn reload(&self) -> Result<()> {
        debug!("Reloading package database state");
        self.satisfied.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.available.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}

/// Parse `pacman -Ss` output
///
/// Each hit is a `repo/name version [(groups)] [[installed]]` line followed by
/// an indented description line.
pub fn parse_search_output(output: &str) -> Vec<PackageRecord> {
    let mut records: Vec<PackageRecord> = Vec::new();

    for line in output.lines() {
        if line.starts_with(char::is_whitespace) {
            if let Some(last) = records.last_mut()
                && last.description.is_empty()
            {
                last.description = line.trim().to_string();
            }
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(qualified), Some(version)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((repo, name)) = qualified.split_once('/') else {
            continue;
        };

        let installed = line.contains("[installed");
        let mut record = PackageRecord::new(
            name,
            version,
            if installed { PackageSource::Local } else { PackageSource::Sync },
        );
        record.repo = repo.to_string();
        records.push(record);
    }

    records
}

/// Parse `pacman -Qm` output (`name version` per line)
pub fn parse_foreign_output(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let version = fields.next()?;
            Some(PackageRecord::new(name, version, PackageSource::Local))
        })
        .collect()
}
