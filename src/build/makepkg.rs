// src/build/makepkg.rs

//! Building a package group with makepkg
//!
//! Builds run in the group's working copy with `PKGDEST` pointing back at
//! it, so every artifact of the group (split packages included) lands in
//! one directory. An artifact whose file name carries the recipe's current
//! version is reused instead of rebuilding.

use super::log::append_line;
use super::recipe::{RECIPE_FILE, has_dynamic_version, static_version};
use super::source::SourceCache;
use crate::error::{Error, Result};
use crate::package::{PackageRecord, is_vcs_package};
use crate::process::ProcessSpec;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Runs makepkg in synced working copies
#[derive(Clone)]
pub struct MakepkgBuilder {
    source: SourceCache,
}

impl MakepkgBuilder {
    pub fn new(source: SourceCache) -> Self {
        Self { source }
    }

    /// Build `record`'s group and return the package files to install
    ///
    /// The working copy must already be synced and reviewed.
    pub fn build(&self, record: &PackageRecord, log: &Path) -> Result<Vec<PathBuf>> {
        let group = record.group_key();
        let dir = self.source.group_dir(group)?;
        let recipe = std::fs::read_to_string(dir.join(RECIPE_FILE))
            .map_err(|_| Error::NotFound(format!("{RECIPE_FILE} not found for: {}", record.name)))?;

        note(log, "Preparing build directory...");
        self.source.hand_over(&dir)?;

        if let Some(cached) = self.cached_artifacts(record, &recipe, &dir)? {
            return Ok(cached);
        }

        for stale in artifacts_in(&dir, None)? {
            debug!("Removing stale artifact {}", stale.display());
            std::fs::remove_file(&stale)?;
        }

        note(log, "Running makepkg -sf --nocheck --noconfirm ...");
        info!("Building {} in {}", record.name, dir.display());
        let spec = self
            .makepkg(&dir)
            .args(["-sf", "--nocheck", "--noconfirm"])
            .output(log);
        let outcome = self.source.runner().run(&spec)?;
        if !outcome.success() {
            return Err(Error::BuildFailed(format!(
                "makepkg failed for {} ({outcome:?})",
                record.name
            )));
        }

        note(log, "Locating built package...");
        let built = artifacts_in(&dir, None)?;
        if !built.is_empty() {
            return Ok(built);
        }

        let listed = self.package_list(&dir)?;
        if listed.is_empty() {
            return Err(Error::BuildFailed(format!(
                "Built package not found for: {}",
                record.name
            )));
        }
        Ok(listed)
    }

    /// Reusable artifacts for the recipe's declared version, if any
    ///
    /// A VCS recipe with a `pkgver()` step declares a stale version, so its
    /// artifacts are never reused.
    fn cached_artifacts(
        &self,
        record: &PackageRecord,
        recipe: &str,
        dir: &Path,
    ) -> Result<Option<Vec<PathBuf>>> {
        if is_vcs_package(&record.name) && has_dynamic_version(recipe) {
            debug!("{} computes its version at build time, not using cache", record.name);
            return Ok(None);
        }
        let Some(version) = static_version(recipe) else {
            return Ok(None);
        };

        let cached = artifacts_in(dir, Some(&version))?;
        if cached.is_empty() {
            return Ok(None);
        }
        for path in &cached {
            if let Some(name) = path.file_name() {
                info!("Using cached build: {}", name.to_string_lossy());
            }
        }
        Ok(Some(cached))
    }

    /// Ask makepkg where it would put the packages
    fn package_list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let spec = self.makepkg(dir).arg("--packagelist");
        let (outcome, stdout) = self.source.runner().capture(&spec)?;
        if !outcome.success() {
            warn!("makepkg --packagelist failed: {:?}", outcome);
            return Ok(Vec::new());
        }
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.exists())
            .collect())
    }

    fn makepkg(&self, dir: &Path) -> ProcessSpec {
        let jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ProcessSpec::new("makepkg")
            .cwd(dir)
            .run_as(self.source.run_as())
            .env("MAKEFLAGS", format!("-j{jobs}"))
            .env("PKGDEST", dir.display().to_string())
    }
}

/// Whether a file name is a built package (signatures excluded)
pub fn is_artifact(file_name: &str) -> bool {
    file_name.contains(".pkg.tar") && !file_name.ends_with(".sig")
}

/// Package files in `dir`, optionally only those built at `version`
pub fn artifacts_in(dir: &Path, version: Option<&str>) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let marker = version.map(|v| format!("-{v}-"));
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_artifact(&name) {
            continue;
        }
        if let Some(marker) = &marker
            && !name.contains(marker.as_str())
        {
            continue;
        }
        found.push(entry.path());
    }
    found.sort();
    Ok(found)
}

fn note(log: &Path, message: &str) {
    if let Err(e) = append_line(log, message) {
        warn!("Failed to write build log: {}", e);
    }
}
