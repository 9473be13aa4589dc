// src/build/source.rs

//! Per-group recipe working copies
//!
//! Each package group gets one git checkout under the build cache
//! directory. Syncing fast-forwards an existing checkout and falls back to
//! a fresh shallow clone when the fast-forward fails.

use super::log::append_line;
use super::recipe::RECIPE_FILE;
use crate::error::{Error, Result};
use crate::privilege::{BuildUser, chown_tree};
use crate::process::{ProcessRunner, ProcessSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default location of package git repositories
pub const DEFAULT_CLONE_BASE: &str = "https://aur.archlinux.org";

/// The build cache directory and the git operations on it
#[derive(Clone)]
pub struct SourceCache {
    root: PathBuf,
    clone_base: String,
    runner: Arc<dyn ProcessRunner>,
    build_user: Option<BuildUser>,
}

impl SourceCache {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>, build_user: Option<BuildUser>) -> Self {
        Self {
            root: root.into(),
            clone_base: DEFAULT_CLONE_BASE.to_string(),
            runner,
            build_user,
        }
    }

    /// Clone from somewhere other than the AUR
    pub fn with_clone_base(mut self, base: impl Into<String>) -> Self {
        self.clone_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    pub fn build_user(&self) -> Option<&BuildUser> {
        self.build_user.as_ref()
    }

    /// Name of the account subprocesses run as, if not the current one
    pub fn run_as(&self) -> Option<String> {
        self.build_user.as_ref().map(|u| u.name.clone())
    }

    /// Working copy directory for a group
    pub fn group_dir(&self, group: &str) -> Result<PathBuf> {
        validate_group(group)?;
        Ok(self.root.join(group))
    }

    pub fn clone_url(&self, group: &str) -> String {
        format!("{}/{}.git", self.clone_base, group)
    }

    /// Create the cache root and hand it to the build user
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {e}", self.root.display()))
        })?;
        self.hand_over(&self.root)
    }

    /// Give `path` to the build user when builds are de-escalated
    pub fn hand_over(&self, path: &Path) -> Result<()> {
        match &self.build_user {
            Some(user) if path.exists() => chown_tree(path, user),
            _ => Ok(()),
        }
    }

    /// Bring the group's working copy up to date and return its directory
    ///
    /// An existing checkout is fast-forwarded; if that fails it is removed
    /// and cloned again.
    pub fn sync(&self, group: &str, log: Option<&Path>) -> Result<PathBuf> {
        let dir = self.group_dir(group)?;
        self.prepare()?;

        if dir.join(".git").exists() {
            note(log, &format!("Updating existing clone of {group}..."));
            let pull = self
                .git(log)
                .arg("-C")
                .arg(dir.display().to_string())
                .args(["pull", "--ff-only"]);
            if !self.runner.run(&pull)?.success() {
                warn!("Fast-forward of {} failed, re-cloning", group);
                note(log, "Pull failed, re-cloning...");
                std::fs::remove_dir_all(&dir).map_err(|e| {
                    Error::IoError(format!("Failed to remove {}: {e}", dir.display()))
                })?;
            }
        } else if dir.exists() {
            debug!("Removing non-git directory {}", dir.display());
            std::fs::remove_dir_all(&dir)?;
        }

        if !dir.exists() {
            let url = self.clone_url(group);
            info!("Cloning {}", url);
            note(log, &format!("Cloning {url} ..."));
            let clone = self
                .git(log)
                .args(["clone", "--depth", "1"])
                .arg(url)
                .arg(dir.display().to_string());
            if !self.runner.run(&clone)?.success() {
                return Err(Error::SourceFetchFailed(format!(
                    "Failed to clone package repository: {group}"
                )));
            }
        }

        self.hand_over(&dir)?;
        Ok(dir)
    }

    /// Discard local modifications in the group's checkout
    pub fn reset(&self, group: &str, log: Option<&Path>) -> Result<()> {
        let dir = self.group_dir(group)?;
        if !dir.join(".git").exists() {
            return Ok(());
        }
        note(log, &format!("Resetting local changes in {group}..."));
        let spec = self
            .git(log)
            .arg("-C")
            .arg(dir.display().to_string())
            .args(["checkout", "--", "."]);
        if !self.runner.run(&spec)?.success() {
            warn!("git checkout in {} failed", dir.display());
        }
        Ok(())
    }

    /// Current recipe text of a synced group
    pub fn read_recipe(&self, group: &str) -> Result<String> {
        let path = self.group_dir(group)?.join(RECIPE_FILE);
        std::fs::read_to_string(&path)
            .map_err(|_| Error::NotFound(format!("{RECIPE_FILE} not found for: {group}")))
    }

    fn git(&self, log: Option<&Path>) -> ProcessSpec {
        let spec = ProcessSpec::new("git")
            .env("GIT_TERMINAL_PROMPT", "0")
            .run_as(self.run_as());
        match log {
            Some(path) => spec.output(path),
            None => spec,
        }
    }
}

/// Reject group names that would escape the cache directory
fn validate_group(group: &str) -> Result<()> {
    if group.is_empty()
        || group == "."
        || group == ".."
        || group.contains('/')
        || group.contains('\0')
    {
        return Err(Error::ParseError(format!("Invalid package base name: {group:?}")));
    }
    Ok(())
}

fn note(log: Option<&Path>, message: &str) {
    if let Some(path) = log
        && let Err(e) = append_line(path, message)
    {
        warn!("Failed to write build log: {}", e);
    }
}
