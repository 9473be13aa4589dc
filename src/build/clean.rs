// src/build/clean.rs

//! Cache cleaning
//!
//! Every operation is split into a `plan_*` step that only looks at the
//! disk and [`CacheCleaner::clean`], which deletes what the plan lists.

use super::makepkg::is_artifact;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Files and directory trees selected for removal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanPlan {
    /// Individual files with their sizes
    pub files: Vec<(PathBuf, u64)>,
    /// Trees removed after the files; their contents are already in `files`
    pub trees: Vec<PathBuf>,
}

impl CleanPlan {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.trees.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|(_, size)| size).sum()
    }

    fn extend(&mut self, other: CleanPlan) {
        self.files.extend(other.files);
        self.trees.extend(other.trees);
    }
}

/// What a clean actually removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub files_removed: usize,
    pub bytes_freed: u64,
}

pub struct CacheCleaner {
    build_dir: PathBuf,
    reviewed_dir: PathBuf,
    log_files: Vec<PathBuf>,
    keep: usize,
}

impl CacheCleaner {
    pub fn new(build_dir: impl Into<PathBuf>, reviewed_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            reviewed_dir: reviewed_dir.into(),
            log_files: Vec::new(),
            keep: 2,
        }
    }

    /// Artifacts kept per group directory by [`plan_build`](Self::plan_build)
    pub fn keep(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    pub fn log_files(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.log_files = files.into_iter().collect();
        self
    }

    /// Old built artifacts, keeping the newest `keep` in each group directory
    pub fn plan_build(&self) -> Result<CleanPlan> {
        let mut plan = CleanPlan::default();
        for group in child_dirs(&self.build_dir)? {
            let mut artifacts: Vec<(PathBuf, u64, SystemTime)> = Vec::new();
            for entry in std::fs::read_dir(&group)? {
                let entry = entry?;
                let name = entry.file_name();
                if !name.to_str().is_some_and(is_artifact) {
                    continue;
                }
                let meta = entry.metadata()?;
                if !meta.is_file() {
                    continue;
                }
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                artifacts.push((entry.path(), meta.len(), modified));
            }

            artifacts.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| b.0.cmp(&a.0)));
            for (path, size, _) in artifacts.into_iter().skip(self.keep) {
                let sig = signature_of(&path);
                if let Ok(meta) = std::fs::metadata(&sig) {
                    plan.files.push((sig, meta.len()));
                }
                plan.files.push((path, size));
            }
        }
        debug!(
            "Build cache plan: {} files, {} bytes",
            plan.file_count(),
            plan.total_bytes()
        );
        Ok(plan)
    }

    /// Every stored review baseline
    pub fn plan_reviewed(&self) -> Result<CleanPlan> {
        tree_plan(&self.reviewed_dir)
    }

    /// Build and VCS check logs
    pub fn plan_logs(&self) -> Result<CleanPlan> {
        let mut plan = CleanPlan::default();
        for path in &self.log_files {
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => plan.files.push((path.clone(), meta.len())),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(plan)
    }

    /// The whole build cache, review baselines and logs
    pub fn plan_all(&self) -> Result<CleanPlan> {
        let mut plan = tree_plan(&self.build_dir)?;
        plan.extend(self.plan_reviewed()?);
        plan.extend(self.plan_logs()?);
        Ok(plan)
    }

    /// Delete what `plan` lists
    ///
    /// Files that vanished or cannot be removed are skipped with a warning
    /// and do not count towards the report.
    pub fn clean(&self, plan: &CleanPlan) -> CleanReport {
        let mut report = CleanReport::default();
        for (path, size) in &plan.files {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    report.files_removed += 1;
                    report.bytes_freed += size;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        for tree in &plan.trees {
            match std::fs::remove_dir_all(tree) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", tree.display(), e),
            }
        }
        info!(
            "Clean complete: {} files, {} bytes freed",
            report.files_removed, report.bytes_freed
        );
        report
    }
}

/// Human readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn signature_of(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sig");
    PathBuf::from(name)
}

fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::IoError(format!("Failed to read {}: {e}", dir.display()))),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Everything below `dir`, which itself is kept
fn tree_plan(dir: &Path) -> Result<CleanPlan> {
    let mut plan = CleanPlan::default();
    if !dir.exists() {
        return Ok(plan);
    }
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {e}", dir.display())))?;
        if entry.file_type().is_file() {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            plan.files.push((entry.into_path(), size));
        } else if entry.depth() == 1 && entry.file_type().is_dir() {
            plan.trees.push(entry.into_path());
        }
    }
    Ok(plan)
}
