// src/build/upgrade.rs

//! Finding and planning upgrades of installed source packages
//!
//! Installed packages that no binary repository provides are looked up in
//! one batch. A newer published version is an upgrade. VCS packages whose
//! published version is not newer get a live version probe, and a newer
//! probed version is an upgrade too.

use super::log::BuildSink;
use super::supervisor::TailedRun;
use super::vcs::VcsChecker;
use crate::alpm::PackageDatabase;
use crate::error::{ResolveError, Result};
use crate::package::{PackageRecord, is_vcs_package};
use crate::progress::ProgressSink;
use crate::resolver::{BuildPlan, DependencyResolver};
use crate::rpc::MetadataSource;
use crate::version::vercmp;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// One package with a newer version available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCandidate {
    pub installed: PackageRecord,
    /// Remote record, carrying the probed version for VCS packages
    pub target: PackageRecord,
    pub probed: bool,
}

impl UpgradeCandidate {
    pub fn name(&self) -> &str {
        &self.installed.name
    }
}

/// Result of checking installed source packages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeScan {
    pub foreign_count: usize,
    pub upgrades: Vec<UpgradeCandidate>,
    /// Installed foreign packages the metadata service does not know
    pub not_found: Vec<String>,
    /// VCS packages whose probe failed
    pub vcs_skipped: Vec<String>,
}

/// Upgrade discovery and planning
pub struct UpgradeScanner<'a> {
    metadata: &'a dyn MetadataSource,
    db: &'a dyn PackageDatabase,
    vcs: Option<VcsChecker>,
    vcs_log: PathBuf,
    poll_interval: Duration,
}

impl<'a> UpgradeScanner<'a> {
    pub fn new(metadata: &'a dyn MetadataSource, db: &'a dyn PackageDatabase) -> Self {
        Self {
            metadata,
            db,
            vcs: None,
            vcs_log: PathBuf::from("/tmp/pmt_vcs_check.log"),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Probe VCS packages with `checker`, logging to `log_file`
    pub fn with_vcs(mut self, checker: VcsChecker, log_file: impl Into<PathBuf>) -> Self {
        self.vcs = Some(checker);
        self.vcs_log = log_file.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Compare installed foreign packages against the metadata service
    pub fn scan(&self, progress: &dyn ProgressSink, sink: &dyn BuildSink) -> Result<UpgradeScan> {
        progress.status("Checking foreign packages...");
        let foreign = self.db.list_foreign()?;
        let mut scan = UpgradeScan {
            foreign_count: foreign.len(),
            ..Default::default()
        };
        if foreign.is_empty() {
            return Ok(scan);
        }

        progress.status(&format!("Querying AUR for {} packages...", foreign.len()));
        let names: Vec<String> = foreign.iter().map(|p| p.name.clone()).collect();
        let remote: HashMap<String, PackageRecord> = self
            .metadata
            .info_batch(&names)
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();

        let mut vcs_candidates = Vec::new();
        for local in &foreign {
            let Some(target) = remote.get(&local.name) else {
                debug!("{} is not in the AUR", local.name);
                scan.not_found.push(local.name.clone());
                continue;
            };

            if vercmp(&target.version, &local.version) == Ordering::Greater {
                scan.upgrades.push(UpgradeCandidate {
                    installed: local.clone(),
                    target: target.clone(),
                    probed: false,
                });
            } else if is_vcs_package(&local.name) {
                vcs_candidates.push((local.clone(), target.clone()));
            }
        }

        if let Some(checker) = &self.vcs
            && !vcs_candidates.is_empty()
        {
            self.probe_vcs(checker, vcs_candidates, &mut scan, sink)?;
        }

        Ok(scan)
    }

    fn probe_vcs(
        &self,
        checker: &VcsChecker,
        candidates: Vec<(PackageRecord, PackageRecord)>,
        scan: &mut UpgradeScan,
        sink: &dyn BuildSink,
    ) -> Result<()> {
        let mut run = TailedRun::start(&self.vcs_log, sink, self.poll_interval)?;
        let log = self.vcs_log.as_path();
        let total = candidates.len();
        run.note(format!("Checking {total} VCS package(s)..."));

        for (idx, (local, target)) in candidates.into_iter().enumerate() {
            let title = format!("Checking VCS: {} [{}/{}]", local.name, idx + 1, total);
            run.note("");
            run.note(format!("=== Checking {} ===", local.name));

            let probed = run.run(&title, || Ok(checker.check(&target, log)))?;
            let Some(version) = probed else {
                run.note(format!("{}: skipped (check failed)", local.name));
                scan.vcs_skipped.push(local.name.clone());
                continue;
            };

            if vercmp(&version, &local.version) == Ordering::Greater {
                run.note(format!(
                    "{}: {} -> {} (UPDATE AVAILABLE)",
                    local.name, local.version, version
                ));
                let mut target = target;
                target.version = version;
                scan.upgrades.push(UpgradeCandidate {
                    installed: local,
                    target,
                    probed: true,
                });
            } else {
                run.note(format!("{}: up to date ({})", local.name, version));
            }
        }

        run.finish("VCS check complete");
        Ok(())
    }

    /// Resolve every upgrade and merge the results into one plan
    pub fn plan(
        &self,
        scan: &UpgradeScan,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<BuildPlan, ResolveError> {
        let mut resolver = DependencyResolver::new(self.metadata, self.db);
        let mut plan = BuildPlan::new();
        for upgrade in &scan.upgrades {
            let resolution = resolver.resolve_record(upgrade.target.clone(), progress)?;
            plan.merge(resolution);
        }
        Ok(plan)
    }
}
