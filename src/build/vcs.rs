// src/build/vcs.rs

//! Live version probing for VCS packages
//!
//! The published version of a `-git` style package is whatever the
//! maintainer last pushed. When the recipe has a `pkgver()` step, running
//! makepkg without building updates the checkout and rewrites `pkgver=`,
//! which then holds the real upstream version.

use super::log::append_line;
use super::recipe::{RECIPE_FILE, has_dynamic_version, static_version, static_version_of};
use super::source::SourceCache;
use crate::package::PackageRecord;
use crate::process::{ProcessOutcome, ProcessSpec};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// makepkg exit status when sources are fetched but nothing is built
const EXIT_NOTHING_BUILT: i32 = 13;

/// Default ceiling for one probe
pub const DEFAULT_VCS_TIMEOUT: Duration = Duration::from_secs(120);

/// Probes the real version of VCS packages
#[derive(Clone)]
pub struct VcsChecker {
    source: SourceCache,
    timeout: Duration,
}

impl VcsChecker {
    pub fn new(source: SourceCache, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Current upstream version of `record`, or `None` when the check failed
    ///
    /// Failures are logged to `log` and mean "skip this package".
    pub fn check(&self, record: &PackageRecord, log: &Path) -> Option<String> {
        let group = record.group_key();

        if let Err(e) = self.source.reset(group, Some(log)) {
            note(log, &format!("Failed to reset {group}: {e}"));
        }
        let dir = match self.source.sync(group, Some(log)) {
            Ok(dir) => dir,
            Err(e) => {
                note(log, &format!("{e}, skipping VCS check"));
                return None;
            }
        };

        let recipe_path = dir.join(RECIPE_FILE);
        let recipe = match std::fs::read_to_string(&recipe_path) {
            Ok(text) => text,
            Err(_) => {
                note(log, &format!("No {RECIPE_FILE} found for {group}"));
                return None;
            }
        };

        if !has_dynamic_version(&recipe) {
            note(log, &format!("{group}: no pkgver() function, using static version"));
            return static_version(&recipe);
        }

        note(
            log,
            &format!("Running makepkg --nobuild for {group} (fetching VCS sources)..."),
        );
        let spec = ProcessSpec::new("makepkg")
            .args(["--nobuild", "--nocheck", "-f"])
            .cwd(&dir)
            .run_as(self.source.run_as())
            .output(log)
            .timeout(self.timeout);

        let outcome = match self.source.runner().run(&spec) {
            Ok(outcome) => outcome,
            Err(e) => {
                note(log, &format!("makepkg --nobuild failed for {group}: {e}, skipping"));
                return None;
            }
        };

        match outcome {
            ProcessOutcome::Exited(0) | ProcessOutcome::Exited(EXIT_NOTHING_BUILT) => {}
            ProcessOutcome::TimedOut => {
                warn!("VCS check for {} timed out", group);
                note(
                    log,
                    &format!(
                        "makepkg --nobuild timed out for {group} after {}s, skipping",
                        self.timeout.as_secs()
                    ),
                );
                return None;
            }
            other => {
                note(
                    log,
                    &format!("makepkg --nobuild failed for {group} ({other:?}), skipping"),
                );
                return None;
            }
        }

        let version = static_version_of(&recipe_path);
        match &version {
            Some(v) => note(log, &format!("{group}: real VCS version is {v}")),
            None => debug!("{} has no readable version after probe", group),
        }
        version
    }
}

fn note(log: &Path, message: &str) {
    if let Err(e) = append_line(log, message) {
        warn!("Failed to write VCS log: {}", e);
    }
}
