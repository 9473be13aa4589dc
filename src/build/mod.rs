// src/build/mod.rs

//! Source package builds
//!
//! Fetching recipes into the build cache, review, makepkg runs with a live
//! log tail, installation, VCS version probes, upgrade discovery and cache
//! cleaning.

pub mod clean;
pub mod log;
pub mod makepkg;
pub mod orchestrator;
pub mod recipe;
pub mod review;
pub mod source;
pub mod supervisor;
pub mod upgrade;
pub mod vcs;

pub use clean::{CacheCleaner, CleanPlan, CleanReport};
pub use log::{BuildLog, BuildSink, LogTail, NullSink, RecordingSink};
pub use makepkg::MakepkgBuilder;
pub use orchestrator::{BuildOrchestrator, EntryProgress, EntryState};
pub use review::{AcceptAll, ReviewArtifact, ReviewStore, Reviewer};
pub use source::SourceCache;
pub use supervisor::TailedRun;
pub use upgrade::{UpgradeCandidate, UpgradeScan, UpgradeScanner};
pub use vcs::VcsChecker;

use crate::config::Config;
use crate::privilege::BuildUser;
use crate::process::ProcessRunner;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// How a build plan run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every entry was built and installed
    Completed,
    /// The reviewer rejected this package's recipe; nothing was built
    Cancelled { package: String },
    /// A step failed; `package` is `None` when repository dependencies failed
    Failed {
        package: Option<String>,
        reason: String,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled { package } => write!(f, "cancelled at review of {package}"),
            Self::Failed {
                package: Some(package),
                reason,
            } => write!(f, "{package} failed: {reason}"),
            Self::Failed {
                package: None,
                reason,
            } => write!(f, "repository dependencies failed: {reason}"),
        }
    }
}

/// Everything a build needs, derived from configuration
#[derive(Clone)]
pub struct BuildEnv {
    pub source: SourceCache,
    pub reviews: ReviewStore,
    pub config: Config,
}

impl BuildEnv {
    /// Cache locations resolved against `home`, owned by `user` when set
    pub fn new(
        config: &Config,
        home: &Path,
        runner: Arc<dyn ProcessRunner>,
        user: Option<BuildUser>,
    ) -> Self {
        let source = SourceCache::new(config.build_dir(home), runner, user.clone());
        let reviews = ReviewStore::new(config.reviewed_dir(home), user);
        Self {
            source,
            reviews,
            config: config.clone(),
        }
    }

    pub fn vcs_checker(&self) -> VcsChecker {
        VcsChecker::new(self.source.clone(), self.config.vcs_timeout())
    }

    pub fn cleaner(&self) -> CacheCleaner {
        CacheCleaner::new(self.source.root(), self.reviews.root())
            .keep(self.config.build.keep_artifacts)
            .log_files([
                self.config.build.log_file.clone(),
                self.config.build.vcs_log_file.clone(),
            ])
    }

    pub fn orchestrator<'a>(&self, db: &'a dyn crate::alpm::PackageDatabase) -> BuildOrchestrator<'a> {
        BuildOrchestrator::new(
            db,
            self.source.clone(),
            self.reviews.clone(),
            &self.config.build.log_file,
        )
        .with_poll_interval(self.config.poll_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SystemRunner;

    #[test]
    fn test_outcome_display() {
        assert_eq!(RunOutcome::Completed.to_string(), "completed");
        let failed = RunOutcome::Failed {
            package: Some("foo".to_string()),
            reason: "boom".to_string(),
        };
        assert!(failed.is_failed());
        assert_eq!(failed.to_string(), "foo failed: boom");
        let cancelled = RunOutcome::Cancelled {
            package: "bar".to_string(),
        };
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_completed());
    }

    #[test]
    fn test_env_paths_follow_config() {
        let config = Config::parse("[cache]\nbuild_dir = \"/srv/aur\"\n").unwrap();
        let env = BuildEnv::new(&config, Path::new("/home/alice"), Arc::new(SystemRunner), None);
        assert_eq!(env.source.root(), Path::new("/srv/aur"));
        assert_eq!(env.reviews.root(), Path::new("/home/alice/.cache/pmt/reviewed"));
    }
}
