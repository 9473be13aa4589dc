// src/build/orchestrator.rs

//! Running a build plan
//!
//! Every entry's recipe is fetched and reviewed before anything is built.
//! Then repository dependencies are installed in one transaction, and each
//! entry is built and installed in order. The first failure ends the run;
//! packages installed before it stay installed.

use super::RunOutcome;
use super::log::BuildSink;
use super::makepkg::MakepkgBuilder;
use super::review::{ReviewStore, Reviewer};
use super::source::SourceCache;
use super::supervisor::TailedRun;
use crate::alpm::PackageDatabase;
use crate::package::PackageRecord;
use crate::resolver::BuildPlan;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where one plan entry is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Fetching,
    Reviewing,
    Building,
    Installing,
    Done,
    /// Recipe rejected at review
    Cancelled,
    Failed,
}

impl EntryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }

    /// Whether an entry in this state may move to `next`
    pub fn can_advance_to(self, next: EntryState) -> bool {
        use EntryState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Reviewing)
                | (Reviewing, Building)
                | (Reviewing, Cancelled)
                | (Building, Installing)
                | (Installing, Done)
        ) || (!self.is_terminal() && next == Failed)
    }
}

/// Lifecycle of one plan entry within a run
#[derive(Debug, Clone)]
pub struct EntryProgress {
    name: String,
    state: EntryState,
}

impl EntryProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: EntryState::Pending,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    /// Move to `next`; an illegal move is logged and ignored
    pub fn advance(&mut self, next: EntryState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!("{}: ignoring transition {:?} -> {:?}", self.name, self.state, next);
            return false;
        }
        debug!("{}: {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
        true
    }
}

/// Drives fetch, review, build and install for a plan
pub struct BuildOrchestrator<'a> {
    db: &'a dyn PackageDatabase,
    source: SourceCache,
    reviews: ReviewStore,
    builder: MakepkgBuilder,
    log_file: PathBuf,
    poll_interval: Duration,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(
        db: &'a dyn PackageDatabase,
        source: SourceCache,
        reviews: ReviewStore,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            builder: MakepkgBuilder::new(source.clone()),
            source,
            reviews,
            log_file: log_file.into(),
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Run a merged plan
    pub fn run_plan(
        &self,
        plan: &BuildPlan,
        label: &str,
        reviewer: &dyn Reviewer,
        sink: &dyn BuildSink,
    ) -> RunOutcome {
        self.run_build_plan(&plan.entries, &plan.repo_deps, label, reviewer, sink)
    }

    /// Review, then build and install every entry in order
    pub fn run_build_plan(
        &self,
        entries: &[PackageRecord],
        repo_deps: &[String],
        label: &str,
        reviewer: &dyn Reviewer,
        sink: &dyn BuildSink,
    ) -> RunOutcome {
        let mut progress: Vec<EntryProgress> =
            entries.iter().map(|e| EntryProgress::new(e.name.as_str())).collect();
        for (entry, state) in entries.iter().zip(progress.iter_mut()) {
            if let Some(outcome) = self.review_entry(entry, state, reviewer) {
                return outcome;
            }
        }

        let mut run = match TailedRun::start(&self.log_file, sink, self.poll_interval) {
            Ok(run) => run,
            Err(e) => {
                return RunOutcome::Failed {
                    package: None,
                    reason: format!("Cannot open build log: {e}"),
                };
            }
        };
        let log = self.log_file.as_path();

        if !repo_deps.is_empty() {
            run.note("=== Installing repo dependencies ===");
            let title = "Installing dependencies";
            if let Err(e) = run.run(title, || self.db.install_as_dependencies(repo_deps, log)) {
                run.note("FAILED to install repo dependencies");
                run.finish(&format!("{title} - FAILED"));
                return RunOutcome::Failed {
                    package: None,
                    reason: e.to_string(),
                };
            }
        }

        let total = entries.len();
        for (idx, (entry, state)) in entries.iter().zip(progress.iter_mut()).enumerate() {
            let mut title = format!("Building {}", entry.name);
            if total > 1 {
                title.push_str(&format!(" [{}/{}]", idx + 1, total));
            }

            state.advance(EntryState::Building);
            run.note("");
            run.note(format!("=== Building {} ===", entry.name));
            let artifacts = match run.run(&title, || self.builder.build(entry, log)) {
                Ok(artifacts) => artifacts,
                Err(e) => {
                    run.note("");
                    run.note(format!("BUILD FAILED for {}", entry.name));
                    state.advance(EntryState::Failed);
                    run.finish(&format!("{title} - FAILED"));
                    return RunOutcome::Failed {
                        package: Some(entry.name.clone()),
                        reason: e.to_string(),
                    };
                }
            };

            state.advance(EntryState::Installing);
            run.note("");
            run.note(format!("=== Installing {} ===", entry.name));
            let install_title = format!("{title} (installing)");
            if let Err(e) = run.run(&install_title, || {
                self.db.install_built_artifacts(&artifacts, log)
            }) {
                run.note(format!("INSTALL FAILED for {}", entry.name));
                state.advance(EntryState::Failed);
                run.finish(&format!("{title} - FAILED"));
                return RunOutcome::Failed {
                    package: Some(entry.name.clone()),
                    reason: e.to_string(),
                };
            }

            if let Err(e) = self.db.reload() {
                warn!("Failed to reload package database: {}", e);
            }
            state.advance(EntryState::Done);
        }

        run.note("");
        run.note("=== Build complete ===");
        let mut message = format!("Successfully built and installed {label}");
        if total > 1 {
            message.push_str(&format!(" ({total} AUR packages)"));
        }
        info!("{}", message);
        run.note(message);
        run.finish(&format!("Build complete: {label}"));

        RunOutcome::Completed
    }

    /// Fetch and review one entry; `Some` ends the run
    fn review_entry(
        &self,
        entry: &PackageRecord,
        state: &mut EntryProgress,
        reviewer: &dyn Reviewer,
    ) -> Option<RunOutcome> {
        let group = entry.group_key();

        state.advance(EntryState::Fetching);
        let recipe = match self
            .source
            .sync(group, None)
            .and_then(|_| self.source.read_recipe(group))
        {
            Ok(recipe) => recipe,
            Err(e) => {
                state.advance(EntryState::Failed);
                return Some(RunOutcome::Failed {
                    package: Some(entry.name.clone()),
                    reason: format!("Failed to fetch recipe for {}: {e}", entry.name),
                });
            }
        };

        state.advance(EntryState::Reviewing);
        let artifact = self.reviews.artifact(&entry.name, group, recipe);
        if !reviewer.review(&artifact) {
            info!("Recipe for {} rejected", entry.name);
            state.advance(EntryState::Cancelled);
            return Some(RunOutcome::Cancelled {
                package: entry.name.clone(),
            });
        }

        if let Err(e) = self.reviews.save(group, &artifact.recipe) {
            warn!("Failed to save reviewed recipe for {}: {}", group, e);
        }
        None
    }
}
