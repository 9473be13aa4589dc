// src/resolver/plan.rs

//! Resolution plan data structures
//!
//! A [`Resolution`] is the output of one `resolve` call. A [`BuildPlan`]
//! merges one or more resolutions into the input of a build run, and a
//! [`PlanSummary`] is what the user confirms before the run starts.

use crate::package::PackageRecord;
use std::collections::HashSet;
use std::fmt;

/// Result of resolving one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Source packages to build, dependencies first, one per group key
    pub build_order: Vec<PackageRecord>,
    /// Dependency strings the binary repositories will provide
    pub repo_deps: Vec<String>,
    /// Dependency strings already met by installed packages
    pub satisfied_deps: Vec<String>,
}

impl Resolution {
    /// Nothing needs building
    pub fn is_up_to_date(&self) -> bool {
        self.build_order.is_empty()
    }
}

/// Source builds and repository dependencies for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub entries: Vec<PackageRecord>,
    pub repo_deps: Vec<String>,
    pub satisfied_deps: Vec<String>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resolution(resolution: Resolution) -> Self {
        let mut plan = Self::new();
        plan.merge(resolution);
        plan
    }

    /// Fold another resolution into this plan
    ///
    /// Entries are deduplicated by group key with the first occurrence
    /// kept; repository and satisfied dependencies are sorted and
    /// deduplicated.
    pub fn merge(&mut self, resolution: Resolution) {
        let mut groups: HashSet<String> = self
            .entries
            .iter()
            .map(|entry| entry.group_key().to_string())
            .collect();

        for entry in resolution.build_order {
            if groups.insert(entry.group_key().to_string()) {
                self.entries.push(entry);
            }
        }

        self.repo_deps.extend(resolution.repo_deps);
        self.repo_deps.sort();
        self.repo_deps.dedup();

        self.satisfied_deps.extend(resolution.satisfied_deps);
        self.satisfied_deps.sort();
        self.satisfied_deps.dedup();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self, label: impl Into<String>) -> PlanSummary {
        PlanSummary {
            label: label.into(),
            entries: self
                .entries
                .iter()
                .map(|e| (e.name.clone(), e.version.clone()))
                .collect(),
            repo_dep_count: self.repo_deps.len(),
            satisfied_count: self.satisfied_deps.len(),
        }
    }
}

/// What a build run is about to do, for confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    /// Names the run in logs and the completion banner
    pub label: String,
    /// `(name, version)` per build entry, in build order
    pub entries: Vec<(String, String)>,
    pub repo_dep_count: usize,
    pub satisfied_count: usize,
}

impl PlanSummary {
    pub fn is_up_to_date(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_up_to_date() {
            return write!(f, "{}: already up to date", self.label);
        }

        writeln!(f, "{}: {} package(s) to build", self.label, self.entries.len())?;
        for (name, version) in &self.entries {
            writeln!(f, "  {name} {version}")?;
        }
        write!(
            f,
            "{} repository dependencies, {} already satisfied",
            self.repo_dep_count, self.satisfied_count
        )
    }
}
