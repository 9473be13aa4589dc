// src/build/review.rs

//! Recipe review before building
//!
//! Every recipe is shown to a human before it runs. When a previously
//! accepted copy of the same group's recipe exists, the review shows a
//! unified diff against it; accepting stores the new text as the baseline.

use super::recipe::RECIPE_FILE;
use crate::error::{Error, Result};
use crate::privilege::{BuildUser, chown_tree};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One recipe awaiting a decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewArtifact {
    pub package: String,
    pub group: String,
    pub recipe: String,
    /// Last accepted text, absent when new or byte-identical
    pub previous: Option<String>,
}

impl ReviewArtifact {
    pub fn new(
        package: impl Into<String>,
        group: impl Into<String>,
        recipe: impl Into<String>,
        previous: Option<String>,
    ) -> Self {
        let recipe = recipe.into();
        let previous = previous.filter(|old| *old != recipe);
        Self {
            package: package.into(),
            group: group.into(),
            recipe,
            previous,
        }
    }

    /// Unified diff against the last accepted text
    pub fn diff(&self) -> Option<String> {
        self.previous
            .as_deref()
            .map(|old| diffy::create_patch(old, &self.recipe).to_string())
    }
}

/// Makes the accept/reject decision for a recipe
pub trait Reviewer: Send + Sync {
    /// `true` accepts the recipe
    fn review(&self, artifact: &ReviewArtifact) -> bool;
}

/// Accepts everything without looking
#[derive(Debug, Default)]
pub struct AcceptAll;

impl Reviewer for AcceptAll {
    fn review(&self, _artifact: &ReviewArtifact) -> bool {
        true
    }
}

/// Directory of last accepted recipes, one per group
#[derive(Debug, Clone)]
pub struct ReviewStore {
    root: PathBuf,
    owner: Option<BuildUser>,
}

impl ReviewStore {
    pub fn new(root: impl Into<PathBuf>, owner: Option<BuildUser>) -> Self {
        Self {
            root: root.into(),
            owner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, group: &str) -> PathBuf {
        self.root.join(group).join(RECIPE_FILE)
    }

    /// Last accepted recipe text for a group
    pub fn load(&self, group: &str) -> Option<String> {
        std::fs::read_to_string(self.path(group)).ok()
    }

    /// Record `recipe` as the accepted baseline for a group
    pub fn save(&self, group: &str, recipe: &str) -> Result<()> {
        let dir = self.root.join(group);
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", dir.display())))?;
        std::fs::write(self.path(group), recipe)?;
        debug!("Saved reviewed recipe for {}", group);

        if let Some(owner) = &self.owner
            && let Err(e) = chown_tree(&dir, owner)
        {
            warn!("Could not hand reviewed recipe to {}: {}", owner.name, e);
        }
        Ok(())
    }

    /// Build the review for a freshly fetched recipe
    pub fn artifact(&self, package: &str, group: &str, recipe: String) -> ReviewArtifact {
        ReviewArtifact::new(package, group, recipe, self.load(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_baseline_means_no_diff() {
        let artifact = ReviewArtifact::new("foo", "foo", "pkgver=1\n", Some("pkgver=1\n".to_string()));
        assert_eq!(artifact.previous, None);
        assert_eq!(artifact.diff(), None);
    }

    #[test]
    fn test_changed_baseline_diffs() {
        let artifact = ReviewArtifact::new(
            "foo",
            "foo",
            "pkgver=2\npkgrel=1\n",
            Some("pkgver=1\npkgrel=1\n".to_string()),
        );
        let diff = artifact.diff().unwrap();
        assert!(diff.contains("-pkgver=1"));
        assert!(diff.contains("+pkgver=2"));
        assert!(!diff.contains("-pkgrel=1"));
    }

    #[test]
    fn test_store_round_trip_per_group() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReviewStore::new(dir.path(), None);

        assert_eq!(store.load("foo"), None);
        store.save("foo", "pkgver=1\n").unwrap();
        assert_eq!(store.load("foo").as_deref(), Some("pkgver=1\n"));
        assert!(dir.path().join("foo").join(RECIPE_FILE).exists());

        let artifact = store.artifact("python-foo", "foo", "pkgver=2\n".to_string());
        assert_eq!(artifact.previous.as_deref(), Some("pkgver=1\n"));
        assert_eq!(store.load("bar"), None);
    }
}
