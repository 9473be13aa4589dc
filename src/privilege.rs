// src/privilege.rs

//! Root detection and build-user de-escalation
//!
//! Installing packages needs root, but makepkg refuses to run as root. When
//! invoked through sudo, builds run as the user named in `SUDO_USER` and
//! per-user caches live under that user's home directory.

use crate::error::{Error, Result};
use nix::unistd::{Gid, Uid, User, chown, geteuid};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The unprivileged account builds run as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUser {
    pub name: String,
    pub home: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

impl BuildUser {
    /// Look up an account by name
    pub fn lookup(name: &str) -> Result<Self> {
        let user = User::from_name(name)
            .map_err(|e| Error::NotFound(format!("Failed to look up user {name}: {e}")))?
            .ok_or_else(|| Error::NotFound(format!("No such user: {name}")))?;
        Ok(Self {
            name: user.name,
            home: user.dir,
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
        })
    }
}

pub fn is_root() -> bool {
    geteuid().is_root()
}

/// Fail with `PermissionDenied` unless running as root
pub fn require_root(action: &str) -> Result<()> {
    if is_root() {
        Ok(())
    } else {
        Err(Error::PermissionDenied(format!(
            "{action} requires root privileges (try sudo)"
        )))
    }
}

/// Decide which account builds run as
///
/// `None` means the current user. Running as root without `SUDO_USER` is
/// rejected.
pub fn build_user_name(running_as_root: bool, sudo_user: Option<&str>) -> Result<Option<String>> {
    if !running_as_root {
        return Ok(None);
    }
    match sudo_user.map(str::trim).filter(|u| !u.is_empty() && *u != "root") {
        Some(user) => Ok(Some(user.to_string())),
        None => Err(Error::PermissionDenied(
            "Cannot build as root directly; run through sudo from a regular user".to_string(),
        )),
    }
}

/// The build account for this process, if different from the current user
pub fn build_user() -> Result<Option<BuildUser>> {
    let sudo_user = std::env::var("SUDO_USER").ok();
    match build_user_name(is_root(), sudo_user.as_deref())? {
        Some(name) => BuildUser::lookup(&name).map(Some),
        None => Ok(None),
    }
}

/// Home directory of the invoking user
///
/// Under sudo this is the `SUDO_USER`'s home rather than root's.
pub fn invoking_home() -> Result<PathBuf> {
    if is_root()
        && let Ok(name) = std::env::var("SUDO_USER")
        && !name.is_empty()
    {
        match BuildUser::lookup(&name) {
            Ok(user) => return Ok(user.home),
            Err(e) => warn!("Falling back to root's home: {}", e),
        }
    }
    dirs::home_dir().ok_or_else(|| Error::InitError("Cannot determine home directory".to_string()))
}

/// Hand a directory tree over to the build user
pub fn chown_tree(path: &Path, user: &BuildUser) -> Result<()> {
    debug!("Changing ownership of {} to {}", path.display(), user.name);
    let uid = Uid::from_raw(user.uid);
    let gid = Gid::from_raw(user.gid);

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {e}", path.display())))?;
        chown(entry.path(), Some(uid), Some(gid)).map_err(|e| {
            Error::IoError(format!("Failed to chown {}: {e}", entry.path().display()))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_root_builds_as_self() {
        assert_eq!(build_user_name(false, None).unwrap(), None);
        assert_eq!(build_user_name(false, Some("alice")).unwrap(), None);
    }

    #[test]
    fn test_root_deescalates_to_sudo_user() {
        assert_eq!(
            build_user_name(true, Some("alice")).unwrap(),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_root_without_sudo_user_rejected() {
        assert!(matches!(
            build_user_name(true, None),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            build_user_name(true, Some("")),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            build_user_name(true, Some("root")),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_lookup_missing_user() {
        assert!(BuildUser::lookup("pmt-no-such-user-xyz").is_err());
    }
}
