//! # Service account ownership.
//!
//! The daemons run as an unprivileged service account, so every file the
//! orchestrator creates on their behalf is handed over to it. The account is
//! resolved once at startup into an [`Owner`] and injected through
//! [`Config`](crate::Config).

use std::io;
use std::path::Path;

use nix::unistd::{self, Gid, Group, Uid, User};
use walkdir::WalkDir;

use crate::error::RuntimeError;

/// Numeric uid/gid pair the cluster's files belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// Resolves the user and the group named `account`.
    pub fn lookup(account: &str) -> Result<Self, RuntimeError> {
        let fail = |reason: String| RuntimeError::Ownership {
            account: account.to_string(),
            reason,
        };

        let user = User::from_name(account)
            .map_err(|e| fail(format!("user lookup: {e}")))?
            .ok_or_else(|| fail("no such user".to_string()))?;
        let group = Group::from_name(account)
            .map_err(|e| fail(format!("group lookup: {e}")))?
            .ok_or_else(|| fail("no such group".to_string()))?;

        Ok(Self {
            uid: user.uid.as_raw(),
            gid: group.gid.as_raw(),
        })
    }

    /// The identity of the running process.
    pub fn current() -> Self {
        Self {
            uid: Uid::current().as_raw(),
            gid: Gid::current().as_raw(),
        }
    }

    /// Changes the owner of a single path.
    pub fn chown(&self, path: &Path) -> io::Result<()> {
        unistd::chown(
            path,
            Some(Uid::from_raw(self.uid)),
            Some(Gid::from_raw(self.gid)),
        )
        .map_err(io::Error::from)
    }

    /// Changes the owner of `root` and everything below it.
    pub fn chown_recursive(&self, root: &Path) -> io::Result<()> {
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(io::Error::from)?;
            self.chown(entry.path())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    #[test]
    fn chown_recursive_reaches_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("mon/ceph-a");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("keyring"), b"[mon.]").unwrap();

        let owner = Owner::current();
        owner.chown_recursive(dir.path()).unwrap();

        let meta = std::fs::metadata(nested.join("keyring")).unwrap();
        assert_eq!(meta.uid(), owner.uid);
        assert_eq!(meta.gid(), owner.gid);
    }

    #[test]
    fn chown_recursive_reports_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = Owner::current()
            .chown_recursive(&dir.path().join("absent"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn lookup_resolves_root_and_rejects_unknown_accounts() {
        assert_eq!(Owner::lookup("root").unwrap(), Owner { uid: 0, gid: 0 });

        let err = Owner::lookup("no-such-account-for-cephvisor").unwrap_err();
        assert_eq!(err.as_label(), "runtime_ownership");
    }
}
