//! State locations and the per-environment state handle.

use std::fmt;
use std::path::{Path, PathBuf};

use netform_common::constants::{LOCK_OBJECT, STATE_OBJECT};
use netform_common::error::{NetformError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::StateDocument;
use crate::lock::{self, LockInfo, StateLock};

/// Where an environment's state lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StateLocation {
    /// A directory on local disk.
    Local {
        /// Directory holding the state and lock files.
        dir: PathBuf,
    },
    /// A bucket/prefix pair in a GCS-compatible object store, reached
    /// through the mount point `root`.
    Bucket {
        /// Mount point of the object store.
        root: PathBuf,
        /// Bucket name.
        bucket: String,
        /// Object prefix.
        prefix: String,
    },
}

impl StateLocation {
    /// Returns the directory holding the state objects.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        match self {
            Self::Local { dir } => dir.clone(),
            Self::Bucket {
                root,
                bucket,
                prefix,
            } => prefix
                .split('/')
                .filter(|segment| !segment.is_empty())
                .fold(root.join(bucket), |path, segment| path.join(segment)),
        }
    }

    /// Returns the path of the state document.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.dir().join(STATE_OBJECT)
    }

    /// Returns the path of the lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.dir().join(LOCK_OBJECT)
    }
}

impl fmt::Display for StateLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { dir } => write!(f, "local:{}", dir.join(STATE_OBJECT).display()),
            Self::Bucket { bucket, prefix, .. } => {
                write!(f, "gs://{bucket}/{}/{STATE_OBJECT}", prefix.trim_matches('/'))
            }
        }
    }
}

/// The explicitly addressed state of one environment.
///
/// Handles are plain values: two handles for different locations never
/// share anything, so several environments can be processed in one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateHandle {
    location: StateLocation,
}

impl StateHandle {
    /// Creates a handle for `location`.
    #[must_use]
    pub const fn new(location: StateLocation) -> Self {
        Self { location }
    }

    /// Returns the handle's location.
    #[must_use]
    pub const fn location(&self) -> &StateLocation {
        &self.location
    }

    /// Acquires the exclusive lock for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`NetformError::StateLocked`] if the state is already locked.
    pub fn lock(&self, operation: &str) -> Result<StateLock> {
        StateLock::acquire(&self.location.lock_path(), operation)
    }

    /// Returns the current lock holder, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing lock file cannot be read.
    pub fn lock_info(&self) -> Result<Option<LockInfo>> {
        lock::read_lock(&self.location.lock_path())
    }

    /// Removes a stale lock whose id is `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no lock or the id does not match.
    pub fn force_unlock(&self, id: Uuid) -> Result<LockInfo> {
        lock::force_unlock(&self.location.lock_path(), id)
    }

    /// Removes a lock file that cannot be parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no lock or the lock is readable.
    pub fn clear_unreadable_lock(&self) -> Result<()> {
        lock::clear_unreadable_lock(&self.location.lock_path())
    }

    /// Loads the state document, or `None` if nothing has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<StateDocument>> {
        let path = self.location.state_path();
        tracing::debug!(path = %path.display(), "loading state");
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NetformError::Io { path, source: e }),
        }
    }

    /// Loads the state for `environment`, creating an empty one if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or belongs to
    /// another environment.
    pub fn load_or_new(&self, environment: &str) -> Result<StateDocument> {
        match self.load()? {
            Some(doc) => {
                doc.ensure_environment(environment)?;
                Ok(doc)
            }
            None => Ok(StateDocument::new(environment)),
        }
    }

    /// Persists `doc` atomically, bumping its serial and timestamp.
    ///
    /// `doc` is only updated once the write has succeeded.
    ///
    /// Requires the caller to hold this handle's lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock belongs to another location or the
    /// document cannot be written.
    pub fn save(&self, lock: &StateLock, doc: &mut StateDocument) -> Result<()> {
        let lock_path = self.location.lock_path();
        if lock.path() != lock_path {
            return Err(NetformError::Config {
                message: format!(
                    "lock {} does not guard {}",
                    lock.path().display(),
                    self.location
                ),
            });
        }

        let mut next = doc.clone();
        next.serial += 1;
        next.updated_at = chrono::Utc::now();

        let path = self.location.state_path();
        write_atomic(&path, &serde_json::to_vec_pretty(&next)?)?;
        tracing::debug!(path = %path.display(), serial = next.serial, "saved state");
        *doc = next;
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |source| NetformError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use netform_common::types::{ResourceAddress, ResourceKind};

    use super::*;
    use crate::document::ResourceRecord;

    fn local(dir: &Path) -> StateHandle {
        StateHandle::new(StateLocation::Local {
            dir: dir.to_path_buf(),
        })
    }

    #[test]
    fn bucket_location_maps_prefix_under_root() {
        let loc = StateLocation::Bucket {
            root: PathBuf::from("/mnt/buckets"),
            bucket: "acme-state".into(),
            prefix: "network/dev/".into(),
        };
        assert_eq!(
            loc.state_path(),
            PathBuf::from("/mnt/buckets/acme-state/network/dev/default.nfstate")
        );
        assert_eq!(loc.to_string(), "gs://acme-state/network/dev/default.nfstate");
    }

    #[test]
    fn load_missing_state_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(local(dir.path()).load().expect("load").is_none());
    }

    #[test]
    fn save_then_load_bumps_serial() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = local(dir.path());
        let lock = handle.lock("apply").expect("lock");

        let mut doc = handle.load_or_new("dev").expect("new");
        let _ = doc.resources.insert(
            ResourceAddress::new(ResourceKind::Network, "vpc"),
            ResourceRecord {
                self_link: "link".into(),
                attributes: serde_json::json!({}),
                depends_on: Vec::new(),
            },
        );
        handle.save(&lock, &mut doc).expect("save");
        handle.save(&lock, &mut doc).expect("save again");

        let loaded = handle.load().expect("load").expect("present");
        assert_eq!(loaded.serial, 2);
        assert_eq!(loaded.lineage, doc.lineage);
        assert_eq!(loaded.resources.len(), 1);
    }

    #[test]
    fn failed_save_keeps_serial() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = local(dir.path());
        let lock = handle.lock("apply").expect("lock");
        let mut doc = handle.load_or_new("dev").expect("new");
        handle.save(&lock, &mut doc).expect("save");
        let saved_at = doc.updated_at;

        // A directory where the state file belongs makes the rename fail.
        let state_path = handle.location().state_path();
        std::fs::remove_file(&state_path).expect("remove state");
        std::fs::create_dir(&state_path).expect("block state path");

        assert!(handle.save(&lock, &mut doc).is_err());
        assert_eq!(doc.serial, 1);
        assert_eq!(doc.updated_at, saved_at);
    }

    #[test]
    fn save_rejects_foreign_lock() {
        let a = tempfile::tempdir().expect("tempdir");
        let b = tempfile::tempdir().expect("tempdir");
        let lock_a = local(a.path()).lock("apply").expect("lock");
        let mut doc = StateDocument::new("dev");
        assert!(local(b.path()).save(&lock_a, &mut doc).is_err());
    }

    #[test]
    fn environments_do_not_share_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dev = local(&dir.path().join("dev"));
        let prod = local(&dir.path().join("prod"));

        let _dev_lock = dev.lock("apply").expect("dev lock");
        let prod_lock = prod.lock("apply").expect("prod lock is independent");
        let mut doc = prod.load_or_new("prod").expect("new");
        prod.save(&prod_lock, &mut doc).expect("save");

        assert!(dev.load().expect("load").is_none());
    }

    #[test]
    fn load_or_new_refuses_foreign_environment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handle = local(dir.path());
        let lock = handle.lock("apply").expect("lock");
        let mut doc = StateDocument::new("prod");
        handle.save(&lock, &mut doc).expect("save");

        assert!(handle.load_or_new("dev").is_err());
    }
}
