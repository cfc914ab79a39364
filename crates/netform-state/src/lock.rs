//! Exclusive locks on a state location.
//!
//! A lock is a file created with exclusive-create semantics next to the
//! state document. Whoever creates it holds the lock until the guard is
//! dropped; a second attempt fails immediately with
//! [`NetformError::StateLocked`].

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use netform_common::error::{NetformError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata written into a lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier, used by `force-unlock`.
    pub id: Uuid,
    /// Operation holding the lock, e.g. `apply`.
    pub operation: String,
    /// `user@host` of the holder.
    pub who: String,
    /// Acquisition time.
    pub created: DateTime<Utc>,
}

impl LockInfo {
    /// Returns a one-line description of the holder.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "lock {} ({} by {} since {})",
            self.id,
            self.operation,
            self.who,
            self.created.to_rfc3339()
        )
    }
}

fn current_holder() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".into());
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into());
    format!("{user}@{host}")
}

/// Reads the lock file at `path`, if any.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn read_lock(path: &Path) -> Result<Option<LockInfo>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(NetformError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// A held state lock. Released when dropped.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    info: LockInfo,
}

impl StateLock {
    /// Acquires the lock at `path` for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`NetformError::StateLocked`] if another holder exists, or an
    /// I/O error if the lock file cannot be written.
    pub fn acquire(path: &Path, operation: &str) -> Result<Self> {
        let io_err = |source| NetformError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = read_lock(path)
                    .ok()
                    .flatten()
                    .map_or_else(|| "an unreadable lock file".to_string(), |info| info.describe());
                tracing::warn!(path = %path.display(), %holder, "state is locked");
                return Err(NetformError::StateLocked {
                    path: path.to_path_buf(),
                    holder,
                });
            }
            Err(e) => return Err(io_err(e)),
        };

        let info = LockInfo {
            id: Uuid::new_v4(),
            operation: operation.to_string(),
            who: current_holder(),
            created: Utc::now(),
        };
        let payload = serde_json::to_vec_pretty(&info)?;
        if let Err(e) = file.write_all(&payload).and_then(|()| file.sync_all()) {
            let _ = std::fs::remove_file(path);
            return Err(io_err(e));
        }

        tracing::debug!(path = %path.display(), lock_id = %info.id, operation, "acquired state lock");
        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    /// Returns the lock metadata.
    #[must_use]
    pub const fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        // The file may have been force-unlocked and taken by another holder.
        match read_lock(&self.path) {
            Ok(Some(held)) if held.id == self.info.id => {}
            Ok(Some(held)) => {
                tracing::warn!(
                    lock_id = %self.info.id,
                    holder = %held.describe(),
                    "state lock was taken over, leaving it in place"
                );
                return;
            }
            Ok(None) => {
                tracing::warn!(lock_id = %self.info.id, "state lock was removed while held");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state lock no longer readable, leaving it in place"
                );
                return;
            }
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(lock_id = %self.info.id, "released state lock"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to release state lock"
            ),
        }
    }
}

/// Removes a lock left behind by a crashed operation.
///
/// Only succeeds when the lock's id matches `id`.
///
/// # Errors
///
/// Returns [`NetformError::NotFound`] when no lock exists and
/// [`NetformError::Config`] when the id does not match.
pub fn force_unlock(path: &Path, id: Uuid) -> Result<LockInfo> {
    let info = read_lock(path)?.ok_or_else(|| NetformError::NotFound {
        kind: "lock",
        id: path.display().to_string(),
    })?;
    if info.id != id {
        return Err(NetformError::Config {
            message: format!("lock id mismatch: held lock is {}", info.id),
        });
    }
    std::fs::remove_file(path).map_err(|e| NetformError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::warn!(lock_id = %id, "forcibly removed state lock");
    Ok(info)
}

/// Removes a lock file whose contents cannot be parsed.
///
/// Such files are left by a crash between creating the lock and writing
/// its metadata, so they carry no id to match against.
///
/// # Errors
///
/// Returns [`NetformError::NotFound`] when no lock exists and
/// [`NetformError::Config`] when the lock is readable and must be removed
/// by id instead.
pub fn clear_unreadable_lock(path: &Path) -> Result<()> {
    match read_lock(path) {
        Ok(None) => Err(NetformError::NotFound {
            kind: "lock",
            id: path.display().to_string(),
        }),
        Ok(Some(info)) => Err(NetformError::Config {
            message: format!("{} is readable; remove it by id", info.describe()),
        }),
        Err(NetformError::Serialization { source: e }) => {
            std::fs::remove_file(path).map_err(|source| NetformError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::warn!(path = %path.display(), error = %e, "removed unreadable state lock");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
