//! Write Lock
//!
//! Advisory exclusive lock that enforces the single-writer rule.
//!
//! The lock lives on a duplicate of the data file's descriptor and is released
//! when the `WriteLock` is dropped. Readers never lock, so any number of them
//! may coexist with the one writer.

use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{DepotError, Result};

/// Held by a writer handle for as long as it stays open
#[derive(Debug)]
pub struct WriteLock {
    /// Duplicate descriptor that owns the lock
    file: File,
    /// Locked path (for error messages and logs)
    path: PathBuf,
}

impl WriteLock {
    /// Try to take the exclusive lock without blocking
    ///
    /// Fails fast with `LockConflict` when another writer holds it.
    pub fn acquire(file: &File, path: &Path) -> Result<Self> {
        let file = file.try_clone()?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                file,
                path: path.to_path_buf(),
            }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(DepotError::LockConflict(path.to_path_buf()))
            }
            Err(e) => Err(DepotError::Io(e)),
        }
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release write lock");
        }
    }
}
