//! Depot File
//!
//! Positional reads and writes over the backing file.
//!
//! Every access names its offset explicitly, so readers never depend on a
//! shared seek position and `&self` is enough for lookups.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{DepotError, Result};

/// The backing file of one depot handle
#[derive(Debug)]
pub struct DepotFile {
    /// Open file handle
    file: File,
    /// Path the handle was opened from
    path: PathBuf,
    /// Whether the handle was opened for writing
    writable: bool,
}

impl DepotFile {
    /// Open an existing file
    ///
    /// A missing file is reported as `NotFound` rather than a raw I/O error.
    pub fn open(path: &Path, writable: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DepotError::NotFound(path.to_path_buf()),
                _ => DepotError::Io(e),
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            writable,
        })
    }

    /// Open for writing, creating the file when it does not exist.
    ///
    /// Never truncates: truncation must wait until the write lock is held.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            writable: true,
        })
    }

    /// Create a brand new file, replacing whatever is at `path`
    pub fn create_new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            writable: true,
        })
    }

    /// Read exactly `buf.len()` bytes starting at `offset`
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        read_exact_at(&self.file, buf, offset).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => DepotError::corrupt(format!(
                "short read: {} bytes at offset {} past end of file",
                buf.len(),
                offset
            )),
            _ => DepotError::Io(e),
        })
    }

    /// Read `len` bytes at `offset` into a fresh buffer
    pub fn read_vec(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(&mut buf, offset)?;
        Ok(buf)
    }

    /// Write all of `buf` starting at `offset`
    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        if !self.writable {
            return Err(DepotError::PermissionDenied);
        }
        write_all_at(&self.file, buf, offset)?;
        Ok(())
    }

    /// Flush file contents and metadata to stable storage
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Flush file contents only
    pub fn sync_data(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Current length of the file in bytes
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the file holds no bytes at all
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncate or extend the file
    pub fn set_len(&self, len: u64) -> Result<()> {
        if !self.writable {
            return Err(DepotError::PermissionDenied);
        }
        self.file.set_len(len)?;
        Ok(())
    }

    /// Path this file was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that the file now lives at `path` (after a rename)
    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    /// Whether writes are permitted
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Underlying file handle (used for locking)
    pub fn as_file(&self) -> &File {
        &self.file
    }
}

// =============================================================================
// Platform Helpers
// =============================================================================

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
