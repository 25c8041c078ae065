//! Error types for DepotKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using DepotError
pub type Result<T> = std::result::Result<T, DepotError>;

/// Unified error type for DepotKV operations
#[derive(Debug, Error)]
pub enum DepotError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Open / Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Depot file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Depot is locked by another writer: {}", .0.display())]
    LockConflict(PathBuf),

    #[error("Depot handle has already been closed")]
    UseAfterClose,

    #[error("Write operation on a read-only depot")]
    PermissionDenied,

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Depot corruption detected: {0}")]
    Corrupt(String),

    #[error("Record too large: {size} bytes")]
    RecordTooLarge { size: u64 },

    // -------------------------------------------------------------------------
    // Key Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Key already exists")]
    KeyExists,

    // -------------------------------------------------------------------------
    // Cursor Errors
    // -------------------------------------------------------------------------
    #[error("Cannot compact while a cursor is active")]
    CursorActive,

    #[error("Cursor invalidated by a layout change")]
    IteratorInvalidated,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DepotError {
    /// Shorthand for building a `Corrupt` error
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        DepotError::Corrupt(msg.into())
    }
}
