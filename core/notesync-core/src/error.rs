//! Error types for notesync-core operations.
//!
//! File capabilities report [`FileError`], which carries a coarse
//! [`FileErrorKind`] so callers can tell a vanished or revoked file apart from
//! a hiccup that the next tick will retry.

use std::fmt;
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// File Capability Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Classification of a failed file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    /// The file or directory no longer exists.
    NotFound,
    /// Access was revoked or never granted.
    PermissionDenied,
    /// Anything else. Retried on the next natural tick.
    Transient,
}

impl FileErrorKind {
    pub fn from_io(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => FileErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => FileErrorKind::PermissionDenied,
            _ => FileErrorKind::Transient,
        }
    }
}

impl fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileErrorKind::NotFound => f.write_str("not found"),
            FileErrorKind::PermissionDenied => f.write_str("permission denied"),
            FileErrorKind::Transient => f.write_str("transient failure"),
        }
    }
}

/// A failed operation on a file or directory handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{context}: {kind}")]
pub struct FileError {
    pub kind: FileErrorKind,
    pub context: String,
}

impl FileError {
    pub fn new(kind: FileErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
        }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Self::new(FileErrorKind::NotFound, context)
    }

    pub fn permission_denied(context: impl Into<String>) -> Self {
        Self::new(FileErrorKind::PermissionDenied, context)
    }

    pub fn transient(context: impl Into<String>) -> Self {
        Self::new(FileErrorKind::Transient, context)
    }

    pub fn from_io(context: impl Into<String>, err: &std::io::Error) -> Self {
        Self::new(
            FileErrorKind::from_io(err.kind()),
            format!("{}: {}", context.into(), err),
        )
    }

    /// True when retrying cannot succeed (file gone or access revoked).
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.kind,
            FileErrorKind::NotFound | FileErrorKind::PermissionDenied
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Engine Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in notesync-core operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    // ─────────────────────────────────────────────────────────────────────
    // Capability Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    File(#[from] FileError),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    // ─────────────────────────────────────────────────────────────────────
    // Workspace Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("No folder is open")]
    NoFolderOpen,

    #[error("No file is open")]
    NoOpenFile,

    #[error("Invalid session path: {0}")]
    InvalidSessionPath(String),

    // ─────────────────────────────────────────────────────────────────────
    // Configuration and Serialization Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SyncError {
    /// True for capability errors that retrying cannot fix.
    pub fn is_permanent(&self) -> bool {
        match self {
            SyncError::File(err) => err.is_permanent(),
            _ => false,
        }
    }
}

/// Convenience type alias for Results using SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;
