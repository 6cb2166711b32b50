//! File and directory capabilities.
//!
//! The engine never touches a path directly. It holds opaque handles that can
//! read, write and stat a file, or list and descend into a directory. Handles
//! are shared as `Arc<dyn …>` and never copied into new identities.
//!
//! Two implementations ship with the crate:
//!
//! - [`local`]: the host file system
//! - [`memory`]: in-process files for scratch documents and tests

pub mod local;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::clock::Millis;
use crate::error::FileError;

pub use local::{LocalDirectory, LocalFile};
pub use memory::{MemoryDirectory, MemoryFile};

/// What a metadata fetch reports about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    pub last_modified: Millis,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One child of a directory, as returned by [`DirectoryHandle::list_entries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

pub trait FileHandle: Send + Sync + fmt::Debug {
    /// Cached display name (the last path component).
    fn name(&self) -> &str;

    fn read(&self) -> Result<String, FileError>;

    fn write(&self, content: &str) -> Result<(), FileError>;

    fn metadata(&self) -> Result<FileMetadata, FileError>;
}

pub trait DirectoryHandle: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Immediate children, in no particular order.
    fn list_entries(&self) -> Result<Vec<DirEntry>, FileError>;

    /// Existing child file. `NotFound` if absent or not a file.
    fn file(&self, name: &str) -> Result<Arc<dyn FileHandle>, FileError>;

    /// Existing child directory. `NotFound` if absent or not a directory.
    fn directory(&self, name: &str) -> Result<Arc<dyn DirectoryHandle>, FileError>;

    /// Child file, created empty if it does not exist yet.
    fn create_file(&self, name: &str) -> Result<Arc<dyn FileHandle>, FileError>;

    fn remove_file(&self, name: &str) -> Result<(), FileError>;
}

/// Rejects names that would escape the directory they are resolved against.
pub(crate) fn validate_child_name(name: &str) -> Result<(), FileError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(FileError::not_found(format!("invalid entry name {:?}", name)));
    }
    Ok(())
}

/// Sorts entries for display: directories first, then files, each by name.
pub fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}
