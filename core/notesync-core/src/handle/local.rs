//! Handles backed by the host file system.
//!
//! Writes go through a temp file in the same directory followed by a rename,
//! so an external reader never observes a half-written file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs_err as fs;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::{
    validate_child_name, DirEntry, DirectoryHandle, EntryKind, FileHandle, FileMetadata,
};
use crate::error::FileError;

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<String, FileError> {
        fs::read_to_string(&self.path).map_err(|err| FileError::from_io("read", &err))
    }

    fn write(&self, content: &str) -> Result<(), FileError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| FileError::not_found("file path has no parent directory"))?;
        let mut temp_file =
            NamedTempFile::new_in(parent).map_err(|err| FileError::from_io("temp file", &err))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| FileError::from_io("write temp file", &err))?;
        temp_file
            .flush()
            .map_err(|err| FileError::from_io("flush temp file", &err))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| FileError::from_io("persist", &err.error))?;
        Ok(())
    }

    fn metadata(&self) -> Result<FileMetadata, FileError> {
        let metadata =
            fs::metadata(&self.path).map_err(|err| FileError::from_io("metadata", &err))?;
        if !metadata.is_file() {
            return Err(FileError::not_found(format!(
                "{} is not a file",
                self.path.display()
            )));
        }
        let modified = metadata
            .modified()
            .map_err(|err| FileError::from_io("modification time", &err))?;
        Ok(FileMetadata {
            last_modified: DateTime::<Utc>::from(modified).timestamp_millis(),
            size: metadata.len(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LocalDirectory {
    path: PathBuf,
    name: String,
}

impl LocalDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        Self { path, name }
    }

    /// Opens an existing directory, failing with `NotFound` otherwise.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FileError> {
        let dir = Self::new(path);
        let metadata = fs::metadata(&dir.path).map_err(|err| FileError::from_io("open", &err))?;
        if !metadata.is_dir() {
            return Err(FileError::not_found(format!(
                "{} is not a directory",
                dir.path.display()
            )));
        }
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DirectoryHandle for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_entries(&self) -> Result<Vec<DirEntry>, FileError> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| match err.io_error() {
                Some(io_err) => FileError::from_io("list entries", io_err),
                None => FileError::transient(format!("list entries: {}", err)),
            })?;
            let kind = if entry.file_type().is_dir() {
                EntryKind::Directory
            } else if entry.file_type().is_file() {
                EntryKind::File
            } else {
                continue;
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
            });
        }
        Ok(entries)
    }

    fn file(&self, name: &str) -> Result<Arc<dyn FileHandle>, FileError> {
        validate_child_name(name)?;
        let path = self.path.join(name);
        if !path.is_file() {
            return Err(FileError::not_found(format!("{} is not a file", path.display())));
        }
        Ok(Arc::new(LocalFile::new(path)))
    }

    fn directory(&self, name: &str) -> Result<Arc<dyn DirectoryHandle>, FileError> {
        validate_child_name(name)?;
        Ok(Arc::new(LocalDirectory::open(self.path.join(name))?))
    }

    fn create_file(&self, name: &str) -> Result<Arc<dyn FileHandle>, FileError> {
        validate_child_name(name)?;
        let path = self.path.join(name);
        if !path.exists() {
            fs::write(&path, "").map_err(|err| FileError::from_io("create", &err))?;
        }
        Ok(Arc::new(LocalFile::new(path)))
    }

    fn remove_file(&self, name: &str) -> Result<(), FileError> {
        validate_child_name(name)?;
        fs::remove_file(self.path.join(name)).map_err(|err| FileError::from_io("remove", &err))
    }
}
