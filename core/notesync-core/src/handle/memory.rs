//! In-process file handles.
//!
//! Useful for scratch documents that have no backing file, and for driving
//! the engine deterministically: modification stamps are explicit, external
//! edits can be simulated, and failures can be injected.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    validate_child_name, DirEntry, DirectoryHandle, EntryKind, FileHandle, FileMetadata,
};
use crate::clock::{Clock, ManualClock, Millis};
use crate::error::{FileError, FileErrorKind};

#[derive(Debug)]
struct FileState {
    content: String,
    modified: Millis,
    removed: bool,
    fail_next: Option<FileErrorKind>,
}

#[derive(Debug)]
pub struct MemoryFile {
    name: String,
    state: Mutex<FileState>,
    clock: Option<ManualClock>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>, modified: Millis) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(FileState {
                content: content.into(),
                modified,
                removed: false,
                fail_next: None,
            }),
            clock: None,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Stamps writes with `clock` instead of bumping the previous stamp.
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        // A poisoned lock only means a panicking test thread held it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, state: &mut FileState, op: &str) -> Result<(), FileError> {
        if state.removed {
            return Err(FileError::not_found(format!("{} {}", op, self.name)));
        }
        if let Some(kind) = state.fail_next.take() {
            return Err(FileError::new(kind, format!("{} {}", op, self.name)));
        }
        Ok(())
    }

    /// Replaces the content as another process would.
    pub fn modify_externally(&self, content: impl Into<String>, modified: Millis) {
        let mut state = self.lock();
        state.content = content.into();
        state.modified = modified;
    }

    /// Makes the next operation of any kind fail with `kind`.
    pub fn fail_next(&self, kind: FileErrorKind) {
        self.lock().fail_next = Some(kind);
    }

    /// Every later operation fails with `NotFound`.
    pub fn remove(&self) {
        self.lock().removed = true;
    }

    pub fn content(&self) -> String {
        self.lock().content.clone()
    }

    pub fn modified(&self) -> Millis {
        self.lock().modified
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<String, FileError> {
        let mut state = self.lock();
        self.check(&mut state, "read")?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(state.content.clone())
    }

    fn write(&self, content: &str) -> Result<(), FileError> {
        let mut state = self.lock();
        self.check(&mut state, "write")?;
        state.content = content.to_string();
        state.modified = match &self.clock {
            Some(clock) => clock.now_ms(),
            None => state.modified + 1,
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn metadata(&self) -> Result<FileMetadata, FileError> {
        let mut state = self.lock();
        self.check(&mut state, "metadata")?;
        Ok(FileMetadata {
            last_modified: state.modified,
            size: state.content.len() as u64,
        })
    }
}

#[derive(Debug, Clone)]
enum Node {
    File(Arc<MemoryFile>),
    Directory(Arc<MemoryDirectory>),
}

#[derive(Debug)]
pub struct MemoryDirectory {
    name: String,
    children: Mutex<BTreeMap<String, Node>>,
    clock: Option<ManualClock>,
}

impl MemoryDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Mutex::new(BTreeMap::new()),
            clock: None,
        }
    }

    /// Files created through this directory (and its subdirectories) use `clock`.
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Node>> {
        self.children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn new_file(&self, name: &str, content: &str) -> MemoryFile {
        let stamp = self.clock.as_ref().map(|c| c.now_ms()).unwrap_or(0);
        let file = MemoryFile::new(name, content, stamp);
        match &self.clock {
            Some(clock) => file.with_clock(clock.clone()),
            None => file,
        }
    }

    /// Adds (or replaces) a child file and returns it for further scripting.
    pub fn add_file(&self, name: &str, content: &str) -> Arc<MemoryFile> {
        let file = Arc::new(self.new_file(name, content));
        self.lock()
            .insert(name.to_string(), Node::File(Arc::clone(&file)));
        file
    }

    pub fn add_directory(&self, name: &str) -> Arc<MemoryDirectory> {
        let mut dir = MemoryDirectory::new(name);
        dir.clock = self.clock.clone();
        let dir = Arc::new(dir);
        self.lock()
            .insert(name.to_string(), Node::Directory(Arc::clone(&dir)));
        dir
    }

    /// Concrete handle to a child file, for test scripting.
    pub fn memory_file(&self, name: &str) -> Option<Arc<MemoryFile>> {
        match self.lock().get(name) {
            Some(Node::File(file)) => Some(Arc::clone(file)),
            _ => None,
        }
    }
}

impl DirectoryHandle for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_entries(&self) -> Result<Vec<DirEntry>, FileError> {
        Ok(self
            .lock()
            .iter()
            .map(|(name, node)| DirEntry {
                name: name.clone(),
                kind: match node {
                    Node::File(_) => EntryKind::File,
                    Node::Directory(_) => EntryKind::Directory,
                },
            })
            .collect())
    }

    fn file(&self, name: &str) -> Result<Arc<dyn FileHandle>, FileError> {
        validate_child_name(name)?;
        match self.lock().get(name) {
            Some(Node::File(file)) => Ok(Arc::clone(file) as Arc<dyn FileHandle>),
            _ => Err(FileError::not_found(format!("file {}", name))),
        }
    }

    fn directory(&self, name: &str) -> Result<Arc<dyn DirectoryHandle>, FileError> {
        validate_child_name(name)?;
        match self.lock().get(name) {
            Some(Node::Directory(dir)) => Ok(Arc::clone(dir) as Arc<dyn DirectoryHandle>),
            _ => Err(FileError::not_found(format!("directory {}", name))),
        }
    }

    fn create_file(&self, name: &str) -> Result<Arc<dyn FileHandle>, FileError> {
        validate_child_name(name)?;
        if let Some(existing) = self.memory_file(name) {
            return Ok(existing as Arc<dyn FileHandle>);
        }
        Ok(self.add_file(name, "") as Arc<dyn FileHandle>)
    }

    fn remove_file(&self, name: &str) -> Result<(), FileError> {
        validate_child_name(name)?;
        let mut children = self.lock();
        match children.get(name) {
            Some(Node::File(file)) => {
                file.remove();
                children.remove(name);
                Ok(())
            }
            _ => Err(FileError::not_found(format!("file {}", name))),
        }
    }
}
