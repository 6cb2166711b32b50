//! In-app back/forward navigation.
//!
//! An ordered log of visited locations plus a cursor into it. Entries are
//! never edited in place: traversal only moves the cursor, a fresh push
//! discards everything after it, and refreshing the current entry's editor
//! state replaces that entry with a new one.
//!
//! # Host History
//!
//! Each push is mirrored into the host's native history, tagged with the new
//! index, so the host's own back/forward gesture works. When that gesture
//! fires, the caller replays it as single internal steps inside
//! [`NavigationHistory::begin_replay`] / [`NavigationHistory::end_replay`];
//! while replaying nothing is mirrored back to the host.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::editor::EditorSnapshot;
use crate::handle::{DirectoryHandle, FileHandle};

/// One visited location.
#[derive(Clone)]
pub struct HistoryEntry {
    /// Root first, the directory holding the location last.
    directories: Vec<Arc<dyn DirectoryHandle>>,
    file: Option<Arc<dyn FileHandle>>,
    snapshot: Option<EditorSnapshot>,
}

impl HistoryEntry {
    pub fn directory(directories: Vec<Arc<dyn DirectoryHandle>>) -> Self {
        Self {
            directories,
            file: None,
            snapshot: None,
        }
    }

    pub fn file(
        directories: Vec<Arc<dyn DirectoryHandle>>,
        file: Arc<dyn FileHandle>,
        snapshot: Option<EditorSnapshot>,
    ) -> Self {
        Self {
            directories,
            file: Some(file),
            snapshot,
        }
    }

    /// Folder names from the root to the entry's directory.
    pub fn path(&self) -> Vec<String> {
        self.directories
            .iter()
            .map(|dir| dir.name().to_string())
            .collect()
    }

    pub fn directory_chain(&self) -> &[Arc<dyn DirectoryHandle>] {
        &self.directories
    }

    pub fn directory_ref(&self) -> Option<&Arc<dyn DirectoryHandle>> {
        self.directories.last()
    }

    pub fn file_ref(&self) -> Option<&Arc<dyn FileHandle>> {
        self.file.as_ref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.file.as_ref().map(|file| file.name())
    }

    pub fn snapshot(&self) -> Option<&EditorSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn with_snapshot(&self, snapshot: EditorSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            ..self.clone()
        }
    }
}

impl fmt::Debug for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryEntry")
            .field("path", &self.path())
            .field("filename", &self.filename())
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

/// The host's native back/forward facility.
pub trait HostHistory: Send {
    /// A new native entry tagged with internal `index`.
    fn push_entry(&mut self, index: usize);

    /// The in-app buttons moved to `index`; keep the native pointer in step.
    fn move_to(&mut self, _index: usize) {}
}

/// For hosts without native history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHostHistory;

impl HostHistory for NoHostHistory {
    fn push_entry(&mut self, _index: usize) {}
}

#[derive(Debug, Default)]
struct HostStack {
    tags: Vec<usize>,
    position: Option<usize>,
    pushes: usize,
}

/// An in-process stand-in for a browser history stack.
///
/// Clones share the same stack, so a host can keep one clone to simulate the
/// user's back/forward gestures while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryHostHistory {
    inner: Arc<Mutex<HostStack>>,
}

impl MemoryHostHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostStack> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Native back gesture. Returns the tag the host would deliver, if any.
    pub fn back(&self) -> Option<usize> {
        let mut stack = self.lock();
        let position = stack.position?.checked_sub(1)?;
        stack.position = Some(position);
        stack.tags.get(position).copied()
    }

    /// Native forward gesture.
    pub fn forward(&self) -> Option<usize> {
        let mut stack = self.lock();
        let position = stack.position? + 1;
        let tag = stack.tags.get(position).copied()?;
        stack.position = Some(position);
        Some(tag)
    }

    /// Jumps `delta` entries at once, as a long-press history menu does.
    pub fn go(&self, delta: isize) -> Option<usize> {
        let mut stack = self.lock();
        let target = stack.position? as isize + delta;
        if target < 0 || target as usize >= stack.tags.len() {
            return None;
        }
        stack.position = Some(target as usize);
        stack.tags.get(target as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current(&self) -> Option<usize> {
        let stack = self.lock();
        stack.position.and_then(|p| stack.tags.get(p).copied())
    }

    pub fn push_count(&self) -> usize {
        self.lock().pushes
    }
}

impl HostHistory for MemoryHostHistory {
    fn push_entry(&mut self, index: usize) {
        let mut stack = self.lock();
        let keep = stack.position.map_or(0, |p| p + 1);
        stack.tags.truncate(keep);
        stack.tags.push(index);
        stack.position = Some(stack.tags.len() - 1);
        stack.pushes += 1;
    }

    fn move_to(&mut self, index: usize) {
        let mut stack = self.lock();
        if let Some(position) = stack.tags.iter().rposition(|tag| *tag == index) {
            stack.position = Some(position);
        }
    }
}

pub struct NavigationHistory {
    entries: Vec<HistoryEntry>,
    /// -1 when empty, otherwise a valid index into `entries`.
    index: isize,
    host: Box<dyn HostHistory>,
    replaying: bool,
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new(Box::new(NoHostHistory))
    }
}

impl NavigationHistory {
    pub fn new(host: Box<dyn HostHistory>) -> Self {
        Self {
            entries: Vec::new(),
            index: -1,
            host,
            replaying: false,
        }
    }

    pub fn index(&self) -> isize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        usize::try_from(self.index)
            .ok()
            .and_then(|index| self.entries.get(index))
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len() as isize
    }

    /// Discards forward entries, appends `entry`, and mirrors it to the host
    /// unless a native gesture is being replayed. Returns the new index.
    pub fn push(&mut self, entry: HistoryEntry) -> usize {
        self.entries.truncate((self.index + 1) as usize);
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        self.index = index as isize;
        if !self.replaying {
            self.host.push_entry(index);
        }
        index
    }

    pub fn go_back(&mut self) -> Option<&HistoryEntry> {
        if self.index <= 0 {
            return None;
        }
        self.index -= 1;
        self.sync_host();
        self.current()
    }

    pub fn go_forward(&mut self) -> Option<&HistoryEntry> {
        if !self.can_go_forward() {
            return None;
        }
        self.index += 1;
        self.sync_host();
        self.current()
    }

    fn sync_host(&mut self) {
        if !self.replaying {
            self.host.move_to(self.index as usize);
        }
    }

    /// Replaces the current entry with one carrying `snapshot`.
    pub fn refresh_current(&mut self, snapshot: EditorSnapshot) -> bool {
        let index = match usize::try_from(self.index) {
            Ok(index) if index < self.entries.len() => index,
            _ => return false,
        };
        let refreshed = self.entries[index].with_snapshot(snapshot);
        self.entries[index] = refreshed;
        true
    }

    /// Drops every entry, e.g. when a different root folder is opened.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = -1;
    }

    /// Signed number of single steps from the current index to `target`.
    /// `None` if `target` is out of range.
    pub fn steps_to(&self, target: usize) -> Option<isize> {
        if target >= self.entries.len() {
            return None;
        }
        Some(target as isize - self.index)
    }

    pub fn begin_replay(&mut self) {
        self.replaying = true;
    }

    pub fn end_replay(&mut self) {
        self.replaying = false;
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }
}

impl fmt::Debug for NavigationHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationHistory")
            .field("entries", &self.entries)
            .field("index", &self.index)
            .field("replaying", &self.replaying)
            .finish()
    }
}
