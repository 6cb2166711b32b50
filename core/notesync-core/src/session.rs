//! Per-folder session persistence.
//!
//! Each opened root folder carries a sidecar record remembering which file
//! was open and where the cursor and scroll were, so re-opening the folder
//! resumes where the user left off.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "folderName": "notes",
//!   "lastModifiedTimestamp": 1767225600000,
//!   "lastOpenFile": {
//!     "path": "journal/today.md",
//!     "cursorLine": 3,
//!     "cursorColumn": 5,
//!     "scrollTop": 0.0,
//!     "scrollLeft": 0.0,
//!     "mode": "source"
//!   }
//! }
//! ```
//!
//! # Defensive Design
//!
//! - Missing, unreadable, empty or corrupt records load as `None`
//! - Records with an unknown major version load as `None`
//! - Saves read the whole record, replace `lastOpenFile`, and rewrite it whole
//!
//! # Write Scheduling
//!
//! High-frequency triggers (cursor moves, scrolls, keystrokes) go through
//! [`SessionStore::request_save`]. Only the trailing request of a burst is
//! written, once the debounce window has passed without a newer request.
//! Requests made within the blackout window after a restore are dropped:
//! a restore causes synthetic cursor and scroll motion that would otherwise
//! overwrite the position it just restored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Millis;
use crate::editor::EditorSnapshot;
use crate::error::{FileErrorKind, Result, SyncError};
use crate::handle::DirectoryHandle;

pub const SESSION_FILE_NAME: &str = ".notesync-session.json";
pub const SESSION_RECORD_VERSION: &str = "1.0";

/// Quiet period before a requested session save is written.
pub const DEFAULT_SESSION_DEBOUNCE_MS: Millis = 2000;

/// Save requests this close after a restore are dropped.
pub const DEFAULT_RESTORE_BLACKOUT_MS: Millis = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOpenFile {
    /// Path relative to the root folder, `/`-separated.
    pub path: String,
    #[serde(flatten)]
    pub snapshot: EditorSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub version: String,
    #[serde(default)]
    pub folder_name: String,
    #[serde(default)]
    pub last_modified_timestamp: Millis,
    #[serde(default)]
    pub last_open_file: Option<LastOpenFile>,
}

impl SessionRecord {
    pub fn empty(folder_name: &str, now: Millis) -> Self {
        Self {
            version: SESSION_RECORD_VERSION.to_string(),
            folder_name: folder_name.to_string(),
            last_modified_timestamp: now,
            last_open_file: None,
        }
    }

    fn is_supported(&self) -> bool {
        let major = |v: &str| v.split('.').next().map(str::to_string);
        major(&self.version) == major(SESSION_RECORD_VERSION)
    }
}

/// Reads the sidecar record of `root`. Any failure means "no prior session".
pub fn load_session(root: &dyn DirectoryHandle) -> Option<SessionRecord> {
    let file = match root.file(SESSION_FILE_NAME) {
        Ok(file) => file,
        Err(err) if err.kind == FileErrorKind::NotFound => return None,
        Err(err) => {
            warn!(error = %err, folder = root.name(), "Failed to open session record");
            return None;
        }
    };

    let content = match file.read() {
        Ok(content) => content,
        Err(err) => {
            warn!(error = %err, folder = root.name(), "Failed to read session record");
            return None;
        }
    };

    if content.trim().is_empty() {
        debug!(folder = root.name(), "Empty session record");
        return None;
    }

    match serde_json::from_str::<SessionRecord>(&content) {
        Ok(record) if record.is_supported() => Some(record),
        Ok(record) => {
            warn!(
                version = %record.version,
                expected = SESSION_RECORD_VERSION,
                "Unsupported session record version, ignoring"
            );
            None
        }
        Err(err) => {
            warn!(error = %err, folder = root.name(), "Corrupt session record, ignoring");
            None
        }
    }
}

fn write_session(root: &dyn DirectoryHandle, record: &SessionRecord) -> Result<()> {
    let content = serde_json::to_string_pretty(record).map_err(|source| SyncError::Json {
        context: "serialize session record".to_string(),
        source,
    })?;
    let file = root.create_file(SESSION_FILE_NAME)?;
    file.write(&content)?;
    Ok(())
}

/// Read-merge-write: replaces only `lastOpenFile` and the timestamp.
pub fn save_session(
    root: &dyn DirectoryHandle,
    relative_path: &str,
    snapshot: &EditorSnapshot,
    now: Millis,
) -> Result<SessionRecord> {
    let mut record =
        load_session(root).unwrap_or_else(|| SessionRecord::empty(root.name(), now));
    record.last_open_file = Some(LastOpenFile {
        path: relative_path.to_string(),
        snapshot: *snapshot,
    });
    record.last_modified_timestamp = now;
    write_session(root, &record)?;
    Ok(record)
}

/// Writes an empty record if the folder has none yet.
pub fn ensure_session(root: &dyn DirectoryHandle, now: Millis) -> Result<SessionRecord> {
    if let Some(record) = load_session(root) {
        return Ok(record);
    }
    let record = SessionRecord::empty(root.name(), now);
    write_session(root, &record)?;
    Ok(record)
}

pub fn clear_session(root: &dyn DirectoryHandle) -> Result<()> {
    match root.remove_file(SESSION_FILE_NAME) {
        Ok(()) => Ok(()),
        Err(err) if err.kind == FileErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRequest {
    /// Will be written at `due` unless superseded.
    Scheduled { due: Millis },
    /// Arrived inside the post-restore blackout window.
    Dropped,
}

struct PendingSave {
    root: Arc<dyn DirectoryHandle>,
    relative_path: String,
    snapshot: EditorSnapshot,
    due: Millis,
}

/// Debounces session saves and enforces the post-restore blackout.
pub struct SessionStore {
    debounce_ms: Millis,
    blackout_ms: Millis,
    pending: Option<PendingSave>,
    restored_at: Option<Millis>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_DEBOUNCE_MS, DEFAULT_RESTORE_BLACKOUT_MS)
    }
}

impl SessionStore {
    pub fn new(debounce_ms: Millis, blackout_ms: Millis) -> Self {
        Self {
            debounce_ms,
            blackout_ms,
            pending: None,
            restored_at: None,
        }
    }

    /// Stamps the end of a restore; opens the blackout window.
    pub fn mark_restored(&mut self, now: Millis) {
        self.restored_at = Some(now);
        self.pending = None;
    }

    pub fn in_blackout(&self, now: Millis) -> bool {
        self.restored_at
            .is_some_and(|restored| now.saturating_sub(restored) <= self.blackout_ms)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_due(&self) -> Option<Millis> {
        self.pending.as_ref().map(|pending| pending.due)
    }

    pub fn request_save(
        &mut self,
        root: Arc<dyn DirectoryHandle>,
        relative_path: &str,
        snapshot: EditorSnapshot,
        now: Millis,
    ) -> SaveRequest {
        if self.in_blackout(now) {
            debug!(path = relative_path, "Session save dropped during restore blackout");
            return SaveRequest::Dropped;
        }
        if self.pending.is_some() {
            debug!(path = relative_path, "Session save coalesced");
        }
        let due = now.saturating_add(self.debounce_ms);
        self.pending = Some(PendingSave {
            root,
            relative_path: relative_path.to_string(),
            snapshot,
            due,
        });
        SaveRequest::Scheduled { due }
    }

    /// Writes the pending save if its quiet window has elapsed.
    pub fn poll(&mut self, now: Millis) -> Option<Result<SessionRecord>> {
        match &self.pending {
            Some(pending) if pending.due <= now => self.flush(now),
            _ => None,
        }
    }

    /// Writes the pending save immediately, if any.
    pub fn flush(&mut self, now: Millis) -> Option<Result<SessionRecord>> {
        let pending = self.pending.take()?;
        let result = save_session(
            pending.root.as_ref(),
            &pending.relative_path,
            &pending.snapshot,
            now,
        );
        if let Err(err) = &result {
            warn!(error = %err, path = %pending.relative_path, "Failed to write session record");
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::EditMode;
    use crate::handle::{FileHandle, MemoryDirectory};

    fn snapshot(line: usize) -> EditorSnapshot {
        EditorSnapshot {
            cursor_line: line,
            cursor_column: 5,
            scroll_top: 2.0,
            scroll_left: 0.0,
            mode: EditMode::Source,
        }
    }

    fn sidecar(root: &MemoryDirectory) -> Arc<crate::handle::MemoryFile> {
        root.memory_file(SESSION_FILE_NAME).expect("sidecar exists")
    }

    #[test]
    fn test_load_missing_record_is_none() {
        let root = MemoryDirectory::new("notes");
        assert!(load_session(&root).is_none());
    }

    #[test]
    fn test_load_corrupt_record_is_none() {
        let root = MemoryDirectory::new("notes");
        root.add_file(SESSION_FILE_NAME, "{oops");
        assert!(load_session(&root).is_none());
    }

    #[test]
    fn test_load_unknown_major_version_is_none() {
        let root = MemoryDirectory::new("notes");
        root.add_file(
            SESSION_FILE_NAME,
            r#"{"version":"2.0","folderName":"notes","lastModifiedTimestamp":1,"lastOpenFile":null}"#,
        );
        assert!(load_session(&root).is_none());
    }

    #[test]
    fn test_load_unreadable_record_is_none() {
        let root = MemoryDirectory::new("notes");
        let file = root.add_file(SESSION_FILE_NAME, "{}");
        file.fail_next(FileErrorKind::Transient);
        assert!(load_session(&root).is_none());
    }

    #[test]
    fn test_save_merges_into_existing_record() {
        let root = MemoryDirectory::new("notes");
        root.add_file(
            SESSION_FILE_NAME,
            r#"{"version":"1.0","folderName":"renamed","lastModifiedTimestamp":1,"lastOpenFile":null}"#,
        );

        let record = save_session(&root, "a/b.md", &snapshot(3), 500).unwrap();
        assert_eq!(record.folder_name, "renamed");
        assert_eq!(record.last_modified_timestamp, 500);

        let loaded = load_session(&root).unwrap();
        let last = loaded.last_open_file.unwrap();
        assert_eq!(last.path, "a/b.md");
        assert_eq!(last.snapshot, snapshot(3));
    }

    #[test]
    fn test_saved_record_is_pretty_camel_case() {
        let root = MemoryDirectory::new("notes");
        save_session(&root, "today.md", &snapshot(1), 42).unwrap();
        let content = sidecar(&root).read().unwrap();
        assert!(content.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["folderName"], "notes");
        assert_eq!(json["lastModifiedTimestamp"], 42);
        assert_eq!(json["lastOpenFile"]["path"], "today.md");
        assert_eq!(json["lastOpenFile"]["cursorLine"], 1);
        assert_eq!(json["lastOpenFile"]["mode"], "source");
    }

    #[test]
    fn test_ensure_session_creates_empty_record_once() {
        let root = MemoryDirectory::new("notes");
        let created = ensure_session(&root, 10).unwrap();
        assert!(created.last_open_file.is_none());
        save_session(&root, "x.md", &snapshot(0), 20).unwrap();

        let existing = ensure_session(&root, 30).unwrap();
        assert_eq!(existing.last_open_file.unwrap().path, "x.md");
    }

    #[test]
    fn test_clear_session_tolerates_missing_record() {
        let root = MemoryDirectory::new("notes");
        clear_session(&root).unwrap();
        save_session(&root, "x.md", &snapshot(0), 20).unwrap();
        clear_session(&root).unwrap();
        assert!(load_session(&root).is_none());
    }

    #[test]
    fn test_debounce_writes_only_trailing_request() {
        let root = Arc::new(MemoryDirectory::new("notes"));
        let mut store = SessionStore::default();

        for (i, now) in [0, 500, 1000, 1500].into_iter().enumerate() {
            let request = store.request_save(root.clone(), "a.md", snapshot(i), now);
            assert_eq!(request, SaveRequest::Scheduled { due: now + 2000 });
            assert!(store.poll(now).is_none());
        }

        assert!(store.poll(3499).is_none());
        let record = store.poll(3500).unwrap().unwrap();
        assert_eq!(record.last_open_file.unwrap().snapshot.cursor_line, 3);
        assert_eq!(sidecar(&root).write_count(), 1);
        assert!(!store.has_pending());
    }

    #[test]
    fn test_blackout_drops_requests_up_to_window_edge() {
        let root = Arc::new(MemoryDirectory::new("notes"));
        let mut store = SessionStore::default();
        store.mark_restored(10_000);

        assert_eq!(
            store.request_save(root.clone(), "a.md", snapshot(1), 10_999),
            SaveRequest::Dropped
        );
        assert_eq!(
            store.request_save(root.clone(), "a.md", snapshot(1), 11_000),
            SaveRequest::Dropped
        );
        assert!(!store.has_pending());
        assert_eq!(
            store.request_save(root.clone(), "a.md", snapshot(1), 11_001),
            SaveRequest::Scheduled { due: 13_001 }
        );
    }

    #[test]
    fn test_mark_restored_discards_pending_capture() {
        let root = Arc::new(MemoryDirectory::new("notes"));
        let mut store = SessionStore::default();
        store.request_save(root, "a.md", snapshot(9), 0);
        store.mark_restored(100);
        assert!(store.poll(5_000).is_none());
    }

    #[test]
    fn test_huge_debounce_saturates() {
        let root = Arc::new(MemoryDirectory::new("notes"));
        let mut store = SessionStore::new(Millis::MAX, DEFAULT_RESTORE_BLACKOUT_MS);
        assert_eq!(
            store.request_save(root, "a.md", snapshot(1), 1_000),
            SaveRequest::Scheduled { due: Millis::MAX }
        );
        assert!(store.poll(1_000_000).is_none());
        assert!(store.has_pending());
    }

    #[test]
    fn test_flush_writes_before_due() {
        let root = Arc::new(MemoryDirectory::new("notes"));
        let mut store = SessionStore::default();
        store.request_save(root.clone(), "a.md", snapshot(2), 0);
        assert!(store.flush(1).unwrap().is_ok());
        assert!(store.flush(2).is_none());
        assert!(load_session(&*root).is_some());
    }
}
