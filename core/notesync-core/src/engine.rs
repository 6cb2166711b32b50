//! SyncEngine - the entry point for editor hosts.
//!
//! Owns the [`Workspace`] and every component that reads or writes it, and
//! sequences them so they observe one consistent state:
//!
//! - [`Reconciler`]: reloads the open file when it changes on disk
//! - [`SessionStore`]: remembers where the user was, per root folder
//! - [`NavigationHistory`]: back/forward across folders and files
//! - [`AutosaveTrigger`]: writes dirty documents on an interval
//!
//! The engine is synchronous and not thread-safe. Hosts drive it by calling
//! [`SyncEngine::tick`] from a periodic timer and wrap it in a `Mutex` if
//! several threads need it.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use notesync_core::{LocalDirectory, SyncConfig, SyncEngine, SystemClock, TextBufferFactory};
//!
//! let mut engine = SyncEngine::new(
//!     SyncConfig::default(),
//!     Arc::new(SystemClock),
//!     Box::new(TextBufferFactory),
//! );
//! engine.open_folder(Arc::new(LocalDirectory::open("/home/me/notes")?))?;
//! loop {
//!     engine.tick();
//!     std::thread::sleep(Duration::from_millis(250));
//! }
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::autosave::AutosaveTrigger;
use crate::clock::{Clock, Millis};
use crate::config::SyncConfig;
use crate::editor::{EditMode, EditorAdapter, EditorFactory, EditorSnapshot};
use crate::error::{Result, SyncError};
use crate::handle::{sort_entries, DirEntry, DirectoryHandle, FileHandle};
use crate::history::{HistoryEntry, HostHistory, NavigationHistory};
use crate::listener::{LoggingListener, SyncListener};
use crate::prefs::{MemoryPreferences, PreferenceStore};
use crate::reconciler::{Fetched, PollTicket, Reconciler, TickOutcome, TickSkip};
use crate::session::{
    ensure_session, load_session, LastOpenFile, SaveRequest, SessionStore, SESSION_FILE_NAME,
};
use crate::workspace::{OpenDocument, Workspace};

/// What one [`SyncEngine::tick`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub reconcile: TickOutcome,
    pub autosaved: bool,
    pub session_saved: bool,
    /// A restore deferred until the editor was ready has now been applied.
    pub restore_settled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub path: String,
    /// What was applied after clamping, or `None` if deferred until ready.
    pub applied: Option<EditorSnapshot>,
}

fn same_file(a: &Arc<dyn FileHandle>, b: &Arc<dyn FileHandle>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

pub struct SyncEngine {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    workspace: Workspace,
    reconciler: Reconciler,
    sessions: SessionStore,
    history: NavigationHistory,
    autosave: AutosaveTrigger,
    prefs: Box<dyn PreferenceStore>,
    factory: Box<dyn EditorFactory>,
    listener: Box<dyn SyncListener>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        clock: Arc<dyn Clock>,
        factory: Box<dyn EditorFactory>,
    ) -> Self {
        let now = clock.now_ms();
        let mut autosave = AutosaveTrigger::new(config.autosave_interval_ms);
        if config.autosave_enabled {
            autosave.start(now);
        }
        Self {
            reconciler: Reconciler::new(config.poll_interval_ms, config.idle_threshold_ms, now),
            sessions: SessionStore::new(config.session_debounce_ms, config.restore_blackout_ms),
            history: NavigationHistory::default(),
            autosave,
            prefs: Box::new(MemoryPreferences::new()),
            factory,
            listener: Box::new(LoggingListener),
            workspace: Workspace::new(),
            clock,
            config,
        }
    }

    pub fn with_preferences(mut self, prefs: Box<dyn PreferenceStore>) -> Self {
        self.prefs = prefs;
        self
    }

    pub fn with_host_history(mut self, host: Box<dyn HostHistory>) -> Self {
        self.history = NavigationHistory::new(host);
        self
    }

    pub fn with_listener(mut self, listener: Box<dyn SyncListener>) -> Self {
        self.listener = listener;
        self
    }

    fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn preferences(&self) -> &dyn PreferenceStore {
        self.prefs.as_ref()
    }

    pub fn document(&self) -> Option<&OpenDocument> {
        self.workspace.document()
    }

    pub fn editor_mut(&mut self) -> Option<&mut dyn EditorAdapter> {
        self.workspace.document_mut().map(|doc| doc.editor_mut())
    }

    fn current_directory(&self) -> Result<Arc<dyn DirectoryHandle>> {
        self.workspace
            .current_directory()
            .cloned()
            .ok_or(SyncError::NoFolderOpen)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Folders and Sessions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Opens `root` and resumes its previous session, if it has one.
    pub fn open_folder(
        &mut self,
        root: Arc<dyn DirectoryHandle>,
    ) -> Result<Option<RestoredSession>> {
        self.leave_current()?;
        let now = self.now();
        if let Some(Err(err)) = self.sessions.flush(now) {
            self.listener.on_sync_error(&err, err.is_permanent());
        }

        self.reconciler.untrack();
        self.workspace.set_root(Arc::clone(&root));
        self.history.clear();
        self.history
            .push(HistoryEntry::directory(self.workspace.directory_chain().to_vec()));
        self.prefs.set_last_folder(root.name());
        info!(folder = root.name(), "Opened folder");

        let record = match load_session(root.as_ref()) {
            Some(record) => record,
            None => {
                if let Err(err) = ensure_session(root.as_ref(), now) {
                    warn!(error = %err, folder = root.name(), "Failed to create session record");
                }
                return Ok(None);
            }
        };
        match record.last_open_file {
            Some(last) => Ok(self.restore_session(last)),
            None => Ok(None),
        }
    }

    /// Re-opens the file a session record points at. Any failure to resolve
    /// or read it means "no prior session".
    fn restore_session(&mut self, last: LastOpenFile) -> Option<RestoredSession> {
        let (chain, file) = match self.resolve_session_path(&last.path) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(error = %err, path = %last.path, "Session points at a missing file");
                return None;
            }
        };

        // Mode must be in place before the content loads.
        self.prefs.set_edit_mode_for(&last.path, last.snapshot.mode);

        if chain.len() > 1 {
            self.workspace.set_location(chain);
            self.history
                .push(HistoryEntry::directory(self.workspace.directory_chain().to_vec()));
        }
        let applied = match self.load_document(Arc::clone(&file), last.path.clone(), Some(last.snapshot)) {
            Ok(applied) => applied,
            Err(err) => {
                warn!(error = %err, path = %last.path, "Failed to reopen session file");
                return None;
            }
        };
        self.history.push(HistoryEntry::file(
            self.workspace.directory_chain().to_vec(),
            file,
            Some(last.snapshot),
        ));

        self.sessions.mark_restored(self.now());
        self.listener.on_session_restored(&last.path);
        info!(path = %last.path, "Restored session");
        Some(RestoredSession {
            path: last.path,
            applied,
        })
    }

    /// Walks a root-relative path to its directory chain and file handle.
    fn resolve_session_path(
        &self,
        path: &str,
    ) -> Result<(Vec<Arc<dyn DirectoryHandle>>, Arc<dyn FileHandle>)> {
        let segments: Vec<&str> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let (file_name, folders) = segments
            .split_last()
            .ok_or_else(|| SyncError::InvalidSessionPath(path.to_string()))?;

        let mut chain = self.workspace.directory_chain().to_vec();
        for folder in folders {
            let next = chain.last().ok_or(SyncError::NoFolderOpen)?.directory(folder)?;
            chain.push(next);
        }
        let file = chain.last().ok_or(SyncError::NoFolderOpen)?.file(file_name)?;
        Ok((chain, file))
    }

    /// Entries of the current directory: folders first, then files, sidecar hidden.
    pub fn list_entries(&self) -> Result<Vec<DirEntry>> {
        let mut entries: Vec<DirEntry> = self
            .current_directory()?
            .list_entries()?
            .into_iter()
            .filter(|entry| entry.name != SESSION_FILE_NAME)
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn enter_directory(&mut self, name: &str) -> Result<()> {
        let dir = self.current_directory()?.directory(name)?;
        self.leave_current()?;
        self.reconciler.untrack();
        self.workspace.enter_directory(dir);
        self.history
            .push(HistoryEntry::directory(self.workspace.directory_chain().to_vec()));
        Ok(())
    }

    /// Moves to the parent folder. Returns false at the root.
    pub fn navigate_up(&mut self) -> Result<bool> {
        if self.workspace.directory_chain().len() <= 1 {
            return Ok(false);
        }
        self.leave_current()?;
        self.reconciler.untrack();
        self.workspace.leave_directory();
        self.history
            .push(HistoryEntry::directory(self.workspace.directory_chain().to_vec()));
        Ok(true)
    }

    pub fn open_file(&mut self, name: &str) -> Result<()> {
        let file = self.current_directory()?.file(name)?;
        self.open_handle(file)
    }

    /// Creates `name` in the current folder if needed, then opens it.
    pub fn create_file(&mut self, name: &str) -> Result<()> {
        let file = self.current_directory()?.create_file(name)?;
        self.open_handle(file)
    }

    fn open_handle(&mut self, file: Arc<dyn FileHandle>) -> Result<()> {
        self.leave_current()?;
        let relative_path = self.workspace.relative_path_of(file.name());
        self.load_document(Arc::clone(&file), relative_path, None)?;
        let snapshot = self.workspace.document().map(OpenDocument::snapshot);
        self.history.push(HistoryEntry::file(
            self.workspace.directory_chain().to_vec(),
            file,
            snapshot,
        ));
        self.schedule_session_save();
        Ok(())
    }

    pub fn go_back(&mut self) -> Result<bool> {
        if !self.history.can_go_back() {
            return Ok(false);
        }
        self.leave_current()?;
        let entry = match self.history.go_back() {
            Some(entry) => entry.clone(),
            None => return Ok(false),
        };
        self.materialize(entry)?;
        Ok(true)
    }

    pub fn go_forward(&mut self) -> Result<bool> {
        if !self.history.can_go_forward() {
            return Ok(false);
        }
        self.leave_current()?;
        let entry = match self.history.go_forward() {
            Some(entry) => entry.clone(),
            None => return Ok(false),
        };
        self.materialize(entry)?;
        Ok(true)
    }

    /// The host's own back/forward landed on the entry tagged `target`.
    ///
    /// Replays it as single steps so each intermediate entry is restored in
    /// order, without mirroring those steps back to the host. Returns the
    /// number of steps taken.
    pub fn handle_native_navigation(&mut self, target: usize) -> Result<usize> {
        if self.history.is_replaying() {
            return Ok(0);
        }
        let steps = match self.history.steps_to(target) {
            Some(steps) => steps,
            None => {
                warn!(target, len = self.history.len(), "Native navigation to unknown entry");
                return Ok(0);
            }
        };

        self.history.begin_replay();
        let result = self.replay(steps);
        self.history.end_replay();
        result
    }

    fn replay(&mut self, steps: isize) -> Result<usize> {
        let mut taken = 0;
        for _ in 0..steps.unsigned_abs() {
            let moved = if steps < 0 {
                self.go_back()?
            } else {
                self.go_forward()?
            };
            if !moved {
                break;
            }
            taken += 1;
        }
        debug!(steps, taken, "Replayed native navigation");
        Ok(taken)
    }

    fn materialize(&mut self, entry: HistoryEntry) -> Result<()> {
        self.reconciler.untrack();
        self.workspace.set_location(entry.directory_chain().to_vec());
        if let Some(file) = entry.file_ref() {
            let relative_path = self.workspace.relative_path_of(file.name());
            self.load_document(Arc::clone(file), relative_path, entry.snapshot().copied())?;
            self.schedule_session_save();
        }
        Ok(())
    }

    /// Persists the in-progress edit and records where the user was, before
    /// anything replaces the open document.
    fn leave_current(&mut self) -> Result<()> {
        let (snapshot, file) = match self.workspace.document() {
            Some(doc) => (doc.snapshot(), Arc::clone(doc.file())),
            None => return Ok(()),
        };
        if self.workspace.has_dirty_file() {
            self.save()?;
        }
        let is_current = self
            .history
            .current()
            .and_then(HistoryEntry::file_ref)
            .is_some_and(|entry_file| same_file(entry_file, &file));
        if is_current {
            self.history.refresh_current(snapshot);
        }
        self.schedule_session_save();
        Ok(())
    }

    /// Persists edits, flushes the session and closes the open file.
    pub fn close_file(&mut self) -> Result<()> {
        self.leave_current()?;
        if let Some(Err(err)) = self.sessions.flush(self.now()) {
            self.listener.on_sync_error(&err, err.is_permanent());
        }
        self.reconciler.untrack();
        self.workspace.close_document();
        Ok(())
    }

    /// Stops autosave and persists everything outstanding.
    pub fn shutdown(&mut self) -> Result<()> {
        self.autosave.stop();
        self.close_file()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────────

    fn load_document(
        &mut self,
        file: Arc<dyn FileHandle>,
        relative_path: String,
        snapshot: Option<EditorSnapshot>,
    ) -> Result<Option<EditorSnapshot>> {
        let mode = snapshot
            .map(|s| s.mode)
            .or_else(|| self.prefs.edit_mode_for(&relative_path))
            .unwrap_or_default();

        // Stat before reading: a write landing in between then shows up as a
        // newer stamp on the next poll instead of being missed.
        let modified = match file.metadata() {
            Ok(metadata) => Some(metadata.last_modified),
            Err(err) if err.is_permanent() => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, file = file.name(), "No modification stamp, will baseline on next poll");
                None
            }
        };
        let content = file.read()?;

        let editor = self.factory.create(mode, &content);
        self.workspace
            .open_document(OpenDocument::new(file, relative_path, editor));
        self.reconciler
            .track(self.workspace.generation(), modified, self.now());

        let document = self.workspace.document_mut().ok_or(SyncError::NoOpenFile)?;
        let applied = snapshot.and_then(|snapshot| document.restore_or_defer(snapshot));
        document.editor_mut().focus();
        debug!(path = document.relative_path(), mode = mode.as_str(), "Opened document");
        Ok(applied)
    }

    /// Writes the open document to disk.
    pub fn save(&mut self) -> Result<()> {
        let document = self.workspace.document_mut().ok_or(SyncError::NoOpenFile)?;
        let content = document.editor().content();
        let file = Arc::clone(document.file());
        file.write(&content)?;
        document.mark_clean();

        let modified = match file.metadata() {
            Ok(metadata) => Some(metadata.last_modified),
            Err(err) => {
                warn!(error = %err, file = file.name(), "Saved, but could not read back the stamp");
                None
            }
        };
        self.reconciler.note_written(modified);
        debug!(file = file.name(), "Saved document");
        Ok(())
    }

    /// The user changed the document's content.
    pub fn note_edit(&mut self) -> bool {
        let now = self.now();
        match self.workspace.document_mut() {
            Some(document) => document.mark_dirty(),
            None => return false,
        }
        self.reconciler.note_local_edit(now);
        self.schedule_session_save();
        true
    }

    /// The user moved the cursor or scrolled.
    pub fn note_activity(&mut self) {
        self.reconciler.record_activity(self.now());
        self.schedule_session_save();
    }

    /// Switches the open document between source and rich editing.
    pub fn set_edit_mode(&mut self, mode: EditMode) -> Result<()> {
        let document = self.workspace.document_mut().ok_or(SyncError::NoOpenFile)?;
        if document.editor().mode() == mode {
            return Ok(());
        }
        let mut snapshot = document.snapshot();
        snapshot.mode = mode;
        let editor = self.factory.create(mode, &document.editor().content());
        document.replace_editor(editor);
        document.restore_or_defer(snapshot);
        document.editor_mut().focus();
        let relative_path = document.relative_path().to_string();

        self.prefs.set_edit_mode_for(&relative_path, mode);
        self.schedule_session_save();
        Ok(())
    }

    fn schedule_session_save(&mut self) -> Option<SaveRequest> {
        let root = Arc::clone(self.workspace.root()?);
        let document = self.workspace.document()?;
        let now = self.now();
        Some(self.sessions.request_save(
            root,
            document.relative_path(),
            document.snapshot(),
            now,
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn pause_sync(&mut self) {
        self.reconciler.pause();
    }

    pub fn resume_sync(&mut self) {
        self.reconciler.resume();
    }

    pub fn set_autosave(&mut self, enabled: bool) {
        if enabled {
            self.autosave.start(self.now());
        } else {
            self.autosave.stop();
        }
    }

    /// First half of a reconciliation tick, for hosts that run the file I/O
    /// outside their lock. Pair with [`SyncEngine::complete_poll`].
    pub fn begin_poll(&mut self) -> std::result::Result<PollTicket, TickSkip> {
        let now = self.now();
        self.reconciler.begin(&self.workspace, now)
    }

    pub fn complete_poll(&mut self, ticket: PollTicket, fetched: Fetched) -> TickOutcome {
        let outcome = self
            .reconciler
            .complete(ticket, fetched, &mut self.workspace);
        self.notify(&outcome);
        outcome
    }

    /// Runs everything that is due: deferred restores, external change
    /// polling, autosave and debounced session writes.
    pub fn tick(&mut self) -> TickReport {
        let restore_settled = self
            .workspace
            .document_mut()
            .and_then(OpenDocument::settle_pending_restore)
            .is_some();

        let reconcile = match self.begin_poll() {
            Ok(ticket) => {
                let fetched = ticket.fetch();
                self.complete_poll(ticket, fetched)
            }
            Err(skip) => TickOutcome::Skipped(skip),
        };

        let now = self.now();
        let workspace = &self.workspace;
        let mut autosaved = false;
        if self.autosave.poll(now, || workspace.has_dirty_file()) {
            match self.save() {
                Ok(()) => autosaved = true,
                Err(err) => {
                    warn!(error = %err, "Autosave failed");
                    self.listener.on_sync_error(&err, err.is_permanent());
                }
            }
        }

        let session_saved = match self.sessions.poll(now) {
            Some(Ok(_)) => true,
            Some(Err(err)) => {
                self.listener.on_sync_error(&err, err.is_permanent());
                false
            }
            None => false,
        };

        TickReport {
            reconcile,
            autosaved,
            session_saved,
            restore_settled,
        }
    }

    fn notify(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Reloaded { name, modified, .. } => {
                self.listener.on_file_reloaded(name, *modified);
            }
            TickOutcome::TransientError(err) => {
                self.listener
                    .on_sync_error(&SyncError::File(err.clone()), false);
            }
            TickOutcome::Stopped(err) => {
                self.listener
                    .on_sync_error(&SyncError::File(err.clone()), true);
            }
            _ => {}
        }
    }
}
