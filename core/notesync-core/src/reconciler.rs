//! External change reconciliation.
//!
//! Polls the open file's metadata and reloads it when another process has
//! changed it, unless the user's own edits are newer.
//!
//! # Tick Lifecycle
//!
//! ```text
//! Idle ──(poll due)──► Polling ──► Skip ──────────────────────────────► Idle
//!                         │
//!                         └──► Capturing ► SwappingContent ► Restoring ► Settled ► Idle
//! ```
//!
//! A tick is split so the I/O can run without holding the shared state:
//!
//! 1. [`Reconciler::begin`] checks the guard (open file, not paused, user
//!    idle, nothing already in flight) and hands out a [`PollTicket`].
//! 2. [`PollTicket::fetch`] stats the file and reads it if needed.
//! 3. [`Reconciler::complete`] re-validates against the current
//!    [`Workspace`] (same document generation, local edits still older) and
//!    only then swaps the content in.
//!
//! [`Reconciler::tick`] runs all three back to back.
//!
//! # Last Edit Wins
//!
//! If the user edited locally after the external modification stamp, the
//! external change is ignored and the displayed content is left alone. The
//! comparison uses coarse file timestamps, so writers racing within the
//! timestamp granularity can still interleave; that is accepted.
//!
//! # Errors
//!
//! `NotFound`/`PermissionDenied` stop polling for the file for good and are
//! reported once. Anything else is reported and retried on the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::activity::{ActivityTracker, DEFAULT_IDLE_THRESHOLD_MS};
use crate::clock::Millis;
use crate::editor::EditorSnapshot;
use crate::error::FileError;
use crate::handle::{FileHandle, FileMetadata};
use crate::workspace::{OpenDocument, Workspace};

pub const DEFAULT_POLL_INTERVAL_MS: Millis = 2500;

/// Sync bookkeeping for the tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    /// Stamp of the last successful read from or write to disk.
    pub last_known_modified: Option<Millis>,
    /// Stamp of the last in-memory change not yet on disk.
    pub last_modified_local: Option<Millis>,
    pub activity: ActivityTracker,
    pub paused: bool,
}

impl SyncState {
    pub fn new(now: Millis) -> Self {
        Self {
            last_known_modified: None,
            last_modified_local: None,
            activity: ActivityTracker::new(now),
            paused: false,
        }
    }

    pub fn last_user_activity(&self) -> Millis {
        self.activity.last_activity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    Idle,
    Polling,
    Capturing,
    SwappingContent,
    Restoring,
    Settled,
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSkip {
    NotDue,
    NoOpenFile,
    Paused,
    UserActive,
    Busy,
    Stopped,
}

/// Result of the I/O half of a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// No stamp was known yet; this one becomes the baseline.
    Baseline(FileMetadata),
    Unchanged,
    /// External change found, but local edits are newer. The file was not read.
    LocalNewer { local: Millis, external: Millis },
    Changed { content: String, metadata: FileMetadata },
    Failed(FileError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Skipped(TickSkip),
    Baseline { modified: Millis },
    Unchanged,
    LocalEditsWin { local: Millis, external: Millis },
    Reloaded {
        name: String,
        modified: Millis,
        report: ReloadReport,
    },
    /// The document changed while the tick was in flight; results discarded.
    Stale,
    TransientError(FileError),
    Stopped(FileError),
}

/// Marks a tick as in flight until dropped.
#[derive(Debug)]
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Work order for the I/O half of a tick.
///
/// The reconciler stays busy while the ticket is alive. Dropping it without
/// calling [`Reconciler::complete`] abandons the tick.
#[derive(Debug)]
pub struct PollTicket {
    _in_flight: InFlight,
    file: Arc<dyn FileHandle>,
    generation: u64,
    last_known_modified: Option<Millis>,
    last_modified_local: Option<Millis>,
}

impl PollTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetch(&self) -> Fetched {
        let metadata = match self.file.metadata() {
            Ok(metadata) => metadata,
            Err(err) => return Fetched::Failed(err),
        };

        let known = match self.last_known_modified {
            Some(known) => known,
            None => return Fetched::Baseline(metadata),
        };
        if metadata.last_modified <= known {
            return Fetched::Unchanged;
        }

        if let Some(local) = self.last_modified_local {
            if local > metadata.last_modified {
                return Fetched::LocalNewer {
                    local,
                    external: metadata.last_modified,
                };
            }
        }

        match self.file.read() {
            Ok(content) => Fetched::Changed { content, metadata },
            Err(err) => Fetched::Failed(err),
        }
    }
}

/// What a reload did, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadReport {
    pub stages: Vec<ReconcilePhase>,
    pub captured: EditorSnapshot,
    /// What was applied, after clamping. `None` if the editor was not ready
    /// and the restore was deferred.
    pub restored: Option<EditorSnapshot>,
}

/// Swaps `content` into the open editor while preserving cursor and scroll.
pub fn reload_document(document: &mut OpenDocument, content: &str) -> ReloadReport {
    let mut stages = Vec::with_capacity(4);

    stages.push(ReconcilePhase::Capturing);
    let captured = document.snapshot();

    stages.push(ReconcilePhase::SwappingContent);
    document.editor_mut().replace_content(content);

    stages.push(ReconcilePhase::Restoring);
    let restored = document.restore_or_defer(captured);

    stages.push(ReconcilePhase::Settled);
    ReloadReport {
        stages,
        captured,
        restored,
    }
}

pub struct Reconciler {
    poll_interval_ms: Millis,
    idle_threshold_ms: Millis,
    state: SyncState,
    phase: ReconcilePhase,
    busy: Arc<AtomicBool>,
    stopped: Option<FileError>,
    tracked_generation: Option<u64>,
    next_poll: Option<Millis>,
}

impl Reconciler {
    pub fn new(poll_interval_ms: Millis, idle_threshold_ms: Millis, now: Millis) -> Self {
        Self {
            poll_interval_ms: poll_interval_ms.max(1),
            idle_threshold_ms,
            state: SyncState::new(now),
            phase: ReconcilePhase::Idle,
            busy: Arc::new(AtomicBool::new(false)),
            stopped: None,
            tracked_generation: None,
            next_poll: None,
        }
    }

    pub fn with_defaults(now: Millis) -> Self {
        Self::new(DEFAULT_POLL_INTERVAL_MS, DEFAULT_IDLE_THRESHOLD_MS, now)
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn phase(&self) -> ReconcilePhase {
        if self.is_busy() {
            self.phase
        } else {
            ReconcilePhase::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// The permanent error that stopped polling, if any.
    pub fn stopped(&self) -> Option<&FileError> {
        self.stopped.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────────────

    /// Starts polling the document installed at `generation`.
    ///
    /// `modified` is the stamp observed when its content was read, if known.
    pub fn track(&mut self, generation: u64, modified: Option<Millis>, now: Millis) {
        self.tracked_generation = Some(generation);
        self.state.last_known_modified = modified;
        self.state.last_modified_local = None;
        self.stopped = None;
        self.next_poll = Some(now.saturating_add(self.poll_interval_ms));
    }

    pub fn untrack(&mut self) {
        self.tracked_generation = None;
        self.state.last_known_modified = None;
        self.state.last_modified_local = None;
        self.next_poll = None;
    }

    pub fn record_activity(&mut self, now: Millis) {
        self.state.activity.record_activity(now);
    }

    /// The user changed the in-memory content.
    pub fn note_local_edit(&mut self, now: Millis) {
        self.state.last_modified_local = Some(now);
        self.state.activity.record_activity(now);
    }

    /// Content was just read from or written to disk with stamp `modified`.
    pub fn note_synced(&mut self, modified: Millis) {
        self.state.last_known_modified = Some(modified);
        self.state.last_modified_local = None;
    }

    /// The document was written out. An unknown stamp re-baselines on the next poll.
    pub fn note_written(&mut self, modified: Option<Millis>) {
        self.state.last_known_modified = modified;
        self.state.last_modified_local = None;
    }

    /// Suppresses polling without dismantling the timer. An in-flight tick still completes.
    pub fn pause(&mut self) {
        self.state.paused = true;
    }

    pub fn resume(&mut self) {
        self.state.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ticking
    // ─────────────────────────────────────────────────────────────────────

    pub fn begin(&mut self, workspace: &Workspace, now: Millis) -> Result<PollTicket, TickSkip> {
        match self.next_poll {
            Some(due) if due <= now => {}
            _ => return Err(TickSkip::NotDue),
        }
        self.next_poll = Some(now.saturating_add(self.poll_interval_ms));

        if self.stopped.is_some() {
            return Err(TickSkip::Stopped);
        }
        if self.is_busy() {
            debug!("Reconciliation already in flight, dropping tick");
            return Err(TickSkip::Busy);
        }
        let document = match workspace.document() {
            Some(document) if self.tracked_generation == Some(workspace.generation()) => document,
            _ => return Err(TickSkip::NoOpenFile),
        };
        if self.state.paused {
            return Err(TickSkip::Paused);
        }
        if !self.state.activity.is_idle(now, self.idle_threshold_ms) {
            return Err(TickSkip::UserActive);
        }

        self.busy.store(true, Ordering::Release);
        self.phase = ReconcilePhase::Polling;
        Ok(PollTicket {
            _in_flight: InFlight(Arc::clone(&self.busy)),
            file: Arc::clone(document.file()),
            generation: workspace.generation(),
            last_known_modified: self.state.last_known_modified,
            last_modified_local: self.state.last_modified_local,
        })
    }

    pub fn complete(
        &mut self,
        ticket: PollTicket,
        fetched: Fetched,
        workspace: &mut Workspace,
    ) -> TickOutcome {
        let outcome = self.apply(&ticket, fetched, workspace);
        drop(ticket);
        self.phase = ReconcilePhase::Idle;
        outcome
    }

    fn apply(
        &mut self,
        ticket: &PollTicket,
        fetched: Fetched,
        workspace: &mut Workspace,
    ) -> TickOutcome {
        if workspace.generation() != ticket.generation
            || self.tracked_generation != Some(ticket.generation)
        {
            debug!(
                ticket_generation = ticket.generation,
                current_generation = workspace.generation(),
                "Discarding poll result for a document that is no longer open"
            );
            return TickOutcome::Stale;
        }

        match fetched {
            Fetched::Failed(err) if err.is_permanent() => {
                warn!(error = %err, file = ticket.file.name(), "File unavailable, stopping sync");
                self.stopped = Some(err.clone());
                TickOutcome::Stopped(err)
            }
            Fetched::Failed(err) => {
                warn!(error = %err, file = ticket.file.name(), "Sync check failed, will retry");
                TickOutcome::TransientError(err)
            }
            Fetched::Baseline(metadata) => {
                self.state.last_known_modified = Some(metadata.last_modified);
                TickOutcome::Baseline {
                    modified: metadata.last_modified,
                }
            }
            Fetched::Unchanged => TickOutcome::Unchanged,
            Fetched::LocalNewer { local, external } => {
                debug!(local, external, "Local edits are newer, keeping them");
                TickOutcome::LocalEditsWin { local, external }
            }
            Fetched::Changed { content, metadata } => {
                let external = metadata.last_modified;
                // The user may have typed while the read was in flight.
                if let Some(local) = self.state.last_modified_local {
                    if local > external {
                        return TickOutcome::LocalEditsWin { local, external };
                    }
                }
                let document = match workspace.document_mut() {
                    Some(document) => document,
                    None => return TickOutcome::Stale,
                };

                self.phase = ReconcilePhase::Capturing;
                let report = reload_document(document, &content);
                self.phase = ReconcilePhase::Settled;
                document.mark_clean();
                self.note_synced(external);

                info!(
                    file = document.name(),
                    modified = external,
                    "Reloaded file changed on disk"
                );
                TickOutcome::Reloaded {
                    name: document.name().to_string(),
                    modified: external,
                    report,
                }
            }
        }
    }

    /// Runs a whole tick: guard, I/O, re-validation and reload.
    pub fn tick(&mut self, workspace: &mut Workspace, now: Millis) -> TickOutcome {
        let ticket = match self.begin(workspace, now) {
            Ok(ticket) => ticket,
            Err(skip) => return TickOutcome::Skipped(skip),
        };
        let fetched = ticket.fetch();
        self.complete(ticket, fetched, workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{EditMode, EditorFactory, TextBufferFactory};
    use crate::error::FileErrorKind;
    use crate::handle::{MemoryDirectory, MemoryFile};

    const IDLE: Millis = DEFAULT_IDLE_THRESHOLD_MS + 1;

    struct Fixture {
        root: Arc<MemoryDirectory>,
        file: Arc<MemoryFile>,
        workspace: Workspace,
        reconciler: Reconciler,
    }

    fn fixture(content: &str, modified: Millis) -> Fixture {
        let root = Arc::new(MemoryDirectory::new("root"));
        let file = root.add_file("notes.md", content);
        file.modify_externally(content, modified);
        let mut workspace = Workspace::new();
        workspace.set_root(root.clone());
        let editor = TextBufferFactory.create(EditMode::Source, content);
        workspace.open_document(OpenDocument::new(file.clone(), "notes.md", editor));

        let mut reconciler = Reconciler::with_defaults(0);
        reconciler.track(workspace.generation(), Some(modified), 0);
        Fixture {
            root,
            file,
            workspace,
            reconciler,
        }
    }

    fn cursor_at(fx: &mut Fixture, line: usize, column: usize) {
        fx.workspace
            .document_mut()
            .unwrap()
            .editor_mut()
            .restore(&EditorSnapshot {
                cursor_line: line,
                cursor_column: column,
                ..EditorSnapshot::default()
            });
    }

    #[test]
    fn test_tick_not_due_before_interval() {
        let mut fx = fixture("a", 10);
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, 2499),
            TickOutcome::Skipped(TickSkip::NotDue)
        );
    }

    #[test]
    fn test_tick_skipped_while_user_active() {
        let mut fx = fixture("a", 10);
        fx.reconciler.record_activity(2000);
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, 2500),
            TickOutcome::Skipped(TickSkip::UserActive)
        );
    }

    #[test]
    fn test_pause_and_resume() {
        let mut fx = fixture("a", 10);
        fx.reconciler.pause();
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, IDLE),
            TickOutcome::Skipped(TickSkip::Paused)
        );
        fx.reconciler.resume();
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, IDLE + 2500),
            TickOutcome::Unchanged
        );
    }

    #[test]
    fn test_reload_restores_cursor_and_updates_stamps() {
        let mut fx = fixture("one\ntwo\nthree\nfour is long", 10);
        cursor_at(&mut fx, 3, 5);
        fx.file
            .modify_externally("one\ntwo\nthree\nfour is long\nfive", 20);

        match fx.reconciler.tick(&mut fx.workspace, IDLE) {
            TickOutcome::Reloaded {
                modified, report, ..
            } => {
                assert_eq!(modified, 20);
                assert_eq!(
                    report.stages,
                    vec![
                        ReconcilePhase::Capturing,
                        ReconcilePhase::SwappingContent,
                        ReconcilePhase::Restoring,
                        ReconcilePhase::Settled,
                    ]
                );
                let restored = report.restored.unwrap();
                assert_eq!((restored.cursor_line, restored.cursor_column), (3, 5));
            }
            other => panic!("expected reload, got {:?}", other),
        }

        let doc = fx.workspace.document().unwrap();
        assert!(doc.editor().content().ends_with("five"));
        assert_eq!(fx.reconciler.state().last_known_modified, Some(20));
        assert_eq!(fx.reconciler.state().last_modified_local, None);
        assert!(!fx.reconciler.is_busy());
        assert_eq!(fx.reconciler.phase(), ReconcilePhase::Idle);
    }

    #[test]
    fn test_reload_clamps_cursor_into_shorter_document() {
        let mut fx = fixture("a\nb\nc\nd\ne", 10);
        cursor_at(&mut fx, 4, 1);
        fx.file.modify_externally("only", 20);

        match fx.reconciler.tick(&mut fx.workspace, IDLE) {
            TickOutcome::Reloaded { report, .. } => {
                let restored = report.restored.unwrap();
                assert_eq!((restored.cursor_line, restored.cursor_column), (0, 1));
            }
            other => panic!("expected reload, got {:?}", other),
        }
    }

    #[test]
    fn test_newer_local_edit_skips_without_reading() {
        let mut fx = fixture("mine", 10);
        fx.reconciler.note_local_edit(100);
        fx.file.modify_externally("theirs", 90);
        let reads_before = fx.file.read_count();

        let outcome = fx.reconciler.tick(&mut fx.workspace, 100 + IDLE);
        assert_eq!(
            outcome,
            TickOutcome::LocalEditsWin {
                local: 100,
                external: 90
            }
        );
        assert_eq!(fx.file.read_count(), reads_before);
        assert_eq!(fx.workspace.document().unwrap().editor().content(), "mine");
        assert_eq!(fx.reconciler.state().last_known_modified, Some(10));
    }

    #[test]
    fn test_older_local_edit_is_overridden() {
        let mut fx = fixture("mine", 10);
        fx.reconciler.note_local_edit(50);
        fx.workspace.document_mut().unwrap().mark_dirty();
        fx.file.modify_externally("theirs", 90);

        let outcome = fx.reconciler.tick(&mut fx.workspace, 50 + IDLE);
        assert!(matches!(outcome, TickOutcome::Reloaded { modified: 90, .. }));
        assert_eq!(fx.reconciler.state().last_modified_local, None);
        assert!(!fx.workspace.has_dirty_file());
    }

    #[test]
    fn test_edit_during_read_wins_at_completion() {
        let mut fx = fixture("mine", 10);
        fx.file.modify_externally("theirs", 90);

        let ticket = fx.reconciler.begin(&fx.workspace, IDLE).unwrap();
        let fetched = ticket.fetch();
        assert!(matches!(fetched, Fetched::Changed { .. }));

        fx.reconciler.note_local_edit(IDLE + 1);
        let outcome = fx.reconciler.complete(ticket, fetched, &mut fx.workspace);
        assert!(matches!(outcome, TickOutcome::LocalEditsWin { .. }));
        assert_eq!(fx.workspace.document().unwrap().editor().content(), "mine");
    }

    #[test]
    fn test_result_for_replaced_document_is_discarded() {
        let mut fx = fixture("old", 10);
        fx.file.modify_externally("old changed", 90);

        let ticket = fx.reconciler.begin(&fx.workspace, IDLE).unwrap();
        let fetched = ticket.fetch();

        // Navigation opens a different file while the read is in flight.
        let other = fx.root.add_file("other.md", "other");
        let editor = TextBufferFactory.create(EditMode::Source, "other");
        fx.workspace
            .open_document(OpenDocument::new(other, "other.md", editor));
        fx.reconciler.track(fx.workspace.generation(), Some(5), IDLE);

        let outcome = fx.reconciler.complete(ticket, fetched, &mut fx.workspace);
        assert_eq!(outcome, TickOutcome::Stale);
        assert_eq!(fx.workspace.document().unwrap().editor().content(), "other");
        assert!(!fx.reconciler.is_busy());
    }

    #[test]
    fn test_overlapping_tick_is_dropped() {
        let mut fx = fixture("a", 10);
        let ticket = fx.reconciler.begin(&fx.workspace, IDLE).unwrap();
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, IDLE + 2500),
            TickOutcome::Skipped(TickSkip::Busy)
        );
        let fetched = ticket.fetch();
        assert_eq!(
            fx.reconciler.complete(ticket, fetched, &mut fx.workspace),
            TickOutcome::Unchanged
        );
    }

    #[test]
    fn test_dropped_ticket_releases_reconciler() {
        let mut fx = fixture("a", 10);
        let ticket = fx.reconciler.begin(&fx.workspace, IDLE).unwrap();
        assert!(fx.reconciler.is_busy());
        assert_eq!(fx.reconciler.phase(), ReconcilePhase::Polling);

        drop(ticket);
        assert!(!fx.reconciler.is_busy());
        assert_eq!(fx.reconciler.phase(), ReconcilePhase::Idle);

        fx.file.modify_externally("b", 20);
        assert!(matches!(
            fx.reconciler.tick(&mut fx.workspace, IDLE + 2500),
            TickOutcome::Reloaded { modified: 20, .. }
        ));
    }

    #[test]
    fn test_huge_poll_interval_saturates() {
        let mut reconciler = Reconciler::new(Millis::MAX, DEFAULT_IDLE_THRESHOLD_MS, 0);
        let workspace = Workspace::new();
        reconciler.track(workspace.generation(), Some(10), 1_000);
        assert!(matches!(
            reconciler.begin(&workspace, 1_000_000),
            Err(TickSkip::NotDue)
        ));
    }

    #[test]
    fn test_missing_file_stops_polling_for_good() {
        let mut fx = fixture("a", 10);
        fx.file.remove();

        assert!(matches!(
            fx.reconciler.tick(&mut fx.workspace, IDLE),
            TickOutcome::Stopped(ref err) if err.kind == FileErrorKind::NotFound
        ));
        assert!(fx.reconciler.stopped().is_some());
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, IDLE + 2500),
            TickOutcome::Skipped(TickSkip::Stopped)
        );
    }

    #[test]
    fn test_transient_error_keeps_polling() {
        let mut fx = fixture("a", 10);
        fx.file.fail_next(FileErrorKind::Transient);
        assert!(matches!(
            fx.reconciler.tick(&mut fx.workspace, IDLE),
            TickOutcome::TransientError(_)
        ));
        fx.file.modify_externally("b", 20);
        assert!(matches!(
            fx.reconciler.tick(&mut fx.workspace, IDLE + 2500),
            TickOutcome::Reloaded { .. }
        ));
    }

    #[test]
    fn test_unknown_stamp_becomes_baseline() {
        let mut fx = fixture("a", 10);
        fx.reconciler.track(fx.workspace.generation(), None, 0);
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, IDLE),
            TickOutcome::Baseline { modified: 10 }
        );
        assert_eq!(fx.reconciler.state().last_known_modified, Some(10));
    }

    #[test]
    fn test_equal_or_older_stamp_is_unchanged() {
        let mut fx = fixture("a", 10);
        fx.file.modify_externally("b", 10);
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, IDLE),
            TickOutcome::Unchanged
        );
        fx.file.modify_externally("c", 5);
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, IDLE + 2500),
            TickOutcome::Unchanged
        );
    }

    #[test]
    fn test_untracked_document_is_not_polled() {
        let mut fx = fixture("a", 10);
        fx.reconciler.untrack();
        assert_eq!(
            fx.reconciler.tick(&mut fx.workspace, IDLE),
            TickOutcome::Skipped(TickSkip::NotDue)
        );
    }
}
