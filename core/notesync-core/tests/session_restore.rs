//! Integration tests for session persistence, restore and the blackout window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notesync_core::session::{load_session, save_session};
use notesync_core::{
    DirectoryHandle, EditMode, EditorAdapter, EditorFactory, EditorSnapshot, FileHandle,
    ManualClock, MemoryDirectory, SyncConfig, SyncEngine, TextBufferFactory, TickOutcome,
    SESSION_FILE_NAME,
};

const GUIDE: &str = "zero\none\ntwo\nthree\nfour four\nfive\nsix\nseven\neight\nnine";

fn folder() -> Arc<MemoryDirectory> {
    let root = Arc::new(MemoryDirectory::new("notes"));
    let docs = root.add_directory("docs");
    docs.add_file("guide.md", GUIDE);
    root.add_file("inbox.md", "inbox");
    root
}

fn engine(clock: &ManualClock) -> SyncEngine {
    let config = SyncConfig {
        autosave_enabled: false,
        ..SyncConfig::default()
    };
    SyncEngine::new(config, Arc::new(clock.clone()), Box::new(TextBufferFactory))
}

/// Editor that reports not-ready until the shared flag is raised.
struct LateEditor {
    inner: Box<dyn EditorAdapter>,
    ready: Arc<AtomicBool>,
}

impl EditorAdapter for LateEditor {
    fn mode(&self) -> EditMode {
        self.inner.mode()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && self.inner.is_ready()
    }

    fn content(&self) -> String {
        self.inner.content()
    }

    fn replace_content(&mut self, content: &str) {
        self.inner.replace_content(content);
    }

    fn capture(&self) -> EditorSnapshot {
        self.inner.capture()
    }

    fn restore(&mut self, snapshot: &EditorSnapshot) -> EditorSnapshot {
        self.inner.restore(snapshot)
    }

    fn focus(&mut self) {
        self.inner.focus();
    }

    fn destroy(&mut self) {
        self.inner.destroy();
    }
}

struct LateEditorFactory {
    ready: Arc<AtomicBool>,
}

impl EditorFactory for LateEditorFactory {
    fn create(&self, mode: EditMode, content: &str) -> Box<dyn EditorAdapter> {
        Box::new(LateEditor {
            inner: TextBufferFactory.create(mode, content),
            ready: Arc::clone(&self.ready),
        })
    }
}

fn late_engine(clock: &ManualClock, ready: &Arc<AtomicBool>) -> SyncEngine {
    let config = SyncConfig {
        autosave_enabled: false,
        ..SyncConfig::default()
    };
    let factory = LateEditorFactory {
        ready: Arc::clone(ready),
    };
    SyncEngine::new(config, Arc::new(clock.clone()), Box::new(factory))
}

fn snapshot(line: usize, column: usize, mode: EditMode) -> EditorSnapshot {
    EditorSnapshot {
        cursor_line: line,
        cursor_column: column,
        scroll_top: 3.0,
        scroll_left: 0.0,
        mode,
    }
}

#[test]
fn test_reopening_folder_restores_file_position_and_mode() {
    let root = folder();
    let saved = snapshot(4, 2, EditMode::Rich);
    save_session(&*root, "docs/guide.md", &saved, 500).unwrap();

    let clock = ManualClock::new(10_000);
    let mut engine = engine(&clock);
    let restored = engine.open_folder(root).unwrap().unwrap();

    assert_eq!(restored.path, "docs/guide.md");
    assert_eq!(engine.workspace().path(), vec!["notes", "docs"]);
    let doc = engine.document().unwrap();
    assert_eq!(doc.relative_path(), "docs/guide.md");
    assert_eq!(doc.editor().mode(), EditMode::Rich);
    assert_eq!(doc.editor().capture().cursor(), saved.cursor());
    assert_eq!(
        engine.preferences().edit_mode_for("docs/guide.md"),
        Some(EditMode::Rich)
    );
}

#[test]
fn test_saves_inside_blackout_are_dropped() {
    let root = folder();
    save_session(
        &*root,
        "docs/guide.md",
        &snapshot(4, 2, EditMode::Source),
        500,
    )
    .unwrap();

    let clock = ManualClock::new(10_000);
    let mut engine = engine(&clock);
    engine.open_folder(root.clone()).unwrap();

    clock.set(10_500);
    engine.note_activity();
    assert!(!engine.sessions().has_pending());

    clock.set(11_000);
    engine.note_activity();
    assert!(!engine.sessions().has_pending());

    clock.set(11_001);
    engine.editor_mut().unwrap().restore(&snapshot(7, 1, EditMode::Source));
    engine.note_activity();
    assert!(engine.sessions().has_pending());

    clock.set(13_001);
    assert!(engine.tick().session_saved);
    let record = load_session(&*root).unwrap();
    let last = record.last_open_file.unwrap();
    assert_eq!(last.snapshot.cursor_line, 7);
    assert_eq!(record.last_modified_timestamp, 13_001);
}

#[test]
fn test_burst_of_requests_writes_only_the_last() {
    let root = folder();
    let clock = ManualClock::new(1_000);
    let mut engine = engine(&clock);
    engine.open_folder(root.clone()).unwrap();
    engine.open_file("inbox.md").unwrap();

    for step in 0..5 {
        clock.set(1_000 + step * 300);
        engine.note_activity();
    }
    let due = engine.sessions().pending_due().unwrap();
    assert_eq!(due, 2_200 + 2_000);

    clock.set(due - 1);
    assert!(!engine.tick().session_saved);
    clock.set(due);
    assert!(engine.tick().session_saved);
    assert!(!engine.sessions().has_pending());

    let record = load_session(&*root).unwrap();
    assert_eq!(record.last_modified_timestamp, due);
    assert_eq!(record.last_open_file.unwrap().path, "inbox.md");
}

#[test]
fn test_restore_clamps_out_of_range_position() {
    let root = folder();
    let wild = EditorSnapshot {
        cursor_line: 500,
        cursor_column: 80,
        scroll_top: 1.0e9,
        scroll_left: -4.0,
        mode: EditMode::Source,
    };
    save_session(&*root, "docs/guide.md", &wild, 500).unwrap();

    let clock = ManualClock::new(10_000);
    let mut engine = engine(&clock);
    let applied = engine.open_folder(root).unwrap().unwrap().applied.unwrap();

    assert_eq!(applied.cursor_line, 9);
    assert_eq!(applied.cursor_column, "nine".len());
    assert!(applied.scroll_top <= 9.0);
    assert_eq!(applied.scroll_left, 0.0);
}

#[test]
fn test_missing_session_file_target_is_no_session() {
    let root = folder();
    save_session(
        &*root,
        "docs/deleted.md",
        &snapshot(1, 1, EditMode::Source),
        500,
    )
    .unwrap();

    let clock = ManualClock::new(10_000);
    let mut engine = engine(&clock);
    assert!(engine.open_folder(root).unwrap().is_none());
    assert!(!engine.workspace().has_open_file());
    assert_eq!(engine.workspace().path(), vec!["notes"]);
}

#[test]
fn test_corrupt_session_behaves_as_absent() {
    let root = folder();
    root.add_file(SESSION_FILE_NAME, "{ this is not json");

    let clock = ManualClock::new(10_000);
    let mut engine = engine(&clock);
    assert!(engine.open_folder(root.clone()).unwrap().is_none());

    let record = load_session(&*root).unwrap();
    assert_eq!(record.folder_name, "notes");
    assert!(record.last_open_file.is_none());
}

#[test]
fn test_first_open_creates_empty_record() {
    let root = folder();
    let clock = ManualClock::new(10_000);
    let mut engine = engine(&clock);
    engine.open_folder(root.clone()).unwrap();

    let raw = root.file(SESSION_FILE_NAME).unwrap().read().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["version"], "1.0");
    assert_eq!(json["folderName"], "notes");
}

#[test]
fn test_close_file_flushes_pending_session() {
    let root = folder();
    let clock = ManualClock::new(1_000);
    let mut engine = engine(&clock);
    engine.open_folder(root.clone()).unwrap();
    engine.open_file("inbox.md").unwrap();
    assert!(engine.sessions().has_pending());

    engine.close_file().unwrap();
    assert!(!engine.sessions().has_pending());
    assert!(!engine.workspace().has_open_file());
    assert_eq!(
        load_session(&*root)
            .unwrap()
            .last_open_file
            .unwrap()
            .path,
        "inbox.md"
    );
}

#[test]
fn test_unsaved_edits_written_on_close() {
    let root = folder();
    let clock = ManualClock::new(1_000);
    let mut engine = engine(&clock);
    engine.open_folder(root.clone()).unwrap();
    engine.open_file("inbox.md").unwrap();

    engine.editor_mut().unwrap().replace_content("inbox\n- call back");
    engine.note_edit();
    engine.shutdown().unwrap();

    assert_eq!(
        root.memory_file("inbox.md").unwrap().content(),
        "inbox\n- call back"
    );
}

#[test]
fn test_restore_waits_for_editor_ready() {
    let root = folder();
    let saved = snapshot(2, 1, EditMode::Source);
    save_session(&*root, "docs/guide.md", &saved, 500).unwrap();

    let ready = Arc::new(AtomicBool::new(false));
    let clock = ManualClock::new(10_000);
    let mut engine = late_engine(&clock, &ready);
    let restored = engine.open_folder(root).unwrap().unwrap();
    assert_eq!(restored.path, "docs/guide.md");
    assert!(restored.applied.is_none());
    assert!(engine.document().unwrap().has_pending_restore());

    clock.set(10_100);
    assert!(!engine.tick().restore_settled);

    ready.store(true, Ordering::SeqCst);
    clock.set(10_200);
    assert!(engine.tick().restore_settled);

    let doc = engine.document().unwrap();
    assert!(!doc.has_pending_restore());
    assert_eq!(doc.editor().capture().cursor(), saved.cursor());
    assert!(!engine.tick().restore_settled);
}

#[test]
fn test_reload_before_editor_ready_keeps_pending_position() {
    let root = Arc::new(MemoryDirectory::new("notes"));
    let docs = root.add_directory("docs");
    let guide = docs.add_file("guide.md", GUIDE);
    let saved = snapshot(4, 2, EditMode::Source);
    save_session(&*root, "docs/guide.md", &saved, 500).unwrap();

    let ready = Arc::new(AtomicBool::new(false));
    let clock = ManualClock::new(10_000);
    let mut engine = late_engine(&clock, &ready);
    let restored = engine.open_folder(root).unwrap().unwrap();
    assert!(restored.applied.is_none());

    let updated = format!("{}\nten", GUIDE);
    guide.modify_externally(updated.clone(), 12_000);
    clock.set(15_000);
    let report = engine.tick();
    assert!(!report.restore_settled);
    match report.reconcile {
        TickOutcome::Reloaded { report, .. } => {
            assert_eq!(report.captured, saved);
            assert!(report.restored.is_none());
        }
        other => panic!("expected reload, got {:?}", other),
    }

    let doc = engine.document().unwrap();
    assert_eq!(doc.editor().content(), updated);
    assert!(doc.has_pending_restore());
    assert_eq!(doc.snapshot(), saved);

    ready.store(true, Ordering::SeqCst);
    clock.set(15_100);
    assert!(engine.tick().restore_settled);
    let doc = engine.document().unwrap();
    assert_eq!(doc.editor().capture().cursor(), saved.cursor());
}
