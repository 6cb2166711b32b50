//! The shared "what is open right now" state.
//!
//! Every component observes the open folder, current directory and open
//! document through one [`Workspace`] passed by reference, and every change
//! goes through a named setter. Each setter that changes what is open bumps
//! [`Workspace::generation`], so work started against an older state can
//! detect that it is stale before applying results.

use std::fmt;
use std::sync::Arc;

use crate::editor::{EditorAdapter, EditorSnapshot};
use crate::handle::{DirectoryHandle, FileHandle};

pub struct OpenDocument {
    file: Arc<dyn FileHandle>,
    relative_path: String,
    editor: Box<dyn EditorAdapter>,
    dirty: bool,
    pending_restore: Option<EditorSnapshot>,
}

impl OpenDocument {
    pub fn new(
        file: Arc<dyn FileHandle>,
        relative_path: impl Into<String>,
        editor: Box<dyn EditorAdapter>,
    ) -> Self {
        Self {
            file,
            relative_path: relative_path.into(),
            editor,
            dirty: false,
            pending_restore: None,
        }
    }

    pub fn file(&self) -> &Arc<dyn FileHandle> {
        &self.file
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }

    /// `/`-separated path relative to the root folder.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn editor(&self) -> &dyn EditorAdapter {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> &mut dyn EditorAdapter {
        self.editor.as_mut()
    }

    pub(crate) fn replace_editor(&mut self, editor: Box<dyn EditorAdapter>) {
        self.editor.destroy();
        self.editor = editor;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Current position, or the one still waiting for the editor to be ready.
    pub fn snapshot(&self) -> EditorSnapshot {
        self.pending_restore
            .unwrap_or_else(|| self.editor.capture())
    }

    /// Applies `snapshot` now, or defers it until the editor reports ready.
    pub fn restore_or_defer(&mut self, snapshot: EditorSnapshot) -> Option<EditorSnapshot> {
        if self.editor.is_ready() {
            self.pending_restore = None;
            Some(self.editor.restore(&snapshot))
        } else {
            self.pending_restore = Some(snapshot);
            None
        }
    }

    /// Applies a deferred restore once the editor is ready.
    pub fn settle_pending_restore(&mut self) -> Option<EditorSnapshot> {
        if !self.editor.is_ready() {
            return None;
        }
        let snapshot = self.pending_restore.take()?;
        Some(self.editor.restore(&snapshot))
    }

    pub fn has_pending_restore(&self) -> bool {
        self.pending_restore.is_some()
    }
}

impl fmt::Debug for OpenDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenDocument")
            .field("relative_path", &self.relative_path)
            .field("mode", &self.editor.mode())
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[derive(Default)]
pub struct Workspace {
    /// Root first, current directory last. Empty when no folder is open.
    directories: Vec<Arc<dyn DirectoryHandle>>,
    document: Option<OpenDocument>,
    generation: u64,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Location
    // ─────────────────────────────────────────────────────────────────────

    pub fn root(&self) -> Option<&Arc<dyn DirectoryHandle>> {
        self.directories.first()
    }

    pub fn current_directory(&self) -> Option<&Arc<dyn DirectoryHandle>> {
        self.directories.last()
    }

    pub fn directory_chain(&self) -> &[Arc<dyn DirectoryHandle>] {
        &self.directories
    }

    /// Folder names from the root to the current directory.
    pub fn path(&self) -> Vec<String> {
        self.directories
            .iter()
            .map(|dir| dir.name().to_string())
            .collect()
    }

    /// `/`-joined path of `name` inside the current directory, relative to the root.
    pub fn relative_path_of(&self, name: &str) -> String {
        let mut segments: Vec<&str> = self
            .directories
            .iter()
            .skip(1)
            .map(|dir| dir.name())
            .collect();
        segments.push(name);
        segments.join("/")
    }

    /// Replaces the whole location with a freshly opened root. Closes any document.
    pub fn set_root(&mut self, root: Arc<dyn DirectoryHandle>) {
        self.close_document();
        self.directories = vec![root];
        self.bump();
    }

    /// Jumps to a previously recorded directory chain. Closes any document.
    pub fn set_location(&mut self, directories: Vec<Arc<dyn DirectoryHandle>>) {
        self.close_document();
        self.directories = directories;
        self.bump();
    }

    pub fn enter_directory(&mut self, directory: Arc<dyn DirectoryHandle>) {
        self.close_document();
        self.directories.push(directory);
        self.bump();
    }

    /// Moves to the parent directory. Returns false at the root.
    pub fn leave_directory(&mut self) -> bool {
        if self.directories.len() <= 1 {
            return false;
        }
        self.close_document();
        self.directories.pop();
        self.bump();
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Document
    // ─────────────────────────────────────────────────────────────────────

    pub fn document(&self) -> Option<&OpenDocument> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut OpenDocument> {
        self.document.as_mut()
    }

    pub fn has_open_file(&self) -> bool {
        self.document.is_some()
    }

    pub fn has_dirty_file(&self) -> bool {
        self.document.as_ref().is_some_and(OpenDocument::is_dirty)
    }

    /// Installs `document`, destroying the previous editor if any.
    pub fn open_document(&mut self, document: OpenDocument) {
        self.close_document();
        self.document = Some(document);
        self.bump();
    }

    /// Destroys the open editor. Returns the relative path that was open.
    pub fn close_document(&mut self) -> Option<String> {
        let mut document = self.document.take()?;
        document.editor.destroy();
        self.bump();
        Some(document.relative_path)
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("path", &self.path())
            .field("document", &self.document)
            .field("generation", &self.generation)
            .finish()
    }
}
