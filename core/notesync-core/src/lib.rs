//! # notesync-core
//!
//! Synchronization and state continuity for editors working on a folder of
//! plain-text files that other programs may also change.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Timers are deadlines checked by
//!   [`SyncEngine::tick`]; hosts drive it from their own loop or a [`Ticker`].
//! - **Injected time**: Everything reads a [`Clock`], so tests run on a [`ManualClock`].
//! - **Not thread-safe**: Clients provide their own synchronization (`Mutex`).
//! - **Graceful degradation**: Missing or corrupt session and preference files
//!   behave as if absent; I/O failures become log lines and coarse events.
//! - **Local edits win**: A file is only reloaded when its on-disk stamp is at
//!   least as new as the last unsaved in-memory change.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use notesync_core::{LocalDirectory, SyncConfig, SyncEngine, SystemClock, TextBufferFactory};
//!
//! let mut engine = SyncEngine::new(SyncConfig::default(), Arc::new(SystemClock), Box::new(TextBufferFactory));
//! let restored = engine.open_folder(Arc::new(LocalDirectory::open("notes")?))?;
//! engine.tick();
//! ```

pub mod activity;
pub mod autosave;
pub mod clock;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod handle;
pub mod history;
pub mod listener;
pub mod prefs;
pub mod reconciler;
pub mod session;
pub mod storage;
pub mod ticker;
pub mod workspace;

pub use activity::ActivityTracker;
pub use autosave::AutosaveTrigger;
pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use config::{load_config, load_config_or_default, SyncConfig};
pub use editor::{
    EditMode, EditorAdapter, EditorFactory, EditorSnapshot, RichEditor, SourceEditor, TextBuffer,
    TextBufferFactory,
};
pub use engine::{RestoredSession, SyncEngine, TickReport};
pub use error::{FileError, FileErrorKind, Result, SyncError};
pub use handle::{
    DirEntry, DirectoryHandle, EntryKind, FileHandle, FileMetadata, LocalDirectory, LocalFile,
    MemoryDirectory, MemoryFile,
};
pub use history::{HistoryEntry, HostHistory, MemoryHostHistory, NavigationHistory, NoHostHistory};
pub use listener::{ChannelListener, LoggingListener, SyncEvent, SyncListener};
pub use prefs::{JsonPreferences, MemoryPreferences, PreferenceStore};
pub use reconciler::{Fetched, PollTicket, ReconcilePhase, Reconciler, TickOutcome, TickSkip};
pub use session::{SessionRecord, SessionStore, SESSION_FILE_NAME};
pub use storage::StorageConfig;
pub use ticker::Ticker;
pub use workspace::{OpenDocument, Workspace};
