//! `notesync watch`: keep a folder's open file in sync until stdin closes.
//!
//! Opens the folder (resuming its session), optionally opens `--file`, then
//! ticks the engine from a background [`Ticker`] while the main thread waits
//! for a line or EOF on stdin. On exit the session is flushed.

use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use notesync_core::{
    Clock, JsonPreferences, LocalDirectory, Millis, StorageConfig, SyncConfig, SyncEngine,
    SyncError, SyncListener, SystemClock, TextBufferFactory, Ticker,
};
use tracing::{error, info};

const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Prints engine notifications for the person watching the terminal.
struct ConsoleListener;

impl SyncListener for ConsoleListener {
    fn on_file_reloaded(&mut self, name: &str, modified: Millis) {
        println!("reloaded {} (modified {})", name, modified);
    }

    fn on_sync_error(&mut self, error: &SyncError, permanent: bool) {
        if permanent {
            println!("sync stopped: {}", error);
        } else {
            println!("sync error, retrying: {}", error);
        }
    }

    fn on_session_restored(&mut self, path: &str) {
        println!("resumed {}", path);
    }
}

fn lock(engine: &Mutex<SyncEngine>) -> MutexGuard<'_, SyncEngine> {
    engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn open_relative(engine: &mut SyncEngine, relative_path: &str) -> Result<(), SyncError> {
    let segments: Vec<&str> = relative_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    let (file_name, folders) = segments
        .split_last()
        .ok_or_else(|| SyncError::EntryNotFound(relative_path.to_string()))?;
    for folder in folders {
        engine.enter_directory(folder)?;
    }
    engine.open_file(file_name)
}

pub fn run(
    folder: &Path,
    file: Option<&str>,
    config: SyncConfig,
    storage: &StorageConfig,
) -> Result<(), SyncError> {
    storage.ensure_root()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut engine = SyncEngine::new(config, Arc::clone(&clock), Box::new(TextBufferFactory))
        .with_preferences(Box::new(JsonPreferences::load(&storage.preferences_file())))
        .with_listener(Box::new(ConsoleListener));

    let root = LocalDirectory::open(folder)?;
    engine.open_folder(Arc::new(root))?;
    if let Some(relative_path) = file {
        open_relative(&mut engine, relative_path)?;
    }
    match engine.document() {
        Some(document) => println!("watching {}", document.relative_path()),
        None => println!("watching {} (no file open)", folder.display()),
    }

    let engine = Arc::new(Mutex::new(engine));
    let mut ticker = Ticker::new();
    let ticking = Arc::clone(&engine);
    ticker.start(TICK_INTERVAL, move || {
        lock(&ticking).tick();
    });

    println!("press Enter to stop");
    let mut line = String::new();
    if let Err(err) = std::io::stdin().lock().read_line(&mut line) {
        error!(error = %err, "Failed to read stdin");
    }

    ticker.stop();
    let mut engine = lock(&engine);
    engine.shutdown()?;
    info!(folder = %folder.display(), "Stopped watching");
    Ok(())
}
