//! Coarse notifications for the UI layer.
//!
//! The engine classifies and swallows I/O failures itself; what reaches the
//! host is limited to these events.

use std::sync::mpsc::Sender;

use tracing::{info, warn};

use crate::clock::Millis;
use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    FileReloaded { name: String, modified: Millis },
    SyncError { message: String, permanent: bool },
    SessionRestored { path: String },
}

pub trait SyncListener: Send {
    fn on_file_reloaded(&mut self, _name: &str, _modified: Millis) {}

    fn on_sync_error(&mut self, _error: &SyncError, _permanent: bool) {}

    fn on_session_restored(&mut self, _path: &str) {}
}

/// Forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl SyncListener for LoggingListener {
    fn on_file_reloaded(&mut self, name: &str, modified: Millis) {
        info!(file = name, modified, "File reloaded from disk");
    }

    fn on_sync_error(&mut self, error: &SyncError, permanent: bool) {
        warn!(error = %error, permanent, "Sync error");
    }

    fn on_session_restored(&mut self, path: &str) {
        info!(path, "Session restored");
    }
}

/// Sends notifications over a channel, for hosts that render them elsewhere.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: Sender<SyncEvent>,
}

impl ChannelListener {
    pub fn new(sender: Sender<SyncEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: SyncEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.sender.send(event);
    }
}

impl SyncListener for ChannelListener {
    fn on_file_reloaded(&mut self, name: &str, modified: Millis) {
        self.send(SyncEvent::FileReloaded {
            name: name.to_string(),
            modified,
        });
    }

    fn on_sync_error(&mut self, error: &SyncError, permanent: bool) {
        self.send(SyncEvent::SyncError {
            message: error.to_string(),
            permanent,
        });
    }

    fn on_session_restored(&mut self, path: &str) {
        self.send(SyncEvent::SessionRestored {
            path: path.to_string(),
        });
    }
}
