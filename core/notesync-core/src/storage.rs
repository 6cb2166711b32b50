//! Storage configuration and path management.
//!
//! Every path the host touches is decided here. Documents and session
//! records never live under this root: they stay with the folder being
//! edited. The root only holds host-side settings, preferences and logs.
//!
//! Production code uses `StorageConfig::new()` (`~/.notesync/`).
//! Tests use `StorageConfig::with_root(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

const ROOT_DIR_NAME: &str = ".notesync";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Uses `~/.notesync`.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| SyncError::Io {
            context: "resolve home directory".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        Ok(Self {
            root: home.join(ROOT_DIR_NAME),
        })
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to config.toml (engine timing).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to preferences.json (small UI preferences).
    pub fn preferences_file(&self) -> PathBuf {
        self.root.join("preferences.json")
    }

    /// Path to logs/ (rolling log files).
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Creates the root directory if needed.
    pub fn ensure_root(&self) -> Result<()> {
        fs_err::create_dir_all(&self.root).map_err(|source| SyncError::Io {
            context: format!("create {}", self.root.display()),
            source,
        })
    }
}
