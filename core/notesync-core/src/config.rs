//! Engine timing configuration.
//!
//! Loaded from `config.toml` under the storage root. A missing file yields the
//! defaults; every key is optional.
//!
//! ```toml
//! poll_interval_ms = 2500
//! idle_threshold_ms = 4000
//! autosave_interval_ms = 2000
//! autosave_enabled = true
//! session_debounce_ms = 2000
//! restore_blackout_ms = 1000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activity::DEFAULT_IDLE_THRESHOLD_MS;
use crate::autosave::DEFAULT_AUTOSAVE_INTERVAL_MS;
use crate::clock::Millis;
use crate::error::{Result, SyncError};
use crate::reconciler::DEFAULT_POLL_INTERVAL_MS;
use crate::session::{DEFAULT_RESTORE_BLACKOUT_MS, DEFAULT_SESSION_DEBOUNCE_MS};

fn default_poll_interval_ms() -> Millis {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_idle_threshold_ms() -> Millis {
    DEFAULT_IDLE_THRESHOLD_MS
}

fn default_autosave_interval_ms() -> Millis {
    DEFAULT_AUTOSAVE_INTERVAL_MS
}

fn default_autosave_enabled() -> bool {
    true
}

fn default_session_debounce_ms() -> Millis {
    DEFAULT_SESSION_DEBOUNCE_MS
}

fn default_restore_blackout_ms() -> Millis {
    DEFAULT_RESTORE_BLACKOUT_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: Millis,
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: Millis,
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: Millis,
    #[serde(default = "default_autosave_enabled")]
    pub autosave_enabled: bool,
    #[serde(default = "default_session_debounce_ms")]
    pub session_debounce_ms: Millis,
    #[serde(default = "default_restore_blackout_ms")]
    pub restore_blackout_ms: Millis,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            autosave_interval_ms: DEFAULT_AUTOSAVE_INTERVAL_MS,
            autosave_enabled: true,
            session_debounce_ms: DEFAULT_SESSION_DEBOUNCE_MS,
            restore_blackout_ms: DEFAULT_RESTORE_BLACKOUT_MS,
        }
    }
}

/// Loads the config at `path`, returning defaults if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    if !path.exists() {
        return Ok(SyncConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| SyncError::Io {
        context: format!("read config {}", path.display()),
        source,
    })?;
    toml::from_str::<SyncConfig>(&content).map_err(|err| SyncError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Like [`load_config`], but logs a bad file and carries on with the defaults.
pub fn load_config_or_default(path: &Path) -> SyncConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "Ignoring malformed config, using defaults"
            );
            SyncConfig::default()
        }
    }
}
