//! Small scalar preferences that survive restarts.
//!
//! Holds per-file edit mode and the last opened folder name. Never holds
//! document content or session records; those live beside the folder.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::editor::EditMode;

const MODE_KEY_PREFIX: &str = "mode:";
const LAST_FOLDER_KEY: &str = "last_folder";

pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str);

    fn remove(&mut self, key: &str);

    fn edit_mode_for(&self, relative_path: &str) -> Option<EditMode> {
        self.get(&format!("{}{}", MODE_KEY_PREFIX, relative_path))
            .and_then(|value| EditMode::parse(&value))
    }

    fn set_edit_mode_for(&mut self, relative_path: &str, mode: EditMode) {
        self.set(
            &format!("{}{}", MODE_KEY_PREFIX, relative_path),
            mode.as_str(),
        );
    }

    fn last_folder(&self) -> Option<String> {
        self.get(LAST_FOLDER_KEY)
    }

    fn set_last_folder(&mut self, name: &str) {
        self.set(LAST_FOLDER_KEY, name);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: BTreeMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Preferences persisted as a flat JSON object, rewritten on every change.
///
/// Missing or corrupt files load as empty. Write failures are logged and the
/// in-memory value is kept, so the preference still holds for this run.
#[derive(Debug, Clone)]
pub struct JsonPreferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonPreferences {
    pub fn load(path: &Path) -> Self {
        let values = fs_err::read_to_string(path)
            .ok()
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(values) => Some(values),
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "Ignoring corrupt preferences file");
                    None
                }
            })
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            values,
        }
    }

    fn persist(&self) -> Result<(), String> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| "Preferences path has no parent directory".to_string())?;
        fs_err::create_dir_all(parent)
            .map_err(|e| format!("Failed to create preferences dir: {}", e))?;
        let content = serde_json::to_string_pretty(&self.values)
            .map_err(|e| format!("Failed to serialize preferences: {}", e))?;
        let mut temp_file =
            NamedTempFile::new_in(parent).map_err(|e| format!("Temp file error: {}", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| format!("Failed to write temp preferences file: {}", e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| format!("Failed to write preferences file: {}", e.error))?;
        Ok(())
    }

    fn persist_or_warn(&self) {
        if let Err(err) = self.persist() {
            warn!(error = %err, path = %self.path.display(), "Failed to persist preferences");
        }
    }
}

impl PreferenceStore for JsonPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return;
        }
        self.values.insert(key.to_string(), value.to_string());
        self.persist_or_warn();
    }

    fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.persist_or_warn();
        }
    }
}
