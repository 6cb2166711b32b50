//! `notesync session`: inspect or reset a folder's session record.

use std::path::Path;

use notesync_core::session::{clear_session, load_session};
use notesync_core::{LocalDirectory, SyncError};

pub fn show(folder: &Path) -> Result<(), SyncError> {
    let root = LocalDirectory::open(folder)?;
    match load_session(&root) {
        Some(record) => {
            let json = serde_json::to_string_pretty(&record).map_err(|source| SyncError::Json {
                context: "render session record".to_string(),
                source,
            })?;
            println!("{}", json);
        }
        None => println!("No session record in {}", folder.display()),
    }
    Ok(())
}

pub fn clear(folder: &Path) -> Result<(), SyncError> {
    let root = LocalDirectory::open(folder)?;
    clear_session(&root)?;
    println!("Cleared session record in {}", folder.display());
    Ok(())
}
