//! notesync: command-line host for the notesync engine.
//!
//! ## Subcommands
//!
//! - `session show`: Print a folder's session record
//! - `session clear`: Delete a folder's session record
//! - `watch`: Keep a folder's open file in sync with disk until Enter is pressed

mod logging;
mod session;
mod watch;

use clap::{Parser, Subcommand};
use notesync_core::{load_config_or_default, StorageConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "notesync")]
#[command(about = "Folder-backed note synchronization")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or reset a folder's session record
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Watch a folder, reloading the open file when it changes on disk
    Watch {
        /// Root folder to open
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,

        /// File to open, relative to the folder (e.g. notes/today.md)
        #[arg(long)]
        file: Option<String>,

        /// Config file (defaults to ~/.notesync/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Print the session record as JSON
    Show {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
    },

    /// Delete the session record
    Clear {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
    },
}

fn main() {
    let storage = match StorageConfig::new() {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("notesync: {}", e);
            std::process::exit(1);
        }
    };
    let _logging_guard = logging::init(Some(&storage.logs_dir()));
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Session {
            action: SessionAction::Show { folder },
        } => session::show(&folder),
        Commands::Session {
            action: SessionAction::Clear { folder },
        } => session::clear(&folder),
        Commands::Watch {
            folder,
            file,
            config,
        } => {
            let config_path = config.unwrap_or_else(|| storage.config_file());
            let config = load_config_or_default(&config_path);
            watch::run(&folder, file.as_deref(), config, &storage)
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "notesync failed");
        eprintln!("notesync: {}", e);
        std::process::exit(1);
    }
}
