use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "NOTESYNC_LOG";
const DEBUG_ENV: &str = "NOTESYNC_DEBUG_LOG";

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn filter() -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Logs to stderr, and to a daily file under `log_dir` when it can be created.
///
/// Hold the returned guard until exit so buffered file lines are flushed.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file = log_dir
        .filter(|dir| fs_err::create_dir_all(dir).is_ok())
        .map(|dir| tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "notesync.log")));

    match file {
        Some((writer, guard)) => {
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
            let installed = tracing_subscriber::registry()
                .with(filter())
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .is_ok();
            // Already installed elsewhere: drop the guard so the writer shuts down.
            installed.then_some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter())
                .with(stderr_layer)
                .try_init();
            None
        }
    }
}
