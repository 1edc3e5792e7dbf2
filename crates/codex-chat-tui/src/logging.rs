use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "codex_chat=info,codex_chat_core=info";

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("codex-chat").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Send tracing output to a daily log file; the terminal belongs to the UI.
///
/// Keep the returned guard alive until exit so buffered lines are flushed.
/// Returns `None` and leaves tracing disabled when the log directory is unusable.
pub fn init() -> Option<WorkerGuard> {
    init_or_skip(&log_dir())
}

fn init_or_skip(dir: &Path) -> Option<WorkerGuard> {
    match init_in(dir) {
        Ok(guard) => Some(guard),
        Err(err) => {
            // Shown once the alternate screen is left
            eprintln!("codex-chat: logging disabled: {err:#}");
            None
        }
    }
}

fn init_in(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow!("cannot create log directory {}: {e}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(dir, "codex-chat.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    tracing::info!(dir = %dir.display(), "logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_log_dir_disables_logging() {
        // A regular file where the directory should be
        let file = tempfile::NamedTempFile::new().unwrap();
        let dir = file.path().join("logs");

        assert!(init_in(&dir).is_err());
        assert!(init_or_skip(&dir).is_none());
        assert!(!dir.exists());
    }
}
