//! Tracing subscriber setup.
//!
//! Filter comes from `AFFLYT_LOG` (default `warn`). Output goes to stderr
//! unless a log file is configured, in which case a non-blocking file writer
//! is used and its guard must be held until exit.

use std::path::Path;
use std::{fs, io};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "AFFLYT_LOG";
const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber.
///
/// Returns the file writer guard when logging to a file. Installing twice is
/// not an error; the second call keeps the first subscriber.
///
/// # Errors
/// Returns an error if the log file directory cannot be created.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(path) = log_file else {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(io::stderr)
            .with_target(false)
            .try_init()
            .is_ok();
        if !installed {
            tracing::debug!("subscriber already installed, keeping it");
        }
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .context("Log file path has no file name")?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .is_ok();
    if !installed {
        tracing::debug!("subscriber already installed, keeping it");
    }
    Ok(Some(guard))
}

/// Masks a bearer token for display and logs.
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJhbGci...");
        assert_eq!(mask_token("short"), "***");
    }

    #[test]
    fn test_init_with_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("afflyt.log");

        let guard = init(Some(&path)).unwrap();
        assert!(guard.is_some());
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_init_twice_keeps_first_subscriber() {
        assert!(init(None).unwrap().is_none());
        assert!(init(None).unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        let guard = init(Some(&dir.path().join("afflyt.log"))).unwrap();
        assert!(guard.is_some());
    }
}
