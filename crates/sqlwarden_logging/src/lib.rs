//! Shared logging utilities for sqlwarden binaries.
//!
//! Logs go to a daily rolling file under `<home>/logs` and to stderr. Stdout
//! is never written to: it carries JSON-RPC frames when serving.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "sqlwarden=info,sqlwarden_mcp=info,sqlwarden_db=info";
const HOME_ENV: &str = "SQLWARDEN_HOME";
const HOME_DIR_NAME: &str = ".sqlwarden";

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Overrides `<home>/logs`.
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a rolling file writer and stderr output.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_logging(config: LogConfig<'_>) -> Result<WorkerGuard> {
    let log_dir = match config.log_dir {
        Some(dir) => ensure_dir(dir)?,
        None => ensure_logs_dir()?,
    };

    let appender = tracing_appender::rolling::daily(&log_dir, format!("{}.log", config.app_name));
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Get the sqlwarden home directory: `$SQLWARDEN_HOME`, else `~/.sqlwarden`.
pub fn warden_home() -> PathBuf {
    resolve_home(std::env::var_os(HOME_ENV).map(PathBuf::from), dirs::home_dir())
}

/// Get the logs directory: `<home>/logs`
pub fn logs_dir() -> PathBuf {
    warden_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    ensure_dir(logs_dir())
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

fn resolve_home(override_path: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    if let Some(path) = override_path.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    home.as_deref()
        .unwrap_or_else(|| Path::new("."))
        .join(HOME_DIR_NAME)
}
