//! Connection pool configuration.
//!
//! The gateway talks to one SQLite database through a bounded pool. Every
//! connection gets WAL journaling, foreign keys and a busy timeout so
//! concurrent requests wait on locks instead of failing immediately.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Path of the SQLite database file
    pub path: PathBuf,
    /// Maximum connections in the pool
    pub max_connections: u32,
    /// How long a connection waits on a locked database
    pub busy_timeout: Duration,
    /// How long a request waits for a free connection
    pub acquire_timeout: Duration,
    /// Create the file when missing
    pub create_if_missing: bool,
}

impl DbConfig {
    /// SQLite configuration with defaults.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
            create_if_missing: true,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Fail instead of creating a missing database file.
    pub fn existing_only(mut self) -> Self {
        self.create_if_missing = false;
        self
    }
}

/// Create a connection pool from configuration.
pub async fn create_pool(config: &DbConfig) -> Result<SqlitePool> {
    if config.create_if_missing {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(config.create_if_missing)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    info!(
        path = %config.path.display(),
        max_connections = config.max_connections,
        "Connected to SQLite database"
    );

    Ok(pool)
}
