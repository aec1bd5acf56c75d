//! Storage layer for the sqlwarden gateway.
//!
//! Owns every interaction with the database: the connection pool, the
//! gateway's own tables, schema introspection, grant loading, statement
//! execution and the audit log.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sqlwarden_db::{DbConfig, PermissionStore, SchemaIntrospector, WardenDb};
//!
//! let db = WardenDb::open(&DbConfig::sqlite("gateway.sqlite3")).await?;
//! let mut tx = db.begin().await?;
//! let grants = PermissionStore.load(&mut tx, 42).await?;
//! let schema = SchemaIntrospector.snapshot(&mut tx).await?;
//! tx.commit().await?;
//! ```

mod demo;
mod error;
mod pool;
mod rows;
mod schema;

pub mod audit;
pub mod executor;
pub mod introspect;
pub mod permissions;

pub use audit::{AuditLog, AuditQuery, AuditRecord, AuditStatus, NewAuditRecord, UNKNOWN_TABLE};
pub use demo::{DemoUsers, DEMO_ADMIN_EMAIL, DEMO_USER_EMAIL};
pub use error::{DbError, Result};
pub use executor::{CostEstimate, ExecutionOutcome, Executor, ExecutorConfig, Row};
pub use introspect::SchemaIntrospector;
pub use permissions::PermissionStore;
pub use pool::{create_pool, DbConfig};
pub use rows::row_to_json;
pub use schema::INTERNAL_TABLES;

use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};
use tracing::info;

/// Handle to the gateway database.
#[derive(Clone)]
pub struct WardenDb {
    pool: SqlitePool,
}

impl WardenDb {
    /// Open the database and make sure the gateway tables exist.
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %config.path.display(), "Database opened");
        Ok(db)
    }

    /// Wrap an existing pool. The schema is still ensured.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Begin the transaction a single request runs in.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
