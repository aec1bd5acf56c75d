//! Statement execution.
//!
//! The executor consumes a [`ValidationResult`], renders the final statement
//! (projection and limit for reads) and runs it on the request's connection.
//! Every database round trip is bounded by the configured statement timeout.

use crate::error::DbError;
use crate::rows::row_to_json;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlwarden_guard::{
    render_final_sql, GatewayError, Operation, PatternShape, SqlShape, ValidationResult,
};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One result row: column name to value, in select-list order.
pub type Row = Map<String, Value>;

type Result<T> = std::result::Result<T, GatewayError>;

/// Opcodes that open the main loop of a compiled statement. Instructions
/// before the first of them are setup work.
const LOOP_OPCODES: &[&str] = &[
    "Rewind", "Last", "SeekGE", "SeekGT", "SeekLE", "SeekLT", "SeekRowid", "NotExists",
    "SorterSort", "Sort",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub statement_timeout: Duration,
}

impl ExecutorConfig {
    pub fn new(statement_timeout: Duration) -> Self {
        Self { statement_timeout }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExecutionOutcome {
    Rows(Vec<Row>),
    Affected { rows_affected: u64 },
}

/// Planner-derived cost figures. No data is read to produce them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Setup instructions before the first row can be produced.
    pub startup_cost: f64,
    /// Total instructions of the compiled statement.
    pub total_cost: f64,
    /// Row estimate from `sqlite_stat1`, `None` without statistics.
    pub plan_rows: Option<u64>,
}

#[derive(Clone)]
pub struct Executor {
    config: ExecutorConfig,
    shape: Arc<dyn SqlShape>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_shape(config, Arc::new(PatternShape::new()))
    }

    pub fn with_shape(config: ExecutorConfig, shape: Arc<dyn SqlShape>) -> Self {
        Self { config, shape }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The statement [`Executor::run`] would execute for `result`.
    pub fn final_sql(&self, result: &ValidationResult) -> String {
        render_final_sql(self.shape.as_ref(), result)
    }

    /// Execute a validated statement.
    pub async fn run(
        &self,
        conn: &mut SqliteConnection,
        result: ValidationResult,
    ) -> Result<ExecutionOutcome> {
        let sql = self.final_sql(&result);
        debug!(operation = %result.operation, table = %result.table, sql = %sql, "Executing statement");

        match result.operation {
            Operation::Read => {
                let rows = self
                    .bounded(sqlx::query(&sql).persistent(false).fetch_all(&mut *conn))
                    .await?
                    .map_err(|e| GatewayError::internal(format!("query failed: {}", e)))?;

                let rows = rows
                    .iter()
                    .map(row_to_json)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| GatewayError::internal(format!("row decoding failed: {}", e)))?;
                Ok(ExecutionOutcome::Rows(rows))
            }
            Operation::Write => {
                let done = self
                    .bounded(sqlx::query(&sql).persistent(false).execute(&mut *conn))
                    .await?
                    .map_err(map_write_error)?;
                Ok(ExecutionOutcome::Affected {
                    rows_affected: done.rows_affected(),
                })
            }
        }
    }

    /// Query plan lines for `sql`, without executing it.
    pub async fn explain(&self, conn: &mut SqliteConnection, sql: &str) -> Result<Vec<String>> {
        let explain = format!("EXPLAIN QUERY PLAN {}", sql);
        let rows = self
            .bounded(sqlx::query(&explain).persistent(false).fetch_all(&mut *conn))
            .await?
            .map_err(|e| GatewayError::internal(format!("explain failed: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("detail")
                    .map_err(|e| GatewayError::internal(format!("explain failed: {}", e)))
            })
            .collect()
    }

    /// Cost figures for the final statement of `result`.
    pub async fn estimate(
        &self,
        conn: &mut SqliteConnection,
        result: &ValidationResult,
    ) -> Result<CostEstimate> {
        let explain = format!("EXPLAIN {}", self.final_sql(result));
        let rows = self
            .bounded(sqlx::query(&explain).persistent(false).fetch_all(&mut *conn))
            .await?
            .map_err(|e| GatewayError::internal(format!("cost estimate failed: {}", e)))?;

        let opcodes = rows
            .iter()
            .map(|row| row.try_get::<String, _>("opcode"))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GatewayError::internal(format!("cost estimate failed: {}", e)))?;

        let startup = opcodes
            .iter()
            .position(|op| LOOP_OPCODES.contains(&op.as_str()))
            .unwrap_or(0);

        let mut plan_rows = self.table_rows(conn, &result.table).await?;
        if result.operation == Operation::Read {
            plan_rows = plan_rows.map(|rows| rows.min(result.limit));
        }

        Ok(CostEstimate {
            startup_cost: startup as f64,
            total_cost: opcodes.len() as f64,
            plan_rows,
        })
    }

    async fn table_rows(&self, conn: &mut SqliteConnection, table: &str) -> Result<Option<u64>> {
        let has_stats: Option<i64> = self
            .bounded(
                sqlx::query_scalar(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_stat1'",
                )
                .fetch_optional(&mut *conn),
            )
            .await?
            .map_err(|e| GatewayError::from(DbError::from(e)))?;
        if has_stats.is_none() {
            return Ok(None);
        }

        let stat: Option<String> = self
            .bounded(
                sqlx::query_scalar(
                    "SELECT stat FROM sqlite_stat1 WHERE lower(tbl) = lower(?) ORDER BY idx IS NOT NULL LIMIT 1",
                )
                .bind(table)
                .fetch_optional(&mut *conn),
            )
            .await?
            .map_err(|e| GatewayError::from(DbError::from(e)))?;

        Ok(stat.and_then(|s| s.split_whitespace().next().and_then(|n| n.parse().ok())))
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let timeout = self.config.statement_timeout;
        tokio::time::timeout(timeout, fut).await.map_err(|_| {
            warn!(timeout_ms = timeout.as_millis() as u64, "Statement timed out");
            GatewayError::from(DbError::Timeout(timeout))
        })
    }
}

fn map_write_error(err: sqlx::Error) -> GatewayError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return GatewayError::conflict(format!("unique constraint violated: {}", db_err.message()));
        }
    }
    GatewayError::internal(format!("write failed: {}", err))
}
