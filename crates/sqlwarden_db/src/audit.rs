//! Append-only audit log of execution attempts.
//!
//! Writing is best-effort: [`AuditLog::record`] logs and swallows failures so
//! the caller's outcome is never replaced by an audit error. Reads are always
//! narrowed to the caller's own entries unless the caller is an admin.

use crate::error::{DbError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlwarden_guard::{GatewayError, Operation, Principal};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Table recorded when a statement failed before its table was known.
pub const UNKNOWN_TABLE: &str = "unknown";

/// Default page size for history reads.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Largest page size a history read may request.
pub const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(AuditStatus::Success),
            "failed" => Ok(AuditStatus::Failed),
            other => Err(format!("unknown audit status '{}'", other)),
        }
    }
}

/// An entry to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditRecord {
    pub user_id: i64,
    pub operation: Operation,
    pub table_name: String,
    pub sql_text: String,
    pub status: AuditStatus,
}

impl NewAuditRecord {
    pub fn new(
        user_id: i64,
        operation: Operation,
        table_name: Option<&str>,
        sql_text: impl Into<String>,
        status: AuditStatus,
    ) -> Self {
        Self {
            user_id,
            operation,
            table_name: table_name.unwrap_or(UNKNOWN_TABLE).to_string(),
            sql_text: sql_text.into(),
            status,
        }
    }
}

/// A stored entry as returned by history reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub id: i64,
    pub user_id: i64,
    pub user_email: Option<String>,
    pub operation: Operation,
    pub table_name: String,
    pub sql_text: String,
    pub status: AuditStatus,
    pub created_at: DateTime<Utc>,
}

/// History filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    pub user_id: Option<i64>,
    /// Case-insensitive substring of the table name.
    pub table_name: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            table_name: None,
            limit: DEFAULT_HISTORY_LIMIT as i64,
            offset: 0,
        }
    }
}

#[derive(Clone)]
pub struct AuditLog {
    pool: SqlitePool,
    max_limit: u32,
}

impl AuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_limit: MAX_HISTORY_LIMIT,
        }
    }

    pub fn with_max_limit(mut self, max_limit: u32) -> Self {
        self.max_limit = max_limit.max(1);
        self
    }

    pub fn max_limit(&self) -> u32 {
        self.max_limit
    }

    /// Append an entry, returning its id.
    pub async fn try_record(&self, entry: &NewAuditRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO mcp_audit_logs (user_id, operation, table_name, sql_text, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.operation.as_str())
        .bind(&entry.table_name)
        .bind(&entry.sql_text)
        .bind(entry.status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Append an entry; failures are logged and swallowed.
    pub async fn record(&self, entry: NewAuditRecord) {
        match self.try_record(&entry).await {
            Ok(id) => debug!(
                audit_id = id,
                user_id = entry.user_id,
                status = %entry.status,
                "Audit entry recorded"
            ),
            Err(err) => warn!(
                user_id = entry.user_id,
                operation = %entry.operation,
                table = %entry.table_name,
                status = %entry.status,
                error = %err,
                "Failed to write audit entry"
            ),
        }
    }

    /// History, newest first. Non-admin callers only ever see their own
    /// entries, whatever `user_id` they ask for.
    pub async fn query(
        &self,
        principal: &Principal,
        filter: AuditQuery,
    ) -> std::result::Result<Vec<AuditRecord>, GatewayError> {
        if filter.limit < 1 || filter.limit > self.max_limit as i64 {
            return Err(GatewayError::validation(format!(
                "limit must be between 1 and {}",
                self.max_limit
            )));
        }
        if filter.offset < 0 {
            return Err(GatewayError::validation("offset must be >= 0"));
        }

        let user_id = if principal.is_admin() {
            filter.user_id
        } else {
            Some(principal.id)
        };

        let mut sql = String::from(
            r#"
            SELECT a.id, a.user_id, u.email AS user_email, a.operation, a.table_name,
                   a.sql_text, a.status, a.created_at
            FROM mcp_audit_logs a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE 1=1"#,
        );
        if user_id.is_some() {
            sql.push_str(" AND a.user_id = ?");
        }
        let pattern = filter
            .table_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(like_pattern);
        if pattern.is_some() {
            sql.push_str(r" AND a.table_name LIKE ? ESCAPE '\'");
        }
        sql.push_str(" ORDER BY a.id DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }
        if let Some(pattern) = pattern {
            query = query.bind(pattern);
        }
        let rows = query
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        rows.iter()
            .map(|row| row_to_audit(row).map_err(GatewayError::from))
            .collect()
    }
}

fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for ch in fragment.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn row_to_audit(row: &SqliteRow) -> Result<AuditRecord> {
    let operation: String = row.try_get("operation")?;
    let status: String = row.try_get("status")?;

    Ok(AuditRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        operation: operation
            .parse()
            .map_err(|e: String| DbError::constraint(e))?,
        table_name: row.try_get("table_name")?,
        sql_text: row.try_get("sql_text")?,
        status: status.parse().map_err(|e: String| DbError::constraint(e))?,
        created_at: row.try_get("created_at")?,
    })
}
