//! Request sequencing for every gateway tool.
//!
//! Each request runs in one transaction: grants and schema are loaded,
//! the candidate statement is validated, then executed or explained. The
//! transaction commits on success and rolls back on any error. Execution
//! tools (`run_read_query`, `run_write_query`) write exactly one audit entry
//! after the transaction has finished, whatever the outcome.

use serde::Serialize;
use sqlwarden_db::{
    AuditLog, AuditQuery, AuditRecord, AuditStatus, CostEstimate, DbError, ExecutionOutcome,
    Executor, ExecutorConfig, NewAuditRecord, PermissionStore, Row, SchemaIntrospector, WardenDb,
};
use sqlwarden_guard::{
    GatewayError, Operation, PatternShape, PermissionRecord, Principal, Result, SchemaSnapshot,
    SqlShape, ValidationResult, Validator, ValidatorConfig,
};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Sqlite, Transaction};
use std::sync::Arc;
use tracing::{info, warn};

/// Explicit configuration of every gateway component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub validator: ValidatorConfig,
    pub executor: ExecutorConfig,
    /// Largest page a history read may request.
    pub audit_history_max_limit: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            validator: ValidatorConfig::default(),
            executor: ExecutorConfig::default(),
            audit_history_max_limit: sqlwarden_db::audit::MAX_HISTORY_LIMIT,
        }
    }
}

/// `validate_query` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub operation: Operation,
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub limit: u64,
}

impl From<&ValidationResult> for ValidationSummary {
    fn from(result: &ValidationResult) -> Self {
        Self {
            operation: result.operation,
            table: result.table.clone(),
            columns: result.columns.clone(),
            limit: result.limit,
        }
    }
}

/// Validation outcome plus the statement the executor would run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub validation: ValidationResult,
    pub final_sql: String,
}

/// `dry_run_query` / `explain_query` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub operation: Operation,
    pub table: String,
    pub plan: Vec<String>,
}

/// `estimate_query_cost` result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    pub operation: Operation,
    pub table: String,
    #[serde(flatten)]
    pub estimate: CostEstimate,
}

/// `run_write_query` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub rows_affected: u64,
}

#[derive(Clone)]
pub struct Gateway {
    db: WardenDb,
    validator: Validator,
    executor: Executor,
    audit: AuditLog,
    permissions: PermissionStore,
    introspector: SchemaIntrospector,
}

impl Gateway {
    pub fn new(db: WardenDb, config: GatewayConfig) -> Self {
        Self::with_shape(db, config, Arc::new(PatternShape::new()))
    }

    /// Build with a custom statement shape recognizer, shared by the
    /// validator and the executor.
    pub fn with_shape(db: WardenDb, config: GatewayConfig, shape: Arc<dyn SqlShape>) -> Self {
        let audit = AuditLog::new(db.pool().clone()).with_max_limit(config.audit_history_max_limit);
        Self {
            validator: Validator::with_shape(config.validator, Arc::clone(&shape)),
            executor: Executor::with_shape(config.executor, shape),
            audit,
            permissions: PermissionStore,
            introspector: SchemaIntrospector,
            db,
        }
    }

    pub fn db(&self) -> &WardenDb {
        &self.db
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Look up a principal's role in the directory.
    pub async fn resolve_principal(&self, user_id: i64) -> Result<Principal> {
        let mut conn = self.db.pool().acquire().await.map_err(db_error)?;
        self.permissions
            .principal(&mut conn, user_id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("user {} does not exist", user_id)))
    }

    pub async fn validate_query(&self, principal: &Principal, sql: &str) -> Result<ValidationSummary> {
        let mut tx = self.db.begin().await?;
        let outcome = self.validated(&mut tx, principal, sql).await;
        finish(tx, outcome).await.map(|result| ValidationSummary::from(&result))
    }

    pub async fn check_query(&self, principal: &Principal, sql: &str) -> Result<CheckReport> {
        let mut tx = self.db.begin().await?;
        let outcome = self.validated(&mut tx, principal, sql).await;
        let validation = finish(tx, outcome).await?;
        Ok(CheckReport {
            final_sql: self.executor.final_sql(&validation),
            validation,
        })
    }

    /// Plan of the statement exactly as the executor would run it.
    pub async fn dry_run_query(&self, principal: &Principal, sql: &str) -> Result<PlanReport> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<PlanReport> = async {
            let result = self.validated(&mut tx, principal, sql).await?;
            let final_sql = self.executor.final_sql(&result);
            let plan = self.executor.explain(&mut tx, &final_sql).await?;
            Ok(PlanReport {
                operation: result.operation,
                table: result.table,
                plan,
            })
        }
        .await;
        finish(tx, outcome).await
    }

    /// Plan of the validated statement.
    pub async fn explain_query(&self, principal: &Principal, sql: &str) -> Result<PlanReport> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<PlanReport> = async {
            let result = self.validated(&mut tx, principal, sql).await?;
            let plan = self.executor.explain(&mut tx, &result.normalized_sql).await?;
            Ok(PlanReport {
                operation: result.operation,
                table: result.table,
                plan,
            })
        }
        .await;
        finish(tx, outcome).await
    }

    pub async fn estimate_query_cost(&self, principal: &Principal, sql: &str) -> Result<CostReport> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<CostReport> = async {
            let result = self.validated(&mut tx, principal, sql).await?;
            let estimate = self.executor.estimate(&mut tx, &result).await?;
            Ok(CostReport {
                operation: result.operation,
                table: result.table,
                estimate,
            })
        }
        .await;
        finish(tx, outcome).await
    }

    pub async fn run_read_query(&self, principal: &Principal, sql: &str) -> Result<Vec<Row>> {
        let mut table = None;
        let outcome = match self.execute(principal, sql, Operation::Read, &mut table).await {
            Ok(ExecutionOutcome::Rows(rows)) => Ok(rows),
            Ok(ExecutionOutcome::Affected { .. }) => {
                Err(GatewayError::internal("read produced no result set"))
            }
            Err(err) => Err(err),
        };
        self.audit_attempt(principal, Operation::Read, table.as_deref(), sql, &outcome)
            .await;
        outcome
    }

    pub async fn run_write_query(&self, principal: &Principal, sql: &str) -> Result<WriteReport> {
        let mut table = None;
        let outcome = match self.execute(principal, sql, Operation::Write, &mut table).await {
            Ok(ExecutionOutcome::Affected { rows_affected }) => Ok(WriteReport { rows_affected }),
            Ok(ExecutionOutcome::Rows(_)) => {
                Err(GatewayError::internal("write produced a result set"))
            }
            Err(err) => Err(err),
        };
        self.audit_attempt(principal, Operation::Write, table.as_deref(), sql, &outcome)
            .await;
        outcome
    }

    pub async fn audit_query_history(
        &self,
        principal: &Principal,
        query: AuditQuery,
    ) -> Result<Vec<AuditRecord>> {
        self.audit.query(principal, query).await
    }

    /// Tables and columns visible to the principal. Admins see everything;
    /// users see readable tables limited to their allowed columns.
    pub async fn get_schema(&self, principal: &Principal) -> Result<SchemaSnapshot> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<SchemaSnapshot> = async {
            let schema = self.introspector.snapshot(&mut tx).await?;
            if principal.is_admin() {
                return Ok(schema);
            }

            let permissions = self.permissions.load(&mut tx, principal.id).await?;
            let mut visible = SchemaSnapshot::new();
            for (table, columns) in schema.as_map() {
                let Some(record) = permissions.get(table) else {
                    continue;
                };
                if !record.can_read {
                    continue;
                }
                let columns = match &record.allowed_columns {
                    None => columns.clone(),
                    Some(allowed) => columns
                        .iter()
                        .filter(|c| allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(c)))
                        .cloned()
                        .collect(),
                };
                visible.insert(table, columns);
            }
            Ok(visible)
        }
        .await;
        finish(tx, outcome).await
    }

    /// Grants of the principal. Admins may ask for another user's grants.
    pub async fn get_user_permissions(
        &self,
        principal: &Principal,
        user_id: Option<i64>,
    ) -> Result<Vec<PermissionRecord>> {
        let target = match user_id {
            Some(id) if principal.is_admin() => id,
            _ => principal.id,
        };
        let mut conn = self.db.pool().acquire().await.map_err(db_error)?;
        Ok(self.permissions.list(&mut conn, target).await?)
    }

    async fn validated(
        &self,
        conn: &mut SqliteConnection,
        principal: &Principal,
        sql: &str,
    ) -> Result<ValidationResult> {
        let permissions = self.permissions.load(conn, principal.id).await?;
        let schema = self.introspector.snapshot(conn).await?;
        self.validator.validate(sql, principal, &permissions, &schema)
    }

    async fn execute(
        &self,
        principal: &Principal,
        sql: &str,
        expected: Operation,
        table: &mut Option<String>,
    ) -> Result<ExecutionOutcome> {
        let mut tx = self.db.begin().await?;
        let outcome: Result<ExecutionOutcome> = async {
            let result = self.validated(&mut tx, principal, sql).await?;
            *table = Some(result.table.clone());
            if result.operation != expected {
                return Err(GatewayError::validation(match expected {
                    Operation::Read => "not a read query",
                    Operation::Write => "not a write query",
                }));
            }
            self.executor.run(&mut tx, result).await
        }
        .await;
        finish(tx, outcome).await
    }

    async fn audit_attempt<T>(
        &self,
        principal: &Principal,
        operation: Operation,
        table: Option<&str>,
        sql: &str,
        outcome: &Result<T>,
    ) {
        let status = match outcome {
            Ok(_) => AuditStatus::Success,
            Err(err) => {
                info!(
                    user_id = principal.id,
                    operation = %operation,
                    kind = %err.kind(),
                    error = %err,
                    "Statement rejected"
                );
                AuditStatus::Failed
            }
        };
        self.audit
            .record(NewAuditRecord::new(principal.id, operation, table, sql, status))
            .await;
    }
}

/// Commit on success, roll back on failure. The original error always wins
/// over a rollback failure.
async fn finish<T>(tx: Transaction<'static, Sqlite>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(db_error)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(err)
        }
    }
}

fn db_error(err: sqlx::Error) -> GatewayError {
    GatewayError::from(DbError::from(err))
}
