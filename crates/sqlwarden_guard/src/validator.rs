//! Candidate statement validation.
//!
//! The pipeline runs in a fixed order and stops at the first failure:
//!
//! 1. destructive keyword block (`DROP`, `TRUNCATE`, `ALTER`) on the raw text
//! 2. tautology guard
//! 3. normalization and classification
//! 4. the read or write path
//!
//! Steps 1 and 2 are independent of grants: a principal with every permission
//! still cannot drop a table.

use crate::error::{GatewayError, Result};
use crate::permissions::{require, restrict_columns};
use crate::shape::{PatternShape, SelectShape, SqlShape, WriteVerb};
use crate::types::{Operation, PermissionMap, Principal, SchemaSnapshot, ValidationResult};
use std::sync::Arc;
use tracing::debug;

/// Row cap applied to reads when none is configured.
pub const DEFAULT_MAX_LIMIT: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Upper bound for the limit of any read, at least 1.
    pub max_limit: u64,
}

impl ValidatorConfig {
    pub fn new(max_limit: u64) -> Self {
        Self {
            max_limit: max_limit.max(1),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LIMIT)
    }
}

/// Validates candidate SQL against grants and schema.
#[derive(Clone)]
pub struct Validator {
    config: ValidatorConfig,
    shape: Arc<dyn SqlShape>,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self::with_shape(config, Arc::new(PatternShape::new()))
    }

    pub fn with_shape(config: ValidatorConfig, shape: Arc<dyn SqlShape>) -> Self {
        Self {
            config: ValidatorConfig::new(config.max_limit),
            shape,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn shape(&self) -> Arc<dyn SqlShape> {
        Arc::clone(&self.shape)
    }

    pub fn validate(
        &self,
        sql: &str,
        principal: &Principal,
        permissions: &PermissionMap,
        schema: &SchemaSnapshot,
    ) -> Result<ValidationResult> {
        if let Some(keyword) = self.shape.destructive_keyword(sql) {
            return Err(GatewayError::validation(format!(
                "destructive statement rejected: {} is not allowed",
                keyword
            )));
        }

        if self.shape.has_tautology(sql) {
            return Err(GatewayError::validation(
                "tautological condition rejected",
            ));
        }

        let normalized = self.shape.normalize(sql)?;
        let result = match self.shape.classify(&normalized)? {
            Operation::Read => self.validate_read(normalized, permissions, schema)?,
            Operation::Write => self.validate_write(normalized, permissions, schema)?,
        };

        debug!(
            user_id = principal.id,
            operation = %result.operation,
            table = %result.table,
            limit = result.limit,
            "Statement validated"
        );

        Ok(result)
    }

    fn validate_read(
        &self,
        normalized: String,
        permissions: &PermissionMap,
        schema: &SchemaSnapshot,
    ) -> Result<ValidationResult> {
        let SelectShape {
            table,
            columns: requested,
            limit,
            aggregate,
        } = self.shape.parse_select(&normalized)?;

        ensure_table(schema, &table)?;
        let record = require(permissions, &table, Operation::Read)?;

        let columns = if aggregate {
            None
        } else {
            let requested = requested.unwrap_or_default();
            let resolved = restrict_columns(&requested, record)?;
            if let Some(resolved) = &resolved {
                if !requested.is_empty() && resolved.len() != requested.len() {
                    let denied: Vec<&str> = requested
                        .iter()
                        .map(|c| c.as_str())
                        .filter(|c| !resolved.iter().any(|r| r == c))
                        .collect();
                    return Err(GatewayError::permission_denied(format!(
                        "columns not permitted on table '{}': {}",
                        table,
                        denied.join(", ")
                    )));
                }
            }
            resolved
        };

        let max = self.config.max_limit;
        let limit = match limit {
            Some(0) => {
                return Err(GatewayError::validation(
                    "LIMIT must be greater than zero",
                ))
            }
            Some(n) => n.min(max),
            None => max,
        };

        Ok(ValidationResult {
            operation: Operation::Read,
            table,
            columns,
            limit,
            normalized_sql: normalized,
        })
    }

    fn validate_write(
        &self,
        normalized: String,
        permissions: &PermissionMap,
        schema: &SchemaSnapshot,
    ) -> Result<ValidationResult> {
        let shape = self.shape.parse_write(&normalized)?;

        if matches!(shape.verb, WriteVerb::Update | WriteVerb::Delete) && !shape.has_where {
            return Err(GatewayError::validation(
                "unsafe statement without WHERE",
            ));
        }

        ensure_table(schema, &shape.table)?;
        require(permissions, &shape.table, Operation::Write)?;

        Ok(ValidationResult {
            operation: Operation::Write,
            table: shape.table,
            columns: None,
            limit: 0,
            normalized_sql: normalized,
        })
    }
}

fn ensure_table(schema: &SchemaSnapshot, table: &str) -> Result<()> {
    if schema.has_table(table) {
        Ok(())
    } else {
        Err(GatewayError::not_found(format!(
            "table '{}' does not exist",
            table
        )))
    }
}
