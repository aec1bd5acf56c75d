//! Statement validation for the sqlwarden gateway.
//!
//! This crate is pure logic. It never touches a database: callers load a
//! [`PermissionMap`] and a [`SchemaSnapshot`] for the request and hand them to
//! the [`Validator`], which either rejects the candidate statement or returns
//! an immutable [`ValidationResult`] describing exactly what may run.
//!
//! SQL shape recognition sits behind the [`SqlShape`] trait. The default
//! [`PatternShape`] is pattern based and only understands single-table
//! statements; a real parser can be dropped in without touching permission or
//! audit logic.

pub mod error;
pub mod permissions;
pub mod rewrite;
pub mod shape;
pub mod types;
pub mod validator;

pub use error::{ErrorKind, GatewayError, Result};
pub use permissions::{require, restrict_columns};
pub use rewrite::render_final_sql;
pub use shape::{PatternShape, SelectShape, SqlShape, WriteShape};
pub use types::{
    Operation, PermissionMap, PermissionRecord, Principal, Role, SchemaSnapshot,
    ValidationResult,
};
pub use validator::{Validator, ValidatorConfig, DEFAULT_MAX_LIMIT};
