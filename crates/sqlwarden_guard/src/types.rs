//! Core domain types: principals, grants, schema and validation results.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Principal role as issued by the external authentication service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{}' (expected admin or user)", other)),
        }
    }
}

/// The caller a request runs on behalf of. Opaque beyond id and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
}

impl Principal {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn user(id: i64) -> Self {
        Self::new(id, Role::User)
    }

    pub fn admin(id: i64) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Statement class after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Operation::Read),
            "write" => Ok(Operation::Write),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

/// A per-principal, per-table grant.
///
/// `allowed_columns = None` means every column is readable. `Some(vec![])`
/// means no column is readable, which rejects every non-aggregate read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: i64,
    pub user_id: i64,
    pub table_name: String,
    pub can_read: bool,
    pub can_write: bool,
    pub allowed_columns: Option<Vec<String>>,
}

impl PermissionRecord {
    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::Read => self.can_read,
            Operation::Write => self.can_write,
        }
    }
}

/// Grants of one principal keyed by lower-cased table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMap {
    records: HashMap<String, PermissionRecord>,
}

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = PermissionRecord>) -> Self {
        let mut map = Self::new();
        for record in records {
            map.insert(record);
        }
        map
    }

    pub fn insert(&mut self, record: PermissionRecord) {
        self.records
            .insert(record.table_name.trim().to_ascii_lowercase(), record);
    }

    pub fn get(&self, table: &str) -> Option<&PermissionRecord> {
        self.records.get(&table.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionRecord> {
        self.records.values()
    }
}

/// Tables and their ordered column names, as reported by the live database.
///
/// Table keys are lower-cased so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, Vec<String>>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl AsRef<str>, columns: Vec<String>) {
        self.tables
            .insert(table.as_ref().trim().to_ascii_lowercase(), columns);
    }

    /// Builder form of [`SchemaSnapshot::insert`].
    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.insert(table, columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.trim().to_ascii_lowercase())
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables
            .get(&table.trim().to_ascii_lowercase())
            .map(|c| c.as_slice())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tables
    }
}

/// Outcome of a successful validation. Produced once per request and consumed
/// once by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub operation: Operation,
    pub table: String,
    /// Projection to enforce; `None` leaves the select list untouched.
    pub columns: Option<Vec<String>>,
    /// Row cap for reads in `1..=max_limit`; always `0` for writes.
    pub limit: u64,
    /// Trimmed statement without its trailing semicolon.
    pub normalized_sql: String,
}
