//! Grant checks over a loaded [`PermissionMap`].

use crate::error::{GatewayError, Result};
use crate::types::{Operation, PermissionMap, PermissionRecord};
use std::collections::HashSet;

/// Return the record granting `operation` on `table`, or `PermissionDenied`.
pub fn require<'a>(
    permissions: &'a PermissionMap,
    table: &str,
    operation: Operation,
) -> Result<&'a PermissionRecord> {
    let record = permissions.get(table).ok_or_else(|| {
        GatewayError::permission_denied(format!("No permission for table '{}'", table))
    })?;

    if !record.allows(operation) {
        let denied = match operation {
            Operation::Read => "Read access denied",
            Operation::Write => "Write access denied",
        };
        return Err(GatewayError::permission_denied(format!(
            "{} for table '{}'",
            denied, table
        )));
    }

    Ok(record)
}

/// Intersect `requested` with the record's column restriction.
///
/// - unrestricted record: the request is returned as is, `None` when empty
/// - empty restriction: always `PermissionDenied`
/// - empty request: the full restriction
/// - otherwise the case-insensitive intersection in request order, which must
///   not be empty
pub fn restrict_columns(
    requested: &[String],
    record: &PermissionRecord,
) -> Result<Option<Vec<String>>> {
    let Some(allowed) = &record.allowed_columns else {
        if requested.is_empty() {
            return Ok(None);
        }
        return Ok(Some(requested.to_vec()));
    };

    if allowed.is_empty() {
        return Err(GatewayError::permission_denied(format!(
            "no readable columns on table '{}'",
            record.table_name
        )));
    }

    let allowed: Vec<String> = allowed
        .iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();

    if requested.is_empty() {
        return Ok(Some(allowed));
    }

    let allowed_set: HashSet<&str> = allowed.iter().map(|c| c.as_str()).collect();
    let filtered: Vec<String> = requested
        .iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| allowed_set.contains(c.as_str()))
        .collect();

    if filtered.is_empty() {
        return Err(GatewayError::permission_denied(
            "No allowed columns in request",
        ));
    }

    Ok(Some(filtered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn record(can_read: bool, can_write: bool, cols: Option<&[&str]>) -> PermissionRecord {
        PermissionRecord {
            id: 1,
            user_id: 2,
            table_name: "candidates".to_string(),
            can_read,
            can_write,
            allowed_columns: cols.map(|c| c.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_require_missing_record() {
        let map = PermissionMap::new();
        let err = require(&map, "candidates", Operation::Read).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.message().starts_with("No permission for table"));
    }

    #[test]
    fn test_require_flags() {
        let map = PermissionMap::from_records(vec![record(true, false, None)]);
        assert!(require(&map, "candidates", Operation::Read).is_ok());
        let err = require(&map, "candidates", Operation::Write).unwrap_err();
        assert!(err.message().starts_with("Write access denied"));

        let map = PermissionMap::from_records(vec![record(false, true, None)]);
        let err = require(&map, "Candidates", Operation::Read).unwrap_err();
        assert!(err.message().starts_with("Read access denied"));
    }

    #[test]
    fn test_restrict_unrestricted_record() {
        let rec = record(true, false, None);
        assert_eq!(restrict_columns(&[], &rec).unwrap(), None);
        assert_eq!(
            restrict_columns(&strings(&["email"]), &rec).unwrap(),
            Some(strings(&["email"]))
        );
    }

    #[test]
    fn test_restrict_empty_allowed_is_denied() {
        let rec = record(true, false, Some(&[]));
        assert!(restrict_columns(&[], &rec).is_err());
        assert!(restrict_columns(&strings(&["id"]), &rec).is_err());
    }

    #[test]
    fn test_restrict_intersection() {
        let rec = record(true, false, Some(&["ID", "full_name", "city"]));
        assert_eq!(
            restrict_columns(&[], &rec).unwrap(),
            Some(strings(&["id", "full_name", "city"]))
        );
        assert_eq!(
            restrict_columns(&strings(&["City", "phone", "id"]), &rec).unwrap(),
            Some(strings(&["city", "id"]))
        );
        let err = restrict_columns(&strings(&["phone"]), &rec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }
}
