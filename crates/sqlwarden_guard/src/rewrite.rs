//! Final statement rendering.

use crate::shape::SqlShape;
use crate::types::{Operation, ValidationResult};

/// Render the statement the executor runs for `result`.
///
/// Reads get the resolved projection (unless aggregating) and the enforced
/// limit. Writes run exactly as validated.
pub fn render_final_sql(shape: &dyn SqlShape, result: &ValidationResult) -> String {
    match result.operation {
        Operation::Write => result.normalized_sql.clone(),
        Operation::Read => {
            let sql = &result.normalized_sql;
            let projected = match &result.columns {
                Some(columns) if !columns.is_empty() && !shape.is_aggregate(sql) => {
                    shape.rewrite_projection(sql, columns)
                }
                _ => sql.clone(),
            };
            shape.enforce_limit(&projected, result.limit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::PatternShape;

    fn read(sql: &str, columns: Option<&[&str]>, limit: u64) -> ValidationResult {
        ValidationResult {
            operation: Operation::Read,
            table: "candidates".to_string(),
            columns: columns.map(|c| c.iter().map(|s| s.to_string()).collect()),
            limit,
            normalized_sql: sql.to_string(),
        }
    }

    #[test]
    fn test_read_projection_and_limit() {
        let result = read("SELECT * FROM candidates", Some(&["id", "full_name"]), 200);
        assert_eq!(
            render_final_sql(&PatternShape, &result),
            "SELECT id, full_name FROM candidates LIMIT 200"
        );
    }

    #[test]
    fn test_unrestricted_read_only_gets_limit() {
        let result = read("SELECT * FROM candidates WHERE city = 'Pune'", None, 50);
        assert_eq!(
            render_final_sql(&PatternShape, &result),
            "SELECT * FROM candidates WHERE city = 'Pune' LIMIT 50"
        );
    }

    #[test]
    fn test_aggregate_keeps_select_list() {
        let result = read("SELECT COUNT(*) FROM candidates", Some(&["id"]), 200);
        assert_eq!(
            render_final_sql(&PatternShape, &result),
            "SELECT COUNT(*) FROM candidates LIMIT 200"
        );
    }

    #[test]
    fn test_write_is_untouched() {
        let result = ValidationResult {
            operation: Operation::Write,
            table: "candidates".to_string(),
            columns: None,
            limit: 0,
            normalized_sql: "DELETE FROM candidates WHERE id = 5".to_string(),
        };
        assert_eq!(
            render_final_sql(&PatternShape, &result),
            "DELETE FROM candidates WHERE id = 5"
        );
    }
}
