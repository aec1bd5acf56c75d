//! SQL shape recognition.
//!
//! Everything the gateway needs to know about statement structure goes through
//! [`SqlShape`]. [`PatternShape`] implements it with a literal/comment aware
//! sanitizer plus regular expressions and deliberately recognises only
//! single-table statements.

use crate::error::{GatewayError, Result};
use crate::types::Operation;
use regex::Regex;
use std::sync::LazyLock;

static DESTRUCTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(drop|truncate|alter)\b").expect("destructive keyword pattern")
});

// `OR <a> = <a>` with optional quotes and parenthesis, or `OR TRUE`.
static TAUTOLOGY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bor\b\s*\(?\s*(?:(true)\b|'?(\w+)'?\s*=\s*'?(\w+)\b)")
        .expect("tautology pattern")
});

static SIMPLE_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*select\s+(?P<cols>[\w\*,\s\(\)]+?)\s+from\s+(?P<table>\w+)(?:\s+where\s+.+?)?(?:\s+order\s+by\s+.+?)?(?:\s+limit\s+\d+)?\s*$",
    )
    .expect("select pattern")
});

static AGGREGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(count|sum|avg|min|max)\s*\(").expect("aggregate pattern")
});

static PROJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*select\s+.+?\s+from\s").expect("projection pattern")
});

static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\s+(\d+)").expect("limit pattern"));

// The only accepted row cap: `LIMIT <digits>` closing the statement.
static TRAILING_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\s+(\d+)\s*$").expect("trailing limit pattern"));

static WHERE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwhere\b").expect("where pattern"));

static UPDATE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*update\s+(?:or\s+[a-z]+\s+)?([a-z_][a-z0-9_]*)\b")
        .expect("update target pattern")
});

static INSERT_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*insert\s+(?:or\s+[a-z]+\s+)?into\s+([a-z_][a-z0-9_]*)\b")
        .expect("insert target pattern")
});

static DELETE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*delete\s+from\s+([a-z_][a-z0-9_]*)\b").expect("delete target pattern")
});

const UNSUPPORTED_READ_KEYWORDS: &[&str] = &["JOIN", "UNION", "INTERSECT", "EXCEPT", "WITH"];

/// Parsed form of a supported read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectShape {
    /// Lower-cased table name.
    pub table: String,
    /// Lower-cased select list, `None` for `*`.
    pub columns: Option<Vec<String>>,
    /// Literal `LIMIT` value. Values too large for `u64` saturate.
    pub limit: Option<u64>,
    pub aggregate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteVerb {
    Insert,
    Update,
    Delete,
}

/// Parsed form of a supported write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteShape {
    pub verb: WriteVerb,
    /// Lower-cased target table.
    pub table: String,
    pub has_where: bool,
}

/// Narrow interface over statement structure.
pub trait SqlShape: Send + Sync {
    /// First destructive keyword found anywhere in the raw text, upper-cased.
    fn destructive_keyword(&self, sql: &str) -> Option<String>;

    /// True when the text contains a condition that is always true.
    fn has_tautology(&self, sql: &str) -> bool;

    /// Trim, reject empty and multi-statement input, strip one trailing `;`.
    fn normalize(&self, sql: &str) -> Result<String>;

    /// Classify a normalized statement by its leading keyword.
    fn classify(&self, sql: &str) -> Result<Operation>;

    fn parse_select(&self, sql: &str) -> Result<SelectShape>;

    fn parse_write(&self, sql: &str) -> Result<WriteShape>;

    fn is_aggregate(&self, sql: &str) -> bool;

    /// Replace the select list with `columns`, keeping everything after `FROM`.
    fn rewrite_projection(&self, sql: &str, columns: &[String]) -> String;

    /// Replace an existing `LIMIT` value or append one.
    fn enforce_limit(&self, sql: &str, limit: u64) -> String;
}

/// Pattern based [`SqlShape`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternShape;

impl PatternShape {
    pub fn new() -> Self {
        Self
    }
}

impl SqlShape for PatternShape {
    fn destructive_keyword(&self, sql: &str) -> Option<String> {
        DESTRUCTIVE
            .find(sql)
            .map(|m| m.as_str().to_ascii_uppercase())
    }

    fn has_tautology(&self, sql: &str) -> bool {
        TAUTOLOGY.captures_iter(&blank_comments(sql)).any(|caps| {
            if caps.get(1).is_some() {
                return true;
            }
            match (caps.get(2), caps.get(3)) {
                (Some(left), Some(right)) => left.as_str().eq_ignore_ascii_case(right.as_str()),
                _ => false,
            }
        })
    }

    fn normalize(&self, sql: &str) -> Result<String> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::validation("SQL is required"));
        }

        let sanitized = sanitize_sql(trimmed);
        let statement = match sanitized.find(';') {
            Some(idx) => {
                if sanitized[idx + 1..].chars().any(|c| !c.is_whitespace()) {
                    return Err(GatewayError::validation(
                        "multiple statements are not allowed",
                    ));
                }
                trimmed[..idx].trim_end()
            }
            None => trimmed,
        };

        if statement.is_empty() {
            return Err(GatewayError::validation("SQL is required"));
        }
        Ok(statement.to_string())
    }

    fn classify(&self, sql: &str) -> Result<Operation> {
        match first_keyword(&sanitize_sql(sql)).as_deref() {
            Some("SELECT") => Ok(Operation::Read),
            Some("INSERT") | Some("UPDATE") | Some("DELETE") => Ok(Operation::Write),
            Some(other) => Err(GatewayError::validation(format!(
                "unsupported operation: {}",
                other
            ))),
            None => Err(GatewayError::validation("unsupported operation")),
        }
    }

    fn parse_select(&self, sql: &str) -> Result<SelectShape> {
        let sanitized = sanitize_sql(sql);
        let tokens = tokens_upper(&sanitized);

        if tokens.iter().filter(|t| t.as_str() == "SELECT").count() != 1 {
            return Err(GatewayError::validation("subqueries are not supported"));
        }
        if let Some(keyword) = tokens
            .iter()
            .find(|t| UNSUPPORTED_READ_KEYWORDS.contains(&t.as_str()))
        {
            return Err(GatewayError::validation(format!(
                "{} is not supported; only single-table reads are allowed",
                keyword
            )));
        }

        let caps = SIMPLE_SELECT.captures(&sanitized).ok_or_else(|| {
            GatewayError::validation(
                "unsupported SELECT shape: expected SELECT <columns> FROM <table> \
                 [WHERE ...] [ORDER BY ...] [LIMIT n]",
            )
        })?;

        let cols = caps.name("cols").map(|m| m.as_str().trim()).unwrap_or("");
        let columns = if cols == "*" {
            None
        } else {
            let parsed: Vec<String> = cols
                .split(',')
                .map(|c| c.trim().to_ascii_lowercase())
                .collect();
            if parsed.iter().any(|c| c.is_empty()) {
                return Err(GatewayError::validation("empty column in select list"));
            }
            Some(parsed)
        };

        let table = caps
            .name("table")
            .map(|m| m.as_str().to_ascii_lowercase())
            .ok_or_else(|| GatewayError::validation("unable to determine table"))?;

        let limit = parse_limit(&sanitized, &tokens)?;

        Ok(SelectShape {
            table,
            columns,
            limit,
            aggregate: AGGREGATE.is_match(&sanitized),
        })
    }

    fn parse_write(&self, sql: &str) -> Result<WriteShape> {
        let sanitized = sanitize_sql(sql);
        let (verb, pattern) = match first_keyword(&sanitized).as_deref() {
            Some("INSERT") => (WriteVerb::Insert, &*INSERT_TARGET),
            Some("UPDATE") => (WriteVerb::Update, &*UPDATE_TARGET),
            Some("DELETE") => (WriteVerb::Delete, &*DELETE_TARGET),
            _ => return Err(GatewayError::validation("not a write statement")),
        };

        if tokens_upper(&sanitized).iter().any(|t| t == "SELECT") {
            return Err(GatewayError::validation(
                "subqueries are not supported in write statements",
            ));
        }

        // Raw text: a blanked quoted target must not match the next keyword.
        let table = pattern
            .captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_ascii_lowercase())
            .ok_or_else(|| GatewayError::validation("unable to determine target table"))?;

        Ok(WriteShape {
            verb,
            table,
            has_where: WHERE_CLAUSE.is_match(&sanitized),
        })
    }

    fn is_aggregate(&self, sql: &str) -> bool {
        AGGREGATE.is_match(&sanitize_sql(sql))
    }

    fn rewrite_projection(&self, sql: &str, columns: &[String]) -> String {
        if columns.is_empty() {
            return sql.to_string();
        }
        let sanitized = sanitize_sql(sql);
        match PROJECTION.find(&sanitized) {
            Some(m) => format!("SELECT {} FROM {}", columns.join(", "), &sql[m.end()..]),
            None => sql.to_string(),
        }
    }

    fn enforce_limit(&self, sql: &str, limit: u64) -> String {
        let sanitized = sanitize_sql(sql);
        let last = LIMIT_CLAUSE
            .captures_iter(&sanitized)
            .filter_map(|caps| caps.get(1))
            .last();
        match last {
            Some(value) => format!(
                "{}{}{}",
                &sql[..value.start()],
                limit,
                &sql[value.end()..]
            ),
            None => format!("{} LIMIT {}", sql.trim_end(), limit),
        }
    }
}

/// The literal row cap of a sanitized select. Anything but a single trailing
/// `LIMIT <digits>` is rejected: `LIMIT a, b`, `OFFSET` and limit expressions
/// would let the executed row count escape the enforced cap.
fn parse_limit(sanitized: &str, tokens: &[String]) -> Result<Option<u64>> {
    if tokens.iter().any(|t| t == "OFFSET") {
        return Err(GatewayError::validation(
            "OFFSET is not supported; only LIMIT <n> is allowed",
        ));
    }
    match tokens.iter().filter(|t| t.as_str() == "LIMIT").count() {
        0 => Ok(None),
        1 => {
            let value = TRAILING_LIMIT
                .captures(sanitized)
                .and_then(|caps| caps.get(1))
                .ok_or_else(|| {
                    GatewayError::validation(
                        "unsupported LIMIT: expected LIMIT <n> at the end of the statement",
                    )
                })?;
            Ok(Some(value.as_str().parse::<u64>().unwrap_or(u64::MAX)))
        }
        _ => Err(GatewayError::validation("multiple LIMIT clauses are not allowed")),
    }
}

fn first_keyword(sql: &str) -> Option<String> {
    let mut current = String::new();
    for ch in sql.chars() {
        if ch.is_ascii_alphabetic() {
            current.push(ch);
        } else if !current.is_empty() {
            break;
        }
    }
    if current.is_empty() {
        None
    } else {
        Some(current.to_ascii_uppercase())
    }
}

fn tokens_upper(sql: &str) -> Vec<String> {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_uppercase())
        .collect()
}

/// Blank out string literals, quoted identifiers and comments.
///
/// Every blanked character is replaced by as many spaces as its UTF-8 length,
/// so byte offsets in the output line up with the input.
fn sanitize_sql(sql: &str) -> String {
    scrub(sql, true)
}

/// Blank out comments only, keeping literals. SQLite reads a comment as
/// whitespace, so `OR/**/1=1` becomes `OR    1=1`.
fn blank_comments(sql: &str) -> String {
    scrub(sql, false)
}

fn scrub(sql: &str, blank_literals: bool) -> String {
    fn blank(out: &mut String, ch: char) {
        for _ in 0..ch.len_utf8() {
            out.push(' ');
        }
    }
    let literal = |out: &mut String, ch: char| {
        if blank_literals {
            blank(out, ch);
        } else {
            out.push(ch);
        }
    };

    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            if ch == '\n' {
                in_line_comment = false;
                out.push('\n');
            } else {
                blank(&mut out, ch);
            }
            continue;
        }
        if in_block_comment {
            if ch == '*' && matches!(chars.peek(), Some('/')) {
                chars.next();
                in_block_comment = false;
                out.push_str("  ");
                continue;
            }
            blank(&mut out, ch);
            continue;
        }
        if in_single {
            if ch == '\'' {
                if matches!(chars.peek(), Some('\'')) {
                    chars.next();
                    literal(&mut out, ch);
                    literal(&mut out, ch);
                    continue;
                }
                in_single = false;
            }
            literal(&mut out, ch);
            continue;
        }
        if in_double {
            if ch == '"' {
                in_double = false;
            }
            literal(&mut out, ch);
            continue;
        }

        match ch {
            '-' if matches!(chars.peek(), Some('-')) => {
                chars.next();
                in_line_comment = true;
                out.push_str("  ");
            }
            '/' if matches!(chars.peek(), Some('*')) => {
                chars.next();
                in_block_comment = true;
                out.push_str("  ");
            }
            '\'' => {
                in_single = true;
                literal(&mut out, ch);
            }
            '"' => {
                in_double = true;
                literal(&mut out, ch);
            }
            _ => out.push(ch),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> PatternShape {
        PatternShape::new()
    }

    #[test]
    fn test_sanitize_preserves_byte_offsets() {
        let sql = "SELECT 'héllo; DROP' FROM t -- ünïcode\nLIMIT 5";
        let sanitized = sanitize_sql(sql);
        assert_eq!(sanitized.len(), sql.len());
        assert!(!sanitized.contains("DROP"));
        assert!(sanitized.contains("LIMIT 5"));
    }

    #[test]
    fn test_destructive_keyword_is_word_bounded() {
        let s = shape();
        assert_eq!(s.destructive_keyword("drop table x").as_deref(), Some("DROP"));
        assert_eq!(
            s.destructive_keyword("SELECT id FROM t; Truncate t").as_deref(),
            Some("TRUNCATE")
        );
        assert!(s.destructive_keyword("SELECT dropped_at FROM t").is_none());
        assert!(s.destructive_keyword("SELECT alterego FROM t").is_none());
    }

    #[test]
    fn test_tautology_detection() {
        let s = shape();
        assert!(s.has_tautology("SELECT a FROM t WHERE 1=1 OR 1=1"));
        assert!(s.has_tautology("select a from t where x = 2 or  1 = 1"));
        assert!(s.has_tautology("SELECT a FROM t WHERE name = 'x' OR 'a'='a'"));
        assert!(s.has_tautology("SELECT a FROM t WHERE id = 3 OR TRUE"));
        assert!(s.has_tautology("SELECT a FROM t WHERE id = 3 OR (2=2)"));
        assert!(!s.has_tautology("SELECT a FROM t WHERE city = 'x' OR city = 'y'"));
        assert!(!s.has_tautology("SELECT a FROM t WHERE id = 1 OR id = 2"));
    }

    #[test]
    fn test_tautology_without_whitespace_after_or() {
        let s = shape();
        assert!(s.has_tautology("SELECT a FROM t WHERE id = 3 OR(1=1)"));
        assert!(s.has_tautology("SELECT a FROM t WHERE id = 3 OR/**/1=1"));
        assert!(s.has_tautology("SELECT a FROM t WHERE id = 3 OR--x\n1=1"));
        assert!(s.has_tautology("SELECT a FROM t WHERE id = 3 or'a'='a'"));
        assert!(!s.has_tautology("SELECT a FROM t WHERE name = 'x' -- or 1=1"));
        assert!(!s.has_tautology("SELECT a FROM t WHERE vendor = 1"));
    }

    #[test]
    fn test_blank_comments_keeps_literals() {
        let sql = "SELECT 'a -- b' FROM t /* c */ WHERE x = 'it''s'";
        let out = blank_comments(sql);
        assert_eq!(out.len(), sql.len());
        assert!(out.contains("'a -- b'"));
        assert!(out.contains("'it''s'"));
        assert!(!out.contains("/*"));
    }

    #[test]
    fn test_normalize() {
        let s = shape();
        assert_eq!(s.normalize("  SELECT 1 FROM t;  ").unwrap(), "SELECT 1 FROM t");
        assert_eq!(
            s.normalize("SELECT ';' FROM t").unwrap(),
            "SELECT ';' FROM t"
        );
        assert!(s.normalize("   ").is_err());
        assert!(s.normalize(";").is_err());
        assert!(s.normalize("SELECT 1 FROM t; DELETE FROM t").is_err());
        assert!(s.normalize("SELECT 1 FROM t;;").is_err());
    }

    #[test]
    fn test_classify() {
        let s = shape();
        assert_eq!(s.classify("select * from t").unwrap(), Operation::Read);
        assert_eq!(s.classify("INSERT INTO t VALUES (1)").unwrap(), Operation::Write);
        assert_eq!(s.classify("update t set a = 1").unwrap(), Operation::Write);
        assert_eq!(s.classify("DELETE FROM t").unwrap(), Operation::Write);
        let err = s.classify("PRAGMA table_info(t)").unwrap_err();
        assert_eq!(err.message(), "unsupported operation: PRAGMA");
    }

    #[test]
    fn test_parse_select_variants() {
        let s = shape();
        let parsed = s
            .parse_select("SELECT Id, Full_Name FROM Candidates WHERE city = 'Pune' ORDER BY id LIMIT 10")
            .unwrap();
        assert_eq!(parsed.table, "candidates");
        assert_eq!(
            parsed.columns,
            Some(vec!["id".to_string(), "full_name".to_string()])
        );
        assert_eq!(parsed.limit, Some(10));
        assert!(!parsed.aggregate);

        let star = s.parse_select("select * from candidates").unwrap();
        assert_eq!(star.columns, None);
        assert_eq!(star.limit, None);

        let agg = s.parse_select("SELECT COUNT(*) FROM candidates").unwrap();
        assert!(agg.aggregate);

        let huge = s
            .parse_select("SELECT * FROM t LIMIT 99999999999999999999999")
            .unwrap();
        assert_eq!(huge.limit, Some(u64::MAX));
    }

    #[test]
    fn test_parse_select_limit_inside_literal_is_ignored() {
        let parsed = shape()
            .parse_select("SELECT id FROM t WHERE note = 'limit 5'")
            .unwrap();
        assert_eq!(parsed.limit, None);
    }

    #[test]
    fn test_parse_select_only_accepts_trailing_plain_limit() {
        let s = shape();
        for sql in [
            "SELECT id FROM t WHERE id > 0 LIMIT 0, 15",
            "SELECT id FROM t ORDER BY id LIMIT 0,15",
            "SELECT id FROM t LIMIT 0, 15",
            "SELECT id FROM t WHERE id > 0 LIMIT 15 OFFSET 5",
            "SELECT id FROM t ORDER BY id LIMIT 5 OFFSET 0",
            "SELECT id FROM t WHERE id > 0 LIMIT 5 + 100",
            "SELECT id FROM t WHERE id > 0 LIMIT (500)",
            "SELECT id FROM t WHERE id > 0 LIMIT 5 LIMIT 9",
        ] {
            let err = s.parse_select(sql).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation, "sql: {}", sql);
        }

        let ok = s
            .parse_select("SELECT id FROM t WHERE id > 0 ORDER BY id LIMIT 15 -- trailing")
            .unwrap();
        assert_eq!(ok.limit, Some(15));
        let ok = s.parse_select("SELECT id FROM t WHERE note = 'limit 1, 2'").unwrap();
        assert_eq!(ok.limit, None);
    }

    #[test]
    fn test_parse_select_rejects_complex_shapes() {
        let s = shape();
        assert!(s
            .parse_select("SELECT a.id FROM a JOIN b ON a.id = b.id")
            .is_err());
        assert!(s
            .parse_select("SELECT id FROM a UNION SELECT id FROM b")
            .is_err());
        assert!(s
            .parse_select("SELECT id FROM a WHERE id IN (SELECT id FROM b)")
            .is_err());
        assert!(s
            .parse_select("SELECT COUNT(*), (SELECT secret FROM b) FROM a")
            .is_err());
        assert!(s.parse_select("SELECT id FROM a, b").is_err());
        assert!(s.parse_select("SELECT id FROM a LIMIT 5 OFFSET 2").is_err());
    }

    #[test]
    fn test_parse_write_targets() {
        let s = shape();
        let update = s.parse_write("UPDATE Candidates SET city = 'X' WHERE id = 1").unwrap();
        assert_eq!(update.verb, WriteVerb::Update);
        assert_eq!(update.table, "candidates");
        assert!(update.has_where);

        let insert = s
            .parse_write("insert into candidates (full_name, email) values ('a', 'b')")
            .unwrap();
        assert_eq!(insert.verb, WriteVerb::Insert);
        assert_eq!(insert.table, "candidates");

        let delete = s.parse_write("DELETE FROM candidates").unwrap();
        assert_eq!(delete.table, "candidates");
        assert!(!delete.has_where);

        // WHERE inside a literal does not count.
        let sneaky = s
            .parse_write("UPDATE candidates SET city = 'where'")
            .unwrap();
        assert!(!sneaky.has_where);

        assert!(s
            .parse_write("INSERT INTO candidates SELECT * FROM secrets")
            .is_err());
        assert!(s.parse_write("UPDATE \"quoted\" SET a = 1 WHERE b = 2").is_err());
    }

    #[test]
    fn test_rewrite_projection() {
        let s = shape();
        let cols = vec!["id".to_string(), "full_name".to_string()];
        assert_eq!(
            s.rewrite_projection("SELECT * FROM candidates WHERE city = 'Pune'", &cols),
            "SELECT id, full_name FROM candidates WHERE city = 'Pune'"
        );
        assert_eq!(
            s.rewrite_projection("select\n  id , email\nfrom candidates", &cols),
            "SELECT id, full_name FROM candidates"
        );
        assert_eq!(s.rewrite_projection("SELECT * FROM t", &[]), "SELECT * FROM t");
    }

    #[test]
    fn test_enforce_limit() {
        let s = shape();
        assert_eq!(s.enforce_limit("SELECT * FROM t", 200), "SELECT * FROM t LIMIT 200");
        assert_eq!(
            s.enforce_limit("SELECT * FROM t LIMIT 1000", 200),
            "SELECT * FROM t LIMIT 200"
        );
        assert_eq!(
            s.enforce_limit("SELECT * FROM t WHERE a = 'limit 9' limit 5", 5),
            "SELECT * FROM t WHERE a = 'limit 9' limit 5"
        );
        assert_eq!(
            s.enforce_limit("SELECT * FROM t WHERE a = 'limit 9'", 7),
            "SELECT * FROM t WHERE a = 'limit 9' LIMIT 7"
        );
    }
}
