//! Lexical extraction of table names from SQL text.
//!
//! A deliberately approximate scanner, not a SQL parser: it recognizes
//! `FROM <table>`, `UPDATE <table>`, `INSERT INTO <table>`, and
//! `DELETE FROM <table>`, case-insensitive, with optional back-quoted
//! identifiers. Joins contribute a table only when it follows one of the
//! recognized keywords; subqueries, CTEs, and aliases get no special
//! handling. False positives and false negatives are both acceptable
//! for best-effort invalidation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFROM\s+`?(\w+)`?").expect("invalid FROM regex"));
static UPDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bUPDATE\s+`?(\w+)`?").expect("invalid UPDATE regex"));
static INSERT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bINSERT\s+INTO\s+`?(\w+)`?").expect("invalid INSERT regex"));
static DELETE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDELETE\s+FROM\s+`?(\w+)`?").expect("invalid DELETE regex"));

/// Distinct table names referenced by `sql`, per the four recognized
/// clause shapes.
pub fn extract_tables(sql: &str) -> BTreeSet<String> {
    let mut tables = BTreeSet::new();
    for re in [&*FROM_RE, &*UPDATE_RE, &*INSERT_RE, &*DELETE_RE] {
        for caps in re.captures_iter(sql) {
            if let Some(name) = caps.get(1) {
                tables.insert(name.as_str().to_string());
            }
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sql: &str) -> Vec<String> {
        extract_tables(sql).into_iter().collect()
    }

    #[test]
    fn test_select_from() {
        assert_eq!(names("SELECT * FROM users WHERE id = ?"), vec!["users"]);
    }

    #[test]
    fn test_update() {
        assert_eq!(names("UPDATE users SET name = ? WHERE id = ?"), vec!["users"]);
    }

    #[test]
    fn test_insert_into() {
        assert_eq!(names("INSERT INTO calls (unit, at) VALUES (?, ?)"), vec!["calls"]);
    }

    #[test]
    fn test_delete_from_yields_single_name() {
        // DELETE FROM matches both the DELETE and the FROM patterns; the
        // set collapses them.
        assert_eq!(names("DELETE FROM calls WHERE id = ?"), vec!["calls"]);
    }

    #[test]
    fn test_case_insensitive_and_backquoted() {
        assert_eq!(names("select * from `Units`"), vec!["Units"]);
        assert_eq!(names("UPDATE `users` SET active = 0"), vec!["users"]);
    }

    #[test]
    fn test_multiple_statements_accumulate() {
        let sql = "INSERT INTO audit_log SELECT * FROM users";
        assert_eq!(names(sql), vec!["audit_log", "users"]);
    }

    #[test]
    fn test_join_table_is_not_captured() {
        // Only the keyword-adjacent name is seen; the joined table is a
        // known false negative of the lexical scan.
        assert_eq!(
            names("SELECT * FROM calls JOIN units ON calls.unit_id = units.id"),
            vec!["calls"]
        );
    }

    #[test]
    fn test_no_tables() {
        assert!(names("SELECT VERSION()").is_empty());
    }
}
