//! Oracle identifier normalization and quoting.
//!
//! Source names are upper-cased (Oracle folds unquoted names to upper case),
//! cut to the 30 character limit, and double-quoted only when they would
//! not parse as a plain identifier.

use crate::source::MAX_IDENTIFIER_LENGTH;

/// Words Oracle refuses as unquoted identifiers.
const RESERVED_WORDS: &[&str] = &[
    "ACCESS", "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUDIT", "BETWEEN", "BY", "CHAR",
    "CHECK", "CLUSTER", "COLUMN", "COMMENT", "COMPRESS", "CONNECT", "CREATE", "CURRENT", "DATE",
    "DECIMAL", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "EXCLUSIVE", "EXISTS",
    "FILE", "FLOAT", "FOR", "FROM", "GRANT", "GROUP", "HAVING", "IDENTIFIED", "IMMEDIATE", "IN",
    "INCREMENT", "INDEX", "INITIAL", "INSERT", "INTEGER", "INTERSECT", "INTO", "IS", "LEVEL",
    "LIKE", "LOCK", "LONG", "MAXEXTENTS", "MINUS", "MLSLABEL", "MODE", "MODIFY", "NOAUDIT",
    "NOCOMPRESS", "NOT", "NOWAIT", "NULL", "NUMBER", "OF", "OFFLINE", "ON", "ONLINE", "OPTION",
    "OR", "ORDER", "PCTFREE", "PRIOR", "PUBLIC", "RAW", "RENAME", "RESOURCE", "REVOKE", "ROW",
    "ROWID", "ROWNUM", "ROWS", "SELECT", "SESSION", "SET", "SHARE", "SIZE", "SMALLINT", "START",
    "SUCCESSFUL", "SYNONYM", "SYSDATE", "TABLE", "THEN", "TO", "TRIGGER", "UID", "UNION",
    "UNIQUE", "UPDATE", "USER", "VALIDATE", "VALUES", "VARCHAR", "VARCHAR2", "VIEW", "WHENEVER",
    "WHERE", "WITH",
];

/// Truncate to at most `max` characters.
pub fn truncate_ident(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

/// Upper-case and truncate a source name, without quoting.
pub fn normalize_ident(name: &str) -> String {
    truncate_ident(&name.trim().to_uppercase(), MAX_IDENTIFIER_LENGTH)
}

/// Whether a normalized name can be written without quotes.
pub fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_uppercase());
    starts_with_letter
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '_' | '$' | '#'))
        && !RESERVED_WORDS.contains(&name)
}

/// Normalize and, when needed, quote a source name for Oracle.
pub fn oracle_ident(name: &str) -> String {
    let normalized = normalize_ident(name);
    if is_plain_ident(&normalized) {
        normalized
    } else {
        format!("\"{}\"", normalized.replace('"', "\"\""))
    }
}

/// `SCHEMA.NAME`, each part rendered with [`oracle_ident`].
pub fn qualify(schema: &str, name: &str) -> String {
    format!("{}.{}", oracle_ident(schema), oracle_ident(name))
}
