//! Schema and metadata types.

use serde::{Deserialize, Serialize};

/// Prefix of conventional destination sequence names.
pub const SEQUENCE_PREFIX: &str = "SEQ_";

/// Oracle identifier length limit (pre-12.2 compatible).
pub const MAX_IDENTIFIER_LENGTH: usize = 30;

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Primary key column names in key order.
    pub primary_key: Vec<String>,

    /// Non-primary key indexes.
    pub indexes: Vec<Index>,

    /// Foreign key constraints, one per constraint name.
    pub foreign_keys: Vec<ForeignKey>,

    /// Destination sequence name when a column draws from a sequence.
    pub sequence: Option<String>,
}

impl Table {
    /// Create an empty descriptor.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            sequence: None,
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Set `sequence` when any column is auto-incrementing.
    pub fn detect_sequence(&mut self) {
        self.sequence = self
            .columns
            .iter()
            .any(|c| c.is_auto_increment)
            .then(|| sequence_name(&self.name));
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// `information_schema` data type (e.g. "character varying", "ARRAY").
    pub data_type: String,

    /// Underlying type name (e.g. "varchar", "_int4", enum names).
    pub udt_name: String,

    /// Character (or bit) length.
    pub char_length: Option<i32>,

    /// Numeric precision.
    pub numeric_precision: Option<i32>,

    /// Numeric scale.
    pub numeric_scale: Option<i32>,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Default expression text as stored in the catalog.
    pub default_expr: Option<String>,

    /// Whether values come from a sequence (serial default or identity).
    pub is_auto_increment: bool,
}

impl Column {
    /// Type name used for mapping.
    ///
    /// `data_type` unless it is empty or `USER-DEFINED`, in which case the
    /// udt name is more specific. `ARRAY` is kept so arrays map as arrays.
    pub fn type_name(&self) -> &str {
        let dt = self.data_type.trim();
        if dt.is_empty() || dt.eq_ignore_ascii_case("USER-DEFINED") {
            if self.udt_name.trim().is_empty() {
                return dt;
            }
            return self.udt_name.trim();
        }
        dt
    }

    /// Whether the default draws from a sequence.
    pub fn has_nextval_default(&self) -> bool {
        self.default_expr
            .as_deref()
            .is_some_and(is_nextval_expression)
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Whether the index is unique.
    pub is_unique: bool,

    /// Indexed column names in index order.
    pub columns: Vec<String>,
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Local column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,

    /// ON DELETE action ("NO_ACTION", "RESTRICT", "CASCADE", "SET_NULL", "SET_DEFAULT").
    pub on_delete: String,
}

/// Conventional destination sequence name for a table.
pub fn sequence_name(table: &str) -> String {
    let name = format!("{}{}", SEQUENCE_PREFIX, table.to_uppercase());
    name.chars().take(MAX_IDENTIFIER_LENGTH).collect()
}

/// Whether a default expression is a `nextval(...)` call.
pub fn is_nextval_expression(expr: &str) -> bool {
    expr.trim_start().to_lowercase().starts_with("nextval(")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, default_expr: Option<&str>) -> Column {
        Column {
            name: name.to_string(),
            data_type: "integer".to_string(),
            udt_name: "int4".to_string(),
            char_length: None,
            numeric_precision: Some(32),
            numeric_scale: Some(0),
            is_nullable: false,
            default_expr: default_expr.map(str::to_string),
            is_auto_increment: false,
        }
    }

    #[test]
    fn test_sequence_name() {
        assert_eq!(sequence_name("users"), "SEQ_USERS");
        let long = sequence_name("a_really_long_table_name_for_orders");
        assert_eq!(long.len(), MAX_IDENTIFIER_LENGTH);
        assert!(long.starts_with("SEQ_A_REALLY"));
    }

    #[test]
    fn test_nextval_detection() {
        let col = column("id", Some("nextval('users_id_seq'::regclass)"));
        assert!(col.has_nextval_default());
        assert!(!column("id", Some("0")).has_nextval_default());
        assert!(!column("id", None).has_nextval_default());
    }

    #[test]
    fn test_detect_sequence() {
        let mut table = Table::new("public", "users");
        table.columns.push(column("name", None));
        table.detect_sequence();
        assert!(table.sequence.is_none());

        let mut id = column("id", Some("nextval('users_id_seq'::regclass)"));
        id.is_auto_increment = true;
        table.columns.push(id);
        table.detect_sequence();
        assert_eq!(table.sequence.as_deref(), Some("SEQ_USERS"));
    }

    #[test]
    fn test_type_name_fallback() {
        let mut col = column("status", None);
        col.data_type = "USER-DEFINED".to_string();
        col.udt_name = "mood".to_string();
        assert_eq!(col.type_name(), "mood");

        col.data_type = "ARRAY".to_string();
        col.udt_name = "_int4".to_string();
        assert_eq!(col.type_name(), "ARRAY");

        col.data_type = String::new();
        col.udt_name = "circle".to_string();
        assert_eq!(col.type_name(), "circle");
    }
}
