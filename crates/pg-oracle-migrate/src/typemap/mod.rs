//! Type mapping between PostgreSQL and Oracle.
//!
//! [`map_type`] is a pure lookup; [`map_column`] wraps it and records a
//! warning for every approximate mapping. Neither ever fails: anything the
//! table does not know becomes a `VARCHAR2(1000)`.

use crate::source::Column;

/// Longest VARCHAR2 in a default (non-extended) Oracle configuration.
pub const MAX_VARCHAR2_LENGTH: i32 = 4000;

/// Longest fixed CHAR.
pub const MAX_CHAR_LENGTH: i32 = 2000;

/// NUMBER precision limit.
pub const MAX_NUMBER_PRECISION: i32 = 38;

/// NUMBER scale range.
pub const MIN_NUMBER_SCALE: i32 = -84;
pub const MAX_NUMBER_SCALE: i32 = 127;

/// Destination type for anything unmapped.
pub const FALLBACK_TYPE: &str = "VARCHAR2(1000)";

/// Why a mapping is approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    Network,
    Geometric,
    FullText,
    Array,
    Unknown,
}

impl LossKind {
    fn describe(self) -> &'static str {
        match self {
            LossKind::Network => "network address",
            LossKind::Geometric => "geometric",
            LossKind::FullText => "full-text search",
            LossKind::Array => "array",
            LossKind::Unknown => "unsupported",
        }
    }
}

/// Result of mapping one source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    /// Oracle column type, e.g. `VARCHAR2(50)`.
    pub oracle_type: String,
    /// Set when the mapping loses information.
    pub loss: Option<LossKind>,
}

impl TypeMapping {
    fn exact(oracle_type: impl Into<String>) -> Self {
        Self {
            oracle_type: oracle_type.into(),
            loss: None,
        }
    }

    fn lossy(oracle_type: impl Into<String>, loss: LossKind) -> Self {
        Self {
            oracle_type: oracle_type.into(),
            loss: Some(loss),
        }
    }
}

/// Map a PostgreSQL type name (plus optional length/precision/scale) to Oracle.
pub fn map_type(
    type_name: &str,
    length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> TypeMapping {
    let name = type_name.trim().to_lowercase();

    if is_array_type(&name) {
        return TypeMapping::lossy("CLOB", LossKind::Array);
    }

    match name.as_str() {
        // Character types
        "character varying" | "varchar" => {
            TypeMapping::exact(sized("VARCHAR2", length, MAX_VARCHAR2_LENGTH, MAX_VARCHAR2_LENGTH))
        }
        "character" | "char" | "bpchar" => {
            TypeMapping::exact(sized("CHAR", length, 1, MAX_CHAR_LENGTH))
        }
        "text" | "json" | "jsonb" | "citext" => TypeMapping::exact("CLOB"),

        // Integer types, including serial pseudo-types
        "smallint" | "int2" | "smallserial" | "serial2" => TypeMapping::exact("NUMBER(5)"),
        "integer" | "int" | "int4" | "serial" | "serial4" => TypeMapping::exact("NUMBER(10)"),
        "bigint" | "int8" | "bigserial" | "serial8" => TypeMapping::exact("NUMBER(19)"),
        "oid" => TypeMapping::exact("NUMBER(10)"),

        // Fixed point
        "numeric" | "decimal" => TypeMapping::exact(number_type(precision, scale)),
        "money" => TypeMapping::exact("NUMBER(19,2)"),

        // Floating point
        "real" | "float4" => TypeMapping::exact("BINARY_FLOAT"),
        "double precision" | "float8" | "float" => TypeMapping::exact("BINARY_DOUBLE"),

        "boolean" | "bool" => TypeMapping::exact("NUMBER(1)"),

        // Date/time
        "date" => TypeMapping::exact("DATE"),
        "timestamp" | "timestamp without time zone" => TypeMapping::exact("TIMESTAMP(6)"),
        "timestamptz" | "timestamp with time zone" => {
            TypeMapping::exact("TIMESTAMP(6) WITH TIME ZONE")
        }
        "time" | "time without time zone" | "timetz" | "time with time zone" => {
            TypeMapping::exact("VARCHAR2(32)")
        }
        "interval" => TypeMapping::exact("INTERVAL DAY(9) TO SECOND(6)"),

        // Binary / identifiers / documents
        "bytea" => TypeMapping::exact("BLOB"),
        "uuid" => TypeMapping::exact("VARCHAR2(36)"),
        "xml" => TypeMapping::exact("XMLTYPE"),

        // Bit strings are kept as '0'/'1' text
        "bit" | "bit varying" | "varbit" => {
            TypeMapping::exact(sized("VARCHAR2", length, 1, MAX_VARCHAR2_LENGTH))
        }

        // Approximate mappings
        "inet" | "cidr" | "macaddr" | "macaddr8" => {
            TypeMapping::lossy("VARCHAR2(50)", LossKind::Network)
        }
        "point" | "line" | "lseg" | "box" | "path" | "polygon" | "circle" => {
            TypeMapping::lossy(FALLBACK_TYPE, LossKind::Geometric)
        }
        "tsvector" | "tsquery" => TypeMapping::lossy("CLOB", LossKind::FullText),

        _ => TypeMapping::lossy(FALLBACK_TYPE, LossKind::Unknown),
    }
}

/// Map a column and append a warning to `warnings` when the mapping is lossy.
pub fn map_column(table: &str, column: &Column, warnings: &mut Vec<String>) -> String {
    let type_name = column.type_name();
    let mapping = map_type(
        type_name,
        column.char_length,
        column.numeric_precision,
        column.numeric_scale,
    );

    if let Some(loss) = mapping.loss {
        warnings.push(format!(
            "Table {}, column {}: {} type '{}' mapped to {}",
            table,
            column.name,
            loss.describe(),
            type_name,
            mapping.oracle_type
        ));
    }

    mapping.oracle_type
}

fn is_array_type(name: &str) -> bool {
    name == "array" || name.starts_with('_') || name.ends_with("[]")
}

fn sized(base: &str, length: Option<i32>, default: i32, max: i32) -> String {
    let len = match length {
        Some(n) if n > 0 => n.min(max),
        _ => default,
    };
    format!("{}({})", base, len)
}

fn number_type(precision: Option<i32>, scale: Option<i32>) -> String {
    match (precision, scale) {
        (Some(p), Some(s)) if p > 0 && s != 0 => format!(
            "NUMBER({},{})",
            p.min(MAX_NUMBER_PRECISION),
            s.clamp(MIN_NUMBER_SCALE, MAX_NUMBER_SCALE)
        ),
        (Some(p), _) if p > 0 => format!("NUMBER({})", p.min(MAX_NUMBER_PRECISION)),
        _ => "NUMBER".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, udt: &str) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            udt_name: udt.to_string(),
            char_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_nullable: true,
            default_expr: None,
            is_auto_increment: false,
        }
    }

    #[test]
    fn test_character_types() {
        assert_eq!(map_type("character varying", Some(50), None, None).oracle_type, "VARCHAR2(50)");
        assert_eq!(map_type("VARCHAR", Some(9000), None, None).oracle_type, "VARCHAR2(4000)");
        assert_eq!(map_type("varchar", None, None, None).oracle_type, "VARCHAR2(4000)");
        assert_eq!(map_type("character", Some(3), None, None).oracle_type, "CHAR(3)");
        assert_eq!(map_type("bpchar", None, None, None).oracle_type, "CHAR(1)");
        assert_eq!(map_type("char", Some(5000), None, None).oracle_type, "CHAR(2000)");
        assert_eq!(map_type("text", None, None, None).oracle_type, "CLOB");
        assert_eq!(map_type("jsonb", None, None, None).oracle_type, "CLOB");
    }

    #[test]
    fn test_integer_types() {
        assert_eq!(map_type("smallint", None, Some(16), Some(0)).oracle_type, "NUMBER(5)");
        assert_eq!(map_type("integer", None, Some(32), Some(0)).oracle_type, "NUMBER(10)");
        assert_eq!(map_type("serial", None, None, None).oracle_type, "NUMBER(10)");
        assert_eq!(map_type("bigint", None, Some(64), Some(0)).oracle_type, "NUMBER(19)");
        assert_eq!(map_type("BIGSERIAL", None, None, None).oracle_type, "NUMBER(19)");
    }

    #[test]
    fn test_numeric_types() {
        assert_eq!(map_type("numeric", None, Some(12), Some(2)).oracle_type, "NUMBER(12,2)");
        assert_eq!(map_type("numeric", None, Some(10), None).oracle_type, "NUMBER(10)");
        assert_eq!(map_type("numeric", None, Some(10), Some(0)).oracle_type, "NUMBER(10)");
        assert_eq!(map_type("numeric", None, Some(60), Some(200)).oracle_type, "NUMBER(38,127)");
        assert_eq!(map_type("decimal", None, None, None).oracle_type, "NUMBER");
        assert_eq!(map_type("money", None, None, None).oracle_type, "NUMBER(19,2)");
        assert_eq!(map_type("real", None, None, None).oracle_type, "BINARY_FLOAT");
        assert_eq!(map_type("double precision", None, None, None).oracle_type, "BINARY_DOUBLE");
    }

    #[test]
    fn test_datetime_types() {
        assert_eq!(map_type("date", None, None, None).oracle_type, "DATE");
        assert_eq!(
            map_type("timestamp without time zone", None, None, None).oracle_type,
            "TIMESTAMP(6)"
        );
        assert_eq!(
            map_type("timestamp with time zone", None, None, None).oracle_type,
            "TIMESTAMP(6) WITH TIME ZONE"
        );
        assert_eq!(
            map_type("interval", None, None, None).oracle_type,
            "INTERVAL DAY(9) TO SECOND(6)"
        );
        assert_eq!(map_type("time without time zone", None, None, None).oracle_type, "VARCHAR2(32)");
    }

    #[test]
    fn test_special_types() {
        assert_eq!(map_type("boolean", None, None, None).oracle_type, "NUMBER(1)");
        assert_eq!(map_type("bytea", None, None, None).oracle_type, "BLOB");
        assert_eq!(map_type("uuid", None, None, None).oracle_type, "VARCHAR2(36)");
        assert_eq!(map_type("xml", None, None, None).oracle_type, "XMLTYPE");
        assert_eq!(map_type("bit", Some(8), None, None).oracle_type, "VARCHAR2(8)");
        assert_eq!(map_type("oid", None, None, None).oracle_type, "NUMBER(10)");
        assert!(map_type("uuid", None, None, None).loss.is_none());
    }

    #[test]
    fn test_lossy_types() {
        assert_eq!(map_type("inet", None, None, None).loss, Some(LossKind::Network));
        assert_eq!(map_type("tsvector", None, None, None).loss, Some(LossKind::FullText));
        assert_eq!(map_type("ARRAY", None, None, None).loss, Some(LossKind::Array));
        assert_eq!(map_type("_int4", None, None, None).oracle_type, "CLOB");
        assert_eq!(map_type("hstore", None, None, None).oracle_type, FALLBACK_TYPE);
        assert_eq!(map_type("hstore", None, None, None).loss, Some(LossKind::Unknown));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let a = map_type("numeric", Some(0), Some(18), Some(4));
        let b = map_type("numeric", Some(0), Some(18), Some(4));
        assert_eq!(a, b);
        let c = map_type("circle", None, None, None);
        let d = map_type("circle", None, None, None);
        assert_eq!(c, d);
    }

    #[test]
    fn test_map_column_warns_for_circle() {
        let mut warnings = Vec::new();
        let col = column("shape", "circle", "circle");
        let oracle = map_column("drawings", &col, &mut warnings);
        assert_eq!(oracle, "VARCHAR2(1000)");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("drawings"));
        assert!(warnings[0].contains("shape"));
        assert!(warnings[0].contains("circle"));
    }

    #[test]
    fn test_map_column_no_warning_for_exact() {
        let mut warnings = Vec::new();
        let mut col = column("name", "character varying", "varchar");
        col.char_length = Some(50);
        assert_eq!(map_column("users", &col, &mut warnings), "VARCHAR2(50)");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_map_column_uses_udt_for_user_defined() {
        let mut warnings = Vec::new();
        let col = column("status", "USER-DEFINED", "order_status");
        assert_eq!(map_column("orders", &col, &mut warnings), FALLBACK_TYPE);
        assert!(warnings[0].contains("order_status"));
    }
}
