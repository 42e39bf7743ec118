//! PostgreSQL result columns to Oracle bind values.

use tokio_postgres::types::{Kind, Type};
use tokio_postgres::Row;

use crate::error::Result;
use crate::source::quote_ident;
use crate::target::OracleValue;

/// How a source column is read and bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindKind {
    /// int2/int4/int8/oid, widened to `int8` in the projection.
    Integer,
    /// float4/float8, widened to `float8`.
    Float,
    /// Bound as 1/0.
    Boolean,
    /// Native text types.
    Text,
    Uuid,
    Json,
    Bytes,
    Date,
    Timestamp,
    TimestampTz,
    /// Epoch seconds, rebuilt with `NUMTODSINTERVAL` on insert.
    Interval,
    /// Cast to text in the projection. Covers numeric, time, bit strings,
    /// network and full-text types, and arrays.
    Cast,
    /// No dedicated handling; cast to text and bound as a string.
    Unhandled,
}

impl BindKind {
    pub fn for_type(ty: &Type) -> Self {
        if matches!(ty.kind(), Kind::Array(_)) {
            return BindKind::Cast;
        }

        match *ty {
            Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => BindKind::Integer,
            Type::FLOAT4 | Type::FLOAT8 => BindKind::Float,
            Type::BOOL => BindKind::Boolean,
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => BindKind::Text,
            Type::UUID => BindKind::Uuid,
            Type::JSON | Type::JSONB => BindKind::Json,
            Type::BYTEA => BindKind::Bytes,
            Type::DATE => BindKind::Date,
            Type::TIMESTAMP => BindKind::Timestamp,
            Type::TIMESTAMPTZ => BindKind::TimestampTz,
            Type::INTERVAL => BindKind::Interval,
            Type::NUMERIC
            | Type::MONEY
            | Type::TIME
            | Type::TIMETZ
            | Type::BIT
            | Type::VARBIT
            | Type::CHAR
            | Type::XML
            | Type::INET
            | Type::CIDR
            | Type::MACADDR
            | Type::MACADDR8
            | Type::TS_VECTOR
            | Type::TSQUERY
            | Type::POINT
            | Type::LINE
            | Type::LSEG
            | Type::BOX
            | Type::PATH
            | Type::POLYGON
            | Type::CIRCLE => BindKind::Cast,
            _ => match ty.kind() {
                Kind::Enum(_) => BindKind::Cast,
                _ => BindKind::Unhandled,
            },
        }
    }

    /// Select-list expression reading `column` in this kind's wire type.
    pub fn select_expr(self, ty: &Type, column: &str) -> String {
        let col = format!("src.{}", quote_ident(column));
        match self {
            BindKind::Integer if *ty != Type::INT8 => format!("{}::int8", col),
            BindKind::Float if *ty != Type::FLOAT8 => format!("{}::float8", col),
            BindKind::Interval => format!("EXTRACT(EPOCH FROM {})::float8", col),
            BindKind::Cast | BindKind::Unhandled if *ty == Type::MONEY => {
                format!("{}::numeric::text", col)
            }
            BindKind::Cast | BindKind::Unhandled => format!("{}::text", col),
            _ => col,
        }
    }

    /// Insert placeholder for bind position `position` (1-based).
    pub fn placeholder(self, position: usize) -> String {
        match self {
            BindKind::Interval => format!("NUMTODSINTERVAL(:{}, 'SECOND')", position),
            _ => format!(":{}", position),
        }
    }

    /// Read column `idx` of a projected row.
    pub fn read(self, row: &Row, idx: usize) -> Result<OracleValue> {
        let value = match self {
            BindKind::Integer => OracleValue::Integer(row.try_get(idx)?),
            BindKind::Float | BindKind::Interval => OracleValue::Float(row.try_get(idx)?),
            BindKind::Boolean => {
                let v: Option<bool> = row.try_get(idx)?;
                OracleValue::Integer(v.map(i64::from))
            }
            BindKind::Text | BindKind::Cast | BindKind::Unhandled => {
                OracleValue::Text(row.try_get(idx)?)
            }
            BindKind::Uuid => {
                let v: Option<uuid::Uuid> = row.try_get(idx)?;
                OracleValue::Text(v.map(|u| u.to_string()))
            }
            BindKind::Json => {
                let v: Option<serde_json::Value> = row.try_get(idx)?;
                OracleValue::Text(v.map(|j| j.to_string()))
            }
            BindKind::Bytes => OracleValue::Bytes(row.try_get(idx)?),
            BindKind::Date => OracleValue::Date(row.try_get(idx)?),
            BindKind::Timestamp => OracleValue::Timestamp(row.try_get(idx)?),
            BindKind::TimestampTz => OracleValue::TimestampTz(row.try_get(idx)?),
        };
        Ok(value)
    }
}

/// A column of the copy query with its resolved bind kind.
#[derive(Debug, Clone)]
pub struct BoundColumn {
    pub name: String,
    pub pg_type: Type,
    pub kind: BindKind,
}

impl BoundColumn {
    pub fn new(name: impl Into<String>, pg_type: Type) -> Self {
        let kind = BindKind::for_type(&pg_type);
        Self {
            name: name.into(),
            pg_type,
            kind,
        }
    }

    pub fn select_expr(&self) -> String {
        format!(
            "{} AS {}",
            self.kind.select_expr(&self.pg_type, &self.name),
            quote_ident(&self.name)
        )
    }
}

/// Convert one projected row.
pub fn read_row(columns: &[BoundColumn], row: &Row) -> Result<Vec<OracleValue>> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| col.kind.read(row, idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_per_type() {
        assert_eq!(BindKind::for_type(&Type::INT4), BindKind::Integer);
        assert_eq!(BindKind::for_type(&Type::OID), BindKind::Integer);
        assert_eq!(BindKind::for_type(&Type::FLOAT4), BindKind::Float);
        assert_eq!(BindKind::for_type(&Type::BOOL), BindKind::Boolean);
        assert_eq!(BindKind::for_type(&Type::VARCHAR), BindKind::Text);
        assert_eq!(BindKind::for_type(&Type::UUID), BindKind::Uuid);
        assert_eq!(BindKind::for_type(&Type::JSONB), BindKind::Json);
        assert_eq!(BindKind::for_type(&Type::BYTEA), BindKind::Bytes);
        assert_eq!(BindKind::for_type(&Type::TIMESTAMPTZ), BindKind::TimestampTz);
        assert_eq!(BindKind::for_type(&Type::INTERVAL), BindKind::Interval);
        assert_eq!(BindKind::for_type(&Type::NUMERIC), BindKind::Cast);
        assert_eq!(BindKind::for_type(&Type::TIME), BindKind::Cast);
        assert_eq!(BindKind::for_type(&Type::INT4_ARRAY), BindKind::Cast);
        assert_eq!(BindKind::for_type(&Type::JSONB_ARRAY), BindKind::Cast);
        assert_eq!(BindKind::for_type(&Type::TID), BindKind::Unhandled);
    }

    #[test]
    fn test_select_expressions() {
        assert_eq!(
            BindKind::Integer.select_expr(&Type::INT4, "id"),
            "src.\"id\"::int8"
        );
        assert_eq!(BindKind::Integer.select_expr(&Type::INT8, "id"), "src.\"id\"");
        assert_eq!(
            BindKind::Interval.select_expr(&Type::INTERVAL, "ttl"),
            "EXTRACT(EPOCH FROM src.\"ttl\")::float8"
        );
        assert_eq!(
            BindKind::Cast.select_expr(&Type::MONEY, "price"),
            "src.\"price\"::numeric::text"
        );
        assert_eq!(
            BindKind::Cast.select_expr(&Type::NUMERIC, "amount"),
            "src.\"amount\"::text"
        );
        assert_eq!(
            BindKind::Timestamp.select_expr(&Type::TIMESTAMP, "created_at"),
            "src.\"created_at\""
        );
    }

    #[test]
    fn test_bound_column_aliases_original_name() {
        let col = BoundColumn::new("Total", Type::FLOAT4);
        assert_eq!(col.select_expr(), "src.\"Total\"::float8 AS \"Total\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(BindKind::Text.placeholder(3), ":3");
        assert_eq!(
            BindKind::Interval.placeholder(2),
            "NUMTODSINTERVAL(:2, 'SECOND')"
        );
    }
}
