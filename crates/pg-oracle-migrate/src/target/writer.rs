//! Batched inserts into Oracle.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use oracle::sql_type::ToSql;
use oracle::Connection;
use tracing::debug;

use crate::error::Result;

/// A bind value. Nulls keep their type so every row of a batch binds the
/// same Oracle types.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleValue {
    Integer(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Bytes(Option<Vec<u8>>),
    Date(Option<NaiveDate>),
    Timestamp(Option<NaiveDateTime>),
    TimestampTz(Option<DateTime<FixedOffset>>),
}

impl OracleValue {
    pub fn is_null(&self) -> bool {
        match self {
            OracleValue::Integer(v) => v.is_none(),
            OracleValue::Float(v) => v.is_none(),
            OracleValue::Text(v) => v.is_none(),
            OracleValue::Bytes(v) => v.is_none(),
            OracleValue::Date(v) => v.is_none(),
            OracleValue::Timestamp(v) => v.is_none(),
            OracleValue::TimestampTz(v) => v.is_none(),
        }
    }

    fn as_sql(&self) -> &dyn ToSql {
        match self {
            OracleValue::Integer(v) => v,
            OracleValue::Float(v) => v,
            OracleValue::Text(v) => v,
            OracleValue::Bytes(v) => v,
            OracleValue::Date(v) => v,
            OracleValue::Timestamp(v) => v,
            OracleValue::TimestampTz(v) => v,
        }
    }
}

/// Insert `rows` with one array-bound execution and commit.
///
/// On any failure the transaction is rolled back before the error is
/// returned, so a batch is either fully committed or not at all.
pub fn write_batch(conn: &Connection, sql: &str, rows: &[Vec<OracleValue>]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    match execute_batch(conn, sql, rows) {
        Ok(()) => {
            conn.commit()?;
            debug!("Committed batch of {} rows", rows.len());
            Ok(rows.len())
        }
        Err(e) => {
            // The original error is more useful than a rollback failure.
            let _ = conn.rollback();
            Err(e)
        }
    }
}

fn execute_batch(conn: &Connection, sql: &str, rows: &[Vec<OracleValue>]) -> Result<()> {
    let mut batch = conn.batch(sql, rows.len()).build()?;
    for row in rows {
        let params: Vec<&dyn ToSql> = row.iter().map(OracleValue::as_sql).collect();
        batch.append_row(&params)?;
    }
    batch.execute()?;
    Ok(())
}
