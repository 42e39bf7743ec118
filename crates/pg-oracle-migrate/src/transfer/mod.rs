//! Per-table copy from PostgreSQL to Oracle.
//!
//! Each table is read through a server-side portal inside a read-only
//! transaction and written in committed batches of `batch_size` rows. A
//! failing batch is rolled back and fails the table; batches committed
//! before it stay in place.

mod binding;

pub use binding::{read_row, BindKind, BoundColumn};

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use oracle::Connection;
use serde::Serialize;
use tokio_postgres::{Portal, Transaction};
use tracing::{debug, error, info, warn};

use crate::error::{MigrateError, Result};
use crate::orchestrator::{MigrationContext, TableMapping};
use crate::outcome::Outcome;
use crate::script::identifiers::{oracle_ident, qualify};
use crate::source::quote_ident;
use crate::target::{write_batch, OracleValue};

/// Statistics from one table copy.
#[derive(Debug, Clone, Default)]
pub struct CopyStats {
    pub rows: i64,
    pub batches: usize,
    pub read_secs: f64,
    pub write_secs: f64,
}

/// Report line for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableResult {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub dest: String,
    /// Committed rows, including those of a table that later failed.
    pub rows: i64,
    pub batches: usize,
    pub duration_secs: f64,
}

impl TableResult {
    pub fn copied(source: String, dest: String, rows: i64, batches: usize, secs: f64) -> Self {
        Self {
            outcome: Outcome::success(source),
            dest,
            rows,
            batches,
            duration_secs: secs,
        }
    }

    pub fn failed(source: String, dest: String, reason: impl ToString) -> Self {
        Self {
            outcome: Outcome::failed(source, reason),
            dest,
            rows: 0,
            batches: 0,
            duration_secs: 0.0,
        }
    }
}

/// Query the copy reads from before projection.
pub fn base_query(schema: &str, mapping: &TableMapping) -> String {
    match &mapping.custom_select {
        Some(sql) => sql.clone(),
        None => format!(
            "SELECT * FROM {}.{}",
            quote_ident(schema),
            quote_ident(&mapping.source)
        ),
    }
}

/// Wrap `base` so every column arrives in the wire type of its bind kind.
pub fn projection_query(base: &str, columns: &[BoundColumn]) -> String {
    let select_list: Vec<String> = columns.iter().map(BoundColumn::select_expr).collect();
    format!("SELECT {} FROM ({}) AS src", select_list.join(", "), base)
}

/// `INSERT INTO SCHEMA.TABLE (COLS) VALUES (:1, ...)`.
pub fn insert_sql(dest_schema: &str, dest_table: &str, columns: &[BoundColumn]) -> String {
    let names: Vec<String> = columns.iter().map(|c| oracle_ident(&c.name)).collect();
    let placeholders: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| c.kind.placeholder(i + 1))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualify(dest_schema, dest_table),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Source of row batches for one table.
#[async_trait]
pub trait RowSource: Send {
    /// Up to `max` rows; fewer (or none) once the source is exhausted.
    async fn fetch(&mut self, max: usize) -> Result<Vec<Vec<OracleValue>>>;
}

/// Destination for row batches. Each call commits or rolls back as a whole.
#[async_trait]
pub trait BatchSink: Send {
    /// Write and commit `rows`, returning how many were written.
    async fn write(&mut self, rows: Vec<Vec<OracleValue>>) -> Result<usize>;
}

/// Rows read from a bound portal inside the copy transaction.
struct PortalSource<'t, 'c> {
    tx: &'t Transaction<'c>,
    portal: Portal,
    columns: &'t [BoundColumn],
}

#[async_trait]
impl RowSource for PortalSource<'_, '_> {
    async fn fetch(&mut self, max: usize) -> Result<Vec<Vec<OracleValue>>> {
        let max_rows = i32::try_from(max).unwrap_or(i32::MAX);
        let rows = self.tx.query_portal(&self.portal, max_rows).await?;
        rows.iter().map(|row| read_row(self.columns, row)).collect()
    }
}

/// Array-bound inserts on one Oracle session.
///
/// The blocking client runs on the blocking pool, so the session is moved
/// out for each batch and put back when it returns.
struct OracleSink {
    conn: Option<Connection>,
    sql: Arc<str>,
}

#[async_trait]
impl BatchSink for OracleSink {
    async fn write(&mut self, rows: Vec<Vec<OracleValue>>) -> Result<usize> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| MigrateError::Task("Oracle session lost by an earlier batch".into()))?;
        let sql = self.sql.clone();
        let (conn, written) = tokio::task::spawn_blocking(move || {
            let written = write_batch(&conn, &sql, &rows);
            (conn, written)
        })
        .await?;
        self.conn = Some(conn);
        written
    }
}

/// Move rows from `source` to `sink` in batches of `batch_size`.
///
/// `on_commit` sees the row count of every committed batch. The loop ends
/// on an empty or short fetch; a failing batch stops it with the stats of
/// the batches committed so far left in `stats`.
pub async fn pump_batches<S, K, F>(
    table: &str,
    source: &mut S,
    sink: &mut K,
    batch_size: usize,
    stats: &mut CopyStats,
    mut on_commit: F,
) -> Result<()>
where
    S: RowSource + ?Sized,
    K: BatchSink + ?Sized,
    F: FnMut(i64),
{
    let fetch_size = batch_size.max(1);

    loop {
        let read_start = Instant::now();
        let batch = source.fetch(fetch_size).await?;
        stats.read_secs += read_start.elapsed().as_secs_f64();
        if batch.is_empty() {
            break;
        }
        let fetched = batch.len();

        let write_start = Instant::now();
        let batch_no = stats.batches + 1;
        let written = sink.write(batch).await.map_err(|e| {
            MigrateError::transfer(table, format!("batch {} failed: {}", batch_no, e))
        })?;
        stats.write_secs += write_start.elapsed().as_secs_f64();

        let written = written as i64;
        stats.rows += written;
        stats.batches += 1;
        on_commit(written);

        if fetched < fetch_size {
            break;
        }
    }

    Ok(())
}

/// Copy one table and report how it went. Failures are logged and
/// captured in the result; rows committed before a failure are counted.
pub async fn copy_table(ctx: &MigrationContext, mapping: &TableMapping) -> TableResult {
    let started = Instant::now();
    let mut stats = CopyStats::default();
    let result = copy_rows(ctx, mapping, &mut stats).await;
    table_result(mapping, result, &stats, started.elapsed().as_secs_f64())
}

/// Report line for a finished copy.
fn table_result(
    mapping: &TableMapping,
    result: Result<()>,
    stats: &CopyStats,
    elapsed: f64,
) -> TableResult {
    match result {
        Ok(()) => {
            info!(
                "{}: copied {} rows in {} batches ({:.1}s, read {:.1}s, write {:.1}s)",
                mapping.source,
                stats.rows,
                stats.batches,
                elapsed,
                stats.read_secs,
                stats.write_secs
            );
            TableResult::copied(
                mapping.source.clone(),
                mapping.dest.clone(),
                stats.rows,
                stats.batches,
                elapsed,
            )
        }
        Err(e) => {
            error!(
                "{}: failed after {} committed rows - {}",
                mapping.source, stats.rows, e
            );
            TableResult {
                rows: stats.rows,
                batches: stats.batches,
                duration_secs: elapsed,
                ..TableResult::failed(mapping.source.clone(), mapping.dest.clone(), e)
            }
        }
    }
}

async fn copy_rows(
    ctx: &MigrationContext,
    mapping: &TableMapping,
    stats: &mut CopyStats,
) -> Result<()> {
    let table = mapping.source.as_str();

    let mut client = ctx
        .source
        .get_client(&format!("copying {}", table))
        .await?;
    let tx = client.build_transaction().read_only(true).start().await?;
    tx.batch_execute(&format!(
        "SET LOCAL statement_timeout = {}",
        ctx.query_timeout().as_millis()
    ))
    .await?;

    let base = base_query(&ctx.source_schema, mapping);
    let described = tx.prepare(&base).await?;
    let columns: Vec<BoundColumn> = described
        .columns()
        .iter()
        .map(|c| BoundColumn::new(c.name(), c.type_().clone()))
        .collect();
    if columns.is_empty() {
        return Err(MigrateError::transfer(table, "query returns no columns"));
    }
    for col in columns.iter().filter(|c| c.kind == BindKind::Unhandled) {
        warn!(
            "Table {}, column {}: no binding for type {}, copying as text",
            table,
            col.name,
            col.pg_type.name()
        );
    }

    let insert: Arc<str> = insert_sql(&ctx.dest_schema, &mapping.dest, &columns).into();
    debug!("{}: {}", table, insert);

    let stmt = tx.prepare(&projection_query(&base, &columns)).await?;
    let portal = tx.bind(&stmt, &[]).await?;

    let mut source = PortalSource {
        tx: &tx,
        portal,
        columns: &columns,
    };
    let mut sink = OracleSink {
        conn: Some(ctx.target.get_connection().await?),
        sql: insert,
    };
    pump_batches(
        table,
        &mut source,
        &mut sink,
        ctx.settings.batch_size,
        stats,
        |rows| ctx.record_rows(rows),
    )
    .await?;

    tx.commit().await?;
    Ok(())
}
