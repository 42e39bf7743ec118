//! Shared, read-only state of one migration run.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::MigrationConfig;
use crate::source::PgSourcePool;
use crate::target::OraclePool;

/// Everything a copy task needs. Built once per run and shared through
/// `Arc`; the row counter is the only thing that changes.
pub struct MigrationContext {
    pub run_id: String,
    pub source: Arc<PgSourcePool>,
    pub target: OraclePool,
    pub source_schema: String,
    pub dest_schema: String,
    pub settings: MigrationConfig,
    /// Sum of per-table row counts taken before copying. `None` when
    /// counting failed.
    pub estimated_total: Option<i64>,
    rows_processed: Arc<AtomicI64>,
}

impl MigrationContext {
    pub fn new(
        run_id: String,
        source: Arc<PgSourcePool>,
        target: OraclePool,
        source_schema: String,
        settings: MigrationConfig,
        estimated_total: Option<i64>,
    ) -> Self {
        let dest_schema = target.schema().to_string();
        Self {
            run_id,
            source,
            target,
            source_schema,
            dest_schema,
            settings,
            estimated_total,
            rows_processed: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Counter of committed rows, shared with the progress monitor.
    pub fn rows_counter(&self) -> Arc<AtomicI64> {
        self.rows_processed.clone()
    }

    pub fn rows_processed(&self) -> i64 {
        self.rows_processed.load(Ordering::Relaxed)
    }

    pub fn record_rows(&self, rows: i64) {
        self.rows_processed.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.query_timeout_secs)
    }
}
