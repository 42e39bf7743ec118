//! Migration orchestrator: lock, discover, copy in parallel, then fix up
//! constraints and sequences.

mod context;
mod discovery;
pub mod lock;
pub mod progress;

pub use context::MigrationContext;
pub use discovery::{build_mappings, discover_tables, TableMapping};

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConnectionConfig, MigrationConfig};
use crate::error::{MigrateError, Result};
use crate::outcome::{Outcome, OutcomeCounts};
use crate::source::{PgSourcePool, SchemaSource};
use crate::target::constraints::{disable_foreign_keys, enable_foreign_keys};
use crate::target::sequences::sync_sequences;
use crate::target::OraclePool;
use crate::transfer::{copy_table, TableResult};
use lock::{HeldLock, MigrationLock};
use progress::spawn_progress_monitor;

/// Where the service is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Idle,
    LockPending,
    Running,
    Finalizing,
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub source_schema: String,
    pub dest_schema: String,
    /// Row count taken before copying.
    pub estimated_rows: Option<i64>,
    pub rows_transferred: i64,
    pub rows_per_second: i64,
    pub tables: Vec<TableResult>,
    pub table_counts: OutcomeCounts,
    pub foreign_keys_disabled: Vec<Outcome>,
    pub sequences: Vec<Outcome>,
    pub foreign_keys_enabled: Vec<Outcome>,
}

impl MigrationReport {
    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.outcome.is_failure())
            .map(|t| t.outcome.item.as_str())
            .collect()
    }

    /// No table, constraint or sequence failed.
    pub fn is_clean(&self) -> bool {
        self.table_counts.failed == 0
            && self
                .foreign_keys_disabled
                .iter()
                .chain(&self.sequences)
                .chain(&self.foreign_keys_enabled)
                .all(|o| !o.is_failure())
    }
}

/// How a started migration ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Another migration held the in-process guard or the advisory lock.
    Skipped { reason: String },
    Completed(MigrationReport),
}

/// A started migration.
pub struct MigrationHandle {
    run_id: String,
    handle: JoinHandle<Result<MigrationOutcome>>,
}

impl MigrationHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<MigrationOutcome> {
        self.handle.await?
    }
}

/// Starts migrations, at most one at a time per process and per source
/// database.
pub struct MigrationService {
    settings: MigrationConfig,
    running: Arc<Mutex<()>>,
    phase: Arc<watch::Sender<MigrationPhase>>,
}

impl MigrationService {
    pub fn new(settings: MigrationConfig) -> Self {
        let (phase, _) = watch::channel(MigrationPhase::Idle);
        Self {
            settings,
            running: Arc::new(Mutex::new(())),
            phase: Arc::new(phase),
        }
    }

    pub fn phase(&self) -> MigrationPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<MigrationPhase> {
        self.phase.subscribe()
    }

    /// Start a migration in the background and return at once.
    pub fn start(&self, source: ConnectionConfig, destination: ConnectionConfig) -> MigrationHandle {
        let run_id = uuid::Uuid::new_v4().to_string();
        let settings = self.settings.clone();
        let running = self.running.clone();
        let phase = self.phase.clone();
        let id = run_id.clone();

        let handle = tokio::spawn(async move {
            let Ok(_guard) = running.try_lock_owned() else {
                warn!("Migration {} skipped: another migration is running", id);
                return Ok(MigrationOutcome::Skipped {
                    reason: "a migration is already running in this process".to_string(),
                });
            };

            let result = run_migration(&id, &source, &destination, &settings, &phase).await;
            phase.send_replace(MigrationPhase::Idle);
            if let Err(e) = &result {
                error!("Migration {} failed: {}", id, e);
            }
            result
        });

        MigrationHandle { run_id, handle }
    }
}

async fn run_migration(
    run_id: &str,
    source: &ConnectionConfig,
    destination: &ConnectionConfig,
    settings: &MigrationConfig,
    phase: &watch::Sender<MigrationPhase>,
) -> Result<MigrationOutcome> {
    phase.send_replace(MigrationPhase::LockPending);
    let lock = MigrationLock::try_acquire(source, settings.lock_key).await?;
    run_exclusive(run_id, lock, phase, || {
        run_locked(run_id, source, destination, settings, phase)
    })
    .await
}

/// Run `work` if the lock was acquired and release it afterwards, whether
/// or not the work succeeded.
async fn run_exclusive<L, F, Fut>(
    run_id: &str,
    lock: Option<L>,
    phase: &watch::Sender<MigrationPhase>,
    work: F,
) -> Result<MigrationOutcome>
where
    L: HeldLock,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<MigrationReport>>,
{
    let Some(lock) = lock else {
        warn!("Migration {} skipped: advisory lock is held elsewhere", run_id);
        return Ok(MigrationOutcome::Skipped {
            reason: "another process holds the migration lock".to_string(),
        });
    };

    phase.send_replace(MigrationPhase::Running);
    info!("Starting migration run: {}", run_id);
    let result = work().await;

    if let Err(e) = lock.release().await {
        warn!("Failed to release migration lock: {}", e);
    }
    result.map(MigrationOutcome::Completed)
}

async fn run_locked(
    run_id: &str,
    source_config: &ConnectionConfig,
    destination: &ConnectionConfig,
    settings: &MigrationConfig,
    phase: &watch::Sender<MigrationPhase>,
) -> Result<MigrationReport> {
    let started_at = Utc::now();
    let started = Instant::now();

    let source = Arc::new(PgSourcePool::new(source_config, settings.source_pool_size()).await?);
    let target = OraclePool::new(destination, settings.target_pool_size()).await?;

    let mappings = discover_tables(source.as_ref(), &source_config.schema, settings).await?;
    let estimated_total = estimate_rows(source.as_ref(), &source_config.schema, &mappings).await;

    let ctx = Arc::new(MigrationContext::new(
        run_id.to_string(),
        source,
        target,
        source_config.schema.clone(),
        settings.clone(),
        estimated_total,
    ));

    let foreign_keys_disabled = disable_foreign_keys(&ctx.target)
        .await
        .unwrap_or_else(|e| step_failed("disable foreign keys", e));

    let cancel = CancellationToken::new();
    let monitor = spawn_progress_monitor(
        ctx.rows_counter(),
        ctx.estimated_total,
        Duration::from_secs(settings.progress_interval_secs.max(1)),
        cancel.clone(),
    );

    let tables = copy_tables(ctx.clone(), mappings).await;

    cancel.cancel();
    if let Err(e) = monitor.await {
        warn!("Progress monitor ended abnormally: {}", e);
    }

    phase.send_replace(MigrationPhase::Finalizing);
    let tables = tables?;

    let sequences = sync_sequences(&ctx.target)
        .await
        .unwrap_or_else(|e| step_failed("synchronize sequences", e));
    let foreign_keys_enabled = enable_foreign_keys(&ctx.target)
        .await
        .unwrap_or_else(|e| step_failed("enable foreign keys", e));

    let duration = started.elapsed().as_secs_f64();
    let rows_transferred = ctx.rows_processed();
    let report = MigrationReport {
        run_id: run_id.to_string(),
        started_at,
        completed_at: Utc::now(),
        duration_seconds: duration,
        source_schema: ctx.source_schema.clone(),
        dest_schema: ctx.dest_schema.clone(),
        estimated_rows: ctx.estimated_total,
        rows_transferred,
        rows_per_second: if duration > 0.0 {
            (rows_transferred as f64 / duration) as i64
        } else {
            0
        },
        table_counts: OutcomeCounts::from_outcomes(
            &tables.iter().map(|t| t.outcome.clone()).collect::<Vec<_>>(),
        ),
        tables,
        foreign_keys_disabled,
        sequences,
        foreign_keys_enabled,
    };

    info!(
        "Migration {} finished: {} rows in {:.1}s, {} of {} tables failed",
        run_id,
        report.rows_transferred,
        report.duration_seconds,
        report.table_counts.failed,
        report.tables.len()
    );
    Ok(report)
}

/// A best-effort step that failed as a whole.
fn step_failed(step: &str, e: MigrateError) -> Vec<Outcome> {
    warn!("Failed to {}: {}", step, e);
    vec![Outcome::failed(step, e)]
}

/// Sum of source row counts, `None` if any count fails.
async fn estimate_rows<S: SchemaSource + ?Sized>(
    source: &S,
    schema: &str,
    mappings: &[TableMapping],
) -> Option<i64> {
    let mut total = 0i64;
    for mapping in mappings {
        match source.row_count(schema, &mapping.source).await {
            Ok(count) => total += count,
            Err(e) => {
                warn!("Could not count rows of {}: {}", mapping.source, e);
                return None;
            }
        }
    }
    info!("Estimated {} rows across {} tables", total, mappings.len());
    Some(total)
}

async fn copy_tables(
    ctx: Arc<MigrationContext>,
    mappings: Vec<TableMapping>,
) -> Result<Vec<TableResult>> {
    let workers = ctx.settings.workers;
    info!("Copying {} tables with {} workers", mappings.len(), workers);

    let labels: Vec<(String, String)> = mappings
        .iter()
        .map(|m| (m.source.clone(), m.dest.clone()))
        .collect();
    let results = run_bounded(mappings, workers, move |mapping: TableMapping| {
        let ctx = ctx.clone();
        async move { Ok(copy_table(&ctx, &mapping).await) }
    })
    .await?;

    Ok(labels
        .into_iter()
        .zip(results)
        .map(|((source, dest), result)| {
            result.unwrap_or_else(|e| {
                error!("{}: task failed - {}", source, e);
                TableResult::failed(source, dest, e)
            })
        })
        .collect())
}

/// Run `work` over `items` with at most `limit` tasks in flight. Results
/// come back in input order; a panicking task yields `Err`.
pub async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    work: F,
) -> Result<Vec<Result<R>>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let work = Arc::new(work);
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| MigrateError::Task(e.to_string()))?;
        let work = work.clone();
        handles.push(tokio::spawn(async move {
            let result = work(item).await;
            drop(permit);
            result
        }));
    }

    Ok(join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap_or_else(|e| Err(e.into())))
        .collect())
}
