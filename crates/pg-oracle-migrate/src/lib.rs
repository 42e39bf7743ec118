//! # pg-oracle-migrate
//!
//! PostgreSQL to Oracle schema translation and bulk data migration.
//!
//! Two operations:
//!
//! - **Script generation** reads a PostgreSQL schema and renders Oracle DDL
//!   (sequences, tables, indexes, foreign keys) and DCL (roles, grants).
//! - **Migration** copies every table of a schema into an existing Oracle
//!   schema with bounded parallelism, batched commits, foreign keys disabled
//!   during the copy and sequences resynchronized afterwards.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_oracle_migrate::{Config, MigrationOutcome, MigrationService};
//!
//! #[tokio::main]
//! async fn main() -> pg_oracle_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let service = MigrationService::new(config.migration.clone());
//!     let handle = service.start(config.source.clone(), config.require_target()?.clone());
//!     if let MigrationOutcome::Completed(report) = handle.wait().await? {
//!         println!("Migrated {} rows", report.rows_transferred);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod script;
pub mod source;
pub mod target;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, MigrationConfig, ScriptConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    MigrationHandle, MigrationOutcome, MigrationPhase, MigrationReport, MigrationService,
    TableMapping,
};
pub use outcome::{Outcome, OutcomeCounts, OutcomeStatus};
pub use script::{generate_scripts, ScriptGenerationResult, ScriptRequest};
pub use source::{Column, ForeignKey, Index, PgSourcePool, Table};
pub use target::OraclePool;
pub use transfer::TableResult;
