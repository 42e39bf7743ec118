//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of parallel table copy workers.
pub const DEFAULT_WORKERS: usize = 10;

/// Default rows per insert batch (also the source fetch size).
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default per-query timeout for source selects, in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 600;

/// Default interval between progress log lines, in seconds.
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 30;

/// Advisory lock key shared by every migration process.
pub const DEFAULT_LOCK_KEY: i64 = 0x5047_4f52_4d49_4752;

/// Connections used while generating scripts.
pub const SCRIPT_POOL_SIZE: usize = 4;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database (PostgreSQL).
    pub source: ConnectionConfig,

    /// Destination database (Oracle). Only needed for `migrate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ConnectionConfig>,

    /// Data copy behaviour.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// DDL/DCL script generation options.
    #[serde(default)]
    pub scripts: ScriptConfig,
}

/// Connection settings for one database, supplied per call and never persisted.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Connection URI. PostgreSQL URL or key/value string for the source,
    /// Easy Connect string or TNS alias for Oracle. JDBC forms are accepted.
    pub uri: String,

    /// Username.
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema to read from (source) or write into (destination).
    pub schema: String,

    /// Optional driver identifier ("postgres", "oracle").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    /// TLS mode for PostgreSQL connections (default: "disable").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"***")
            .field("schema", &self.schema)
            .field("driver", &self.driver)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Number of tables copied concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Rows per insert batch and per source fetch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout applied to each source select, in seconds.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Seconds between progress log lines.
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,

    /// Advisory lock key used for cross-process mutual exclusion.
    #[serde(default = "default_lock_key")]
    pub lock_key: i64,

    /// Source tables to leave out of the copy.
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Custom select statements keyed by source table name.
    #[serde(default)]
    pub custom_selects: BTreeMap<String, String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            progress_interval_secs: DEFAULT_PROGRESS_INTERVAL_SECS,
            lock_key: DEFAULT_LOCK_KEY,
            exclude_tables: Vec::new(),
            custom_selects: BTreeMap::new(),
        }
    }
}

impl MigrationConfig {
    /// Source pool size for the copy phase: one connection per worker plus
    /// headroom for discovery and row counts.
    pub fn source_pool_size(&self) -> usize {
        self.workers + 2
    }

    /// Oracle session pool size for the copy phase.
    pub fn target_pool_size(&self) -> usize {
        self.workers + 2
    }
}

/// Options for DDL/DCL script generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Oracle schema the generated objects belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_schema: Option<String>,

    /// Explicit edit role name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_role: Option<String>,

    /// Explicit view role name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_role: Option<String>,

    /// Users granted the edit role.
    #[serde(default)]
    pub edit_role_users: Vec<String>,

    /// Users granted the view role.
    #[serde(default)]
    pub view_role_users: Vec<String>,
}

// Default value functions for serde
fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

fn default_progress_interval_secs() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_SECS
}

fn default_lock_key() -> i64 {
    DEFAULT_LOCK_KEY
}
