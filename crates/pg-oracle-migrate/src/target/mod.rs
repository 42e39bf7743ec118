//! Oracle destination: session pool, batch writes, constraint and sequence
//! maintenance.
//!
//! The Oracle client is blocking, so every call runs on tokio's blocking
//! thread pool.

pub mod constraints;
pub mod sequences;
mod writer;

pub use writer::{write_batch, OracleValue};

use crate::config::ConnectionConfig;
use crate::error::{MigrateError, Result};
use crate::script::identifiers::normalize_ident;
use oracle::pool::{Pool, PoolBuilder};
use oracle::Connection;
use tracing::info;

/// Numeric strings are bound with `.` as the decimal separator.
const SESSION_SETUP_SQL: &str = "ALTER SESSION SET NLS_NUMERIC_CHARACTERS = '.,'";

/// Oracle session pool bound to one destination schema.
#[derive(Clone)]
pub struct OraclePool {
    pool: Pool,
    schema: String,
}

impl OraclePool {
    /// Create the pool and verify one session.
    pub async fn new(config: &ConnectionConfig, max_conns: usize) -> Result<Self> {
        let username = config.username.clone();
        let password = config.password.clone();
        let connect_string = config.oracle_connect_string();
        let max = u32::try_from(max_conns).unwrap_or(u32::MAX);

        let pool = tokio::task::spawn_blocking(move || -> Result<Pool> {
            let pool = PoolBuilder::new(username, password, connect_string)
                .min_connections(1)
                .max_connections(max)
                .build()
                .map_err(|e| MigrateError::pool(e, "creating Oracle session pool"))?;
            let conn = pool
                .get()
                .map_err(|e| MigrateError::pool(e, "testing Oracle connection"))?;
            conn.ping()?;
            Ok(pool)
        })
        .await??;

        let schema = normalize_ident(&config.schema);
        info!(
            "Connected to Oracle destination (schema '{}', pool size {})",
            schema, max_conns
        );

        Ok(Self { pool, schema })
    }

    /// Destination schema, upper-cased as Oracle stores it.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Check out a session prepared for bulk inserts. Autocommit is off.
    pub async fn get_connection(&self) -> Result<Connection> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = pool
                .get()
                .map_err(|e| MigrateError::pool(e, "getting Oracle connection"))?;
            conn.execute(SESSION_SETUP_SQL, &[])?;
            Ok(conn)
        })
        .await?
    }

    /// Run blocking work against a pooled session.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection, &str) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.get_connection().await?;
        let schema = self.schema.clone();
        tokio::task::spawn_blocking(move || f(&conn, &schema)).await?
    }
}
