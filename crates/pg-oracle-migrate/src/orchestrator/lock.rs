//! Cross-process mutual exclusion through a PostgreSQL advisory lock.
//!
//! Advisory locks are held by a session, so the lock keeps its own
//! connection checked out until it is released.

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::{MigrateError, Result};
use crate::source::build_pg_pool;

const TRY_LOCK_SQL: &str = "SELECT pg_try_advisory_lock($1)";
const UNLOCK_SQL: &str = "SELECT pg_advisory_unlock($1)";

/// A lock that is given back once the guarded work is done.
#[async_trait]
pub trait HeldLock: Send {
    async fn release(self) -> Result<()>;
}

/// A held advisory lock.
pub struct MigrationLock {
    client: Object,
    key: i64,
    _pool: Pool,
}

impl MigrationLock {
    /// Try to take the lock without waiting. `None` means another session
    /// holds it.
    pub async fn try_acquire(config: &ConnectionConfig, key: i64) -> Result<Option<Self>> {
        let pool = build_pg_pool(config, 1, "migration lock")?;
        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting connection for migration lock"))?;

        let row = client.query_one(TRY_LOCK_SQL, &[&key]).await?;
        let acquired: bool = row.try_get(0)?;
        if !acquired {
            warn!("Advisory lock {} is held by another session", key);
            return Ok(None);
        }

        debug!("Acquired advisory lock {}", key);
        Ok(Some(Self {
            client,
            key,
            _pool: pool,
        }))
    }

}

#[async_trait]
impl HeldLock for MigrationLock {
    /// Release the lock and return its connection.
    async fn release(self) -> Result<()> {
        let row = self.client.query_one(UNLOCK_SQL, &[&self.key]).await?;
        let released: bool = row.try_get(0)?;
        if released {
            debug!("Released advisory lock {}", self.key);
        } else {
            warn!("Advisory lock {} was not held at release", self.key);
        }
        Ok(())
    }
}
