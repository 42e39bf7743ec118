//! PostgreSQL source: catalog introspection and pooled connections.

mod postgres;
pub mod tls;
mod types;

pub use postgres::{build_pg_pool, quote_ident, PgSourcePool};
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// Catalog introspection used by script generation and table discovery.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Base table names in a schema, alphabetical.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Columns, primary key, indexes, foreign keys and sequence of a table.
    async fn describe_table(&self, schema: &str, table: &str) -> Result<Table>;

    /// Exact row count of a table.
    async fn row_count(&self, schema: &str, table: &str) -> Result<i64>;
}
