//! PostgreSQL source database operations.

use crate::config::ConnectionConfig;
use crate::error::{MigrateError, Result};
use crate::source::tls::TlsBuilder;
use crate::source::{Column, ForeignKey, Index, SchemaSource, Table};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tracing::{debug, info, warn};

/// Build a deadpool-postgres pool for a connection config, honouring its
/// `ssl_mode`.
pub fn build_pg_pool(config: &ConnectionConfig, max_size: usize, purpose: &str) -> Result<Pool> {
    let pg_config = config.pg_config()?;
    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let pool = match TlsBuilder::parse(&config.ssl_mode)?.build()? {
        None => {
            debug!("PostgreSQL TLS is disabled for {}", purpose);
            let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
            Pool::builder(mgr)
                .max_size(max_size)
                .build()
                .map_err(|e| MigrateError::pool(e, format!("creating {} pool", purpose)))?
        }
        Some(tls) => {
            let mgr = Manager::from_config(pg_config, tls, mgr_config);
            Pool::builder(mgr)
                .max_size(max_size)
                .build()
                .map_err(|e| MigrateError::pool(e, format!("creating {} pool", purpose)))?
        }
    };

    Ok(pool)
}

/// PostgreSQL source pool.
pub struct PgSourcePool {
    pool: Pool,
}

impl PgSourcePool {
    /// Connect to the source and verify the connection.
    pub async fn new(config: &ConnectionConfig, max_conns: usize) -> Result<Self> {
        let pool = build_pg_pool(config, max_conns, "PostgreSQL source")?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL source connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL source (schema '{}', pool size {})",
            config.schema, max_conns
        );

        Ok(Self { pool })
    }

    /// Check out a pooled connection.
    pub async fn get_client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("getting connection for {}", context)))
    }

    async fn load_columns(&self, table: &mut Table) -> Result<()> {
        let client = self.get_client("load_columns").await?;

        let query = r#"
            SELECT
                column_name::text,
                data_type::text,
                udt_name::text,
                character_maximum_length::int4,
                numeric_precision::int4,
                numeric_scale::int4,
                is_nullable = 'YES',
                column_default::text,
                COALESCE(is_identity = 'YES', false)
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client.query(query, &[&table.schema, &table.name]).await?;

        for row in rows {
            let mut col = Column {
                name: row.get(0),
                data_type: row.get(1),
                udt_name: row.get(2),
                char_length: row.get(3),
                numeric_precision: row.get(4),
                numeric_scale: row.get(5),
                is_nullable: row.get(6),
                default_expr: row.get(7),
                is_auto_increment: row.get(8),
            };
            col.is_auto_increment = col.is_auto_increment || col.has_nextval_default();
            table.columns.push(col);
        }

        debug!(
            "Loaded {} columns for {}",
            table.columns.len(),
            table.full_name()
        );
        Ok(())
    }

    async fn load_primary_key(&self, table: &mut Table) -> Result<()> {
        let client = self.get_client("load_primary_key").await?;

        let query = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;

        let rows = client.query(query, &[&table.schema, &table.name]).await?;
        table.primary_key = rows.iter().map(|row| row.get(0)).collect();

        debug!(
            "Primary key for {}: {:?}",
            table.full_name(),
            table.primary_key
        );
        Ok(())
    }

    async fn load_indexes(&self, table: &mut Table) -> Result<()> {
        let client = self.get_client("load_indexes").await?;

        // Expression indexes carry a zero in indkey and are left out.
        let query = r#"
            SELECT
                i.relname::text AS index_name,
                ix.indisunique,
                array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum)) AS columns
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND NOT ix.indisprimary
              AND NOT (0 = ANY(ix.indkey::int2[]))
            GROUP BY i.relname, ix.indisunique
            ORDER BY i.relname
        "#;

        let rows = client.query(query, &[&table.schema, &table.name]).await?;

        for row in rows {
            table.indexes.push(Index {
                name: row.get(0),
                is_unique: row.get(1),
                columns: row.get(2),
            });
        }

        debug!(
            "Loaded {} indexes for {}",
            table.indexes.len(),
            table.full_name()
        );
        Ok(())
    }

    async fn load_foreign_keys(&self, table: &mut Table) -> Result<()> {
        let client = self.get_client("load_foreign_keys").await?;

        let query = r#"
            SELECT
                c.conname::text AS fk_name,
                array_agg(a.attname::text ORDER BY k.ord) AS columns,
                rt.relname::text AS ref_table,
                array_agg(ra.attname::text ORDER BY k.ord) AS ref_columns,
                CASE c.confdeltype
                    WHEN 'r' THEN 'RESTRICT'
                    WHEN 'c' THEN 'CASCADE'
                    WHEN 'n' THEN 'SET_NULL'
                    WHEN 'd' THEN 'SET_DEFAULT'
                    ELSE 'NO_ACTION'
                END AS on_delete
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            CROSS JOIN LATERAL unnest(c.conkey, c.confkey) WITH ORDINALITY AS k(attnum, ref_attnum, ord)
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = k.ref_attnum
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
            GROUP BY c.conname, rt.relname, c.confdeltype
            ORDER BY c.conname
        "#;

        let rows = client.query(query, &[&table.schema, &table.name]).await?;

        for row in rows {
            table.foreign_keys.push(ForeignKey {
                name: row.get(0),
                columns: row.get(1),
                ref_table: row.get(2),
                ref_columns: row.get(3),
                on_delete: row.get(4),
            });
        }

        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys.len(),
            table.full_name()
        );
        Ok(())
    }
}

#[async_trait]
impl SchemaSource for PgSourcePool {
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let client = self.get_client("list_tables").await?;

        let query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = $1
            ORDER BY table_name
        "#;

        let rows = client.query(query, &[&schema]).await?;
        let tables: Vec<String> = rows.iter().map(|row| row.get(0)).collect();

        if tables.is_empty() {
            warn!("No tables found in schema '{}'", schema);
        } else {
            info!("Found {} tables in schema '{}'", tables.len(), schema);
        }
        Ok(tables)
    }

    async fn describe_table(&self, schema: &str, table: &str) -> Result<Table> {
        let mut desc = Table::new(schema, table);

        self.load_columns(&mut desc).await?;
        if desc.columns.is_empty() {
            return Err(MigrateError::SchemaExtraction(format!(
                "table {} has no visible columns",
                desc.full_name()
            )));
        }
        self.load_primary_key(&mut desc).await?;
        self.load_indexes(&mut desc).await?;
        self.load_foreign_keys(&mut desc).await?;
        desc.detect_sequence();

        Ok(desc)
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let client = self.get_client("row_count").await?;

        let query = format!(
            "SELECT COUNT(*)::int8 FROM {}.{}",
            quote_ident(schema),
            quote_ident(table)
        );

        let row = client.query_one(&query, &[]).await?;
        Ok(row.get::<_, i64>(0))
    }
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
