//! Script generation entry point.

use serde::Serialize;
use tracing::{info, warn};

use super::builder::{build_script, BuildOptions};
use super::render::render;
use super::roles::{role_users, RoleNames};
use crate::config::{ConnectionConfig, SCRIPT_POOL_SIZE};
use crate::error::Result;
use crate::source::{PgSourcePool, SchemaSource};

/// Inputs of a script generation run.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    /// Source connection; its `schema` is the schema introspected.
    pub source: ConnectionConfig,
    /// Oracle schema for the generated objects. Defaults to the source schema.
    pub target_schema: Option<String>,
    pub edit_role: Option<String>,
    pub view_role: Option<String>,
    pub edit_users: Vec<String>,
    pub view_users: Vec<String>,
}

impl ScriptRequest {
    fn target_schema(&self) -> String {
        self.target_schema
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.source.schema)
            .to_string()
    }
}

/// Generated document plus what went into it.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptGenerationResult {
    /// Tables successfully described and emitted.
    pub table_count: usize,
    /// Full DDL + DCL text.
    pub script: String,
    /// Approximations, skipped objects and per-table failures, in order.
    pub warnings: Vec<String>,
}

/// Connect to the source and generate the Oracle DDL/DCL document.
///
/// Only connection and table-listing failures are returned as errors; a
/// table that cannot be described becomes a warning.
pub async fn generate_scripts(request: &ScriptRequest) -> Result<ScriptGenerationResult> {
    let source = PgSourcePool::new(&request.source, SCRIPT_POOL_SIZE).await?;
    generate_from_source(&source, request).await
}

/// Generate against any [`SchemaSource`].
pub async fn generate_from_source<S>(
    source: &S,
    request: &ScriptRequest,
) -> Result<ScriptGenerationResult>
where
    S: SchemaSource + ?Sized,
{
    let schema = &request.source.schema;
    let target_schema = request.target_schema();
    let names = source.list_tables(schema).await?;

    let mut warnings = Vec::new();
    let mut tables = Vec::with_capacity(names.len());
    for name in &names {
        match source.describe_table(schema, name).await {
            Ok(table) => tables.push(table),
            Err(e) => {
                warn!("Failed to process table {}: {}", name, e);
                warnings.push(format!("Failed to process table {}: {}", name, e));
            }
        }
    }

    let options = BuildOptions {
        roles: RoleNames::resolve(
            Some(target_schema.as_str()),
            request.edit_role.as_deref(),
            request.view_role.as_deref(),
        ),
        target_schema,
        edit_users: role_users(&request.edit_users),
        view_users: role_users(&request.view_users),
    };

    let script = build_script(&tables, &options, &mut warnings);
    let text = render(&script);

    info!(
        "Generated scripts for {} of {} tables ({} warnings)",
        tables.len(),
        names.len(),
        warnings.len()
    );

    Ok(ScriptGenerationResult {
        table_count: script.table_count(),
        script: text,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use crate::source::{Column, Table};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    /// In-memory catalog; tables mapped to `None` fail to describe.
    struct FakeSource {
        tables: BTreeMap<String, Option<Table>>,
        fail_listing: bool,
    }

    #[async_trait]
    impl SchemaSource for FakeSource {
        async fn list_tables(&self, _schema: &str) -> Result<Vec<String>> {
            if self.fail_listing {
                return Err(MigrateError::SchemaExtraction("catalog unavailable".into()));
            }
            Ok(self.tables.keys().cloned().collect())
        }

        async fn describe_table(&self, _schema: &str, table: &str) -> Result<Table> {
            self.tables
                .get(table)
                .cloned()
                .flatten()
                .ok_or_else(|| MigrateError::SchemaExtraction(format!("{} vanished", table)))
        }

        async fn row_count(&self, _schema: &str, _table: &str) -> Result<i64> {
            Ok(0)
        }
    }

    fn column(name: &str, data_type: &str) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            udt_name: data_type.to_string(),
            char_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_nullable: true,
            default_expr: None,
            is_auto_increment: false,
        }
    }

    fn table(name: &str, columns: Vec<Column>) -> Table {
        let mut t = Table::new("public", name);
        t.columns = columns;
        t
    }

    fn request() -> ScriptRequest {
        ScriptRequest {
            source: ConnectionConfig {
                uri: "postgresql://localhost/app".to_string(),
                username: "app".to_string(),
                password: String::new(),
                schema: "public".to_string(),
                driver: None,
                ssl_mode: "disable".to_string(),
            },
            target_schema: Some("mb_oracle_schema".to_string()),
            edit_role: None,
            view_role: None,
            edit_users: Vec::new(),
            view_users: Vec::new(),
        }
    }

    fn source() -> FakeSource {
        let mut tables = BTreeMap::new();
        tables.insert(
            "drawings".to_string(),
            Some(table("drawings", vec![column("shape", "circle")])),
        );
        tables.insert("ghost".to_string(), None);
        tables.insert(
            "users".to_string(),
            Some(table("users", vec![column("name", "text")])),
        );
        FakeSource {
            tables,
            fail_listing: false,
        }
    }

    #[tokio::test]
    async fn test_failed_tables_become_warnings() {
        let result = generate_from_source(&source(), &request()).await.unwrap();

        assert_eq!(result.table_count, 2);
        let ghost: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.starts_with("Failed to process table ghost"))
            .collect();
        assert_eq!(ghost.len(), 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("drawings") && w.contains("shape") && w.contains("circle")));
        assert!(result.script.contains("SHAPE VARCHAR2(1000)"));
        assert!(!result.script.contains("GHOST"));
    }

    #[tokio::test]
    async fn test_default_roles_and_users() {
        let result = generate_from_source(&source(), &request()).await.unwrap();
        assert!(result.script.contains("CREATE ROLE MB_ORACLE_SCHEMA_EDIT_ROLE;"));
        assert!(result.script.contains("CREATE ROLE MB_ORACLE_SCHEMA_VIEW_ROLE;"));
        assert!(result.script.contains("GRANT MB_ORACLE_SCHEMA_EDIT_ROLE TO APP_USER;"));
    }

    #[tokio::test]
    async fn test_output_is_byte_identical_across_runs() {
        let first = generate_from_source(&source(), &request()).await.unwrap();
        let second = generate_from_source(&source(), &request()).await.unwrap();
        assert_eq!(first.script, second.script);
        assert_eq!(first.warnings, second.warnings);
    }

    #[tokio::test]
    async fn test_listing_failure_is_an_error() {
        let mut failing = source();
        failing.fail_listing = true;
        assert!(generate_from_source(&failing, &request()).await.is_err());
    }

    #[test]
    fn test_target_schema_defaults_to_source() {
        let mut req = request();
        req.target_schema = Some("  ".to_string());
        assert_eq!(req.target_schema(), "public");
    }
}
