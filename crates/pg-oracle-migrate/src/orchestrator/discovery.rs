//! Table discovery: which source tables are copied, and where to.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::script::builder::NameAllocator;
use crate::script::identifiers::normalize_ident;
use crate::source::SchemaSource;

/// One table to copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMapping {
    /// Source table name as stored in PostgreSQL.
    pub source: String,
    /// Destination table name, normalized for Oracle.
    pub dest: String,
    /// Replaces `SELECT * FROM <table>` as the row source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_select: Option<String>,
}

impl TableMapping {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let dest = normalize_ident(&source);
        Self {
            source,
            dest,
            custom_select: None,
        }
    }
}

/// Build mappings from a table listing. Exclusions match case-insensitively;
/// custom selects are keyed by source table name.
///
/// Destination names are allocated over the whole listing, in order, so a
/// name cut to the identifier limit resolves to the same table the generated
/// DDL created.
pub fn build_mappings(
    tables: Vec<String>,
    exclude: &[String],
    custom_selects: &BTreeMap<String, String>,
) -> Vec<TableMapping> {
    let mut names = NameAllocator::default();
    tables
        .into_iter()
        .map(|name| {
            let dest = names.allocate(&normalize_ident(&name));
            (name, dest)
        })
        .filter(|(name, _)| {
            let excluded = exclude.iter().any(|e| e.eq_ignore_ascii_case(name));
            if excluded {
                debug!("Excluding table {}", name);
            }
            !excluded
        })
        .map(|(name, dest)| {
            let custom_select = custom_selects
                .get(&name)
                .or_else(|| {
                    custom_selects
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(&name))
                        .map(|(_, v)| v)
                })
                .map(|sql| sql.trim().trim_end_matches(';').trim_end().to_string())
                .filter(|sql| !sql.is_empty());
            if dest != normalize_ident(&name) {
                warn!("Table {} is copied into {} (name already taken)", name, dest);
            }
            TableMapping {
                source: name,
                dest,
                custom_select,
            }
        })
        .collect()
}

/// List source tables and turn them into mappings.
pub async fn discover_tables<S: SchemaSource + ?Sized>(
    source: &S,
    schema: &str,
    settings: &MigrationConfig,
) -> Result<Vec<TableMapping>> {
    let tables = source.list_tables(schema).await?;
    let listed = tables.len();
    let mappings = build_mappings(tables, &settings.exclude_tables, &settings.custom_selects);
    info!(
        "Discovered {} tables in {} ({} excluded)",
        mappings.len(),
        schema,
        listed - mappings.len()
    );
    Ok(mappings)
}
