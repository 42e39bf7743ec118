//! Builds structured DDL/DCL from table descriptors.

use std::collections::{HashMap, HashSet};

use super::identifiers::{normalize_ident, oracle_ident, truncate_ident};
use super::roles::RoleNames;
use super::statements::{ColumnDef, PrimaryKeyDef, Script, Section, Statement};
use crate::source::{is_nextval_expression, Table, MAX_IDENTIFIER_LENGTH};
use crate::typemap::map_column;

pub const SECTION_SEQUENCES: &str = "SEQUENCES";
pub const SECTION_TABLES: &str = "TABLES";
pub const SECTION_FOREIGN_KEYS: &str = "FOREIGN KEYS";
pub const SECTION_GRANTS: &str = "ROLES AND GRANTS";

const EDIT_PRIVILEGES: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE"];

/// Inputs that are not part of the source descriptors.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Destination schema owning the generated objects.
    pub target_schema: String,
    pub roles: RoleNames,
    pub edit_users: Vec<String>,
    pub view_users: Vec<String>,
}

/// Hands out schema-unique object names within the identifier limit.
///
/// A name already taken gets `_2`, `_3`, ... with the base shortened to fit.
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    pub fn allocate(&mut self, base: &str) -> String {
        let base = truncate_ident(&base.to_uppercase(), MAX_IDENTIFIER_LENGTH);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut n = 2usize;
        loop {
            let suffix = format!("_{}", n);
            let candidate = format!(
                "{}{}",
                truncate_ident(&base, MAX_IDENTIFIER_LENGTH - suffix.len()),
                suffix
            );
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Outcome of translating a PostgreSQL column default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// Oracle expression to emit.
    Keep(String),
    /// Intentionally dropped (sequence defaults, `NULL`).
    Drop,
    /// Not translatable; dropped with a warning.
    Unsupported,
}

/// Translate a PostgreSQL default expression into Oracle syntax.
pub fn translate_default(expr: &str) -> DefaultValue {
    let trimmed = expr.trim();
    if trimmed.is_empty() || is_nextval_expression(trimmed) {
        return DefaultValue::Drop;
    }

    let value = strip_parens(strip_casts(trimmed));
    match value.to_lowercase().as_str() {
        "null" => return DefaultValue::Drop,
        "now()" | "current_timestamp" | "localtimestamp" | "transaction_timestamp()"
        | "statement_timestamp()" | "clock_timestamp()" => {
            return DefaultValue::Keep("SYSTIMESTAMP".to_string())
        }
        "current_date" => return DefaultValue::Keep("SYSDATE".to_string()),
        "true" | "'t'" | "'true'" => return DefaultValue::Keep("1".to_string()),
        "false" | "'f'" | "'false'" => return DefaultValue::Keep("0".to_string()),
        _ => {}
    }

    if is_string_literal(value) || value.parse::<f64>().is_ok() {
        DefaultValue::Keep(value.to_string())
    } else {
        DefaultValue::Unsupported
    }
}

/// Cut the expression at the first `::` outside a string literal.
fn strip_casts(expr: &str) -> &str {
    let mut in_quote = false;
    let bytes = expr.as_bytes();
    for i in 0..bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b':' if !in_quote && bytes.get(i + 1) == Some(&b':') => return expr[..i].trim(),
            _ => {}
        }
    }
    expr
}

fn strip_parens(mut expr: &str) -> &str {
    while expr.len() >= 2 && expr.starts_with('(') && expr.ends_with(')') {
        expr = expr[1..expr.len() - 1].trim();
    }
    expr
}

fn is_string_literal(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'')
}

fn on_delete_clause(action: &str) -> Option<String> {
    match action.to_uppercase().as_str() {
        "CASCADE" => Some("CASCADE".to_string()),
        "SET_NULL" => Some("SET NULL".to_string()),
        _ => None,
    }
}

fn same_columns(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Destination names of one table's schema objects, unquoted.
#[derive(Debug, Clone)]
struct ObjectNames {
    table: String,
    sequence: Option<String>,
}

/// Allocate table names in listing order, then sequence names.
///
/// Tables come first so their names match what
/// [`crate::orchestrator::build_mappings`] resolves for the copy.
fn allocate_object_names(
    tables: &[Table],
    names: &mut NameAllocator,
    warnings: &mut Vec<String>,
) -> Vec<ObjectNames> {
    let table_names: Vec<String> = tables
        .iter()
        .map(|table| {
            let wanted = normalize_ident(&table.name);
            let allocated = names.allocate(&wanted);
            if allocated != wanted {
                warnings.push(format!(
                    "Table {}: destination name {} already taken, renamed to {}",
                    table.name, wanted, allocated
                ));
            }
            allocated
        })
        .collect();

    tables
        .iter()
        .zip(table_names)
        .map(|(table, table_name)| {
            let sequence = table.sequence.as_deref().map(|seq| {
                let wanted = normalize_ident(seq);
                let allocated = names.allocate(&wanted);
                if allocated != wanted {
                    warnings.push(format!(
                        "Table {}: sequence name {} already taken, renamed to {}",
                        table.name, wanted, allocated
                    ));
                }
                allocated
            });
            ObjectNames {
                table: table_name,
                sequence,
            }
        })
        .collect()
}

/// Build the full script.
///
/// Name collisions are reported first, then the remaining warnings in
/// table order.
pub fn build_script(tables: &[Table], options: &BuildOptions, warnings: &mut Vec<String>) -> Script {
    let schema = oracle_ident(&options.target_schema);
    let mut names = NameAllocator::default();
    let objects = allocate_object_names(tables, &mut names, warnings);
    let dest_tables: HashMap<&str, &str> = tables
        .iter()
        .zip(&objects)
        .map(|(t, o)| (t.name.as_str(), o.table.as_str()))
        .collect();

    let mut sequences = Section::new(SECTION_SEQUENCES);
    for seq in objects.iter().filter_map(|o| o.sequence.as_deref()) {
        sequences.push(Statement::CreateSequence {
            schema: schema.clone(),
            name: oracle_ident(seq),
        });
    }

    let mut table_section = Section::new(SECTION_TABLES);
    for (table, object) in tables.iter().zip(&objects) {
        build_table(
            table,
            &object.table,
            &schema,
            &mut names,
            &mut table_section,
            warnings,
        );
    }

    let mut fk_section = Section::new(SECTION_FOREIGN_KEYS);
    for (table, object) in tables.iter().zip(&objects) {
        let table_name = oracle_ident(&object.table);
        for fk in &table.foreign_keys {
            let name = names.allocate(&format!(
                "FK_{}_{}",
                normalize_ident(&table.name),
                normalize_ident(&fk.ref_table)
            ));
            let ref_table = dest_tables
                .get(fk.ref_table.as_str())
                .copied()
                .unwrap_or(fk.ref_table.as_str());
            fk_section.push(Statement::AddForeignKey {
                schema: schema.clone(),
                table: table_name.clone(),
                name: oracle_ident(&name),
                columns: fk.columns.iter().map(|c| oracle_ident(c)).collect(),
                ref_table: oracle_ident(ref_table),
                ref_columns: fk.ref_columns.iter().map(|c| oracle_ident(c)).collect(),
                on_delete: on_delete_clause(&fk.on_delete),
            });
        }
    }

    let grants = build_grants(&objects, &schema, options);

    Script {
        sections: vec![sequences, table_section, fk_section, grants],
    }
}

fn build_table(
    table: &Table,
    dest: &str,
    schema: &str,
    names: &mut NameAllocator,
    section: &mut Section,
    warnings: &mut Vec<String>,
) {
    let table_name = oracle_ident(dest);

    let columns = table
        .columns
        .iter()
        .map(|col| {
            let data_type = map_column(&table.name, col, warnings);
            let default = match col.default_expr.as_deref().map(translate_default) {
                Some(DefaultValue::Keep(expr)) => Some(expr),
                Some(DefaultValue::Unsupported) => {
                    warnings.push(format!(
                        "Table {}, column {}: default expression '{}' omitted",
                        table.name,
                        col.name,
                        col.default_expr.as_deref().unwrap_or_default()
                    ));
                    None
                }
                Some(DefaultValue::Drop) | None => None,
            };
            ColumnDef {
                name: oracle_ident(&col.name),
                data_type,
                default,
                nullable: col.is_nullable,
            }
        })
        .collect();

    let primary_key = table.has_pk().then(|| PrimaryKeyDef {
        name: oracle_ident(&names.allocate(&format!("PK_{}", normalize_ident(&table.name)))),
        columns: table.primary_key.iter().map(|c| oracle_ident(c)).collect(),
    });

    section.push(Statement::Comment(format!("Table: {}", table_name)));
    section.push(Statement::CreateTable {
        schema: schema.to_string(),
        name: table_name.clone(),
        columns,
        primary_key,
    });

    let mut indexed: Vec<&[String]> = Vec::new();
    if table.has_pk() {
        indexed.push(&table.primary_key);
    }
    for index in &table.indexes {
        if indexed.iter().any(|cols| same_columns(cols, &index.columns)) {
            warnings.push(format!(
                "Table {}: index {} skipped, columns ({}) are already indexed",
                table.name,
                index.name,
                index.columns.join(", ")
            ));
            continue;
        }
        indexed.push(&index.columns);

        section.push(Statement::CreateIndex {
            schema: schema.to_string(),
            table: table_name.clone(),
            name: oracle_ident(&names.allocate(&normalize_ident(&index.name))),
            unique: index.is_unique,
            columns: index.columns.iter().map(|c| oracle_ident(c)).collect(),
        });
    }
}

fn build_grants(objects: &[ObjectNames], schema: &str, options: &BuildOptions) -> Section {
    let edit = oracle_ident(&options.roles.edit);
    let view = oracle_ident(&options.roles.view);
    let mut section = Section::new(SECTION_GRANTS);

    section.push(Statement::Comment(format!(
        "Roles and grants for schema {}",
        schema
    )));
    section.push(Statement::CreateRole { name: edit.clone() });
    section.push(Statement::CreateRole { name: view.clone() });

    for seq in objects.iter().filter_map(|o| o.sequence.as_deref()) {
        section.push(Statement::GrantObject {
            privileges: vec!["SELECT".to_string()],
            schema: schema.to_string(),
            object: oracle_ident(seq),
            grantee: edit.clone(),
        });
    }

    for object in objects {
        section.push(Statement::GrantObject {
            privileges: EDIT_PRIVILEGES.iter().map(|p| p.to_string()).collect(),
            schema: schema.to_string(),
            object: oracle_ident(&object.table),
            grantee: edit.clone(),
        });
    }

    for object in objects {
        section.push(Statement::GrantObject {
            privileges: vec!["SELECT".to_string()],
            schema: schema.to_string(),
            object: oracle_ident(&object.table),
            grantee: view.clone(),
        });
    }

    section.push(Statement::GrantRole {
        role: edit,
        users: options.edit_users.iter().map(|u| oracle_ident(u)).collect(),
    });
    section.push(Statement::GrantRole {
        role: view,
        users: options.view_users.iter().map(|u| oracle_ident(u)).collect(),
    });

    section
}
