//! Structured DDL/DCL statements.
//!
//! Identifiers held here are already in their final Oracle form (see
//! [`super::identifiers::oracle_ident`]); rendering only lays them out.

use serde::Serialize;

/// A column inside `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub default: Option<String>,
    pub nullable: bool,
}

impl ColumnDef {
    /// Type plus optional `DEFAULT` clause.
    pub fn type_clause(&self) -> String {
        match &self.default {
            Some(default) => format!("{} DEFAULT {}", self.data_type, default),
            None => self.data_type.clone(),
        }
    }
}

/// Named primary key constraint line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeyDef {
    pub name: String,
    pub columns: Vec<String>,
}

/// One generated statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Statement {
    /// Single-line `--` comment.
    Comment(String),

    CreateSequence {
        schema: String,
        name: String,
    },

    CreateTable {
        schema: String,
        name: String,
        columns: Vec<ColumnDef>,
        primary_key: Option<PrimaryKeyDef>,
    },

    CreateIndex {
        schema: String,
        table: String,
        name: String,
        unique: bool,
        columns: Vec<String>,
    },

    AddForeignKey {
        schema: String,
        table: String,
        name: String,
        columns: Vec<String>,
        ref_table: String,
        ref_columns: Vec<String>,
        /// `CASCADE` or `SET NULL`; other actions are Oracle's default.
        on_delete: Option<String>,
    },

    CreateRole {
        name: String,
    },

    /// `GRANT <privileges> ON <schema>.<object> TO <grantee>`.
    GrantObject {
        privileges: Vec<String>,
        schema: String,
        object: String,
        grantee: String,
    },

    /// `GRANT <role> TO <users>`.
    GrantRole {
        role: String,
        users: Vec<String>,
    },
}

/// Titled group of statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    pub statements: Vec<Statement>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            statements: Vec::new(),
        }
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }
}

/// Full DDL + DCL document in section order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Script {
    pub sections: Vec<Section>,
}

impl Script {
    /// Number of `CREATE TABLE` statements.
    pub fn table_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.statements)
            .filter(|s| matches!(s, Statement::CreateTable { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_clause() {
        let mut col = ColumnDef {
            name: "STATUS".into(),
            data_type: "VARCHAR2(10)".into(),
            default: None,
            nullable: true,
        };
        assert_eq!(col.type_clause(), "VARCHAR2(10)");
        col.default = Some("'new'".into());
        assert_eq!(col.type_clause(), "VARCHAR2(10) DEFAULT 'new'");
    }

    #[test]
    fn test_table_count() {
        let mut section = Section::new("TABLES");
        section.push(Statement::Comment("Table: A".into()));
        section.push(Statement::CreateTable {
            schema: "S".into(),
            name: "A".into(),
            columns: Vec::new(),
            primary_key: None,
        });
        let script = Script {
            sections: vec![Section::new("SEQUENCES"), section],
        };
        assert_eq!(script.table_count(), 1);
    }
}
