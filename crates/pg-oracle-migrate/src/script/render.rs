//! Text rendering of a [`Script`].

use super::statements::{ColumnDef, PrimaryKeyDef, Script, Section, Statement};

/// Width of the `=` run in section separators.
const SEPARATOR_WIDTH: usize = 60;

const INDENT: &str = "    ";

/// Render the whole document. Output depends only on the input.
pub fn render(script: &Script) -> String {
    let mut out = String::new();
    for (i, section) in script.sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_section(section, &mut out);
    }
    out
}

fn render_section(section: &Section, out: &mut String) {
    out.push_str("-- ");
    out.push_str(&"=".repeat(SEPARATOR_WIDTH));
    out.push('\n');
    out.push_str("-- ");
    out.push_str(&section.title);
    out.push_str("\n\n");

    for statement in &section.statements {
        out.push_str(&render_statement(statement));
        out.push('\n');
    }
}

/// Render one statement, including its terminating semicolon.
pub fn render_statement(statement: &Statement) -> String {
    match statement {
        Statement::Comment(text) => format!("-- {}", text),
        Statement::CreateSequence { schema, name } => format!(
            "CREATE SEQUENCE {}.{} START WITH 1 INCREMENT BY 1 NOCACHE;",
            schema, name
        ),
        Statement::CreateTable {
            schema,
            name,
            columns,
            primary_key,
        } => render_create_table(schema, name, columns, primary_key.as_ref()),
        Statement::CreateIndex {
            schema,
            table,
            name,
            unique,
            columns,
        } => format!(
            "CREATE {}INDEX {}.{} ON {}.{} ({});",
            if *unique { "UNIQUE " } else { "" },
            schema,
            name,
            schema,
            table,
            columns.join(", ")
        ),
        Statement::AddForeignKey {
            schema,
            table,
            name,
            columns,
            ref_table,
            ref_columns,
            on_delete,
        } => {
            let mut sql = format!(
                "ALTER TABLE {}.{} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}.{} ({})",
                schema,
                table,
                name,
                columns.join(", "),
                schema,
                ref_table,
                ref_columns.join(", ")
            );
            if let Some(action) = on_delete {
                sql.push_str(" ON DELETE ");
                sql.push_str(action);
            }
            sql.push(';');
            sql
        }
        Statement::CreateRole { name } => format!("CREATE ROLE {};", name),
        Statement::GrantObject {
            privileges,
            schema,
            object,
            grantee,
        } => format!(
            "GRANT {} ON {}.{} TO {};",
            privileges.join(", "),
            schema,
            object,
            grantee
        ),
        Statement::GrantRole { role, users } => {
            format!("GRANT {} TO {};", role, users.join(", "))
        }
    }
}

fn render_create_table(
    schema: &str,
    name: &str,
    columns: &[ColumnDef],
    primary_key: Option<&PrimaryKeyDef>,
) -> String {
    let name_width = columns.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);
    let clauses: Vec<String> = columns.iter().map(ColumnDef::type_clause).collect();
    let clause_width = clauses.iter().map(|c| c.chars().count()).max().unwrap_or(0);

    let mut lines: Vec<String> = columns
        .iter()
        .zip(&clauses)
        .map(|(col, clause)| {
            let not_null = if col.nullable { "" } else { "NOT NULL" };
            let line = format!(
                "{}{:<nw$} {:<cw$} {}",
                INDENT,
                col.name,
                clause,
                not_null,
                nw = name_width,
                cw = clause_width
            );
            line.trim_end().to_string()
        })
        .collect();

    if let Some(pk) = primary_key {
        lines.push(format!(
            "{}CONSTRAINT {} PRIMARY KEY ({})",
            INDENT,
            pk.name,
            pk.columns.join(", ")
        ));
    }

    format!(
        "CREATE TABLE {}.{} (\n{}\n);",
        schema,
        name,
        lines.join(",\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, nullable: bool) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            data_type: data_type.to_string(),
            default: None,
            nullable,
        }
    }

    #[test]
    fn test_create_table_alignment() {
        let mut status = column("STATUS", "VARCHAR2(10)", false);
        status.default = Some("'new'".to_string());
        let statement = Statement::CreateTable {
            schema: "APP".into(),
            name: "USERS".into(),
            columns: vec![
                column("ID", "NUMBER(10)", false),
                column("NAME", "VARCHAR2(50)", true),
                status,
            ],
            primary_key: Some(PrimaryKeyDef {
                name: "PK_USERS".into(),
                columns: vec!["ID".into()],
            }),
        };

        let expected = "CREATE TABLE APP.USERS (\n\
                        \x20   ID     NUMBER(10)                 NOT NULL,\n\
                        \x20   NAME   VARCHAR2(50),\n\
                        \x20   STATUS VARCHAR2(10) DEFAULT 'new' NOT NULL,\n\
                        \x20   CONSTRAINT PK_USERS PRIMARY KEY (ID)\n\
                        );";
        assert_eq!(render_statement(&statement), expected);
    }

    #[test]
    fn test_foreign_key_rendering() {
        let statement = Statement::AddForeignKey {
            schema: "APP".into(),
            table: "ORDERS".into(),
            name: "FK_ORDERS_USERS".into(),
            columns: vec!["USER_ID".into()],
            ref_table: "USERS".into(),
            ref_columns: vec!["ID".into()],
            on_delete: Some("CASCADE".into()),
        };
        assert_eq!(
            render_statement(&statement),
            "ALTER TABLE APP.ORDERS ADD CONSTRAINT FK_ORDERS_USERS FOREIGN KEY (USER_ID) \
             REFERENCES APP.USERS (ID) ON DELETE CASCADE;"
        );
    }

    #[test]
    fn test_grants_rendering() {
        let grant = Statement::GrantObject {
            privileges: vec!["SELECT".into(), "INSERT".into()],
            schema: "APP".into(),
            object: "USERS".into(),
            grantee: "APP_EDIT_ROLE".into(),
        };
        assert_eq!(
            render_statement(&grant),
            "GRANT SELECT, INSERT ON APP.USERS TO APP_EDIT_ROLE;"
        );
        let role = Statement::GrantRole {
            role: "APP_VIEW_ROLE".into(),
            users: vec!["ALICE".into(), "BOB".into()],
        };
        assert_eq!(render_statement(&role), "GRANT APP_VIEW_ROLE TO ALICE, BOB;");
    }

    #[test]
    fn test_section_headers() {
        let mut section = Section::new("SEQUENCES");
        section.push(Statement::CreateSequence {
            schema: "APP".into(),
            name: "SEQ_USERS".into(),
        });
        let text = render(&Script {
            sections: vec![section, Section::new("TABLES")],
        });
        let separator = format!("-- {}", "=".repeat(60));
        assert!(text.starts_with(&format!("{}\n-- SEQUENCES\n\n", separator)));
        assert!(text.contains("CREATE SEQUENCE APP.SEQ_USERS START WITH 1 INCREMENT BY 1 NOCACHE;\n"));
        assert_eq!(text.matches(&separator).count(), 2);
        assert!(text.ends_with("-- TABLES\n\n"));
    }
}
