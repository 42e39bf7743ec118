//! Foreign key disabling/enabling around the bulk copy.

use std::collections::HashMap;

use oracle::Connection;
use tracing::{info, warn};

use super::OraclePool;
use crate::error::Result;
use crate::outcome::Outcome;

const LIST_FOREIGN_KEYS_SQL: &str = "SELECT table_name, constraint_name, status \
     FROM all_constraints \
     WHERE owner = :1 AND constraint_type = 'R' \
     ORDER BY table_name, constraint_name";

/// Direction of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Disable,
    Enable,
}

impl ToggleAction {
    /// Status a constraint must have to be affected.
    pub fn from_status(self) -> &'static str {
        match self {
            ToggleAction::Disable => "ENABLED",
            ToggleAction::Enable => "DISABLED",
        }
    }

    /// Status after a successful toggle.
    pub fn to_status(self) -> &'static str {
        match self {
            ToggleAction::Disable => "DISABLED",
            ToggleAction::Enable => "ENABLED",
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            ToggleAction::Disable => "DISABLE",
            ToggleAction::Enable => "ENABLE",
        }
    }
}

/// Foreign key constraint as listed in `ALL_CONSTRAINTS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintRef {
    pub table: String,
    pub name: String,
}

impl ConstraintRef {
    fn label(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

/// Anonymous PL/SQL block toggling every matching constraint of `:owner`.
/// Each `ALTER TABLE` has its own handler so one failure does not stop the
/// loop.
pub fn toggle_block(action: ToggleAction) -> String {
    format!(
        "BEGIN
  FOR c IN (SELECT table_name, constraint_name
              FROM all_constraints
             WHERE owner = :owner
               AND constraint_type = 'R'
               AND status = '{from}') LOOP
    BEGIN
      EXECUTE IMMEDIATE 'ALTER TABLE \"' || :owner || '\".\"' || c.table_name ||
        '\" {keyword} CONSTRAINT \"' || c.constraint_name || '\"';
    EXCEPTION
      WHEN OTHERS THEN NULL;
    END;
  END LOOP;
END;",
        from = action.from_status(),
        keyword = action.keyword()
    )
}

/// One outcome per targeted constraint, judged by its status afterwards.
pub fn evaluate(
    action: ToggleAction,
    targeted: &[ConstraintRef],
    statuses_after: &HashMap<ConstraintRef, String>,
) -> Vec<Outcome> {
    targeted
        .iter()
        .map(|c| match statuses_after.get(c) {
            Some(status) if status == action.to_status() => Outcome::success(c.label()),
            Some(status) => Outcome::failed(
                c.label(),
                format!("status is still {} after {}", status, action.keyword()),
            ),
            None => Outcome::skipped(c.label(), "constraint no longer exists"),
        })
        .collect()
}

fn list_statuses(conn: &Connection, owner: &str) -> Result<HashMap<ConstraintRef, String>> {
    let rows = conn.query_as::<(String, String, String)>(LIST_FOREIGN_KEYS_SQL, &[&owner])?;
    let mut statuses = HashMap::new();
    for row in rows {
        let (table, name, status) = row?;
        statuses.insert(ConstraintRef { table, name }, status);
    }
    Ok(statuses)
}

fn toggle(conn: &Connection, owner: &str, action: ToggleAction) -> Result<Vec<Outcome>> {
    let before = list_statuses(conn, owner)?;
    let mut targeted: Vec<ConstraintRef> = before
        .into_iter()
        .filter(|(_, status)| status == action.from_status())
        .map(|(c, _)| c)
        .collect();
    targeted.sort_by(|a, b| (&a.table, &a.name).cmp(&(&b.table, &b.name)));

    if targeted.is_empty() {
        return Ok(Vec::new());
    }

    conn.execute_named(&toggle_block(action), &[("owner", &owner)])?;
    conn.commit()?;

    let after = list_statuses(conn, owner)?;
    Ok(evaluate(action, &targeted, &after))
}

async fn run_toggle(pool: &OraclePool, action: ToggleAction) -> Result<Vec<Outcome>> {
    let outcomes = pool
        .run(move |conn, schema| toggle(conn, schema, action))
        .await?;

    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    if failed > 0 {
        warn!(
            "{} of {} foreign keys could not be {}",
            failed,
            outcomes.len(),
            action.to_status().to_lowercase()
        );
    } else {
        info!(
            "{} foreign keys {}",
            outcomes.len(),
            action.to_status().to_lowercase()
        );
    }
    Ok(outcomes)
}

/// Disable every enabled foreign key in the destination schema.
pub async fn disable_foreign_keys(pool: &OraclePool) -> Result<Vec<Outcome>> {
    run_toggle(pool, ToggleAction::Disable).await
}

/// Re-enable every disabled foreign key in the destination schema.
pub async fn enable_foreign_keys(pool: &OraclePool) -> Result<Vec<Outcome>> {
    run_toggle(pool, ToggleAction::Enable).await
}
