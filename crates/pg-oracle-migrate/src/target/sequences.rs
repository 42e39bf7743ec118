//! Post-copy sequence resynchronization.
//!
//! Each `SEQ_<TABLE>` sequence is advanced so its next value is greater
//! than `MAX(ID)` of the table it backs. A sequence name cut at the
//! identifier limit is matched to the only table starting with the kept
//! part.

use oracle::Connection;
use tracing::{debug, info, warn};

use super::OraclePool;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::script::identifiers::oracle_ident;
use crate::source::{MAX_IDENTIFIER_LENGTH, SEQUENCE_PREFIX};

/// Identity column expected in sequence-backed tables.
pub const ID_COLUMN: &str = "ID";

/// Database operations needed to resynchronize one sequence.
pub trait SequenceOps {
    /// Tables whose name equals or starts with `prefix`, sorted.
    fn tables_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
    fn has_id_column(&self, table: &str) -> Result<bool>;
    /// `MAX(ID)`, `None` for an empty table.
    fn max_id(&self, table: &str) -> Result<Option<i64>>;
    /// Draw `NEXTVAL`.
    fn next_value(&self, sequence: &str) -> Result<i64>;
    fn set_increment(&self, sequence: &str, increment: i64) -> Result<()>;
}

/// Table backed by a conventionally named sequence.
pub fn sequence_table(sequence: &str) -> Option<&str> {
    sequence
        .strip_prefix(SEQUENCE_PREFIX)
        .filter(|table| !table.is_empty())
}

/// Table lookup for one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableLookup {
    Found(String),
    Missing,
    /// Truncated name shared by several tables.
    Ambiguous(Vec<String>),
}

/// Find the table behind `sequence`, given the name derived from it.
///
/// Prefix matches are only considered when the sequence name sits at the
/// identifier limit, so `SEQ_USER` never resolves to `USERS`.
pub fn resolve_table<O: SequenceOps + ?Sized>(
    ops: &O,
    sequence: &str,
    derived: &str,
) -> Result<TableLookup> {
    let mut candidates = ops.tables_with_prefix(derived)?;
    if candidates.iter().any(|t| t == derived) {
        return Ok(TableLookup::Found(derived.to_string()));
    }
    if sequence.chars().count() < MAX_IDENTIFIER_LENGTH {
        return Ok(TableLookup::Missing);
    }

    Ok(match candidates.len() {
        0 => TableLookup::Missing,
        1 => TableLookup::Found(candidates.swap_remove(0)),
        _ => TableLookup::Ambiguous(candidates),
    })
}

/// `LIKE` pattern matching names that start with `prefix`, using `\` as escape.
pub fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '_' | '%') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Increment that moves a sequence whose last drawn value is `current` onto
/// `max`, if it is behind.
pub fn catch_up_increment(current: i64, max: i64) -> Option<i64> {
    (max > current).then(|| max - current)
}

/// Resynchronize one sequence.
pub fn sync_sequence<O: SequenceOps + ?Sized>(ops: &O, sequence: &str) -> Outcome {
    let Some(table) = sequence_table(sequence) else {
        return Outcome::skipped(sequence, "name has no SEQ_ prefix");
    };

    match try_sync(ops, sequence, table) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Failed to synchronize sequence {}: {}", sequence, e);
            Outcome::failed(sequence, e)
        }
    }
}

fn try_sync<O: SequenceOps + ?Sized>(ops: &O, sequence: &str, derived: &str) -> Result<Outcome> {
    let table = match resolve_table(ops, sequence, derived)? {
        TableLookup::Found(table) => table,
        TableLookup::Missing => {
            return Ok(Outcome::skipped(
                sequence,
                format!("table {} does not exist", derived),
            ));
        }
        TableLookup::Ambiguous(tables) => {
            return Ok(Outcome::skipped(
                sequence,
                format!("truncated name matches tables {}", tables.join(", ")),
            ));
        }
    };
    if table != derived {
        debug!("Sequence {} backs table {}", sequence, table);
    }
    let table = table.as_str();

    if !ops.has_id_column(table)? {
        return Ok(Outcome::skipped(
            sequence,
            format!("table {} has no {} column", table, ID_COLUMN),
        ));
    }
    let Some(max) = ops.max_id(table)? else {
        return Ok(Outcome::skipped(sequence, format!("table {} is empty", table)));
    };

    let current = ops.next_value(sequence)?;
    let Some(increment) = catch_up_increment(current, max) else {
        debug!("Sequence {} already ahead ({} >= {})", sequence, current, max);
        return Ok(Outcome::success(sequence));
    };

    ops.set_increment(sequence, increment)?;
    let drawn = ops.next_value(sequence);
    let reset = ops.set_increment(sequence, 1);
    let drawn = drawn?;
    reset?;

    info!(
        "Sequence {} advanced from {} to {} (max {} = {})",
        sequence, current, drawn, ID_COLUMN, max
    );
    Ok(Outcome::success(sequence))
}

/// [`SequenceOps`] over a live Oracle session.
pub struct OracleSequenceOps<'a> {
    conn: &'a Connection,
    schema: &'a str,
}

impl<'a> OracleSequenceOps<'a> {
    pub fn new(conn: &'a Connection, schema: &'a str) -> Self {
        Self { conn, schema }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{}", oracle_ident(self.schema), oracle_ident(name))
    }

    pub fn list_sequences(&self) -> Result<Vec<String>> {
        let rows = self.conn.query_as::<String>(
            "SELECT sequence_name FROM all_sequences WHERE sequence_owner = :1 ORDER BY sequence_name",
            &[&self.schema],
        )?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }
}

impl SequenceOps for OracleSequenceOps<'_> {
    fn tables_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = like_prefix(prefix);
        let rows = self.conn.query_as::<String>(
            "SELECT table_name FROM all_tables WHERE owner = :1 AND table_name LIKE :2 ESCAPE '\\' \
             ORDER BY table_name",
            &[&self.schema, &pattern],
        )?;
        let mut tables = Vec::new();
        for row in rows {
            tables.push(row?);
        }
        Ok(tables)
    }

    fn has_id_column(&self, table: &str) -> Result<bool> {
        let count = self.conn.query_row_as::<i64>(
            "SELECT COUNT(*) FROM all_tab_columns WHERE owner = :1 AND table_name = :2 AND column_name = :3",
            &[&self.schema, &table, &ID_COLUMN],
        )?;
        Ok(count > 0)
    }

    fn max_id(&self, table: &str) -> Result<Option<i64>> {
        let sql = format!("SELECT MAX({}) FROM {}", ID_COLUMN, self.qualified(table));
        Ok(self.conn.query_row_as::<Option<i64>>(&sql, &[])?)
    }

    fn next_value(&self, sequence: &str) -> Result<i64> {
        let sql = format!("SELECT {}.NEXTVAL FROM DUAL", self.qualified(sequence));
        Ok(self.conn.query_row_as::<i64>(&sql, &[])?)
    }

    fn set_increment(&self, sequence: &str, increment: i64) -> Result<()> {
        let sql = format!(
            "ALTER SEQUENCE {} INCREMENT BY {}",
            self.qualified(sequence),
            increment
        );
        self.conn.execute(&sql, &[])?;
        Ok(())
    }
}

/// Resynchronize every sequence in the destination schema.
///
/// Only the sequence listing can fail as a whole; each sequence gets its
/// own [`Outcome`].
pub async fn sync_sequences(pool: &OraclePool) -> Result<Vec<Outcome>> {
    pool.run(|conn, schema| {
        let ops = OracleSequenceOps::new(conn, schema);
        let sequences = ops.list_sequences()?;
        info!("Synchronizing {} sequences in {}", sequences.len(), schema);
        Ok(sequences
            .iter()
            .map(|seq| sync_sequence(&ops, seq))
            .collect())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use crate::outcome::OutcomeStatus;
    use crate::source::sequence_name;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory sequences and tables.
    #[derive(Default)]
    struct FakeOps {
        tables: HashMap<String, (bool, Option<i64>)>,
        sequences: RefCell<HashMap<String, (i64, i64)>>,
        fail_alter: bool,
    }

    impl FakeOps {
        fn with_table(mut self, table: &str, has_id: bool, max: Option<i64>) -> Self {
            self.tables.insert(table.to_string(), (has_id, max));
            self
        }

        fn with_sequence(self, name: &str, last: i64) -> Self {
            self.sequences.borrow_mut().insert(name.to_string(), (last, 1));
            self
        }

        /// Value the next NEXTVAL would return, without drawing it.
        fn peek(&self, name: &str) -> i64 {
            let (last, inc) = self.sequences.borrow()[name];
            last + inc
        }
    }

    impl SequenceOps for FakeOps {
        fn tables_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            let mut tables: Vec<String> = self
                .tables
                .keys()
                .filter(|t| t.starts_with(prefix))
                .cloned()
                .collect();
            tables.sort();
            Ok(tables)
        }

        fn has_id_column(&self, table: &str) -> Result<bool> {
            Ok(self.tables[table].0)
        }

        fn max_id(&self, table: &str) -> Result<Option<i64>> {
            Ok(self.tables[table].1)
        }

        fn next_value(&self, sequence: &str) -> Result<i64> {
            let mut seqs = self.sequences.borrow_mut();
            let entry = seqs.get_mut(sequence).expect("sequence exists");
            entry.0 += entry.1;
            Ok(entry.0)
        }

        fn set_increment(&self, sequence: &str, increment: i64) -> Result<()> {
            if self.fail_alter {
                return Err(MigrateError::Config("ORA-01031: insufficient privileges".into()));
            }
            self.sequences.borrow_mut().get_mut(sequence).expect("sequence exists").1 = increment;
            Ok(())
        }
    }

    #[test]
    fn test_sequence_table() {
        assert_eq!(sequence_table("SEQ_USERS"), Some("USERS"));
        assert_eq!(sequence_table("SEQ_"), None);
        assert_eq!(sequence_table("USERS_ID_SEQ"), None);
    }

    #[test]
    fn test_catch_up_increment() {
        assert_eq!(catch_up_increment(1, 3), Some(2));
        assert_eq!(catch_up_increment(3, 3), None);
        assert_eq!(catch_up_increment(10, 3), None);
    }

    #[test]
    fn test_users_sequence_reaches_max_plus_one() {
        // Fresh sequence: the first NEXTVAL returns 1.
        let ops = FakeOps::default()
            .with_table("USERS", true, Some(3))
            .with_sequence("SEQ_USERS", 0);

        let outcome = sync_sequence(&ops, "SEQ_USERS");
        assert!(outcome.is_success());
        assert_eq!(ops.peek("SEQ_USERS"), 4);
    }

    #[test]
    fn test_sequence_never_moves_backwards() {
        let ops = FakeOps::default()
            .with_table("ORDERS", true, Some(5))
            .with_sequence("SEQ_ORDERS", 100);

        assert!(sync_sequence(&ops, "SEQ_ORDERS").is_success());
        assert!(ops.peek("SEQ_ORDERS") > 100);
        assert!(ops.peek("SEQ_ORDERS") > 5);
    }

    #[test]
    fn test_skips() {
        let ops = FakeOps::default()
            .with_table("NO_ID", false, Some(1))
            .with_table("EMPTY", true, None)
            .with_sequence("SEQ_NO_ID", 0)
            .with_sequence("SEQ_EMPTY", 0);

        for seq in ["AUDIT_SEQ", "SEQ_MISSING", "SEQ_NO_ID", "SEQ_EMPTY"] {
            let outcome = sync_sequence(&ops, seq);
            assert!(
                matches!(outcome.status, OutcomeStatus::Skipped { .. }),
                "{} should be skipped",
                seq
            );
        }
        assert_eq!(ops.peek("SEQ_EMPTY"), 1);
    }

    #[test]
    fn test_failure_is_captured() {
        let mut ops = FakeOps::default()
            .with_table("USERS", true, Some(50))
            .with_sequence("SEQ_USERS", 0);
        ops.fail_alter = true;

        let outcome = sync_sequence(&ops, "SEQ_USERS");
        assert!(outcome.is_failure());
    }

    #[test]
    fn test_truncated_name_resolves_to_its_table() {
        let table = "CUSTOMER_ORDER_LINE_ITEMS_A";
        let sequence = sequence_name(table);
        assert_eq!(sequence, "SEQ_CUSTOMER_ORDER_LINE_ITEMS_");

        let ops = FakeOps::default()
            .with_table(table, true, Some(42))
            .with_sequence(&sequence, 0);
        assert!(sync_sequence(&ops, &sequence).is_success());
        assert_eq!(ops.peek(&sequence), 43);
    }

    #[test]
    fn test_ambiguous_truncated_name_is_skipped() {
        let sequence = sequence_name("CUSTOMER_ORDER_LINE_ITEMS_A");
        let ops = FakeOps::default()
            .with_table("CUSTOMER_ORDER_LINE_ITEMS_A", true, Some(5))
            .with_table("CUSTOMER_ORDER_LINE_ITEMS_B", true, Some(9))
            .with_sequence(&sequence, 0);

        assert_eq!(
            resolve_table(&ops, &sequence, "CUSTOMER_ORDER_LINE_ITEMS_").unwrap(),
            TableLookup::Ambiguous(vec![
                "CUSTOMER_ORDER_LINE_ITEMS_A".to_string(),
                "CUSTOMER_ORDER_LINE_ITEMS_B".to_string(),
            ])
        );
        let outcome = sync_sequence(&ops, &sequence);
        assert!(matches!(outcome.status, OutcomeStatus::Skipped { .. }));
        assert_eq!(ops.peek(&sequence), 1);
    }

    #[test]
    fn test_short_names_match_exactly() {
        let ops = FakeOps::default()
            .with_table("USERS", true, Some(3))
            .with_sequence("SEQ_USER", 0);
        assert_eq!(
            resolve_table(&ops, "SEQ_USER", "USER").unwrap(),
            TableLookup::Missing
        );
        assert!(matches!(
            sync_sequence(&ops, "SEQ_USER").status,
            OutcomeStatus::Skipped { .. }
        ));
    }

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("ORDER_ITEMS"), "ORDER\\_ITEMS%");
        assert_eq!(like_prefix("100%"), "100\\%%");
    }
}
