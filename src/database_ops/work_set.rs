use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use super::schema::{ENTITY_TABLE, PROCESSED_COLUMN};

/// Rows still waiting for enrichment. `NULL` counts as not processed: rows
/// that existed before the column was added may not have picked up its default.
fn outstanding_filter() -> String {
    format!("item_id IS NOT NULL AND COALESCE({PROCESSED_COLUMN}, 0) = 0")
}

/// Item ids still waiting for enrichment.
///
/// Loaded once at start and owned by the scan: ids are removed as soon as
/// their row is updated, and the scan stops when the set runs empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkSet {
    ids: HashSet<i64>,
}

impl WorkSet {
    pub fn contains(&self, item_id: i64) -> bool {
        self.ids.contains(&item_id)
    }

    /// Returns whether the id was still outstanding.
    pub fn remove(&mut self, item_id: i64) -> bool {
        self.ids.remove(&item_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<i64> for WorkSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

pub fn load_work_set(conn: &Connection) -> Result<WorkSet> {
    info!(target = "work_set", "loading item_ids left to process");
    let mut stmt = conn
        .prepare(&format!(
            "SELECT item_id FROM {ENTITY_TABLE} WHERE {}",
            outstanding_filter()
        ))
        .context("work-set query failed; is the schema prepared?")?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut ids = HashSet::new();
    for id in rows {
        ids.insert(id?);
    }
    info!(target = "work_set", count = ids.len(), "item_ids left to process");
    Ok(WorkSet { ids })
}

pub fn count_outstanding(conn: &Connection) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            &format!(
                "SELECT COUNT(*) FROM {ENTITY_TABLE} WHERE {}",
                outstanding_filter()
            ),
            [],
            |row| row.get(0),
        )
        .context("outstanding count failed; is the schema prepared?")?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::test_support::{fixture_conn, prepared_conn};

    #[test]
    fn loads_exactly_the_unprocessed_ids() {
        let conn = prepared_conn(&[1, 2, 3, 3, 4]);
        conn.execute("UPDATE joined SET processed = 1 WHERE item_id IN (2, 4)", [])
            .unwrap();
        conn.execute("UPDATE joined SET processed = NULL WHERE item_id = 1", [])
            .unwrap();

        let work = load_work_set(&conn).unwrap();
        let mut ids: Vec<i64> = work.iter().collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
        // duplicates collapse in the set but are both counted as rows
        assert_eq!(count_outstanding(&conn).unwrap(), 3);
    }

    #[test]
    fn reload_reflects_shrinkage() {
        let conn = prepared_conn(&[10, 20]);
        assert_eq!(load_work_set(&conn).unwrap().len(), 2);
        conn.execute("UPDATE joined SET processed = 1 WHERE item_id = 10", [])
            .unwrap();
        let work = load_work_set(&conn).unwrap();
        assert!(!work.contains(10));
        assert!(work.contains(20));
        assert_eq!(count_outstanding(&conn).unwrap(), 1);
    }

    #[test]
    fn unprepared_schema_is_an_error() {
        let conn = fixture_conn(&[1]);
        assert!(load_work_set(&conn).is_err());
        assert!(count_outstanding(&conn).is_err());
    }

    #[test]
    fn remove_reports_membership() {
        let mut work: WorkSet = [5, 6].into_iter().collect();
        assert!(work.remove(5));
        assert!(!work.remove(5));
        assert_eq!(work.len(), 1);
        assert!(!work.is_empty());
    }
}
