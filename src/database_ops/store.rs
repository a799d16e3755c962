use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, instrument};

/// The single SQLite connection held for the lifetime of a run.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open an existing database file read-write. The file is never created.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("failed to open sqlite database {}", path.display()))?;
        apply_writer_pragmas(&conn)?;
        info!("sqlite database opened");
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow::Error::from(e).context("failed to close sqlite database"))
    }
}

/// Pragmas for one long-running writer.
fn apply_writer_pragmas(conn: &Connection) -> Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.busy_timeout(Duration::from_millis(3000))?;
    debug!(journal_mode = %mode, "sqlite pragmas applied");
    Ok(())
}

/// Quote an identifier for interpolation into SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND lower(name) = lower(?) LIMIT 1",
    )?;
    let mut rows = stmt.query([table])?;
    Ok(rows.next()?.is_some())
}

pub fn index_exists(conn: &Connection, index: &str) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT 1 FROM sqlite_master WHERE type = 'index' AND lower(name) = lower(?) LIMIT 1",
    )?;
    let mut rows = stmt.query([index])?;
    Ok(rows.next()?.is_some())
}

/// One row of `PRAGMA table_info(<table>)`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    /// 1-based position within the primary key, 0 when not part of it.
    pub pk: i64,
}

pub fn table_info(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            cid: row.get(0)?,
            name: row.get(1)?,
            decl_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            not_null: row.get::<_, i64>(3)? != 0,
            default_value: row.get(4)?,
            pk: row.get(5)?,
        })
    })?;
    let mut cols = Vec::new();
    for col in rows {
        cols.push(col?);
    }
    Ok(cols)
}

/// Lowercased column names of `table`; empty when the table does not exist.
pub fn column_names(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    Ok(table_info(conn, table)?
        .into_iter()
        .map(|c| c.name.to_lowercase())
        .collect())
}
