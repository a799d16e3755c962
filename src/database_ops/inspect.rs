//! Read-back and schema introspection for debugging a run.

use anyhow::Result;
use itertools::Itertools;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use super::schema::ENTITY_TABLE;
use super::store::{quote_ident, table_exists, table_info, ColumnInfo};
use super::work_set::count_outstanding;
use crate::config::LangCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRecord {
    pub item_id: i64,
    pub processed: bool,
    pub label: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRow {
    pub alias: String,
    pub alias_lowercase: String,
}

pub fn fetch_record(
    conn: &Connection,
    lang: &LangCode,
    item_id: i64,
) -> Result<Option<EnrichedRecord>> {
    let sql = format!(
        "SELECT item_id, COALESCE(processed, 0), {}, {} FROM {} WHERE item_id = ?1 LIMIT 1",
        quote_ident(&lang.label_column()),
        quote_ident(&lang.description_column()),
        quote_ident(ENTITY_TABLE),
    );
    let record = conn
        .query_row(&sql, [item_id], |row| {
            Ok(EnrichedRecord {
                item_id: row.get(0)?,
                processed: row.get::<_, i64>(1)? != 0,
                label: row.get(2)?,
                description: row.get(3)?,
            })
        })
        .optional()?;
    Ok(record)
}

/// Aliases in the order they were written.
pub fn fetch_aliases(conn: &Connection, lang: &LangCode, item_id: i64) -> Result<Vec<AliasRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, {} FROM {} WHERE item_id = ?1 ORDER BY rowid",
        quote_ident(&lang.alias_column()),
        quote_ident(&lang.alias_lowercase_column()),
        quote_ident(&lang.alias_table()),
    ))?;
    let rows = stmt.query_map([item_id], |row| {
        Ok(AliasRow {
            alias: row.get(0)?,
            alias_lowercase: row.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Log the stored state of one item after it has been updated.
pub fn log_verification(conn: &Connection, lang: &LangCode, item_id: i64) -> Result<()> {
    let record = fetch_record(conn, lang, item_id)?;
    let aliases = fetch_aliases(conn, lang, item_id)?;
    info!(
        target = "verify",
        item_id,
        record = ?record,
        aliases = %aliases.iter().map(|a| a.alias.as_str()).join(" | "),
        "read back"
    );
    Ok(())
}

/// `PRAGMA table_info(joined)`.
pub fn entity_columns(conn: &Connection) -> Result<Vec<ColumnInfo>> {
    table_info(conn, ENTITY_TABLE)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub lang: String,
    pub total: u64,
    pub processed: u64,
    pub outstanding: u64,
    pub items_with_label: u64,
    pub alias_rows: u64,
}

/// Progress counters for `lang`. Expects a prepared schema. `outstanding`
/// uses the same filter as the work set, so rows without an `item_id` are
/// counted in `total` only.
pub fn status_counts(conn: &Connection, lang: &LangCode) -> Result<StatusCounts> {
    let (total, processed, with_label): (i64, i64, i64) = conn.query_row(
        &format!(
            "SELECT COUNT(*),
                    COALESCE(SUM(COALESCE(processed, 0) != 0), 0),
                    COUNT({})
             FROM {}",
            quote_ident(&lang.label_column()),
            quote_ident(ENTITY_TABLE)
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    let alias_rows: i64 = if table_exists(conn, &lang.alias_table())? {
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&lang.alias_table())),
            [],
            |row| row.get(0),
        )?
    } else {
        0
    };
    let outstanding = count_outstanding(conn)?;
    Ok(StatusCounts {
        lang: lang.to_string(),
        total: total as u64,
        processed: processed as u64,
        outstanding,
        items_with_label: with_label as u64,
        alias_rows: alias_rows as u64,
    })
}
