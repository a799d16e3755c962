//! Schema preparation for one enrichment language.
//!
//! The current schema is introspected and only the missing pieces are applied,
//! inside one transaction.

use std::fmt;

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, Transaction};
use tracing::{info, warn};

use super::store::{column_names, index_exists, quote_ident, table_exists, table_info};
use crate::config::LangCode;

/// Pre-existing table holding the entity snapshot.
pub const ENTITY_TABLE: &str = "joined";
pub const PROCESSED_COLUMN: &str = "processed";
pub const IDX_PROCESSED: &str = "idx_processed";
pub const IDX_ITEM_ID: &str = "idx_item_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    AddColumn { table: String, column: String },
    CreateTable { table: String },
    /// Legacy alias table keyed by `item_id` alone, rebuilt with the composite key.
    MigrateAliasTable { table: String, rows_copied: usize },
    CreateIndex { index: String },
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::AddColumn { table, column } => write!(f, "add column {table}.{column}"),
            SchemaChange::CreateTable { table } => write!(f, "create table {table}"),
            SchemaChange::MigrateAliasTable { table, rows_copied } => {
                write!(f, "migrate {table} to (item_id, alias) key ({rows_copied} rows)")
            }
            SchemaChange::CreateIndex { index } => write!(f, "create index {index}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub applied: Vec<SchemaChange>,
}

impl SchemaReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }

    fn record(&mut self, change: SchemaChange) {
        info!(target = "schema", change = %change, "schema change applied");
        self.applied.push(change);
    }
}

/// Ensure `joined` carries `processed`, `<lang>_label`, `<lang>_description`,
/// that `<lang>_aliases` exists with an `(item_id, <lang>_alias)` key, and that
/// the lookup indexes exist. Safe to run any number of times.
pub fn prepare_schema(conn: &mut Connection, lang: &LangCode) -> Result<SchemaReport> {
    let tx = conn.transaction()?;
    let mut report = SchemaReport::default();

    ensure_entity_table(&tx)?;
    ensure_entity_columns(&tx, lang, &mut report)?;
    ensure_alias_table(&tx, lang, &mut report)?;
    ensure_indexes(&tx, lang, &mut report)?;

    tx.commit().context("failed to commit schema changes")?;
    if report.is_noop() {
        info!(target = "schema", lang = %lang, "schema already up to date");
    }
    Ok(report)
}

fn ensure_entity_table(tx: &Transaction<'_>) -> Result<()> {
    if !table_exists(tx, ENTITY_TABLE)? {
        bail!("table {ENTITY_TABLE:?} does not exist; the store must be pre-populated");
    }
    if !column_names(tx, ENTITY_TABLE)?.contains("item_id") {
        bail!("table {ENTITY_TABLE:?} has no item_id column");
    }
    Ok(())
}

fn ensure_entity_columns(
    tx: &Transaction<'_>,
    lang: &LangCode,
    report: &mut SchemaReport,
) -> Result<()> {
    let existing = column_names(tx, ENTITY_TABLE)?;
    let wanted = [
        (PROCESSED_COLUMN.to_string(), "BOOLEAN DEFAULT FALSE"),
        (lang.label_column(), "TEXT"),
        (lang.description_column(), "TEXT"),
    ];
    for (column, decl) in wanted {
        if existing.contains(&column.to_lowercase()) {
            continue;
        }
        tx.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {} {decl}",
                quote_ident(ENTITY_TABLE),
                quote_ident(&column)
            ),
            [],
        )
        .with_context(|| format!("failed to add column {ENTITY_TABLE}.{column}"))?;
        report.record(SchemaChange::AddColumn {
            table: ENTITY_TABLE.to_string(),
            column,
        });
    }
    Ok(())
}

fn create_alias_table_sql(lang: &LangCode, table: &str) -> String {
    format!(
        "CREATE TABLE {table} (
            item_id INTEGER NOT NULL,
            {alias} TEXT NOT NULL,
            {lower} TEXT NOT NULL,
            PRIMARY KEY (item_id, {alias})
        )",
        table = quote_ident(table),
        alias = quote_ident(&lang.alias_column()),
        lower = quote_ident(&lang.alias_lowercase_column()),
    )
}

fn ensure_alias_table(
    tx: &Transaction<'_>,
    lang: &LangCode,
    report: &mut SchemaReport,
) -> Result<()> {
    let table = lang.alias_table();
    if !table_exists(tx, &table)? {
        tx.execute(&create_alias_table_sql(lang, &table), [])
            .with_context(|| format!("failed to create table {table}"))?;
        report.record(SchemaChange::CreateTable { table });
        return Ok(());
    }

    let info = table_info(tx, &table)?;
    let alias_col = lang.alias_column();
    let has_column = |name: &str| info.iter().any(|c| c.name.eq_ignore_ascii_case(name));
    if !has_column("item_id") || !has_column(&alias_col) {
        bail!("table {table:?} exists but lacks item_id/{alias_col} columns");
    }

    let mut pk: Vec<(i64, String)> = info
        .iter()
        .filter(|c| c.pk > 0)
        .map(|c| (c.pk, c.name.to_lowercase()))
        .collect();
    pk.sort();
    let composite = pk
        .iter()
        .map(|(_, name)| name.as_str())
        .eq(["item_id", alias_col.as_str()]);
    if composite {
        return Ok(());
    }

    warn!(
        target = "schema",
        table = %table,
        "alias table allows one alias per item; migrating to (item_id, alias) key"
    );
    let rows_copied = migrate_legacy_alias_table(tx, lang, &table)?;
    report.record(SchemaChange::MigrateAliasTable { table, rows_copied });
    Ok(())
}

fn migrate_legacy_alias_table(tx: &Transaction<'_>, lang: &LangCode, table: &str) -> Result<usize> {
    let legacy = format!("{table}_legacy");
    let alias = quote_ident(&lang.alias_column());
    tx.execute(
        &format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(table),
            quote_ident(&legacy)
        ),
        [],
    )?;
    tx.execute(&create_alias_table_sql(lang, table), [])?;

    let legacy_rows: Vec<(i64, String)> = {
        let mut stmt = tx.prepare(&format!(
            "SELECT item_id, {alias} FROM {} WHERE item_id IS NOT NULL AND {alias} IS NOT NULL ORDER BY rowid",
            quote_ident(&legacy)
        ))?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        collected
    };

    let mut copied = 0usize;
    {
        let mut insert = tx.prepare(&format!(
            "INSERT OR IGNORE INTO {} (item_id, {alias}, {}) VALUES (?1, ?2, ?3)",
            quote_ident(table),
            quote_ident(&lang.alias_lowercase_column())
        ))?;
        for (item_id, value) in &legacy_rows {
            copied += insert.execute(params![item_id, value, value.to_lowercase()])?;
        }
    }
    tx.execute(&format!("DROP TABLE {}", quote_ident(&legacy)), [])?;
    Ok(copied)
}

fn ensure_indexes(tx: &Transaction<'_>, lang: &LangCode, report: &mut SchemaReport) -> Result<()> {
    let alias_index = format!("idx_{}_lowercase", lang.alias_table());
    let wanted = [
        (IDX_PROCESSED.to_string(), ENTITY_TABLE.to_string(), PROCESSED_COLUMN.to_string()),
        (IDX_ITEM_ID.to_string(), ENTITY_TABLE.to_string(), "item_id".to_string()),
        (alias_index, lang.alias_table(), lang.alias_lowercase_column()),
    ];
    for (index, table, column) in wanted {
        if index_exists(tx, &index)? {
            continue;
        }
        tx.execute(
            &format!(
                "CREATE INDEX {} ON {} ({})",
                quote_ident(&index),
                quote_ident(&table),
                quote_ident(&column)
            ),
            [],
        )
        .with_context(|| format!("failed to create index {index}"))?;
        report.record(SchemaChange::CreateIndex { index });
    }
    Ok(())
}
