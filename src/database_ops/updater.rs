use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use tracing::{debug, instrument, warn};

use super::schema::{ENTITY_TABLE, PROCESSED_COLUMN};
use super::store::quote_ident;
use crate::config::LangCode;
use crate::dump::entity::DumpEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub item_id: i64,
    /// `joined` rows touched; 0 when the id is no longer in the store.
    pub rows_updated: usize,
    pub aliases_written: usize,
}

/// Write label, description and aliases of `entity` for `lang`, and flag the
/// row processed. Both tables change in one transaction; when no `joined` row
/// matches, nothing is written.
#[instrument(skip_all, fields(entity = %entity.id, lang = %lang))]
pub fn update_entity(
    conn: &mut Connection,
    lang: &LangCode,
    entity: &DumpEntity,
) -> Result<UpdateOutcome> {
    let item_id = entity
        .item_id()
        .ok_or_else(|| anyhow!("{} is not a Wikidata item", entity.id))?;
    let label = entity.label(lang.as_str());
    let description = entity.description(lang.as_str());
    let aliases = entity.aliases(lang.as_str());

    let tx = conn.transaction()?;
    let rows_updated = {
        let mut stmt = tx.prepare_cached(&format!(
            "UPDATE {} SET {} = ?1, {} = ?2, {} = 1 WHERE item_id = ?3",
            quote_ident(ENTITY_TABLE),
            quote_ident(&lang.description_column()),
            quote_ident(&lang.label_column()),
            quote_ident(PROCESSED_COLUMN),
        ))?;
        stmt.execute(params![description, label, item_id])
            .with_context(|| format!("failed to update {ENTITY_TABLE} for item {item_id}"))?
    };
    if rows_updated == 0 {
        warn!(item_id, "no row for item; skipping");
        return Ok(UpdateOutcome {
            item_id,
            rows_updated: 0,
            aliases_written: 0,
        });
    }

    let alias_table = quote_ident(&lang.alias_table());
    tx.prepare_cached(&format!("DELETE FROM {alias_table} WHERE item_id = ?1"))?
        .execute([item_id])?;
    let mut aliases_written = 0usize;
    {
        let mut insert = tx.prepare_cached(&format!(
            "INSERT OR IGNORE INTO {alias_table} (item_id, {}, {}) VALUES (?1, ?2, ?3)",
            quote_ident(&lang.alias_column()),
            quote_ident(&lang.alias_lowercase_column()),
        ))?;
        for alias in aliases.iter().copied() {
            aliases_written += insert
                .execute(params![item_id, alias, alias.to_lowercase()])
                .with_context(|| format!("failed to write alias for item {item_id}"))?;
        }
    }
    tx.commit()?;

    debug!(item_id, rows_updated, aliases_written, "item updated");
    Ok(UpdateOutcome {
        item_id,
        rows_updated,
        aliases_written,
    })
}
