use anyhow::Result;
use serde_json::json;

use crate::config::{EnrichConfig, EnrichOverrides};
use crate::database_ops::inspect::{entity_columns, fetch_aliases, fetch_record};
use crate::database_ops::store::Store;

#[derive(Debug, Clone, Default)]
pub struct InspectConfig {
    pub overrides: EnrichOverrides,
    /// Also print the stored record and aliases of this item.
    pub item_id: Option<i64>,
}

pub fn run(cfg: InspectConfig) -> Result<()> {
    let resolved = EnrichConfig::resolve(cfg.overrides)?;
    resolved.validate_store()?;
    let store = Store::open(&resolved.db_path)?;

    println!("Columns in joined:");
    for col in entity_columns(store.conn())? {
        println!(
            "  - {:24} {:10} null={} default={} pk={}",
            col.name,
            col.decl_type,
            !col.not_null,
            col.default_value.as_deref().unwrap_or("-"),
            col.pk
        );
    }

    if let Some(item_id) = cfg.item_id {
        let record = fetch_record(store.conn(), &resolved.lang, item_id)?;
        let aliases = fetch_aliases(store.conn(), &resolved.lang, item_id)?;
        let out = json!({
            "item_id": item_id,
            "lang": resolved.lang.to_string(),
            "record": record,
            "aliases": aliases,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}
