use anyhow::Result;
use serde_json::json;
use tracing::info;

use crate::config::{EnrichConfig, EnrichOverrides};
use crate::database_ops::schema::prepare_schema;
use crate::database_ops::store::Store;

/// Apply the schema changes for one language without scanning the dump.
pub fn run(overrides: EnrichOverrides) -> Result<()> {
    let cfg = EnrichConfig::resolve(overrides)?;
    cfg.validate_store()?;
    let mut store = Store::open(&cfg.db_path)?;
    let report = prepare_schema(store.conn_mut(), &cfg.lang)?;
    store.close()?;

    let applied: Vec<String> = report.applied.iter().map(|c| c.to_string()).collect();
    let out = json!({
        "lang": cfg.lang.to_string(),
        "applied": applied,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    info!("prepare done");
    Ok(())
}
