use anyhow::Result;
use tracing::info;

use crate::config::{EnrichConfig, EnrichOverrides};
use crate::database_ops::inspect::status_counts;
use crate::database_ops::store::Store;

pub fn run(overrides: EnrichOverrides) -> Result<()> {
    let cfg = EnrichConfig::resolve(overrides)?;
    cfg.validate_store()?;
    let store = Store::open(&cfg.db_path)?;
    let counts = status_counts(store.conn(), &cfg.lang)?;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    info!("status done");
    Ok(())
}
