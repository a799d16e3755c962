use anyhow::Result;
use tracing::info;

use crate::config::{EnrichConfig, EnrichOverrides};
use crate::pipeline;

pub fn run(overrides: EnrichOverrides) -> Result<()> {
    let cfg = EnrichConfig::resolve(overrides)?;
    let summary = pipeline::run(&cfg)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("enrich done");
    Ok(())
}
