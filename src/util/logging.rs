use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Pick the filter for a run: a parsable `RUST_LOG` value wins, anything
/// else falls back to `default_filter`.
pub fn filter_from(rust_log: Option<&str>, default_filter: &str) -> EnvFilter {
    rust_log
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter))
}

/// Install the global fmt subscriber. Events go to stderr; stdout is left to
/// the JSON each subcommand prints.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter_from(rust_log.as_deref(), default_filter))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_overrides_the_default() {
        assert_eq!(filter_from(Some("debug"), "info").to_string(), "debug");
    }

    #[test]
    fn unusable_rust_log_falls_back() {
        assert_eq!(filter_from(None, "info").to_string(), "info");
        assert_eq!(filter_from(Some("  "), "info").to_string(), "info");
        assert_eq!(
            filter_from(Some("wikidata_enrich=loud"), "info").to_string(),
            "info"
        );
    }
}
