//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_ok() {
            return;
        }
        // Fallback to Cargo project root
        let root = env!("CARGO_MANIFEST_DIR");
        let _ = dotenv::from_filename(format!("{root}/.env"));
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD") || k.contains("SECRET") || k.contains("TOKEN") {
        return "***".to_string();
    }
    val.trim().to_string()
}

/// Log a consolidated, redacted snapshot of the given `(key, value)` pairs.
pub fn preflight_check(title: &str, snapshot: &[(&str, String)]) {
    let snapshot: Vec<(String, String)> = snapshot
        .iter()
        .map(|(k, v)| (k.to_string(), redact_value(k, v)))
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_secret_keys_only() {
        assert_eq!(redact_value("API_TOKEN", "abc"), "***");
        assert_eq!(redact_value("ENRICH_DB_PATH", " wikidb.db\n"), "wikidb.db");
    }

    #[test]
    fn flag_accepts_common_truthy_spellings() {
        for (raw, expected) in [("1", true), ("YES", true), ("on", true), ("0", false), ("nope", false)] {
            std::env::set_var("WIKIDATA_ENRICH_TEST_FLAG", raw);
            assert_eq!(env_flag("WIKIDATA_ENRICH_TEST_FLAG", !expected), expected, "{raw}");
        }
        std::env::remove_var("WIKIDATA_ENRICH_TEST_FLAG");
        assert!(env_flag("WIKIDATA_ENRICH_TEST_FLAG", true));
    }
}
