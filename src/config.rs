//! Run configuration: language code, dump path, store path and scan knobs.
//!
//! Values resolve as CLI flag -> env var (`.env` honoured) -> default, and are
//! validated once before any work starts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;

use crate::util::env as env_util;

pub const DEFAULT_LANG: &str = "sv";
pub const DEFAULT_DUMP_PATH: &str =
    "/mnt/nfs/dumps-clouddumps1001.wikimedia.org/wikidatawiki/entities/latest-all.json.gz";
pub const DEFAULT_DB_PATH: &str = "wikidb_filtered.db";
pub const DEFAULT_PROGRESS_EVERY: u64 = 1_000_000;

/// A required input file or database is absent. Fatal before any work begins.
#[derive(Debug)]
pub struct MissingInput {
    pub what: &'static str,
    pub path: PathBuf,
}

impl fmt::Display for MissingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} path does not exist: {}", self.what, self.path.display())
    }
}

impl std::error::Error for MissingInput {}

fn lang_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]{2,3}(-[a-z0-9]+)*$").expect("static regex"))
}

/// Validated Wikidata language code (`sv`, `en`, `zh-hans`, ...).
///
/// Column and table names derived from the code use `_` in place of `-`, so
/// every identifier built here is a plain SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LangCode {
    code: String,
}

impl LangCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim().to_ascii_lowercase();
        if !lang_pattern().is_match(&code) {
            bail!("invalid language code {raw:?} (expected e.g. \"sv\" or \"zh-hans\")");
        }
        Ok(Self { code })
    }

    /// The code as it appears in the dump's `labels`/`descriptions`/`aliases` maps.
    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn sql_prefix(&self) -> String {
        self.code.replace('-', "_")
    }

    pub fn label_column(&self) -> String {
        format!("{}_label", self.sql_prefix())
    }

    pub fn description_column(&self) -> String {
        format!("{}_description", self.sql_prefix())
    }

    pub fn alias_table(&self) -> String {
        format!("{}_aliases", self.sql_prefix())
    }

    pub fn alias_column(&self) -> String {
        format!("{}_alias", self.sql_prefix())
    }

    pub fn alias_lowercase_column(&self) -> String {
        format!("{}_alias_lowercase", self.sql_prefix())
    }
}

impl FromStr for LangCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LangCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// How the dump scanner recognises outstanding entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ScanStrategy {
    /// Byte-level prefilter on `"type":"item","id":"Q<n>"`; only matching lines are decoded.
    #[default]
    LineScan,
    /// Decode every dump record and compare its numeric id.
    Decode,
}

impl ScanStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStrategy::LineScan => "line-scan",
            ScanStrategy::Decode => "decode",
        }
    }
}

impl FromStr for ScanStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "line-scan" | "linescan" | "lines" => Ok(ScanStrategy::LineScan),
            "decode" | "json" => Ok(ScanStrategy::Decode),
            other => Err(anyhow!("unknown scan strategy {other:?} (line-scan|decode)")),
        }
    }
}

impl fmt::Display for ScanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied overrides, usually straight from the CLI.
#[derive(Debug, Clone, Default)]
pub struct EnrichOverrides {
    pub lang: Option<String>,
    pub dump_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub strategy: Option<ScanStrategy>,
    pub limit: Option<u64>,
    pub verify: bool,
    pub progress_every: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub lang: LangCode,
    pub dump_path: PathBuf,
    pub db_path: PathBuf,
    pub strategy: ScanStrategy,
    /// Stop after this many dump records have been read.
    pub limit: Option<u64>,
    /// Read back and log every row right after it is updated.
    pub verify: bool,
    pub progress_every: u64,
}

impl EnrichConfig {
    /// Resolve overrides against the environment (`ENRICH_*`, `WIKIDATA_DUMP_PATH`)
    /// and defaults. Does not touch the filesystem; see [`EnrichConfig::validate`].
    pub fn resolve(overrides: EnrichOverrides) -> Result<Self> {
        let lang_raw = overrides
            .lang
            .or_else(|| env_util::env_opt("ENRICH_LANG"))
            .unwrap_or_else(|| DEFAULT_LANG.to_string());
        let strategy = match overrides.strategy {
            Some(s) => s,
            None => match env_util::env_opt("ENRICH_STRATEGY") {
                Some(raw) => raw.parse()?,
                None => ScanStrategy::default(),
            },
        };

        let limit = match overrides.limit {
            Some(limit) => Some(limit),
            None => parse_count("ENRICH_LIMIT", env_util::env_opt("ENRICH_LIMIT"))?,
        };
        let progress_every = match overrides.progress_every {
            Some(every) => every,
            None => parse_count(
                "ENRICH_PROGRESS_EVERY",
                env_util::env_opt("ENRICH_PROGRESS_EVERY"),
            )?
            .unwrap_or(DEFAULT_PROGRESS_EVERY),
        };

        Ok(Self {
            lang: LangCode::parse(&lang_raw)?,
            dump_path: overrides
                .dump_path
                .or_else(|| env_util::env_opt("WIKIDATA_DUMP_PATH").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DUMP_PATH)),
            db_path: overrides
                .db_path
                .or_else(|| env_util::env_opt("ENRICH_DB_PATH").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            strategy,
            limit,
            verify: overrides.verify || env_util::env_flag("ENRICH_VERIFY", false),
            progress_every,
        })
    }

    /// Checks needed by every subcommand: the store must already exist.
    pub fn validate_store(&self) -> Result<()> {
        require_file("database", &self.db_path)
    }

    /// Full validation for an enrichment run.
    pub fn validate(&self) -> Result<()> {
        self.validate_store()?;
        require_file("dump file", &self.dump_path)?;
        if self.progress_every == 0 {
            bail!("progress interval must be greater than zero");
        }
        if self.limit == Some(0) {
            bail!("record limit must be greater than zero when set");
        }
        Ok(())
    }

    pub fn log_snapshot(&self, title: &str) {
        env_util::preflight_check(
            title,
            &[
                ("ENRICH_LANG", self.lang.to_string()),
                ("WIKIDATA_DUMP_PATH", self.dump_path.display().to_string()),
                ("ENRICH_DB_PATH", self.db_path.display().to_string()),
                ("ENRICH_STRATEGY", self.strategy.to_string()),
                (
                    "ENRICH_LIMIT",
                    self.limit.map(|l| l.to_string()).unwrap_or_default(),
                ),
                ("ENRICH_VERIFY", self.verify.to_string()),
            ],
        );
    }
}

/// Numeric env value; unset stays `None`, anything unparsable is an error.
fn parse_count(key: &str, raw: Option<String>) -> Result<Option<u64>> {
    raw.map(|raw| {
        raw.trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}"))
    })
    .transpose()
}

fn require_file(what: &'static str, path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(MissingInput {
            what,
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}
