use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::error;

use wikidata_enrich::cli;
use wikidata_enrich::config::{EnrichOverrides, ScanStrategy};
use wikidata_enrich::util::{env, logging};

#[derive(Parser, Debug)]
#[command(
    name = "enrich",
    version,
    about = "Enrich a filtered Wikidata SQLite snapshot with one language's terms from the JSON dump"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand. Unset values fall back to the
/// environment (`ENRICH_LANG`, `ENRICH_DB_PATH`) and then to defaults.
#[derive(Args, Debug, Clone)]
struct StoreArgs {
    /// Wikidata language code to enrich (default: sv)
    #[arg(long)]
    lang: Option<String>,
    /// SQLite database holding the `joined` table
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Scan the dump and write label, description and aliases for every outstanding item
    Run {
        #[command(flatten)]
        store: StoreArgs,
        /// Path to latest-all.json.gz
        #[arg(long)]
        dump: Option<PathBuf>,
        /// How dump lines are matched against outstanding items
        #[arg(long, value_enum)]
        strategy: Option<ScanStrategy>,
        /// Stop after reading this many dump records
        #[arg(long)]
        limit: Option<u64>,
        /// Read back and log every row right after it is written
        #[arg(long, default_value_t = false)]
        verify: bool,
        /// Log scan progress every N dump records
        #[arg(long)]
        progress_every: Option<u64>,
    },
    /// Add the language columns, alias table and indexes without scanning
    Prepare {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print processed/outstanding counts as JSON
    Status {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print the columns of `joined`, and optionally one stored item
    Inspect {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        item_id: Option<i64>,
    },
}

impl StoreArgs {
    fn into_overrides(self) -> EnrichOverrides {
        EnrichOverrides {
            lang: self.lang,
            db_path: self.db,
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    env::init_env();
    logging::init_tracing("info")?;

    let args = Cli::parse();
    let result = match args.command {
        Commands::Run {
            store,
            dump,
            strategy,
            limit,
            verify,
            progress_every,
        } => cli::enrich::run(EnrichOverrides {
            dump_path: dump,
            strategy,
            limit,
            verify,
            progress_every,
            ..store.into_overrides()
        }),
        Commands::Prepare { store } => cli::prepare::run(store.into_overrides()),
        Commands::Status { store } => cli::status::run(store.into_overrides()),
        Commands::Inspect { store, item_id } => cli::inspect::run(cli::inspect::InspectConfig {
            overrides: store.into_overrides(),
            item_id,
        }),
    };
    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "enrich failed");
    }
    result
}
