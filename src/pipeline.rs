//! The enrichment job: prepare schema, load the work set, scan the dump and
//! update every outstanding item found in it.

use std::io::BufRead;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::EnrichConfig;
use crate::database_ops::inspect::log_verification;
use crate::database_ops::schema::prepare_schema;
use crate::database_ops::store::Store;
use crate::database_ops::updater::update_entity;
use crate::database_ops::work_set::{count_outstanding, load_work_set, WorkSet};
use crate::dump::{open_dump, DumpLines, MatchStrategy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    WorkSetEmpty,
    DumpExhausted,
    LimitReached,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub strategy: String,
    pub lines_read: u64,
    pub records_read: u64,
    pub matches: u64,
    pub rows_updated: u64,
    pub aliases_written: u64,
    pub outstanding_at_start: u64,
    pub outstanding_remaining: u64,
    pub stopped: StopReason,
    pub elapsed_ms: u64,
}

/// Validate `cfg`, open the store and run the whole job.
pub fn run(cfg: &EnrichConfig) -> Result<RunSummary> {
    cfg.validate()?;
    cfg.log_snapshot("enrich");
    let mut store = Store::open(&cfg.db_path)?;
    let summary = enrich_store(store.conn_mut(), cfg)?;
    store.close()?;
    Ok(summary)
}

/// Run the job against an already open connection.
#[instrument(skip_all, fields(lang = %cfg.lang, strategy = %cfg.strategy))]
pub fn enrich_store(conn: &mut Connection, cfg: &EnrichConfig) -> Result<RunSummary> {
    check_progress_every(cfg)?;
    let started = Instant::now();
    prepare_schema(conn, &cfg.lang)?;
    let mut work = load_work_set(conn)?;
    let outstanding_at_start = work.len() as u64;

    let mut summary = if work.is_empty() {
        info!("no items left to process; skipping dump scan");
        RunSummary {
            strategy: cfg.strategy.to_string(),
            stopped: StopReason::WorkSetEmpty,
            ..Default::default()
        }
    } else {
        let mut lines = open_dump(&cfg.dump_path)?;
        let mut strategy = cfg.strategy.build();
        scan(conn, cfg, &mut work, &mut lines, strategy.as_mut())?
    };

    summary.outstanding_at_start = outstanding_at_start;
    summary.outstanding_remaining = count_outstanding(conn)?;
    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        lines = summary.lines_read,
        matches = summary.matches,
        rows_updated = summary.rows_updated,
        aliases = summary.aliases_written,
        remaining = summary.outstanding_remaining,
        stopped = ?summary.stopped,
        elapsed_ms = summary.elapsed_ms,
        "enrichment finished"
    );
    Ok(summary)
}

/// Scan dump records until the work set is empty, the dump ends or the
/// record limit is hit. Updated ids leave `work` as they are written.
pub fn scan<R: BufRead>(
    conn: &mut Connection,
    cfg: &EnrichConfig,
    work: &mut WorkSet,
    lines: &mut DumpLines<R>,
    strategy: &mut dyn MatchStrategy,
) -> Result<RunSummary> {
    check_progress_every(cfg)?;
    let mut summary = RunSummary {
        strategy: strategy.name().to_string(),
        ..Default::default()
    };
    info!(target = "scan", outstanding = work.len(), strategy = strategy.name(), "scanning dump");

    let stopped = loop {
        if work.is_empty() {
            break StopReason::WorkSetEmpty;
        }
        if cfg.limit.is_some_and(|limit| summary.records_read >= limit) {
            break StopReason::LimitReached;
        }
        let Some(line) = lines.next_record()? else {
            break StopReason::DumpExhausted;
        };
        let line_number = line.number;
        summary.records_read += 1;

        let matched = strategy
            .match_line(line.text, work)
            .with_context(|| format!("dump line {line_number}"))?;
        if summary.records_read % cfg.progress_every == 0 {
            info!(
                target = "scan",
                line = line_number,
                matches = summary.matches,
                outstanding = work.len(),
                "scan progress"
            );
        }
        let Some(entity) = matched else {
            continue;
        };

        summary.matches += 1;
        let outcome = update_entity(conn, &cfg.lang, &entity)?;
        work.remove(outcome.item_id);
        summary.rows_updated += outcome.rows_updated as u64;
        summary.aliases_written += outcome.aliases_written as u64;
        info!(
            target = "scan",
            item_id = outcome.item_id,
            line = line_number,
            label = entity.label(cfg.lang.as_str()).unwrap_or_default(),
            aliases = outcome.aliases_written,
            "item enriched"
        );
        if cfg.verify {
            log_verification(conn, &cfg.lang, outcome.item_id)?;
        }
    };
    summary.stopped = stopped;
    summary.lines_read = lines.line_number();
    debug!(target = "scan", stopped = ?summary.stopped, "scan stopped");
    Ok(summary)
}

fn check_progress_every(cfg: &EnrichConfig) -> Result<()> {
    if cfg.progress_every == 0 {
        bail!("progress interval must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LangCode, ScanStrategy};
    use crate::database_ops::inspect::{fetch_aliases, fetch_record};
    use crate::database_ops::test_support::{fixture_conn, sv};
    use crate::dump::reader::test_support::{write_gz_dump, TempPath};
    use std::path::PathBuf;

    const EARTH: &str = r#"{"type":"item","id":"Q42","labels":{"en":{"language":"en","value":"Earth"}},"descriptions":{"en":{"language":"en","value":"planet"}},"aliases":{"en":[{"language":"en","value":"Terra"},{"language":"en","value":"Gaia"}]},"claims":{}}"#;
    const PROPERTY: &str = r#"{"type":"property","datatype":"string","id":"P42","labels":{"en":{"language":"en","value":"prop"}}}"#;
    const OTHER: &str = r#"{"type":"item","id":"Q7","labels":{"en":{"language":"en","value":"seven"}}}"#;

    fn config(dump: PathBuf, lang: &str, strategy: ScanStrategy) -> EnrichConfig {
        EnrichConfig {
            lang: LangCode::parse(lang).unwrap(),
            dump_path: dump,
            db_path: PathBuf::from("unused.db"),
            strategy,
            limit: None,
            verify: true,
            progress_every: 1,
        }
    }

    #[test]
    fn end_to_end_with_both_strategies() {
        let dump = write_gz_dump(&[PROPERTY, OTHER, EARTH]);
        for strategy in [ScanStrategy::LineScan, ScanStrategy::Decode] {
            let mut conn = fixture_conn(&[42]);
            let cfg = config(dump.0.clone(), "en", strategy);
            let summary = enrich_store(&mut conn, &cfg).unwrap();

            assert_eq!(summary.matches, 1, "{strategy}");
            assert_eq!(summary.rows_updated, 1);
            assert_eq!(summary.aliases_written, 2);
            assert_eq!(summary.outstanding_at_start, 1);
            assert_eq!(summary.outstanding_remaining, 0);
            assert_eq!(summary.stopped, StopReason::WorkSetEmpty);
            assert_eq!(summary.strategy, strategy.as_str());

            let lang = &cfg.lang;
            let record = fetch_record(&conn, lang, 42).unwrap().unwrap();
            assert!(record.processed);
            assert_eq!(record.label.as_deref(), Some("Earth"));
            assert_eq!(record.description.as_deref(), Some("planet"));
            let aliases: Vec<(String, String)> = fetch_aliases(&conn, lang, 42)
                .unwrap()
                .into_iter()
                .map(|a| (a.alias, a.alias_lowercase))
                .collect();
            assert_eq!(
                aliases,
                vec![
                    ("Terra".to_string(), "terra".to_string()),
                    ("Gaia".to_string(), "gaia".to_string())
                ]
            );
        }
    }

    #[test]
    fn scan_continues_past_the_first_match() {
        let dump = write_gz_dump(&[OTHER, PROPERTY, EARTH]);
        let mut conn = fixture_conn(&[7, 42, 1000]);
        let summary = enrich_store(&mut conn, &config(dump.0.clone(), "en", ScanStrategy::LineScan))
            .unwrap();
        assert_eq!(summary.matches, 2);
        assert_eq!(summary.stopped, StopReason::DumpExhausted);
        assert_eq!(summary.outstanding_remaining, 1);
        assert_eq!(summary.records_read, 3);
        assert_eq!(summary.lines_read, 5);
    }

    #[test]
    fn resumed_run_skips_processed_items() {
        let dump = write_gz_dump(&[OTHER, EARTH]);
        let mut conn = fixture_conn(&[7, 42]);
        let cfg = config(dump.0.clone(), "en", ScanStrategy::Decode);

        let first = enrich_store(&mut conn, &cfg).unwrap();
        assert_eq!(first.matches, 2);
        let second = enrich_store(&mut conn, &cfg).unwrap();
        assert_eq!(second.matches, 0);
        assert_eq!(second.records_read, 0);
        assert_eq!(second.stopped, StopReason::WorkSetEmpty);
    }

    #[test]
    fn empty_work_set_never_touches_the_dump() {
        let mut conn = fixture_conn(&[]);
        let missing = TempPath::new(".json.gz");
        let summary = enrich_store(&mut conn, &config(missing.0.clone(), "sv", ScanStrategy::LineScan))
            .unwrap();
        assert_eq!(summary.rows_updated, 0);
        assert_eq!(summary.stopped, StopReason::WorkSetEmpty);
    }

    #[test]
    fn limit_caps_records_read() {
        let dump = write_gz_dump(&[OTHER, PROPERTY, EARTH]);
        let mut conn = fixture_conn(&[42]);
        let mut cfg = config(dump.0.clone(), "en", ScanStrategy::Decode);
        cfg.limit = Some(2);
        let summary = enrich_store(&mut conn, &cfg).unwrap();
        assert_eq!(summary.records_read, 2);
        assert_eq!(summary.matches, 0);
        assert_eq!(summary.stopped, StopReason::LimitReached);
        assert_eq!(summary.outstanding_remaining, 1);
    }

    #[test]
    fn zero_progress_interval_is_an_error_not_a_panic() {
        let dump = write_gz_dump(&[EARTH]);
        let mut conn = fixture_conn(&[42]);
        let mut cfg = config(dump.0.clone(), "en", ScanStrategy::LineScan);
        cfg.progress_every = 0;
        let err = enrich_store(&mut conn, &cfg).unwrap_err();
        assert!(err.to_string().contains("progress interval"), "{err:#}");
    }

    #[test]
    fn malformed_record_fails_with_line_number() {
        let dump = write_gz_dump(&[OTHER, "{\"type\":\"item\",\"id\":"]);
        let mut conn = fixture_conn(&[42]);
        let err = enrich_store(&mut conn, &config(dump.0.clone(), "sv", ScanStrategy::Decode))
            .unwrap_err();
        assert!(format!("{err:#}").contains("dump line 3"), "{err:#}");
    }

    #[test]
    fn run_enriches_a_file_backed_store() {
        let db = TempPath::new(".db");
        {
            let conn = Connection::open(&db.0).unwrap();
            conn.execute_batch("CREATE TABLE joined (item_id INTEGER); INSERT INTO joined VALUES (42);")
                .unwrap();
        }
        let dump = write_gz_dump(&[EARTH]);
        let mut cfg = config(dump.0.clone(), "sv", ScanStrategy::LineScan);
        cfg.db_path = db.0.clone();

        let summary = run(&cfg).unwrap();
        assert_eq!(summary.rows_updated, 1);
        assert_eq!(summary.aliases_written, 0);

        let conn = Connection::open(&db.0).unwrap();
        let record = fetch_record(&conn, &sv(), 42).unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.label, None);
    }

    #[test]
    fn run_fails_fast_on_missing_dump() {
        let db = TempPath::new(".db");
        Connection::open(&db.0)
            .unwrap()
            .execute_batch("CREATE TABLE joined (item_id INTEGER);")
            .unwrap();
        let missing = TempPath::new(".json.gz");
        let mut cfg = config(missing.0.clone(), "sv", ScanStrategy::LineScan);
        cfg.db_path = db.0.clone();
        let err = run(&cfg).unwrap_err();
        assert!(err.downcast_ref::<crate::config::MissingInput>().is_some());
    }
}
