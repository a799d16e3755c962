use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use tracing::info;

use crate::config::MissingInput;

const READ_BUFFER: usize = 1 << 20;

/// One entity record of the dump with its physical line number (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpLine<'a> {
    pub number: u64,
    pub text: &'a str,
}

/// Line reader over the dump's JSON-array framing: `[` and `]` lines are
/// skipped and each record's trailing comma is removed. The line buffer is
/// reused between calls.
pub struct DumpLines<R> {
    reader: R,
    buf: String,
    line_number: u64,
}

impl<R: BufRead> DumpLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_number: 0,
        }
    }

    /// Physical lines consumed so far, framing included.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn next_record(&mut self) -> Result<Option<DumpLine<'_>>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_line(&mut self.buf)
                .with_context(|| format!("failed to read dump after line {}", self.line_number))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            if record_text(&self.buf).is_some() {
                break;
            }
        }
        let text = record_text(&self.buf).unwrap_or_default();
        Ok(Some(DumpLine {
            number: self.line_number,
            text,
        }))
    }
}

fn record_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_end();
    if trimmed.is_empty() || trimmed == "[" || trimmed == "]" {
        return None;
    }
    Some(trimmed.strip_suffix(',').unwrap_or(trimmed))
}

/// Open the dump, decompressing when the file name ends in `.gz`.
pub fn open_dump(path: &Path) -> Result<DumpLines<Box<dyn BufRead>>> {
    if !path.exists() {
        return Err(MissingInput {
            what: "dump file",
            path: path.to_path_buf(),
        }
        .into());
    }
    let file =
        File::open(path).with_context(|| format!("failed to open dump {}", path.display()))?;
    let gz = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    let reader: Box<dyn BufRead> = if gz {
        Box::new(BufReader::with_capacity(READ_BUFFER, MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(READ_BUFFER, file))
    };
    info!(target = "dump", path = %path.display(), gzip = gz, "dump opened");
    Ok(DumpLines::new(reader))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use flate2::write::GzEncoder;
    use flate2::Compression;

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Unique path under the system temp dir; removed on drop.
    pub struct TempPath(pub PathBuf);

    impl TempPath {
        pub fn new(suffix: &str) -> Self {
            let n = COUNTER.fetch_add(1, Ordering::SeqCst);
            Self(std::env::temp_dir().join(format!(
                "wikidata-enrich-{}-{n}{suffix}",
                std::process::id()
            )))
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    /// Write `records` framed like `latest-all.json.gz`.
    pub fn write_gz_dump(records: &[&str]) -> TempPath {
        let path = TempPath::new(".json.gz");
        let file = std::fs::File::create(&path.0).unwrap();
        let mut enc = GzEncoder::new(file, Compression::fast());
        writeln!(enc, "[").unwrap();
        for (i, rec) in records.iter().enumerate() {
            let sep = if i + 1 < records.len() { "," } else { "" };
            writeln!(enc, "{rec}{sep}").unwrap();
        }
        writeln!(enc, "]").unwrap();
        enc.finish().unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{write_gz_dump, TempPath};
    use super::*;
    use std::io::Cursor;

    fn collect<R: BufRead>(mut lines: DumpLines<R>) -> Vec<(u64, String)> {
        let mut out = Vec::new();
        while let Some(line) = lines.next_record().unwrap() {
            out.push((line.number, line.text.to_string()));
        }
        out
    }

    #[test]
    fn strips_array_framing_and_commas() {
        let raw = "[\n{\"id\":\"Q1\"},\n\n{\"id\":\"Q2\"}\r\n]\n";
        let lines = collect(DumpLines::new(Cursor::new(raw)));
        assert_eq!(
            lines,
            vec![(2, "{\"id\":\"Q1\"}".to_string()), (4, "{\"id\":\"Q2\"}".to_string())]
        );
    }

    #[test]
    fn reads_gzip_dumps() {
        let dump = write_gz_dump(&[r#"{"type":"item","id":"Q1"}"#, r#"{"type":"item","id":"Q2"}"#]);
        let mut lines = open_dump(&dump.0).unwrap();
        let first = lines.next_record().unwrap().unwrap();
        assert_eq!(first.text, r#"{"type":"item","id":"Q1"}"#);
        assert_eq!(lines.next_record().unwrap().unwrap().number, 3);
        assert!(lines.next_record().unwrap().is_none());
        assert_eq!(lines.line_number(), 4);
    }

    #[test]
    fn plain_text_dumps_are_read_as_is() {
        let path = TempPath::new(".json");
        std::fs::write(&path.0, "{\"type\":\"item\",\"id\":\"Q9\"}\n").unwrap();
        let lines = collect(open_dump(&path.0).unwrap());
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn missing_dump_is_missing_input() {
        let path = TempPath::new(".json.gz");
        let err = open_dump(&path.0).err().expect("missing dump must fail");
        assert!(err.downcast_ref::<MissingInput>().is_some());
    }
}
