//src/blast.rs

use flate2::read::MultiGzDecoder;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::dispatch::FailureSink;
use crate::types::{AnnotatedRow, BlastHit, FailureRecord, OUTPUT_PREFIX_HEADERS};

/// Reads a tab-separated BLAST table (no header). Fields stay text.
/// Files ending in `.gz` are decompressed on the fly.
pub fn read_blast_table<P: AsRef<Path>>(path: P) -> io::Result<Vec<BlastHit>> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };

    parse_blast_table(reader)
}

pub fn parse_blast_table<R: BufRead>(reader: R) -> io::Result<Vec<BlastHit>> {
    let mut hits = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        hits.push(BlastHit::from_line(line));
    }
    Ok(hits)
}

/// Header line of the annotated table.
pub fn table_header<S: AsRef<str>>(ranks: &[S]) -> String {
    OUTPUT_PREFIX_HEADERS
        .iter()
        .copied()
        .chain(ranks.iter().map(AsRef::<str>::as_ref))
        .collect::<Vec<_>>()
        .join("\t")
}

/// Writes the annotated table: header, then one line per row, each padded
/// to the full rank width.
pub fn write_annotated_table<W: Write, S: AsRef<str>>(
    mut out: W,
    ranks: &[S],
    rows: &[AnnotatedRow],
) -> io::Result<()> {
    writeln!(out, "{}", table_header(ranks))?;
    for row in rows {
        writeln!(out, "{}", row.to_line(ranks.len()))?;
    }
    out.flush()
}

pub fn write_annotated_file<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    ranks: &[S],
    rows: &[AnnotatedRow],
) -> io::Result<()> {
    write_annotated_table(BufWriter::new(File::create(path)?), ranks, rows)
}

/// Failure side-channel on disk. Every recorded row is appended verbatim
/// and flushed right away, so the file can be inspected mid-run. Nothing is
/// created until the first row fails.
pub struct FailureFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FailureFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FailureSink for FailureFile {
    fn record(&self, failure: &FailureRecord) -> io::Result<()> {
        let mut file = self.file.lock();
        if file.is_none() {
            *file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        if let Some(out) = file.as_mut() {
            // one write per row keeps lines whole when workers race
            out.write_all(format!("{}\n", failure.hit.to_line()).as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }
}

/// Removes a failure file left behind by an earlier run.
pub fn reset_failure_file<P: AsRef<Path>>(path: P) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
