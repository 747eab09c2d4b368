// src/lib.rs
pub mod annotate;
pub mod blast;
pub mod config;
pub mod consensus;
pub mod dispatch;
pub mod error;
pub mod lineage;
pub mod refresh;
pub mod taxdb;
pub mod types;

use std::path::{Path, PathBuf};

use crate::blast::{read_blast_table, reset_failure_file, write_annotated_table, FailureFile};
use crate::config::{AnnotationConfig, DEFAULT_FAILED_FILE};
use crate::dispatch::run_with_sink;
use crate::error::{Blast2TaxError, Result};
use crate::refresh::refresh_database;
use crate::taxdb::TaxDb;
use crate::types::{AnnotatedRow, FailureRecord};

pub use crate::error::TaxonomyError;
pub use crate::taxdb::TaxonomyService;

/// Everything one annotation run needs besides the output location.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Tabular BLAST results.
    pub input: PathBuf,
    /// Taxdump directory or krakenuniq `taxDB` file.
    pub taxdb: PathBuf,
    /// Where diverted rows are appended.
    pub failed_file: PathBuf,
    /// Skip downloading a fresh taxdump before the run.
    pub skip_refresh: bool,
    pub config: AnnotationConfig,
}

impl RunOptions {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input: P, taxdb: Q) -> Self {
        Self {
            input: input.into(),
            taxdb: taxdb.into(),
            failed_file: PathBuf::from(DEFAULT_FAILED_FILE),
            skip_refresh: false,
            config: AnnotationConfig::default(),
        }
    }
}

/// Results of a completed run. Text is rendered on demand.
pub struct AnnotationResults {
    pub ranks: Vec<String>,
    /// One row per successfully annotated input row, in input order.
    pub annotated: Vec<AnnotatedRow>,
    /// Rows diverted to the failure file.
    pub failures: Vec<FailureRecord>,
}

impl AnnotationResults {
    /// The annotated table as tab-separated text, header included.
    pub fn get_annotated_table(&self) -> String {
        let mut buf = Vec::new();
        write_annotated_table(&mut buf, &self.ranks, &self.annotated)
            .expect("writing to a Vec cannot fail");
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn write_table<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        blast::write_annotated_file(path, &self.ranks, &self.annotated)?;
        Ok(())
    }
}

/// Refreshes the database if asked, loads it, and annotates every row of
/// the input. Diverted rows are appended to `options.failed_file` as each
/// one fails; the caller writes the main table only on success.
pub fn annotate_blast_results(options: &RunOptions) -> Result<AnnotationResults> {
    let config = AnnotationConfig {
        refresh_skipped: options.skip_refresh,
        ..options.config.clone()
    };
    config.validate()?;
    if options.input.as_os_str().is_empty() || options.taxdb.as_os_str().is_empty() {
        return Err(Blast2TaxError::Configuration(
            "input and taxonomy database paths must not be empty".to_string(),
        ));
    }

    log::info!(
        "#### Extracting Taxonomy Information for Blast Results\n\
         {:<40} {}\n{:<40} {}\n{:<40} {}\n{:<40} {}\n{:<40} {}\n{:<40} {}\n{:<40} {}\n{:<40} {}",
        "Blast Results File:", options.input.display(),
        "Taxonomy Database:", options.taxdb.display(),
        "Column With TaxIDs:", config.taxon_column,
        "Column With Perc Identity:", config.percent_column,
        "Column With Subject Length:", config.length_column,
        "Skip Taxonomy DB update:", options.skip_refresh,
        "Skip failed Taxids:", config.divert_failures,
        "Number of threads:", config.workers,
    );
    log::info!("Ranks: {}", config.ranks.join(","));

    if options.skip_refresh {
        log::info!("Skipping Taxonomy Database Update");
    } else if options.taxdb.is_file() {
        log::warn!(
            "{} is a taxDB file and cannot be refreshed; using it as is",
            options.taxdb.display()
        );
    } else {
        refresh_database(&options.taxdb)?;
    }

    if config.divert_failures {
        reset_failure_file(&options.failed_file)?;
    }

    let hits = read_blast_table(&options.input)?;
    log::info!("Read {} BLAST rows", hits.len());

    let taxdb = TaxDb::open(&options.taxdb)?;
    log::info!("Searching TaxIDs vs Taxonomy DB ({} taxa)", taxdb.len());

    let failure_file = FailureFile::new(&options.failed_file);
    let result = run_with_sink(&hits, &config, &taxdb, &failure_file)?;

    if !result.failures.is_empty() {
        log::warn!(
            "{} row(s) could not be resolved; written to {}",
            result.failures.len(),
            failure_file.path().display()
        );
    }

    Ok(AnnotationResults {
        ranks: config.ranks,
        annotated: result.annotated,
        failures: result.failures,
    })
}
