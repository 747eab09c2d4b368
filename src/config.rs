//src/config.rs

use crate::error::{Blast2TaxError, Result};
use crate::types::{BlastHit, DEFAULT_RANKS};

pub const DEFAULT_TAXON_COLUMN: usize = 13;
pub const DEFAULT_PERCENT_COLUMN: usize = 3;
pub const DEFAULT_LENGTH_COLUMN: usize = 4;
pub const DEFAULT_FAILED_FILE: &str = "failed_taxids.tsv";

/// Immutable settings for one annotation run. Threaded through the
/// dispatcher and the annotator; nothing here is process-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationConfig {
    /// Ranks to report, least to most specific.
    pub ranks: Vec<String>,
    /// 1-based column holding the `;`-separated candidate taxids.
    pub taxon_column: usize,
    /// 1-based column holding the percent identity.
    pub percent_column: usize,
    /// 1-based column holding the subject length.
    pub length_column: usize,
    /// Worker threads; 1 runs sequentially.
    pub workers: usize,
    /// Divert unresolvable rows instead of aborting the run.
    pub divert_failures: bool,
    /// Whether the database refresh was skipped (only affects error guidance).
    pub refresh_skipped: bool,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            ranks: DEFAULT_RANKS.iter().map(|r| r.to_string()).collect(),
            taxon_column: DEFAULT_TAXON_COLUMN,
            percent_column: DEFAULT_PERCENT_COLUMN,
            length_column: DEFAULT_LENGTH_COLUMN,
            workers: 1,
            divert_failures: false,
            refresh_skipped: false,
        }
    }
}

impl AnnotationConfig {
    pub fn with_ranks<I, S>(mut self, ranks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ranks = ranks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_divert_failures(mut self, divert: bool) -> Self {
        self.divert_failures = divert;
        self
    }

    /// Checks the settings that do not depend on the input table.
    pub fn validate(&self) -> Result<()> {
        if self.ranks.is_empty() || self.ranks.iter().any(|r| r.is_empty()) {
            return Err(Blast2TaxError::Configuration(
                "rank list must contain at least one non-empty rank name".to_string(),
            ));
        }
        for (label, column) in self.columns() {
            if column == 0 {
                return Err(Blast2TaxError::Configuration(format!(
                    "{label} column must be 1 or greater (columns are 1-based)"
                )));
            }
        }
        if self.workers == 0 {
            return Err(Blast2TaxError::Configuration(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks that every configured column exists in every row. A column
    /// beyond a row's width is a configuration error, reported before any
    /// row is resolved.
    pub fn validate_against(&self, hits: &[BlastHit]) -> Result<()> {
        self.validate()?;
        let needed = self.columns().iter().map(|(_, c)| *c).max().unwrap_or(1);
        if let Some((row, hit)) = hits.iter().enumerate().find(|(_, h)| h.width() < needed) {
            let (label, column) = self
                .columns()
                .into_iter()
                .find(|(_, c)| *c > hit.width())
                .unwrap_or(("taxid", needed));
            return Err(Blast2TaxError::Configuration(format!(
                "{label} column {column} is out of range: input row {} has only {} column(s)",
                row + 1,
                hit.width()
            )));
        }
        Ok(())
    }

    fn columns(&self) -> [(&'static str, usize); 3] {
        [
            ("taxid", self.taxon_column),
            ("percent identity", self.percent_column),
            ("subject length", self.length_column),
        ]
    }
}

/// Splits a comma-separated rank list, trimming blanks around names.
pub fn parse_rank_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}
