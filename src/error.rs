//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::types::TaxId;

/// Errors raised by a taxonomy database lookup or load.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// The identifier is malformed or has no entry in the database.
    #[error("taxid {0} not found in the taxonomy database")]
    UnknownTaxon(String),

    /// Walking up from `taxid` revisited `node`; the parent links loop.
    #[error("taxid {taxid} cannot be resolved: parent links loop back to {node}")]
    ParentCycle { taxid: String, node: TaxId },

    #[error("malformed taxonomy file {path:?} at line {line}: {reason}")]
    MalformedDatabase {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("taxonomy database I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TaxonomyResult<T> = std::result::Result<T, TaxonomyError>;

/// Run-level errors surfaced to the caller of an annotation run.
#[derive(Debug, Error)]
pub enum Blast2TaxError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{}", unknown_taxon_message(.taxid, .refresh_skipped))]
    UnknownTaxon { taxid: String, refresh_skipped: bool },

    #[error("worker coordination failed: {0}\nRetry with a single worker ('-t 1').")]
    WorkerCoordination(String),

    #[error(transparent)]
    Taxonomy(TaxonomyError),

    #[error("taxonomy database refresh failed: {0}")]
    Refresh(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Blast2TaxError>;

impl From<TaxonomyError> for Blast2TaxError {
    fn from(err: TaxonomyError) -> Self {
        match err {
            TaxonomyError::UnknownTaxon(taxid) => Blast2TaxError::UnknownTaxon {
                taxid,
                refresh_skipped: false,
            },
            other => Blast2TaxError::Taxonomy(other),
        }
    }
}

fn unknown_taxon_message(taxid: &str, refresh_skipped: &bool) -> String {
    if *refresh_skipped {
        format!(
            "taxid {taxid} not found.\n\
             The taxonomy database update was skipped; rerun without '-s' to refresh it."
        )
    } else {
        format!(
            "taxid {taxid} not found.\n\
             If the NCBI database was just updated it may not yet be synchronized with the taxonomy dump. \
             Try again later, or use '-f' to divert failed rows to the failure file \
             (check the diverted taxids manually)."
        )
    }
}
