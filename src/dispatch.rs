//src/dispatch.rs

use rayon::prelude::*;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::annotate::{annotate_hit, HitOutcome};
use crate::config::AnnotationConfig;
use crate::error::{Blast2TaxError, Result};
use crate::lineage::ProjectionCache;
use crate::taxdb::TaxonomyService;
use crate::types::{AnnotatedRow, BlastHit, FailureRecord};

/// Annotated rows in input order, plus the rows diverted as failures.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub annotated: Vec<AnnotatedRow>,
    pub failures: Vec<FailureRecord>,
}

/// Receives each diverted row as soon as the worker that resolved it gives
/// up, while the rest of the run is still in progress. Calls may come from
/// several workers at once and in any order.
pub trait FailureSink: Sync {
    fn record(&self, failure: &FailureRecord) -> io::Result<()>;
}

/// Keeps diverted rows only in [`DispatchResult::failures`].
impl FailureSink for () {
    fn record(&self, _failure: &FailureRecord) -> io::Result<()> {
        Ok(())
    }
}

/// Annotates every hit, sequentially when `config.workers == 1` and on a
/// dedicated rayon pool otherwise.
///
/// Output order always matches input order. Without failure diversion the
/// first unresolvable row (by input position, regardless of which worker
/// hit it first) aborts the run and nothing is returned.
pub fn run(
    hits: &[BlastHit],
    config: &AnnotationConfig,
    service: &dyn TaxonomyService,
) -> Result<DispatchResult> {
    run_with_sink(hits, config, service, &())
}

/// [`run`], also handing every diverted row to `sink` the moment it fails.
/// A sink error stops the run.
pub fn run_with_sink(
    hits: &[BlastHit],
    config: &AnnotationConfig,
    service: &dyn TaxonomyService,
    sink: &dyn FailureSink,
) -> Result<DispatchResult> {
    config.validate_against(hits)?;
    let projector = ProjectionCache::new(service, &config.ranks);

    if config.workers == 1 {
        log::debug!("Only one worker requested, annotating sequentially.");
        let outcomes = annotate_sequential(hits, config, &projector, sink)?;
        collect_outcomes(outcomes, config)
    } else {
        log::debug!("Annotating {} rows on {} workers.", hits.len(), config.workers);
        let outcomes = annotate_parallel(hits, config, &projector, sink)?;
        collect_outcomes(outcomes.into_iter().flatten(), config)
    }
}

/// Annotates one row and, when diversion is on, hands a failure to the sink.
fn process_row(
    hit: &BlastHit,
    config: &AnnotationConfig,
    projector: &ProjectionCache<'_>,
    sink: &dyn FailureSink,
) -> io::Result<HitOutcome> {
    let outcome = annotate_hit(hit, config, projector);
    if let HitOutcome::Failed(record) = &outcome {
        if config.divert_failures {
            log::warn!(
                "Taxid {} not found! Diverting query {} to the failure file",
                record.taxid,
                record.hit.query_id()
            );
            sink.record(record)?;
        }
    }
    Ok(outcome)
}

fn annotate_sequential(
    hits: &[BlastHit],
    config: &AnnotationConfig,
    projector: &ProjectionCache<'_>,
    sink: &dyn FailureSink,
) -> io::Result<Vec<HitOutcome>> {
    let mut outcomes = Vec::with_capacity(hits.len());
    for hit in hits {
        let outcome = process_row(hit, config, projector, sink)?;
        let abort = !config.divert_failures && matches!(outcome, HitOutcome::Failed(_));
        outcomes.push(outcome);
        if abort {
            break;
        }
    }
    Ok(outcomes)
}

/// Indexed parallel map; rayon's indexed collect puts each outcome back at
/// its input position. Without diversion, rows after the lowest failing
/// index seen so far are skipped (`None`) so outstanding work winds down.
fn annotate_parallel(
    hits: &[BlastHit],
    config: &AnnotationConfig,
    projector: &ProjectionCache<'_>,
    sink: &dyn FailureSink,
) -> Result<Vec<Option<HitOutcome>>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| Blast2TaxError::WorkerCoordination(e.to_string()))?;

    let first_failure = AtomicUsize::new(usize::MAX);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pool.install(|| {
            hits.par_iter()
                .enumerate()
                .map(|(idx, hit)| -> io::Result<Option<HitOutcome>> {
                    if !config.divert_failures && idx > first_failure.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                    let outcome = process_row(hit, config, projector, sink)?;
                    if !config.divert_failures && matches!(outcome, HitOutcome::Failed(_)) {
                        first_failure.fetch_min(idx, Ordering::Relaxed);
                    }
                    Ok(Some(outcome))
                })
                .collect::<io::Result<Vec<_>>>()
        })
    }));

    let outcomes = result
        .map_err(|payload| Blast2TaxError::WorkerCoordination(panic_message(payload.as_ref())))?;
    Ok(outcomes?)
}

/// Folds outcomes (in input order) into the two output channels, or
/// aborts on the first failure when diversion is off.
fn collect_outcomes<I>(outcomes: I, config: &AnnotationConfig) -> Result<DispatchResult>
where
    I: IntoIterator<Item = HitOutcome>,
{
    let mut result = DispatchResult::default();
    for outcome in outcomes {
        match outcome {
            HitOutcome::Annotated(row) => result.annotated.push(row),
            HitOutcome::Failed(record) if config.divert_failures => {
                result.failures.push(record);
            }
            HitOutcome::Failed(record) => {
                return Err(Blast2TaxError::UnknownTaxon {
                    taxid: record.taxid,
                    refresh_skipped: config.refresh_skipped,
                });
            }
        }
    }
    Ok(result)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {msg}")
    } else {
        "worker panicked".to_string()
    }
}
