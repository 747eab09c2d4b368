//src/annotate.rs

use crate::config::AnnotationConfig;
use crate::consensus::collapse;
use crate::error::{TaxonomyError, TaxonomyResult};
use crate::lineage::ProjectionCache;
use crate::types::{AnnotatedRow, BlastHit, FailureRecord};

/// Result of annotating one row: either the annotation or the untouched
/// row plus the identifier that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitOutcome {
    Annotated(AnnotatedRow),
    Failed(FailureRecord),
}

/// Annotates one BLAST row with the consensus taxonomy of its candidates.
pub fn annotate(
    hit: &BlastHit,
    config: &AnnotationConfig,
    projector: &ProjectionCache<'_>,
) -> TaxonomyResult<AnnotatedRow> {
    let taxids = hit.column(config.taxon_column).unwrap_or("");

    let vectors = taxids
        .split(';')
        .map(|taxid| projector.rank_vector(taxid))
        .collect::<TaxonomyResult<Vec<_>>>()?;

    Ok(AnnotatedRow {
        query: hit.query_id().to_string(),
        perc_id: hit.column(config.percent_column).unwrap_or("").to_string(),
        sbjct_len: hit.column(config.length_column).unwrap_or("").to_string(),
        taxonomy: collapse(&vectors),
    })
}

/// Two-channel form of [`annotate`]: unknown taxa, and taxa whose parent
/// links loop, become a `Failed` outcome carrying the original row.
pub fn annotate_hit(
    hit: &BlastHit,
    config: &AnnotationConfig,
    projector: &ProjectionCache<'_>,
) -> HitOutcome {
    match annotate(hit, config, projector) {
        Ok(row) => HitOutcome::Annotated(row),
        Err(err) => {
            let taxid = match err {
                TaxonomyError::UnknownTaxon(taxid) | TaxonomyError::ParentCycle { taxid, .. } => {
                    taxid
                }
                other => other.to_string(),
            };
            HitOutcome::Failed(FailureRecord {
                hit: hit.clone(),
                taxid,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxdb::fixture::test_taxdb;
    use crate::taxdb::TaxDb;

    fn row(query: &str, taxids: &str) -> BlastHit {
        BlastHit::from_line(&format!(
            "{query}\tsubj\t95.0\t300\t1\t2\t3\t4\t5\t6\t7\t8\t{taxids}"
        ))
    }

    fn config(ranks: &[&str]) -> AnnotationConfig {
        AnnotationConfig::default().with_ranks(ranks.iter().copied())
    }

    #[test]
    fn test_candidates_disagreeing_at_class_stop_before_class() {
        let db = test_taxdb();
        let cfg = config(&["kingdom", "phylum", "class"]);
        let projector = ProjectionCache::new(&db, &cfg.ranks);

        let out = annotate(&row("Q1", "9606;10090"), &cfg, &projector).unwrap();
        assert_eq!(out.query, "Q1");
        assert_eq!(out.perc_id, "95.0");
        assert_eq!(out.sbjct_len, "300");
        assert_eq!(
            out.taxonomy,
            vec![Some("Animalia".to_string()), Some("Chordata".to_string())]
        );
    }

    #[test]
    fn test_single_candidate_keeps_absent_rank() {
        let db = test_taxdb();
        let cfg = config(&["kingdom", "phylum"]);
        let projector = ProjectionCache::new(&db, &cfg.ranks);

        let out = annotate(&row("Q2", "562"), &cfg, &projector).unwrap();
        assert_eq!(out.taxonomy, vec![Some("Bacteria".to_string()), None]);
        assert_eq!(out.to_line(2), "Q2\t95.0\t300\tBacteria\tNan");
    }

    #[test]
    fn test_single_candidate_equals_its_projection() {
        let db = test_taxdb();
        let cfg = AnnotationConfig::default();
        let projector = ProjectionCache::new(&db, &cfg.ranks);

        let out = annotate(&row("Q3", "10090"), &cfg, &projector).unwrap();
        assert_eq!(out.taxonomy.len(), cfg.ranks.len());
        assert_eq!(out.taxonomy, projector.rank_vector("10090").unwrap());
    }

    #[test]
    fn test_custom_columns() {
        let db = test_taxdb();
        let cfg = AnnotationConfig {
            taxon_column: 2,
            percent_column: 4,
            length_column: 3,
            ..config(&["kingdom"])
        };
        let projector = ProjectionCache::new(&db, &cfg.ranks);
        let hit = BlastHit::from_line("Q4\t562;620\t150\t88.5");

        let out = annotate(&hit, &cfg, &projector).unwrap();
        assert_eq!(out.perc_id, "88.5");
        assert_eq!(out.sbjct_len, "150");
        assert_eq!(out.taxonomy, vec![Some("Bacteria".to_string())]);
    }

    #[test]
    fn test_unknown_candidate_fails_whole_row() {
        let db = test_taxdb();
        let cfg = config(&["kingdom"]);
        let projector = ProjectionCache::new(&db, &cfg.ranks);
        let hit = row("Q5", "9606;777777");

        assert!(matches!(
            annotate(&hit, &cfg, &projector),
            Err(TaxonomyError::UnknownTaxon(id)) if id == "777777"
        ));
        match annotate_hit(&hit, &cfg, &projector) {
            HitOutcome::Failed(record) => {
                assert_eq!(record.hit, hit);
                assert_eq!(record.taxid, "777777");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_candidate_with_looping_parents_fails_row() {
        let db = TaxDb::from_records([
            (1, 1, "root", "no rank"),
            (2, 1, "Bacteria", "kingdom"),
            (5, 6, "Loop A", "genus"),
            (6, 5, "Loop B", "family"),
        ]);
        let cfg = config(&["kingdom", "genus"]);
        let projector = ProjectionCache::new(&db, &cfg.ranks);
        let hit = row("Q6", "2;5");

        assert!(matches!(
            annotate(&hit, &cfg, &projector),
            Err(TaxonomyError::ParentCycle { ref taxid, .. }) if taxid == "5"
        ));
        match annotate_hit(&hit, &cfg, &projector) {
            HitOutcome::Failed(record) => {
                assert_eq!(record.hit, hit);
                assert_eq!(record.taxid, "5");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
