//src/lineage.rs

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::TaxonomyResult;
use crate::taxdb::TaxonomyService;
use crate::types::{RankVector, TaxId};

/// rank name -> ancestor holding that rank, for one lineage. Ranks the
/// lineage skips are simply not keys.
pub type LineageRanks = AHashMap<String, TaxId>;

/// Tags each ancestor of `taxid` with its rank. When a rank label repeats
/// within a lineage the more specific ancestor wins.
pub fn resolve(service: &dyn TaxonomyService, taxid: &str) -> TaxonomyResult<LineageRanks> {
    let lineage = service.lineage_of(taxid)?;
    let mut ranks = LineageRanks::with_capacity(lineage.len());
    // root-first, so later inserts are the more specific ancestors
    for ancestor in lineage {
        if let Some(rank) = service.rank_of(ancestor) {
            ranks.insert(rank.to_string(), ancestor);
        }
    }
    Ok(ranks)
}

/// Names the ancestor at each wanted rank, in order. A rank the lineage
/// lacks, or an ancestor without a name, yields the absent sentinel.
pub fn project<S: AsRef<str>>(
    service: &dyn TaxonomyService,
    ranks: &LineageRanks,
    wanted: &[S],
) -> RankVector {
    wanted
        .iter()
        .map(|rank| {
            ranks
                .get(rank.as_ref())
                .and_then(|&taxid| service.name_of(taxid))
                .map(str::to_string)
        })
        .collect()
}

/// Resolves and projects candidates for one run's rank list, memoizing
/// the projected vector per identifier. Failed lookups are not cached,
/// so errors surface exactly as they would without the cache.
pub struct ProjectionCache<'a> {
    service: &'a dyn TaxonomyService,
    ranks: &'a [String],
    memo: Option<RwLock<AHashMap<String, RankVector>>>,
}

impl<'a> ProjectionCache<'a> {
    pub fn new(service: &'a dyn TaxonomyService, ranks: &'a [String]) -> Self {
        Self {
            service,
            ranks,
            memo: Some(RwLock::new(AHashMap::new())),
        }
    }

    /// Same lookups, no memoization.
    pub fn uncached(service: &'a dyn TaxonomyService, ranks: &'a [String]) -> Self {
        Self {
            service,
            ranks,
            memo: None,
        }
    }

    /// The projected rank vector for one candidate identifier.
    pub fn rank_vector(&self, taxid: &str) -> TaxonomyResult<RankVector> {
        let Some(memo) = &self.memo else {
            return self.compute(taxid);
        };
        if let Some(hit) = memo.read().get(taxid) {
            return Ok(hit.clone());
        }
        let vector = self.compute(taxid)?;
        memo.write().insert(taxid.to_string(), vector.clone());
        Ok(vector)
    }

    pub fn cached_len(&self) -> usize {
        self.memo.as_ref().map(|m| m.read().len()).unwrap_or(0)
    }

    fn compute(&self, taxid: &str) -> TaxonomyResult<RankVector> {
        let ranks = resolve(self.service, taxid)?;
        Ok(project(self.service, &ranks, self.ranks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaxonomyError;
    use crate::taxdb::fixture::test_taxdb;
    use crate::taxdb::TaxDb;

    fn names(v: &[&str]) -> RankVector {
        v.iter()
            .map(|n| if *n == "-" { None } else { Some(n.to_string()) })
            .collect()
    }

    #[test]
    fn test_resolve_tags_ancestors_by_rank() {
        let db = test_taxdb();
        let ranks = resolve(&db, "9606").unwrap();
        assert_eq!(ranks.get("kingdom"), Some(&33208));
        assert_eq!(ranks.get("class"), Some(&40674));
        assert_eq!(ranks.get("species"), Some(&9606));
        assert_eq!(ranks.get("genus"), None);
    }

    #[test]
    fn test_resolve_later_duplicate_rank_wins() {
        let db = TaxDb::from_records([
            (1, 1, "root", "no rank"),
            (10, 1, "Outer", "clade"),
            (11, 10, "Inner", "clade"),
        ]);
        assert_eq!(resolve(&db, "11").unwrap().get("clade"), Some(&11));
    }

    #[test]
    fn test_resolve_unknown_taxon() {
        let db = test_taxdb();
        assert!(matches!(resolve(&db, "31337"), Err(TaxonomyError::UnknownTaxon(_))));
    }

    #[test]
    fn test_project_follows_requested_order_with_absent_slots() {
        let db = test_taxdb();
        let ranks = resolve(&db, "562").unwrap();
        assert_eq!(
            project(&db, &ranks, &["species", "phylum", "kingdom"]),
            names(&["Escherichia coli", "-", "Bacteria"])
        );
    }

    #[test]
    fn test_projection_cache_matches_uncached() {
        let db = test_taxdb();
        let wanted: Vec<String> = ["kingdom", "phylum", "class", "order"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cached = ProjectionCache::new(&db, &wanted);
        let direct = ProjectionCache::uncached(&db, &wanted);

        for id in ["9606", "10090", "562", "9606"] {
            assert_eq!(cached.rank_vector(id).unwrap(), direct.rank_vector(id).unwrap());
        }
        assert_eq!(cached.cached_len(), 3);
        assert!(cached.rank_vector("424242").is_err());
        assert_eq!(cached.cached_len(), 3);
        assert_eq!(direct.cached_len(), 0);
    }
}
