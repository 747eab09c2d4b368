//src/taxdb.rs

use ahash::{AHashMap, AHashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{TaxonomyError, TaxonomyResult};
use crate::types::TaxId;

pub type ParentMap = AHashMap<TaxId, TaxId>;
pub type NameMap = AHashMap<TaxId, String>;
pub type RankMap = AHashMap<TaxId, String>;
pub type MergedMap = AHashMap<TaxId, TaxId>;

/// The three read-only lookups annotation needs from a taxonomy database.
///
/// Implementations are shared across worker threads during a run, so they
/// must not mutate state visible to lookups.
pub trait TaxonomyService: Send + Sync {
    /// Ancestor chain from the root down to `taxid`, inclusive.
    fn lineage_of(&self, taxid: &str) -> TaxonomyResult<Vec<TaxId>>;

    /// Rank label of `taxid` (e.g. "genus", "no rank").
    fn rank_of(&self, taxid: TaxId) -> Option<&str>;

    /// Scientific name of `taxid`.
    fn name_of(&self, taxid: TaxId) -> Option<&str>;
}

/// In-memory taxonomy loaded from an NCBI taxdump directory or a
/// krakenuniq `taxDB` file.
#[derive(Debug, Default, Clone)]
pub struct TaxDb {
    parent_map: ParentMap,
    name_map: NameMap,
    rank_map: RankMap,
    merged_map: MergedMap,
}

impl TaxDb {
    /// Opens `path` as a taxdump directory (`nodes.dmp`, `names.dmp`,
    /// optional `merged.dmp`) or, if it is a file, as a `taxDB` file.
    pub fn open<P: AsRef<Path>>(path: P) -> TaxonomyResult<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_taxdump(path)
        } else {
            let (parent_map, name_map, rank_map) = parse_taxdb(path)?;
            Ok(Self {
                parent_map,
                name_map,
                rank_map,
                merged_map: MergedMap::new(),
            })
        }
    }

    pub fn from_taxdump<P: AsRef<Path>>(dir: P) -> TaxonomyResult<Self> {
        let dir = dir.as_ref();
        let (parent_map, rank_map) = parse_nodes_dmp(dir.join("nodes.dmp"))?;
        let name_map = parse_names_dmp(dir.join("names.dmp"))?;
        let merged_path = dir.join("merged.dmp");
        let merged_map = if merged_path.exists() {
            parse_merged_dmp(merged_path)?
        } else {
            MergedMap::new()
        };
        log::debug!(
            "Loaded {} taxa, {} names, {} merged ids from {}",
            parent_map.len(),
            name_map.len(),
            merged_map.len(),
            dir.display()
        );
        Ok(Self {
            parent_map,
            name_map,
            rank_map,
            merged_map,
        })
    }

    /// Builds a database from `(taxid, parent, name, rank)` records.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = (TaxId, TaxId, &'a str, &'a str)>,
    {
        let mut db = Self::default();
        for (taxid, parent, name, rank) in records {
            db.parent_map.insert(taxid, parent);
            db.name_map.insert(taxid, name.to_string());
            db.rank_map.insert(taxid, rank.to_string());
        }
        db
    }

    /// Records that `old` was merged into `new` upstream.
    pub fn add_merged(&mut self, old: TaxId, new: TaxId) {
        self.merged_map.insert(old, new);
    }

    pub fn len(&self) -> usize {
        self.parent_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_map.is_empty()
    }

    /// Parses a textual identifier and follows merged-id translation.
    fn canonical_taxid(&self, taxid: &str) -> TaxonomyResult<TaxId> {
        let parsed: TaxId = taxid
            .trim()
            .parse()
            .map_err(|_| TaxonomyError::UnknownTaxon(taxid.to_string()))?;
        if self.parent_map.contains_key(&parsed) {
            return Ok(parsed);
        }
        match self.merged_map.get(&parsed) {
            Some(&merged) if self.parent_map.contains_key(&merged) => {
                log::warn!("taxid {} was merged into {}", parsed, merged);
                Ok(merged)
            }
            _ => Err(TaxonomyError::UnknownTaxon(taxid.to_string())),
        }
    }
}

impl TaxonomyService for TaxDb {
    fn lineage_of(&self, taxid: &str) -> TaxonomyResult<Vec<TaxId>> {
        let mut node = self.canonical_taxid(taxid)?;
        let mut lineage = Vec::with_capacity(32);
        let mut seen = AHashSet::with_capacity(32);
        loop {
            if !seen.insert(node) {
                log::warn!("parent cycle detected above taxid {} at {}", taxid, node);
                return Err(TaxonomyError::ParentCycle {
                    taxid: taxid.to_string(),
                    node,
                });
            }
            lineage.push(node);
            match self.parent_map.get(&node) {
                Some(&p) if p != node && p != 0 => node = p,
                _ => break,
            }
        }
        lineage.reverse();
        Ok(lineage)
    }

    fn rank_of(&self, taxid: TaxId) -> Option<&str> {
        self.rank_map.get(&taxid).map(String::as_str)
    }

    fn name_of(&self, taxid: TaxId) -> Option<&str> {
        self.name_map.get(&taxid).map(String::as_str)
    }
}

/// Parses a taxDB file in the format:
/// ```text
/// <taxid>\t<parentid>\t<taxname>\t<rank>
/// ```
/// Returns:
/// - a `ParentMap` mapping child_taxid -> parent_taxid
/// - a `NameMap` mapping taxid -> taxname
/// - a `RankMap` mapping taxid -> rank
pub fn parse_taxdb<P: AsRef<Path>>(
    filepath: P,
) -> TaxonomyResult<(ParentMap, NameMap, RankMap)> {
    let path = filepath.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut parent_map = ParentMap::new();
    let mut name_map = NameMap::new();
    let mut rank_map = RankMap::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        // e.g. "2   1   Eukaryota   domain"
        let parts: Vec<&str> = line.split('\t').collect();

        // Skip lines that are not taxon records
        if parts.len() < 4 {
            continue;
        }

        let taxid = parse_dmp_id(path, idx + 1, parts[0])?;
        let parentid = parse_dmp_id(path, idx + 1, parts[1])?;

        parent_map.insert(taxid, parentid);
        name_map.insert(taxid, parts[2].trim().to_string());
        rank_map.insert(taxid, parts[3].trim().to_string());
    }
    Ok((parent_map, name_map, rank_map))
}

/// Splits one `.dmp` record: fields are separated by `\t|\t` and the line
/// ends with `\t|`.
fn dmp_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\n', '\r'])
        .trim_end_matches("\t|")
        .split("\t|\t")
        .collect()
}

fn parse_dmp_id(path: &Path, line_no: usize, field: &str) -> TaxonomyResult<TaxId> {
    field.trim().parse().map_err(|_| TaxonomyError::MalformedDatabase {
        path: PathBuf::from(path),
        line: line_no,
        reason: format!("invalid taxid {:?}", field),
    })
}

/// `nodes.dmp`: taxid, parent taxid, rank, ...
fn parse_nodes_dmp<P: AsRef<Path>>(path: P) -> TaxonomyResult<(ParentMap, RankMap)> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut parent_map = ParentMap::new();
    let mut rank_map = RankMap::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.is_empty() {
            continue;
        }
        let parts = dmp_fields(&line);
        if parts.len() < 3 {
            return Err(TaxonomyError::MalformedDatabase {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: "expected at least 3 fields".to_string(),
            });
        }
        let taxid = parse_dmp_id(path, idx + 1, parts[0])?;
        let parent = parse_dmp_id(path, idx + 1, parts[1])?;
        parent_map.insert(taxid, parent);
        rank_map.insert(taxid, parts[2].trim().to_string());
    }
    Ok((parent_map, rank_map))
}

/// `names.dmp`: taxid, name, unique name, name class. Only scientific
/// names are kept.
fn parse_names_dmp<P: AsRef<Path>>(path: P) -> TaxonomyResult<NameMap> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut name_map = NameMap::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let parts = dmp_fields(&line);
        if parts.len() < 4 || parts[3].trim() != "scientific name" {
            continue;
        }
        let taxid = parse_dmp_id(path, idx + 1, parts[0])?;
        name_map.insert(taxid, parts[1].trim().to_string());
    }
    Ok(name_map)
}

/// `merged.dmp`: old taxid, new taxid.
fn parse_merged_dmp<P: AsRef<Path>>(path: P) -> TaxonomyResult<MergedMap> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut merged_map = MergedMap::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let parts = dmp_fields(&line);
        if parts.len() < 2 {
            continue;
        }
        let old = parse_dmp_id(path, idx + 1, parts[0])?;
        let new = parse_dmp_id(path, idx + 1, parts[1])?;
        merged_map.insert(old, new);
    }
    Ok(merged_map)
}


#[cfg(test)]
mod tests {
    use super::fixture::test_taxdb;
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lineage_is_root_first_and_inclusive() {
        let db = test_taxdb();
        assert_eq!(
            db.lineage_of("9606").unwrap(),
            vec![1, 2759, 33208, 7711, 40674, 9443, 9606]
        );
        assert_eq!(db.lineage_of("1").unwrap(), vec![1]);
    }

    #[test]
    fn test_unknown_and_malformed_ids_fail() {
        let db = test_taxdb();
        assert!(matches!(db.lineage_of("99999"), Err(TaxonomyError::UnknownTaxon(id)) if id == "99999"));
        assert!(matches!(db.lineage_of("abc"), Err(TaxonomyError::UnknownTaxon(_))));
        assert!(matches!(db.lineage_of(""), Err(TaxonomyError::UnknownTaxon(_))));
    }

    #[test]
    fn test_merged_ids_are_translated() {
        let db = test_taxdb();
        assert_eq!(db.lineage_of("1806490").unwrap(), db.lineage_of("562").unwrap());
    }

    #[test]
    fn test_rank_and_name_lookup() {
        let db = test_taxdb();
        assert_eq!(db.rank_of(7711), Some("phylum"));
        assert_eq!(db.name_of(562), Some("Escherichia coli"));
        assert_eq!(db.name_of(123), None);
    }

    #[test]
    fn test_parse_taxdump_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut nodes = File::create(dir.path().join("nodes.dmp")).unwrap();
        writeln!(nodes, "1\t|\t1\t|\tno rank\t|\t\t|").unwrap();
        writeln!(nodes, "2\t|\t131567\t|\tsuperkingdom\t|\t\t|").unwrap();
        writeln!(nodes, "131567\t|\t1\t|\tno rank\t|\t\t|").unwrap();
        let mut names = File::create(dir.path().join("names.dmp")).unwrap();
        writeln!(names, "1\t|\troot\t|\t\t|\tscientific name\t|").unwrap();
        writeln!(names, "2\t|\tBacteria\t|\tBacteria <bacteria>\t|\tscientific name\t|").unwrap();
        writeln!(names, "2\t|\teubacteria\t|\t\t|\tgenbank common name\t|").unwrap();
        let mut merged = File::create(dir.path().join("merged.dmp")).unwrap();
        writeln!(merged, "12\t|\t2\t|").unwrap();

        let db = TaxDb::open(dir.path()).unwrap();
        assert_eq!(db.len(), 3);
        assert_eq!(db.name_of(2), Some("Bacteria"));
        assert_eq!(db.rank_of(2), Some("superkingdom"));
        assert_eq!(db.lineage_of("12").unwrap(), vec![1, 131567, 2]);
    }

    #[test]
    fn test_malformed_nodes_dmp_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nodes.dmp"), "x\t|\t1\t|\tno rank\t|\n").unwrap();
        std::fs::write(dir.path().join("names.dmp"), "").unwrap();
        assert!(matches!(
            TaxDb::open(dir.path()),
            Err(TaxonomyError::MalformedDatabase { line: 1, .. })
        ));
    }

    #[test]
    fn test_parent_cycle_is_an_error() {
        let db = TaxDb::from_records([(5, 6, "A", "genus"), (6, 5, "B", "family")]);
        match db.lineage_of("5") {
            Err(TaxonomyError::ParentCycle { taxid, node }) => {
                assert_eq!(taxid, "5");
                assert_eq!(node, 5);
            }
            other => panic!("expected a parent cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_above_a_valid_prefix_is_an_error() {
        let db = TaxDb::from_records([
            (7, 8, "Leaf", "species"),
            (8, 9, "Mid", "genus"),
            (9, 8, "Top", "family"),
        ]);
        assert!(matches!(
            db.lineage_of("7"),
            Err(TaxonomyError::ParentCycle { node: 8, .. })
        ));
    }

    #[test]
    fn test_taxdb_file_with_bad_parent_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1\t1\troot\tno rank").unwrap();
        writeln!(file, "2759\tone\tEukaryota\tdomain").unwrap();
        assert!(matches!(
            TaxDb::open(file.path()),
            Err(TaxonomyError::MalformedDatabase { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_krakenuniq_taxdb_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1\t1\troot\tno rank").unwrap();
        writeln!(file, "2759\t1\tEukaryota\tdomain").unwrap();
        writeln!(file, "garbage line").unwrap();
        let db = TaxDb::open(file.path()).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.lineage_of("2759").unwrap(), vec![1, 2759]);
        assert_eq!(db.rank_of(2759), Some("domain"));
    }
}
