//src/types.rs

/// Numeric NCBI taxon identifier, as stored in the taxonomy database.
pub type TaxId = u32;

/// Display name at one rank slot. `None` is the "absent" sentinel: the
/// candidate's lineage has no ancestor at that rank.
pub type TaxonName = Option<String>;

/// One slot per requested rank, in the caller's rank order.
pub type RankVector = Vec<TaxonName>;

/// How the absent sentinel is rendered in output tables.
pub const ABSENT_NAME: &str = "Nan";

/// Ranks extracted when the caller does not supply a list.
pub const DEFAULT_RANKS: [&str; 11] = [
    "kingdom",
    "phylum",
    "superclass",
    "class",
    "subclass",
    "order",
    "infraorder",
    "superfamily",
    "family",
    "genus",
    "species",
];

/// Fixed leading columns of the annotated table.
pub const OUTPUT_PREFIX_HEADERS: [&str; 3] = ["query", "perc_id", "sbjct_len"];

/// One row of a tabular BLAST report, kept verbatim as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlastHit {
    pub fields: Vec<String>,
}

impl BlastHit {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Splits a raw tab-separated line.
    pub fn from_line(line: &str) -> Self {
        Self {
            fields: line.split('\t').map(str::to_string).collect(),
        }
    }

    /// Query identifier, always column 1.
    pub fn query_id(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }

    /// Field at a 1-based column position.
    pub fn column(&self, column: usize) -> Option<&str> {
        column
            .checked_sub(1)
            .and_then(|idx| self.fields.get(idx))
            .map(String::as_str)
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }

    /// The row as it appeared in the input.
    pub fn to_line(&self) -> String {
        self.fields.join("\t")
    }
}

/// A successfully annotated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedRow {
    pub query: String,
    pub perc_id: String,
    pub sbjct_len: String,
    /// Consensus names, possibly shorter than the requested rank list.
    pub taxonomy: RankVector,
}

impl AnnotatedRow {
    /// Tab-separated rendering, padded with empty cells up to `width` rank slots.
    pub fn to_line(&self, width: usize) -> String {
        let mut cells: Vec<&str> = Vec::with_capacity(3 + width.max(self.taxonomy.len()));
        cells.push(&self.query);
        cells.push(&self.perc_id);
        cells.push(&self.sbjct_len);
        for name in &self.taxonomy {
            cells.push(name.as_deref().unwrap_or(ABSENT_NAME));
        }
        for _ in self.taxonomy.len()..width {
            cells.push("");
        }
        cells.join("\t")
    }
}

/// A row whose candidate set could not be resolved, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub hit: BlastHit,
    /// The candidate identifier that failed to resolve.
    pub taxid: String,
}
