use serde::Serialize;

use crate::{
    chunk::RowBatch,
    extract::{CanonicalVariant, extract},
    format::InputFormat,
    reference::{ReferenceEntry, ReferenceTable},
};

/// Annotation fields with absent values normalized to empty text.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Annotation {
    pub phenotype: String,
    pub broken_genotype: String,
    pub gene: String,
}

impl Annotation {
    pub fn normalize(entry: &ReferenceEntry) -> Self {
        Self {
            phenotype: entry.phenotype.clone(),
            broken_genotype: entry.broken_geno.clone().unwrap_or_default(),
            gene: entry.gene.clone().unwrap_or_default(),
        }
    }
}

/// A variant found in the reference table, with its annotation merged in.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MatchedRecord {
    pub rsid: String,
    pub chromosome: String,
    pub position: String,
    pub genotype: String,
    pub phenotype: String,
    #[serde(rename = "broken_geno")]
    pub broken_genotype: String,
    pub gene: String,
}

impl MatchedRecord {
    pub fn new(variant: CanonicalVariant, annotation: Annotation) -> Self {
        Self {
            rsid: variant.rsid,
            chromosome: variant.chromosome,
            position: variant.position,
            genotype: variant.genotype,
            phenotype: annotation.phenotype,
            broken_genotype: annotation.broken_genotype,
            gene: annotation.gene,
        }
    }
}

/// Look `variant` up by exact identifier text.
pub fn match_variant(variant: CanonicalVariant, table: &ReferenceTable) -> Option<MatchedRecord> {
    let annotation = Annotation::normalize(table.get(&variant.rsid)?);
    Some(MatchedRecord::new(variant, annotation))
}

/// Row counters for one run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RunStats {
    pub batches: usize,
    pub rows: u64,
    pub skipped_rows: u64,
    pub extracted_rows: u64,
    pub matched_rows: u64,
}

/// Matched records in discovery order, plus the counters that produced them.
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    records: Vec<MatchedRecord>,
    stats: RunStats,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one batch into the result set.
    pub fn absorb(mut self, batch: &RowBatch, format: InputFormat, table: &ReferenceTable) -> Self {
        self.stats.batches += 1;
        for row in &batch.rows {
            self.stats.rows += 1;
            let Some(variant) = extract(format, row) else {
                self.stats.skipped_rows += 1;
                continue;
            };
            self.stats.extracted_rows += 1;
            if let Some(record) = match_variant(variant, table) {
                self.stats.matched_rows += 1;
                self.records.push(record);
            }
        }
        tracing::trace!(
            batch = batch.index,
            rows = batch.rows.len(),
            matched = self.records.len(),
            "absorbed batch"
        );
        self
    }

    pub fn records(&self) -> &[MatchedRecord] {
        &self.records
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_parts(self) -> (Vec<MatchedRecord>, RunStats) {
        (self.records, self.stats)
    }
}

/// Bytes processed against the expected total.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProgressState {
    processed: u64,
    total: u64,
    finished: bool,
}

impl ProgressState {
    pub fn new(total: u64) -> Self {
        Self {
            processed: 0,
            total,
            finished: false,
        }
    }

    /// Record progress; values below the current mark are ignored.
    pub fn advance(&mut self, processed: u64) {
        self.processed = self.processed.max(processed);
    }

    pub fn finish(&mut self) {
        self.processed = self.processed.max(self.total);
        self.finished = true;
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Percentage complete, clamped to `[0, 100]`.
    pub fn percent(&self) -> f64 {
        if self.finished {
            return 100.0;
        }
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0)
    }
}
