use crate::error::{PrepError, Result};
use crate::{sample_name, Cohort, FrequencyMatrix};
use csv;
use log::{debug, warn};
use ndarray;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CoverageRow {
    #[serde(rename = "#chr")]
    chr: String,
    pos: u64,
    coverage: u64,
}

/// Per base read depth of one sample, keyed by reference and position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageTable {
    depths: HashMap<String, HashMap<u64, u64>>,
}

impl CoverageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: &str, pos: u64, depth: u64) {
        self.depths
            .entry(reference.into())
            .or_insert_with(HashMap::new)
            .insert(pos, depth);
    }

    pub fn depth(&self, reference: &str, pos: u64) -> Option<u64> {
        self.depths.get(reference).and_then(|d| d.get(&pos)).copied()
    }

    /// Whether the position has an entry deeper than `min_coverage`.
    pub fn is_covered(&self, reference: &str, pos: u64, min_coverage: u64) -> bool {
        matches!(self.depth(reference, pos), Some(depth) if depth > min_coverage)
    }

    pub fn len(&self) -> usize {
        self.depths.values().map(|d| d.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a tab separated table with `#chr`, `pos` and `coverage` columns.
    pub fn from_reader(reader: Box<dyn Read>) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(reader);
        let mut table = Self::new();
        for row in rdr.deserialize() {
            let row: CoverageRow = row?;
            table.insert(&row.chr, row.pos, row.coverage);
        }
        Ok(table)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        Self::from_reader(Box::new(file))
    }
}

/// Loads coverage tables keyed by sample name, the file name without extension.
pub fn load_coverage_tables<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<HashMap<String, CoverageTable>> {
    let tables = paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            Ok((sample_name(path), CoverageTable::from_path(path)?))
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("loaded {} coverage tables", tables.len());
    Ok(tables.into_iter().collect())
}

/// Masks cells that have no observed frequency and no reliable coverage.
///
/// A cell is masked when its value is 0 and the sample's table has no entry
/// for the position, or a depth of at most `min_coverage`. Samples without a
/// table keep their row unmasked.
pub fn mask_uncovered(
    cohort: &Cohort,
    tables: &HashMap<String, CoverageTable>,
    reference: &str,
    min_coverage: u64,
) -> Result<Cohort> {
    let row_tables: ndarray::Array1<Option<&CoverageTable>> = cohort
        .samples()
        .iter()
        .map(|sample| {
            let table = tables.get(sample);
            if table.is_none() {
                warn!("{} was not found in coverage tables", sample);
            }
            table
        })
        .collect();
    let positions: Vec<u64> = cohort.mutations().iter().map(|m| m.pos()).collect();

    let data = cohort.matrix().data();
    let mut mask = cohort.matrix().mask().clone();
    ndarray::Zip::from(mask.rows_mut())
        .and(data.rows())
        .and(&row_tables)
        .par_for_each(|mut masked, values, table| {
            if let Some(table) = table {
                for ((m, value), pos) in masked.iter_mut().zip(values.iter()).zip(&positions) {
                    if *value == 0.0 && !table.is_covered(reference, *pos, min_coverage) {
                        *m = true;
                    }
                }
            }
        });

    let matrix = FrequencyMatrix::from_parts(data.clone(), mask)?;
    debug!("{} cells masked for low coverage", matrix.n_masked());
    cohort.clone().with_matrix(matrix)
}
