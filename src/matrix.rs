use crate::error::{PrepError, Result};
use crate::vcf::{VariantRecord, VariantRecords, VcfBuilder};
use crate::{sample_name, Cohort, FrequencyList, FrequencyMatrix, MutationId};
use log::{debug, info};
use ndarray;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// Suffix used when a record carries no effect annotation.
pub const NO_AA_CHANGE: &str = "-";

/// Amino acid change from the fourth `|` segment of the `EFF` INFO field.
fn aa_change(record: &VariantRecord) -> String {
    record
        .info
        .get("EFF")
        .and_then(|v| v.as_ref())
        .and_then(|eff| {
            let eff = eff.to_string();
            eff.split('|')
                .nth(3)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| NO_AA_CHANGE.to_owned())
}

/// Mutations of one sample with an allele frequency of at least `threshold`.
///
/// Records without an `AF` value, or with one outside [0, 1], are skipped.
/// When an id occurs more than once the first frequency is kept.
pub fn frequency_list(records: &VariantRecords, threshold: f64, with_aa_change: bool) -> FrequencyList {
    let mut seen = HashSet::new();
    let mut list = FrequencyList::new();
    for record in records.iter() {
        let af = match record.allele_frequency {
            Some(af) => af,
            None => {
                debug!("{}:{} has no AF value, skipped", record.chrom, record.pos);
                continue;
            }
        };
        if !(0.0..=1.0).contains(&af) {
            debug!("{}:{} has AF {} outside [0, 1], skipped", record.chrom, record.pos, af);
            continue;
        }
        if af < threshold {
            continue;
        }
        let mut id = MutationId::new(
            record.pos,
            &record.ref_allele,
            &record.alt,
            record.mutation_type,
        );
        if with_aa_change {
            id = id.with_aa_change(&aa_change(record));
        }
        if seen.insert(id.clone()) {
            list.push((id, af));
        }
    }
    list
}

/// Union of all mutations, sorted by position.
pub fn unique_mutations(lists: &[FrequencyList], reference: &str) -> Result<Vec<MutationId>> {
    let union: BTreeSet<&MutationId> = lists
        .iter()
        .flat_map(|list| list.iter().map(|(id, _)| id))
        .collect();
    if union.is_empty() {
        return Err(PrepError::NoVariantsFound {
            reference: reference.to_owned(),
        });
    }
    Ok(union.into_iter().cloned().collect())
}

/// Dense samples x mutations matrix; a mutation a sample lacks is 0.
pub fn create_frequency_matrix(
    mutations: &[MutationId],
    lists: &[FrequencyList],
) -> Result<FrequencyMatrix> {
    let columns: HashMap<&MutationId, usize> =
        mutations.iter().enumerate().map(|(c, id)| (id, c)).collect();
    let mut data = ndarray::Array2::zeros((lists.len(), mutations.len()));
    for (row, list) in lists.iter().enumerate() {
        // reversed so the first occurrence wins
        for (id, af) in list.iter().rev() {
            if let Some(c) = columns.get(id) {
                data[[row, *c]] = *af;
            }
        }
    }
    let mask = ndarray::Array2::from_elem(data.dim(), false);
    FrequencyMatrix::from_parts(data, mask)
}

/// Sort key putting `s2` before `s10`.
///
/// Compares the name with its digits removed, then the first run of digits
/// as a number. Names without digits sort after numbered ones.
pub fn natural_key(name: &str) -> (String, u64) {
    let alpha: String = name.chars().filter(|c| !c.is_ascii_digit()).collect();
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (alpha, digits.parse().unwrap_or(u64::MAX))
}

pub struct MatrixBuilder {
    reference: String,
    threshold: f64,
    with_aa_change: bool,
    sort_samples: bool,
}

impl MatrixBuilder {
    /// Construct a new matrix builder for variants of `reference`
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_owned(),
            threshold: 0.0,
            with_aa_change: false,
            sort_samples: false,
        }
    }

    /// Minimum allele frequency for a record to count as observed.
    pub fn threshold(&mut self, threshold: f64) -> &mut Self {
        self.threshold = threshold;
        self
    }

    /// Append the amino acid change from `EFF` to every mutation id.
    pub fn with_aa_change(&mut self, with_aa_change: bool) -> &mut Self {
        self.with_aa_change = with_aa_change;
        self
    }

    /// Order samples by `natural_key` instead of input order.
    pub fn sort_samples(&mut self, sort_samples: bool) -> &mut Self {
        self.sort_samples = sort_samples;
        self
    }

    /// Reads one VCF per sample in parallel and builds the cohort.
    pub fn from_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Cohort> {
        let mut paths: Vec<&Path> = paths.iter().map(|p| p.as_ref()).collect();
        if self.sort_samples {
            paths.sort_by_cached_key(|p| natural_key(&sample_name(p)));
        }
        let vcf = VcfBuilder::new(&self.reference);
        let samples = paths
            .par_iter()
            .map(|path| Ok((sample_name(path), vcf.from_path(path)?.into_records())))
            .collect::<Result<Vec<_>>>()?;
        self.from_records(samples)
    }

    pub fn from_records(&self, samples: Vec<(String, VariantRecords)>) -> Result<Cohort> {
        let lists: Vec<FrequencyList> = samples
            .par_iter()
            .map(|(_, records)| frequency_list(records, self.threshold, self.with_aa_change))
            .collect();
        let mutations = unique_mutations(&lists, &self.reference)?;
        let matrix = create_frequency_matrix(&mutations, &lists)?;
        info!(
            "{} unique mutations to {} across {} samples",
            mutations.len(),
            self.reference,
            samples.len()
        );
        let names = samples.into_iter().map(|(name, _)| name).collect();
        Cohort::new(names, mutations, matrix)
    }
}
