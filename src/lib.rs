#![crate_name = "virheat_prep"]
use ndarray;
use ndarray::ShapeBuilder;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub mod prelude;

pub mod coverage;
pub mod error;
pub mod filter;
pub mod gff3;
pub mod matrix;
pub mod pipeline;
pub mod scores;
pub mod tracks;
pub mod vcf;

use crate::error::{PrepError, Result};

/// INFO values of a single allele, keyed by INFO key.
pub type Info = BTreeMap<String, Option<Value>>;
/// Observed frequency of every mutation in one sample.
pub type FrequencyList = Vec<(MutationId, f64)>;

/// A scalar coerced from a text field
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Coerces a field into the narrowest fitting scalar.
    ///
    /// Strings of ASCII digits become integers, strings that are all digits
    /// once a single `.` is removed become floats, anything else stays text.
    pub fn parse(field: &str) -> Self {
        let field = field.trim_end_matches(|c| c == '\n' || c == '\r');
        if is_decimal(field) {
            if let Ok(i) = field.parse::<i64>() {
                return Value::Integer(i);
            }
        }
        if is_decimal(&field.replacen('.', "", 1)) {
            if let Ok(f) = field.parse::<f64>() {
                return Value::Float(f);
            }
        }
        Value::Text(field.to_owned())
    }

    /// Numeric view; text is accepted when it parses, e.g. `1e-4`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Kind of change an ALT allele makes relative to REF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MutationType {
    Snv,
    Ins,
    Del,
}

impl MutationType {
    /// Classifies an allele by comparing REF and ALT lengths.
    pub fn classify(ref_allele: &str, alt: &str) -> Self {
        let (r, a) = (ref_allele.chars().count(), alt.chars().count());
        if a > r {
            MutationType::Ins
        } else if a < r {
            MutationType::Del
        } else {
            MutationType::Snv
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MutationType::Snv => "SNV",
            MutationType::Ins => "INS",
            MutationType::Del => "DEL",
        }
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationType {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SNV" => Ok(MutationType::Snv),
            "INS" => Ok(MutationType::Ins),
            "DEL" => Ok(MutationType::Del),
            other => Err(PrepError::InvalidMutationId(format!(
                "unknown mutation type {}",
                other
            ))),
        }
    }
}

/// Join key of a mutation across samples.
///
/// Displays as `pos_ref_alt_TYPE`, with `_aa` appended when an amino acid
/// change was extracted. Field order makes the derived `Ord` sort by
/// numeric position first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId {
    pos: u64,
    ref_allele: String,
    alt: String,
    mutation_type: MutationType,
    aa_change: Option<String>,
}

impl MutationId {
    pub fn new(pos: u64, ref_allele: &str, alt: &str, mutation_type: MutationType) -> Self {
        Self {
            pos,
            ref_allele: ref_allele.into(),
            alt: alt.into(),
            mutation_type,
            aa_change: None,
        }
    }

    pub fn with_aa_change(mut self, aa_change: &str) -> Self {
        self.aa_change = Some(aa_change.into());
        self
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    pub fn alt(&self) -> &str {
        &self.alt
    }

    pub fn mutation_type(&self) -> MutationType {
        self.mutation_type
    }

    pub fn aa_change(&self) -> Option<&str> {
        self.aa_change.as_deref()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.pos, self.ref_allele, self.alt, self.mutation_type
        )?;
        if let Some(aa) = &self.aa_change {
            write!(f, "_{}", aa)?;
        }
        Ok(())
    }
}

impl FromStr for MutationId {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        // the amino acid change may itself contain '_', e.g. `p.Ser2_Leu3del`
        let parts: Vec<&str> = s.splitn(5, '_').collect();
        if parts.len() < 4 {
            return Err(PrepError::InvalidMutationId(s.to_owned()));
        }
        let pos = parts[0]
            .parse()
            .map_err(|_| PrepError::InvalidMutationId(s.to_owned()))?;
        let id = MutationId::new(pos, parts[1], parts[2], parts[3].parse()?);
        Ok(match parts.get(4) {
            Some(aa) => id.with_aa_change(aa),
            None => id,
        })
    }
}

/// Samples x mutations allele frequencies with a missing-data mask.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyMatrix {
    data: ndarray::Array2<f64>,
    mask: ndarray::Array2<bool>,
}

impl FrequencyMatrix {
    pub fn zeros(samples: usize, mutations: usize) -> Self {
        Self {
            data: ndarray::Array2::zeros((samples, mutations)),
            mask: ndarray::Array2::from_elem((samples, mutations), false),
        }
    }

    /// Builds an unmasked matrix from row-major data.
    pub fn from_vec(samples: usize, data: Vec<f64>) -> Result<Self> {
        let mutations = if samples == 0 { 0 } else { data.len() / samples };
        let data = ndarray::Array::from_shape_vec(
            (samples, mutations).strides((mutations, 1)),
            data,
        )?;
        let mask = ndarray::Array2::from_elem(data.dim(), false);
        Ok(Self { data, mask })
    }

    pub fn from_parts(data: ndarray::Array2<f64>, mask: ndarray::Array2<bool>) -> Result<Self> {
        if data.dim() != mask.dim() {
            return Err(PrepError::config(format!(
                "mask shape {:?} does not match data shape {:?}",
                mask.dim(),
                data.dim()
            )));
        }
        Ok(Self { data, mask })
    }

    /// (samples, mutations)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_mutations(&self) -> usize {
        self.data.ncols()
    }

    /// The frequency at a cell, `None` when masked or out of bounds.
    pub fn get(&self, sample: usize, mutation: usize) -> Option<f64> {
        match self.mask.get((sample, mutation)) {
            Some(false) => self.data.get((sample, mutation)).copied(),
            _ => None,
        }
    }

    pub fn is_masked(&self, sample: usize, mutation: usize) -> bool {
        self.mask.get((sample, mutation)).copied().unwrap_or(false)
    }

    /// Raw frequencies; masked cells hold 0.
    pub fn data(&self) -> &ndarray::Array2<f64> {
        &self.data
    }

    pub fn mask(&self) -> &ndarray::Array2<bool> {
        &self.mask
    }

    pub fn n_masked(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    /// A new matrix holding only the given columns, in the given order.
    pub fn select_columns(&self, columns: &[usize]) -> Self {
        Self {
            data: self.data.select(ndarray::Axis(1), columns),
            mask: self.mask.select(ndarray::Axis(1), columns),
        }
    }
}

/// Samples, their sorted mutation axis and the frequency matrix, kept aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    samples: Vec<String>,
    mutations: Vec<MutationId>,
    matrix: FrequencyMatrix,
}

impl Cohort {
    pub fn new(
        samples: Vec<String>,
        mutations: Vec<MutationId>,
        matrix: FrequencyMatrix,
    ) -> Result<Self> {
        if matrix.dim() != (samples.len(), mutations.len()) {
            return Err(PrepError::config(format!(
                "matrix shape {:?} does not match {} samples and {} mutations",
                matrix.dim(),
                samples.len(),
                mutations.len()
            )));
        }
        Ok(Self {
            samples,
            mutations,
            matrix,
        })
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn mutations(&self) -> &[MutationId] {
        &self.mutations
    }

    pub fn matrix(&self) -> &FrequencyMatrix {
        &self.matrix
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Keeps the mutations whose column satisfies `keep`, producing a new
    /// aligned cohort.
    pub fn retain_columns<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&MutationId, ndarray::ArrayView1<f64>) -> bool,
    {
        let columns: Vec<usize> = self
            .mutations
            .iter()
            .enumerate()
            .filter(|(idx, mutation)| keep(*mutation, self.matrix.data.column(*idx)))
            .map(|(idx, _)| idx)
            .collect();
        Self {
            samples: self.samples.clone(),
            mutations: columns.iter().map(|c| self.mutations[*c].clone()).collect(),
            matrix: self.matrix.select_columns(&columns),
        }
    }

    /// Restricts the cohort to mutations within the inclusive window.
    pub fn zoom(&self, start: u64, stop: u64) -> Self {
        self.retain_columns(|mutation, _| start <= mutation.pos() && mutation.pos() <= stop)
    }

    pub fn with_matrix(self, matrix: FrequencyMatrix) -> Result<Self> {
        Self::new(self.samples, self.mutations, matrix)
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<MutationId>, FrequencyMatrix) {
        (self.samples, self.mutations, self.matrix)
    }
}

/// Sample name of an input file: its file name without the last extension.
pub fn sample_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
