use crate::coverage::{load_coverage_tables, mask_uncovered};
use crate::error::{PrepError, Result};
use crate::filter::{delete_common_mutations, delete_rare_mutations, DEFAULT_COMMON_SPREAD};
use crate::gff3::{genome_end, AnnotationIndex, Gff3Builder};
use crate::matrix::MatrixBuilder;
use crate::scores::{ScoreTableBuilder, ScoredMutation};
use crate::tracks::{layout_tracks, TrackLayout};
use crate::Cohort;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings of one data preparation run.
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sequence id selecting VCF, GFF3 and coverage lines
    pub reference: String,
    /// Minimum allele frequency for a variant to be counted
    pub min_frequency: f64,
    /// Depth at or below which an unobserved position is masked
    pub min_coverage: u64,
    pub delete_common: bool,
    pub common_spread: f64,
    /// Keep only mutations found in more than this many samples
    pub min_samples: Option<usize>,
    /// Inclusive window of positions to keep
    pub zoom: Option<(u64, u64)>,
    pub annotation_types: Vec<String>,
    pub with_aa_change: bool,
    pub sort_samples: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference: String::new(),
            min_frequency: 0.0,
            min_coverage: 20,
            delete_common: false,
            common_spread: DEFAULT_COMMON_SPREAD,
            min_samples: None,
            zoom: None,
            annotation_types: vec!["gene".to_owned()],
            with_aa_change: false,
            sort_samples: false,
        }
    }
}

impl PipelineConfig {
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_owned(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.reference.is_empty() {
            return Err(PrepError::config("reference must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.min_frequency) {
            return Err(PrepError::config(format!(
                "min_frequency {} is outside [0, 1]",
                self.min_frequency
            )));
        }
        if self.common_spread < 0.0 {
            return Err(PrepError::config(format!(
                "common_spread {} is negative",
                self.common_spread
            )));
        }
        if let Some((start, stop)) = self.zoom {
            if start > stop {
                return Err(PrepError::config(format!(
                    "zoom start {} is after stop {}",
                    start, stop
                )));
            }
        }
        Ok(())
    }
}

/// A score table and the columns to join on.
#[derive(Debug, Clone)]
pub struct ScoreSource {
    pub path: PathBuf,
    pub aa_column: String,
    pub score_column: String,
    pub delimiter: u8,
}

/// Files of one run. Coverage tables are matched to samples by file stem.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub vcf_paths: Vec<PathBuf>,
    pub coverage_paths: Vec<PathBuf>,
    pub gff3_path: Option<PathBuf>,
    pub scores: Option<ScoreSource>,
}

#[derive(Debug, Clone)]
pub struct PreparedData {
    pub cohort: Cohort,
    /// Mutation labels with scores, when a score table was given
    pub scored: Option<Vec<ScoredMutation>>,
    pub annotation: Option<AnnotationIndex>,
    pub genome_end: Option<u64>,
    pub layout: Option<TrackLayout>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reads, masks and filters the samples, then lays out the annotation.
    pub fn run(&self, inputs: &PipelineInputs) -> Result<PreparedData> {
        let config = &self.config;
        info!(
            "reading {} vcf files for {}",
            inputs.vcf_paths.len(),
            config.reference
        );
        let cohort = MatrixBuilder::new(&config.reference)
            .threshold(config.min_frequency)
            .with_aa_change(config.with_aa_change || inputs.scores.is_some())
            .sort_samples(config.sort_samples)
            .from_paths(&inputs.vcf_paths)?;

        let cohort = if inputs.coverage_paths.is_empty() {
            cohort
        } else {
            let tables = load_coverage_tables(&inputs.coverage_paths)?;
            mask_uncovered(&cohort, &tables, &config.reference, config.min_coverage)?
        };
        let cohort = if config.delete_common {
            delete_common_mutations(&cohort, config.common_spread)
        } else {
            cohort
        };
        let cohort = match config.min_samples {
            Some(min_samples) => delete_rare_mutations(&cohort, min_samples),
            None => cohort,
        };
        let cohort = match config.zoom {
            Some((start, stop)) => cohort.zoom(start, stop),
            None => cohort,
        };
        if cohort.is_empty() {
            warn!("no mutations left after filtering");
        }
        info!(
            "{} mutations in {} samples after filtering",
            cohort.mutations().len(),
            cohort.samples().len()
        );

        let scored = match &inputs.scores {
            Some(source) => Some(
                ScoreTableBuilder::new(&source.aa_column, &source.score_column)
                    .delimiter(source.delimiter)
                    .from_path(&source.path)?
                    .annotate(cohort.mutations()),
            ),
            None => None,
        };

        let (annotation, end, layout) = match &inputs.gff3_path {
            Some(path) => {
                let index = Gff3Builder::new(&config.reference).from_path(path)?;
                let end = genome_end(&index)?;
                let layout = layout_tracks(cohort.mutations(), &index, &config.annotation_types);
                (Some(index), Some(end), Some(layout))
            }
            None => (None, None, None),
        };

        Ok(PreparedData {
            cohort,
            scored,
            annotation,
            genome_end: end,
            layout,
        })
    }
}
