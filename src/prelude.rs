pub use crate::coverage::{load_coverage_tables, mask_uncovered, CoverageTable};
pub use crate::error::{PrepError, Result};
pub use crate::filter::{delete_common_mutations, delete_rare_mutations, zoom_to_region};
pub use crate::gff3::{genome_end, AnnotationIndex, Feature, Gff3Builder, Strand};
pub use crate::matrix::{create_frequency_matrix, frequency_list, unique_mutations, MatrixBuilder};
pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineInputs, PreparedData};
pub use crate::scores::{ScoreTable, ScoreTableBuilder, ScoredMutation};
pub use crate::tracks::{layout_tracks, GeneTrack, TrackLayout};
pub use crate::vcf::{VariantRecord, VariantRecords, VcfBuilder, VcfOutcome};
pub use crate::{Cohort, FrequencyList, FrequencyMatrix, Info, MutationId, MutationType, Value};
