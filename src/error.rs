use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a data preparation run.
///
/// Conditions that only degrade a single sample (missing header, no
/// variants for the reference, no coverage table) are logged instead.
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// A line of an input file could not be parsed.
    #[error("malformed record in {source_name} at line {line}: {message}")]
    MalformedRecord {
        source_name: String,
        line: u64,
        message: String,
    },

    #[error("no variants to {reference} in all vcf files")]
    NoVariantsFound { reference: String },

    #[error("{reference} not found in gff3 file")]
    ReferenceNotFound { reference: String },

    #[error("region annotation is missing in the gff3")]
    MissingRegion,

    #[error("column {column} not found in {source_name}")]
    MissingColumn { source_name: String, column: String },

    #[error("invalid mutation identifier: {0}")]
    InvalidMutationId(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = PrepError> = std::result::Result<T, E>;

impl PrepError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(source_name: &str, line: u64, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            source_name: source_name.to_owned(),
            line,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
