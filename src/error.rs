use std::path::PathBuf;

use thiserror::Error;

/// Failure to derive a sample identity from a file stem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("stem '{stem}': position token '{token}' contains no digits")]
    MissingPositionDigits { stem: String, token: String },
    #[error("stem '{stem}': position '{digits}' does not fit in an integer")]
    PositionOverflow { stem: String, digits: String },
}

/// Fatal failures of the spectrum reader.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("spectrum file does not exist: {0}")]
    NotFound(PathBuf),
    #[error("spectrum path is not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("unsupported spectrum file suffix '.{suffix}': {path}")]
    UnsupportedFormat { path: PathBuf, suffix: String },
    #[error("no numeric rows found in {0}")]
    NoNumericRows(PathBuf),
    /// Format-level failures coming out of the csv / json / parquet loaders.
    #[error(transparent)]
    Malformed(#[from] anyhow::Error),
}

/// The discrepancy kinds raised when a persisted index mirror and a
/// freshly built record set disagree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexValidationError {
    #[error("index headers differ: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("index row counts differ: {expected} live rows, {found} persisted rows")]
    RowCountMismatch { expected: usize, found: usize },
    #[error("index rows differ: {}", .rows.join("; "))]
    RowMismatch { rows: Vec<String> },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Validation(#[from] IndexValidationError),
    #[error("index I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("index mirror {path} is not valid CSV: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("index mirror row {row}: {message}")]
    MalformedRow { row: usize, message: String },
    #[error("cannot identify {path}: {source}")]
    Identity {
        path: PathBuf,
        #[source]
        source: IdentityError,
    },
    #[error("scanning {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("could not replace index mirror {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
    #[error("no index file to load and no directory to scan")]
    NoSource,
}

/// Raised when the spectra of one region cannot be averaged element-wise.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregationError {
    #[error(
        "region '{region}': sampling grid of {offending:?} differs from reference {reference:?}"
    )]
    GridMismatch {
        region: String,
        reference: PathBuf,
        offending: Vec<PathBuf>,
    },
}

/// Everything that can stop a single (group, sample) unit.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("group is empty")]
    Empty,
    #[error("multiple source files for a single position on a sample: {positions:?}")]
    DuplicatePosition { positions: Vec<String> },
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}
