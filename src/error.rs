use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while streaming, clustering, or persisting results.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a file failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file has no header line.
    #[error("missing header line in {}", .0.display())]
    MissingHeader(PathBuf),

    /// A selected attribute index does not exist in the header.
    #[error("attribute index {index} out of range, file has {columns} columns")]
    AttributeOutOfRange { index: usize, columns: usize },

    /// Rows have inconsistent dimensionality.
    #[error("dimension mismatch on row {row}: expected {expected}, found {found}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// The file yielded more rows than the pass that sized the label array.
    #[error("row source changed between passes: expected {expected} rows, found more")]
    SourceChanged { expected: usize },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },

    /// Unknown timeline bucket name.
    #[error("invalid time span {0:?}, expected one of day, hour, minute, second")]
    InvalidTimeSpan(String),

    /// Serializing or deserializing a cached result failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Workers exited without reporting a result (usually a panic).
    #[error("{0} cluster worker(s) exited without a result")]
    WorkerLost(usize),

    /// The task was cancelled because a sibling task failed.
    #[error("cluster task for k = {0} cancelled")]
    Cancelled(usize),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
