use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Largest cluster count evaluated by the elbow run; k ranges over `1..=K_MAX`.
pub const K_MAX: usize = 10;

/// Centroids moving less than this (squared distance) are considered stable.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Configuration options for a streaming elbow run.
#[derive(Debug, Clone)]
pub struct ElbowConfig {
    /// Path to the (normalized) delimited file.
    pub path: PathBuf,
    /// Columns to cluster on. Empty means every column.
    pub attribute_indices: Vec<usize>,
    /// Maximum number of assignment passes per task.
    pub max_iterations: usize,
    /// Mini-batch size, 0 for full-batch passes.
    pub batch_size: usize,
    /// Base seed; each task derives its own generator from it.
    /// `None` draws a fresh seed from the OS.
    pub seed: Option<u64>,
    /// Field delimiter.
    pub delimiter: u8,
    /// Squared centroid movement below which a task stops iterating.
    pub tolerance: f64,
}

impl ElbowConfig {
    /// Create a new config with default values for max_iterations (100),
    /// batch_size (0), and tolerance (1e-6).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            attribute_indices: Vec::new(),
            max_iterations: 100,
            batch_size: 0,
            seed: None,
            delimiter: b',',
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_attribute_indices(mut self, indices: Vec<usize>) -> Self {
        self.attribute_indices = indices;
        self
    }

    /// Customize the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Customize the mini-batch size (0 disables mini-batching).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Customize the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Reject values no run could make sense of.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "tolerance",
                message: format!("must be a non-negative finite number, got {}", self.tolerance),
            });
        }
        if self.delimiter == b'\n' || self.delimiter == b'\r' {
            return Err(Error::InvalidParameter {
                name: "delimiter",
                message: "line terminators cannot be used as delimiters".to_string(),
            });
        }
        Ok(())
    }
}
