//! Streaming k-means.
//!
//! Rows are never held in memory: every phase of a run is a fresh pass over a
//! [`RowSource`](crate::data::RowSource). Per task the resident state is the
//! centroids (k vectors) and one label per row.
//!
//! A single run moves through `init -> iterate -> finalize -> wcss`:
//!
//! 1. reservoir-sample k seed rows (and count the rows while at it),
//! 2. repeat assignment passes, updating centroid means online, until no centroid
//!    moves more than the tolerance or the iteration budget is spent,
//! 3. with mini-batching, relabel every row against the frozen centroids,
//! 4. sum squared distances from each row to its centroid.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod assignment;
pub mod centroid;
pub mod convergence;
pub mod minibatch;
pub mod reservoir;
pub mod task;

pub use assignment::{AssignmentPass, PassMode, PassStats};
pub use centroid::{Centroid, Centroids};
pub use convergence::{has_converged, max_displacement};
pub use minibatch::MiniBatch;
pub use reservoir::{reservoir_sample, Reservoir};
pub use task::{within_cluster_sum_of_squares, KMeansFit, KMeansTask};

/// A row's cluster index, or [`UNASSIGNED`].
pub type Label = i32;

/// Label of a row no pass has assigned yet.
pub const UNASSIGNED: Label = -1;

/// `Some(index)` for a real cluster, `None` for [`UNASSIGNED`].
#[inline]
pub fn label_index(label: Label) -> Option<usize> {
    usize::try_from(label).ok()
}

/// Squared Euclidean distance between two points of the same dimension.
#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .fold(0.0, |acc, (&x, &y)| acc + (x - y).powi(2))
}

/// Shared flag telling running tasks to stop at the next row.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
