use rand::Rng;

use super::centroid::Centroids;
use super::minibatch::MiniBatch;
use super::{label_index, Label};
use crate::data::Row;
use crate::error::{Error, Result};

/// Whether a pass may move centroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Relabel rows and fold them into the centroid means.
    Train,
    /// Relabel rows against frozen centroids.
    Finalize,
}

/// What a single pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Rows read from the source, admitted or not.
    pub read: usize,
    /// Rows that took part in the pass.
    pub visited: usize,
    /// Rows whose label changed.
    pub relabeled: usize,
}

/// One streaming pass of nearest-centroid assignment.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentPass {
    mode: PassMode,
    batch_size: usize,
}

impl AssignmentPass {
    /// A training pass; `batch_size > 0` restricts it to a coin-flip mini-batch.
    pub fn train(batch_size: usize) -> Self {
        Self {
            mode: PassMode::Train,
            batch_size,
        }
    }

    /// A full, read-only labelling pass.
    pub fn finalize() -> Self {
        Self {
            mode: PassMode::Finalize,
            batch_size: 0,
        }
    }

    pub fn mode(&self) -> PassMode {
        self.mode
    }

    /// Stream `rows`, relabelling each admitted row with its nearest centroid.
    ///
    /// `labels[i]` holds the label of the i-th row and is updated in place;
    /// rows skipped by the mini-batch gate keep their label. A mini-batch pass
    /// stops reading as soon as the batch is complete.
    pub fn run<I, R>(
        &self,
        rows: I,
        centroids: &mut Centroids,
        labels: &mut [Label],
        rng: &mut R,
    ) -> Result<PassStats>
    where
        I: IntoIterator<Item = Result<Row>>,
        R: Rng + ?Sized,
    {
        let mut gate = MiniBatch::new(self.batch_size);
        let mut stats = PassStats::default();
        let expected = labels.len();

        for (index, row) in rows.into_iter().enumerate() {
            let row = row?;
            stats.read += 1;
            let slot = labels
                .get_mut(index)
                .ok_or(Error::SourceChanged { expected })?;
            if !gate.admit(rng) {
                continue;
            }
            stats.visited += 1;

            if let Some((nearest, _)) = centroids.nearest(&row) {
                let previous = *slot;
                let label = Label::try_from(nearest).map_err(|_| Error::InvalidParameter {
                    name: "k",
                    message: format!("{} clusters exceed the label range", centroids.len()),
                })?;
                if previous != label {
                    *slot = label;
                    stats.relabeled += 1;
                    if self.mode == PassMode::Train {
                        centroids.reassign(label_index(previous), nearest, &row);
                    }
                }
            }

            if gate.is_full() {
                break;
            }
        }
        Ok(stats)
    }
}
