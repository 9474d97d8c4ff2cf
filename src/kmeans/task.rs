use std::time::Instant;

use log::{debug, info, warn};
use rand::Rng;

use super::assignment::AssignmentPass;
use super::centroid::Centroids;
use super::convergence::has_converged;
use super::reservoir::reservoir_sample;
use super::{label_index, squared_euclidean, CancelToken, Label, UNASSIGNED};
use crate::config::DEFAULT_TOLERANCE;
use crate::data::{Row, RowSource};
use crate::error::{Error, Result};

/// Outcome of one fixed-k run.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub k: usize,
    /// One label per row, in file order.
    pub labels: Vec<Label>,
    pub centroids: Centroids,
    pub wcss: f64,
    /// Training passes performed.
    pub iterations: usize,
    pub converged: bool,
}

/// One k-means run for a fixed k over a restartable row source.
///
/// Seeds with a reservoir sample, trains with repeated assignment passes until
/// the centroids settle or `max_iterations` passes have run, relabels the full
/// dataset when mini-batching was used, then computes the WCSS in a last
/// read-only pass.
#[derive(Debug)]
pub struct KMeansTask<'a, S: RowSource + ?Sized> {
    source: &'a S,
    k: usize,
    max_iterations: usize,
    batch_size: usize,
    tolerance: f64,
    cancel: Option<CancelToken>,
}

impl<'a, S: RowSource + ?Sized> KMeansTask<'a, S> {
    /// Create a task with default values for max_iterations (100),
    /// batch_size (0, full batch), and tolerance (1e-6).
    pub fn new(source: &'a S, k: usize) -> Self {
        Self {
            source,
            k,
            max_iterations: 100,
            batch_size: 0,
            tolerance: DEFAULT_TOLERANCE,
            cancel: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Stop with [`Error::Cancelled`] at the next row once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<KMeansFit> {
        if self.k == 0 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "at least one cluster is required".to_string(),
            });
        }
        if Label::try_from(self.k).is_err() {
            return Err(Error::InvalidParameter {
                name: "k",
                message: format!("{} clusters exceed the label range", self.k),
            });
        }

        let (mut centroids, rows) = self.init(rng)?;
        let mut labels = vec![UNASSIGNED; rows];
        let (iterations, converged) = self.iterate(&mut centroids, &mut labels, rng)?;
        if self.batch_size > 0 {
            self.finalize(&mut centroids, &mut labels, rng)?;
        }

        let start = Instant::now();
        let wcss = within_cluster_sum_of_squares(self.rows()?, &centroids, &labels)?;
        debug!("k = {}: wcss {} in {:?}", self.k, wcss, start.elapsed());

        Ok(KMeansFit {
            k: self.k,
            labels,
            centroids,
            wcss,
            iterations,
            converged,
        })
    }

    /// Seed centroids from a reservoir sample; also counts the rows.
    fn init<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(Centroids, usize)> {
        let start = Instant::now();
        let reservoir = reservoir_sample(self.rows()?, self.k, rng)?;
        if reservoir.sample.len() < self.k {
            warn!(
                "k = {}: only {} rows available, clustering with {} centroids",
                self.k,
                reservoir.seen,
                reservoir.sample.len()
            );
        }
        debug!(
            "k = {}: reservoir sampling over {} rows took {:?}",
            self.k,
            reservoir.seen,
            start.elapsed()
        );
        Ok((Centroids::from_seeds(reservoir.sample), reservoir.seen))
    }

    fn iterate<R: Rng + ?Sized>(
        &self,
        centroids: &mut Centroids,
        labels: &mut [Label],
        rng: &mut R,
    ) -> Result<(usize, bool)> {
        let start = Instant::now();
        let pass = AssignmentPass::train(self.batch_size);
        let mut converged = false;
        let mut step = 0;

        while !converged && step < self.max_iterations {
            let before = centroids.positions();
            let stats = pass.run(self.rows()?, centroids, labels, rng)?;
            if self.batch_size == 0 {
                debug_assert_eq!(centroids.total_count(), stats.visited);
            }
            converged = has_converged(&before, centroids, self.tolerance);
            step += 1;
            debug!(
                "k = {}: step {} visited {} rows, relabeled {}, converged {}",
                self.k, step, stats.visited, stats.relabeled, converged
            );
        }

        info!(
            "k = {}: {} iterations ({}) in {:?}",
            self.k,
            step,
            if converged { "converged" } else { "budget spent" },
            start.elapsed()
        );
        Ok((step, converged))
    }

    fn finalize<R: Rng + ?Sized>(
        &self,
        centroids: &mut Centroids,
        labels: &mut [Label],
        rng: &mut R,
    ) -> Result<()> {
        let start = Instant::now();
        let stats = AssignmentPass::finalize().run(self.rows()?, centroids, labels, rng)?;
        debug!(
            "k = {}: finalize relabeled {} of {} rows in {:?}",
            self.k,
            stats.relabeled,
            stats.visited,
            start.elapsed()
        );
        Ok(())
    }

    /// A fresh pass over the source that fails once the task is cancelled.
    fn rows(&self) -> Result<Cancellable<'_, S::Rows<'a>>> {
        Ok(Cancellable {
            rows: self.source.rows()?,
            cancel: self.cancel.as_ref(),
            k: self.k,
        })
    }
}

struct Cancellable<'t, I> {
    rows: I,
    cancel: Option<&'t CancelToken>,
    k: usize,
}

impl<I: Iterator<Item = Result<Row>>> Iterator for Cancellable<'_, I> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Some(Err(Error::Cancelled(self.k))),
            _ => self.rows.next(),
        }
    }
}

/// Sum of squared distances from each row to its assigned centroid.
///
/// `labels[i]` belongs to the i-th row; unassigned rows contribute nothing.
/// More rows than labels means the source changed under us.
pub fn within_cluster_sum_of_squares<I>(rows: I, centroids: &Centroids, labels: &[Label]) -> Result<f64>
where
    I: IntoIterator<Item = Result<Row>>,
{
    let mut total = 0.0;
    for (index, row) in rows.into_iter().enumerate() {
        let row = row?;
        let label = *labels.get(index).ok_or(Error::SourceChanged {
            expected: labels.len(),
        })?;
        if let Some(centroid) = label_index(label).and_then(|i| centroids.get(i)) {
            total += squared_euclidean(&row, centroid.position());
        }
    }
    Ok(total)
}
