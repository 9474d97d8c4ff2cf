use super::squared_euclidean;

/// An incrementally maintained cluster mean.
///
/// The mean is kept as a running sum plus count and only divided out when a
/// member joins or leaves, so removing points never divides by `count - 1`.
/// A centroid that loses its last member keeps its last position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Centroid {
    position: Vec<f64>,
    sum: Vec<f64>,
    count: usize,
}

impl Centroid {
    /// A centroid sitting at `position` with no members yet.
    pub fn seeded(position: Vec<f64>) -> Self {
        let sum = vec![0.0; position.len()];
        Self {
            position,
            sum,
            count: 0,
        }
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The centroid after `point` joins (`added`) or leaves it.
    ///
    /// Removing from an empty centroid is a no-op.
    #[must_use]
    pub fn with_point(mut self, added: bool, point: &[f64]) -> Self {
        debug_assert_eq!(point.len(), self.sum.len());
        if added {
            self.count += 1;
            self.sum.iter_mut().zip(point).for_each(|(s, &x)| *s += x);
        } else {
            if self.count == 0 {
                return self;
            }
            self.count -= 1;
            self.sum.iter_mut().zip(point).for_each(|(s, &x)| *s -= x);
        }

        if self.count == 0 {
            // drop accumulated rounding error, keep the last position
            self.sum.iter_mut().for_each(|s| *s = 0.0);
        } else {
            let n = self.count as f64;
            self.position
                .iter_mut()
                .zip(&self.sum)
                .for_each(|(p, &s)| *p = s / n);
        }
        self
    }
}

/// The k centroids owned by one task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Centroids {
    items: Vec<Centroid>,
}

impl Centroids {
    pub fn from_seeds(seeds: Vec<Vec<f64>>) -> Self {
        Self {
            items: seeds.into_iter().map(Centroid::seeded).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Centroid> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Centroid> {
        self.items.iter()
    }

    /// Copy of every position, used to measure movement across a pass.
    pub fn positions(&self) -> Vec<Vec<f64>> {
        self.items.iter().map(|c| c.position.clone()).collect()
    }

    /// Total members over all centroids.
    pub fn total_count(&self) -> usize {
        self.items.iter().map(Centroid::count).sum()
    }

    /// Index and squared distance of the centroid closest to `row`.
    ///
    /// Ties go to the lowest index.
    pub fn nearest(&self, row: &[f64]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, centroid) in self.items.iter().enumerate() {
            let dist = squared_euclidean(&centroid.position, row);
            let closer = match best {
                None => true,
                Some((_, best_dist)) => dist < best_dist,
            };
            if closer {
                best = Some((i, dist));
            }
        }
        best
    }

    /// Move `row` from `old` (or nowhere) into `new`.
    pub fn reassign(&mut self, old: Option<usize>, new: usize, row: &[f64]) {
        if old == Some(new) {
            return;
        }
        if let Some(old) = old {
            self.update(old, false, row);
        }
        self.update(new, true, row);
    }

    fn update(&mut self, index: usize, added: bool, row: &[f64]) {
        let centroid = std::mem::take(&mut self.items[index]);
        self.items[index] = centroid.with_point(added, row);
    }
}
