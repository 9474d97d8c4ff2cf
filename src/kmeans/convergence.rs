use super::centroid::Centroids;
use super::squared_euclidean;

/// Largest squared distance any centroid moved between `before` and `after`.
pub fn max_displacement(before: &[Vec<f64>], after: &Centroids) -> f64 {
    before
        .iter()
        .zip(after.iter())
        .map(|(old, new)| squared_euclidean(old, new.position()))
        .fold(0.0, f64::max)
}

/// True when no centroid moved `tolerance` or more (squared distance).
pub fn has_converged(before: &[Vec<f64>], after: &Centroids, tolerance: f64) -> bool {
    max_displacement(before, after) < tolerance
}
