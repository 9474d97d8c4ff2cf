use rand::Rng;

/// Outcome of a reservoir pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservoir<T> {
    /// Up to k uniformly chosen items.
    pub sample: Vec<T>,
    /// Number of items the pass consumed.
    pub seen: usize,
}

/// Returns a reservoir sample of k items from the given iterator.
/// This function processes the iterator in a single pass and selects k items uniformly at random
/// (Algorithm R), stopping at the first error.
///
/// Fewer than k items in the stream gives a sample of all of them.
pub fn reservoir_sample<T, E, I, R>(iter: I, k: usize, rng: &mut R) -> Result<Reservoir<T>, E>
where
    I: IntoIterator<Item = Result<T, E>>,
    R: Rng + ?Sized,
{
    let mut reservoir = Vec::with_capacity(k);
    let mut seen = 0;
    for (i, item) in iter.into_iter().enumerate() {
        let item = item?;
        seen += 1;
        if i < k {
            reservoir.push(item);
        } else {
            let r = rng.gen_range(0..=i);
            if r < k {
                reservoir[r] = item;
            }
        }
    }
    Ok(Reservoir {
        sample: reservoir,
        seen,
    })
}
