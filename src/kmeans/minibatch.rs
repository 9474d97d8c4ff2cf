use rand::Rng;

/// Coin-flip row gate for mini-batch passes.
///
/// Each row is admitted with probability 1/2 until `batch_size` rows have been
/// admitted. A batch size of 0 admits every row (full batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniBatch {
    batch_size: usize,
    accepted: usize,
}

impl MiniBatch {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            accepted: 0,
        }
    }

    /// A gate that admits everything.
    pub fn full() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.batch_size > 0
    }

    /// Rows admitted so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// The batch is complete; the pass can stop reading.
    pub fn is_full(&self) -> bool {
        self.is_enabled() && self.accepted >= self.batch_size
    }

    /// Decide whether the next row takes part in the pass.
    pub fn admit<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if !self.is_enabled() {
            self.accepted += 1;
            return true;
        }
        if self.is_full() || !rng.gen_bool(0.5) {
            return false;
        }
        self.accepted += 1;
        true
    }
}
