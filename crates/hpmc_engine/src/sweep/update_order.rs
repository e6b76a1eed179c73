//! Per-substep update order.

use std::ops::Range;

use crate::rng::{KeyedRng, Stream};

/// Identity or reversed permutation of particle indices.
///
/// Both permutations are stored and rebuilt only on resize; each substep
/// merely redraws which one is active.
///
/// # Examples
///
/// ```rust
/// use hpmc_engine::sweep::UpdateOrder;
///
/// let mut order = UpdateOrder::new(42);
/// order.resize(4);
/// order.shuffle(10, 0);
/// let first: Vec<usize> = order.as_slice().to_vec();
/// order.shuffle(10, 0);
/// assert_eq!(order.as_slice(), first.as_slice());
/// ```
#[derive(Clone, Debug)]
pub struct UpdateOrder {
    seed: u64,
    forward: Vec<usize>,
    reverse: Vec<usize>,
    reversed: bool,
}

impl UpdateOrder {
    /// Creates an empty order keyed by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            forward: Vec::new(),
            reverse: Vec::new(),
            reversed: false,
        }
    }

    /// Rebuilds both permutations for `n` particles.
    ///
    /// Does nothing if `n` is unchanged.
    pub fn resize(&mut self, n: usize) {
        if n == self.forward.len() {
            return;
        }
        self.forward = (0..n).collect();
        self.reverse = (0..n).rev().collect();
        self.reversed = false;
    }

    /// Redraws the direction for `(timestep, select)`.
    pub fn shuffle(&mut self, timestep: u64, select: u64) {
        let mut rng = KeyedRng::new(Stream::UpdateOrder, self.seed, &[timestep, select]);
        self.reversed = rng.gen_uniform() < 0.5;
    }

    /// Whether the reversed permutation is active.
    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Number of ordered particles.
    #[inline]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if no particles are ordered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// The active permutation.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        if self.reversed {
            &self.reverse
        } else {
            &self.forward
        }
    }

    /// The particles of a contiguous index range in the active direction.
    pub fn device_order(&self, range: Range<usize>) -> &[usize] {
        let n = self.len();
        let range = range.start.min(n)..range.end.min(n);
        let positions = if self.reversed {
            (n - range.end)..(n - range.start)
        } else {
            range
        };
        &self.as_slice()[positions]
    }
}
