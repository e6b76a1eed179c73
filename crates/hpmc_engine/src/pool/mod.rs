//! Per-thread scratch lists for insertion work groups.
//!
//! Each insertion group gathers its candidate neighbours into a scratch
//! list of fixed maximum length. The pool hands every rayon worker its own
//! list so groups never contend for memory.
//!
//! # Overflow Protocol
//!
//! A group whose candidate count exceeds [`ScratchPool::max_len`] records
//! the length it needed in a shared high-water mark and abandons its work.
//! After the device-wide barrier the convergence loop compares the mark
//! with the current length, grows the pool and reruns the iteration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Pool of per-thread candidate lists with a shared length limit.
///
/// # Examples
///
/// ```rust
/// use hpmc_engine::pool::ScratchPool;
///
/// let mut pool = ScratchPool::new(2);
/// assert_eq!(pool.gather(0..2, |c| c.len()), Some(2));
/// assert_eq!(pool.gather(0..5, |c| c.len()), None);
/// assert!(pool.overflowed());
///
/// pool.grow_to(pool.requested_len());
/// assert_eq!(pool.gather(0..5, |c| c.len()), Some(5));
/// ```
#[derive(Debug)]
pub struct ScratchPool {
    lists: Vec<Mutex<Vec<usize>>>,
    max_len: usize,
    requested_len: AtomicUsize,
}

impl ScratchPool {
    /// Creates a pool whose lists hold at most `max_len` candidates.
    pub fn new(max_len: usize) -> Self {
        let n_slots = rayon::current_num_threads() + 1;
        Self {
            lists: (0..n_slots).map(|_| Mutex::new(Vec::with_capacity(max_len))).collect(),
            max_len,
            requested_len: AtomicUsize::new(0),
        }
    }

    /// Current per-group length limit.
    #[inline]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Largest length requested by any group so far. Never decreases.
    #[inline]
    pub fn requested_len(&self) -> usize {
        self.requested_len.load(Ordering::Acquire)
    }

    /// Raises the high-water mark to at least `len`.
    #[inline]
    pub fn record_request(&self, len: usize) {
        self.requested_len.fetch_max(len, Ordering::AcqRel);
    }

    /// Returns `true` if some group needed more than the current limit.
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.requested_len() > self.max_len
    }

    /// Grows the limit to cover `needed`, doubling for amortised growth.
    ///
    /// Returns the new limit. The limit never shrinks.
    pub fn grow_to(&mut self, needed: usize) -> usize {
        if needed > self.max_len {
            self.max_len = needed.max(self.max_len * 2);
        }
        self.max_len
    }

    /// Collects `candidates` into this thread's list and runs `f` on them.
    ///
    /// Returns `None` without calling `f` if there are more candidates than
    /// the limit allows; the full count is recorded as a request.
    pub fn gather<R>(
        &self,
        candidates: impl IntoIterator<Item = usize>,
        f: impl FnOnce(&[usize]) -> R,
    ) -> Option<R> {
        let slot = rayon::current_thread_index().map_or(0, |i| i + 1) % self.lists.len();
        let mut list = self.lists[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        list.clear();
        let mut count = 0;
        for c in candidates {
            if count < self.max_len {
                list.push(c);
            }
            count += 1;
        }
        if count > self.max_len {
            self.record_request(count);
            return None;
        }
        Some(f(&list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_zero_length_pool_overflows_on_any_candidate() {
        let pool = ScratchPool::new(0);
        assert_eq!(pool.gather(std::iter::empty(), |c| c.len()), Some(0));
        assert!(pool.gather([3], |c| c.len()).is_none());
        assert_eq!(pool.requested_len(), 1);
    }

    #[test]
    fn test_high_water_mark_is_monotone() {
        let pool = ScratchPool::new(1);
        pool.record_request(5);
        pool.record_request(3);
        assert_eq!(pool.requested_len(), 5);
    }

    #[test]
    fn test_grow_doubles() {
        let mut pool = ScratchPool::new(4);
        assert_eq!(pool.grow_to(5), 8);
        assert_eq!(pool.grow_to(20), 20);
        assert_eq!(pool.grow_to(3), 20);
    }

    #[test]
    fn test_parallel_gathers_see_their_own_candidates() {
        let pool = ScratchPool::new(16);
        let ok = (0..1000usize).into_par_iter().all(|k| {
            pool.gather(k..k + 10, |c| c.first() == Some(&k) && c.len() == 10)
                .unwrap_or(false)
        });
        assert!(ok);
    }

    #[test]
    fn test_parallel_overflow_records_maximum() {
        let pool = ScratchPool::new(4);
        (0..64usize).into_par_iter().for_each(|k| {
            pool.gather(0..k, |_| ());
        });
        assert_eq!(pool.requested_len(), 63);
    }
}
