//! In-process communicator connecting threads that act as ranks.

use std::sync::{Arc, Barrier, Mutex, PoisonError};

use super::{CommError, Communicator};

struct Shared {
    name: String,
    barrier: Barrier,
    slots: Mutex<Vec<Vec<u64>>>,
}

/// Factory for a group of [`ThreadCommunicator`]s sharing one rendezvous.
///
/// # Examples
///
/// ```rust
/// use std::thread;
/// use hpmc_engine::comm::{Communicator, ThreadGroup};
///
/// let ranks = ThreadGroup::new("trial", 2);
/// let handles: Vec<_> = ranks
///     .into_iter()
///     .map(|comm| {
///         thread::spawn(move || {
///             let mut buf = [comm.rank() as i32 + 1];
///             comm.all_reduce_sum_i32(&mut buf).unwrap();
///             buf[0]
///         })
///     })
///     .collect();
/// for h in handles {
///     assert_eq!(h.join().unwrap(), 3);
/// }
/// ```
pub struct ThreadGroup;

impl ThreadGroup {
    /// Creates `size` connected communicators, one per rank.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(name: impl Into<String>, size: usize) -> Vec<ThreadCommunicator> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            name: name.into(),
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
        });
        (0..size)
            .map(|rank| ThreadCommunicator {
                shared: Arc::clone(&shared),
                rank,
                size,
            })
            .collect()
    }
}

/// One rank of a [`ThreadGroup`].
#[derive(Clone)]
pub struct ThreadCommunicator {
    shared: Arc<Shared>,
    rank: usize,
    size: usize,
}

impl std::fmt::Debug for ThreadCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadCommunicator")
            .field("name", &self.shared.name)
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl ThreadCommunicator {
    fn poisoned(&self) -> CommError {
        CommError::Poisoned {
            group: self.shared.name.clone(),
        }
    }

    /// Publishes `words`, waits for all ranks, folds every rank's words with
    /// `combine`, then waits again so slots are not overwritten early.
    fn exchange(
        &self,
        words: Vec<u64>,
        combine: impl Fn(u64, u64) -> u64,
    ) -> Result<Vec<u64>, CommError> {
        {
            let mut slots = self.shared.slots.lock().map_err(|_| self.poisoned())?;
            slots[self.rank] = words;
        }
        self.shared.barrier.wait();
        let result = {
            let slots = self
                .shared
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let expected = slots[0].len();
            let mismatch = slots
                .iter()
                .enumerate()
                .find(|(_, s)| s.len() != expected)
                .map(|(rank, s)| (rank, s.len()));
            match mismatch {
                Some((rank, actual)) => Err(CommError::LengthMismatch {
                    group: self.shared.name.clone(),
                    rank,
                    expected,
                    actual,
                }),
                None => {
                    let mut acc = slots[0].clone();
                    for s in slots.iter().skip(1) {
                        for (a, &b) in acc.iter_mut().zip(s) {
                            *a = combine(*a, b);
                        }
                    }
                    Ok(acc)
                }
            }
        };
        self.shared.barrier.wait();
        result
    }
}

impl Communicator for ThreadCommunicator {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn size(&self) -> usize {
        self.size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn all_reduce_sum_i32(&self, buffer: &mut [i32]) -> Result<(), CommError> {
        let words = buffer.iter().map(|&v| v as i64 as u64).collect();
        let summed = self.exchange(words, u64::wrapping_add)?;
        for (out, w) in buffer.iter_mut().zip(summed) {
            *out = w as i64 as i32;
        }
        Ok(())
    }

    fn all_reduce_sum_u64(&self, buffer: &mut [u64]) -> Result<(), CommError> {
        let summed = self.exchange(buffer.to_vec(), u64::wrapping_add)?;
        buffer.copy_from_slice(&summed);
        Ok(())
    }

    fn all_reduce_max_usize(&self, value: usize) -> Result<usize, CommError> {
        let reduced = self.exchange(vec![value as u64], u64::max)?;
        Ok(reduced.first().map_or(value, |&v| v as usize))
    }
}
