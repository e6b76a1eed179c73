//! Move and insertion statistics.
//!
//! Stages record into per-device slots. A slot and the pages holding its
//! pair counters are page aligned, so devices never write to the same
//! cache line. After every sweep the slots are
//! reduced into the single authoritative total.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::trial::MoveKind;

/// Accepted and rejected trial moves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCounters {
    /// Accepted translations.
    pub translate_accept: u64,
    /// Rejected translations.
    pub translate_reject: u64,
    /// Accepted rotations.
    pub rotate_accept: u64,
    /// Rejected rotations.
    pub rotate_reject: u64,
    /// Exact overlap tests performed by the narrow phase.
    pub overlap_checks: u64,
}

impl MoveCounters {
    /// Attempted moves of either kind.
    pub fn attempted(&self) -> u64 {
        self.translate_accept + self.translate_reject + self.rotate_accept + self.rotate_reject
    }

    /// Accepted moves of either kind.
    pub fn accepted(&self) -> u64 {
        self.translate_accept + self.rotate_accept
    }

    /// Fraction of translations accepted, if any were attempted.
    pub fn translate_acceptance(&self) -> Option<f64> {
        ratio(self.translate_accept, self.translate_accept + self.translate_reject)
    }

    /// Fraction of rotations accepted, if any were attempted.
    pub fn rotate_acceptance(&self) -> Option<f64> {
        ratio(self.rotate_accept, self.rotate_accept + self.rotate_reject)
    }

    /// Adds `other` into `self`.
    pub fn accumulate(&mut self, other: &MoveCounters) {
        self.translate_accept += other.translate_accept;
        self.translate_reject += other.translate_reject;
        self.rotate_accept += other.rotate_accept;
        self.rotate_reject += other.rotate_reject;
        self.overlap_checks += other.overlap_checks;
    }
}

/// Depletant insertion statistics for one type pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitCounters {
    /// Depletants inserted.
    pub insert_count: u64,
    /// Inserted depletants that landed in free volume.
    pub insert_accept_count: u64,
    /// Sum over insertion groups of the squared free-volume count.
    pub insert_accept_count_sq: u64,
}

impl ImplicitCounters {
    /// Adds `other` into `self`.
    pub fn accumulate(&mut self, other: &ImplicitCounters) {
        self.insert_count += other.insert_count;
        self.insert_accept_count += other.insert_accept_count;
        self.insert_accept_count_sq += other.insert_accept_count_sq;
    }

    /// Fraction of insertions landing in free volume, if any were made.
    pub fn free_fraction(&self) -> Option<f64> {
        ratio(self.insert_accept_count, self.insert_count)
    }

    /// Flattens into words for reduction.
    pub(crate) fn to_words(self) -> [u64; 3] {
        [
            self.insert_count,
            self.insert_accept_count,
            self.insert_accept_count_sq,
        ]
    }

    /// Inverse of [`to_words`](Self::to_words).
    pub(crate) fn from_words(words: &[u64]) -> Self {
        Self {
            insert_count: words[0],
            insert_accept_count: words[1],
            insert_accept_count_sq: words[2],
        }
    }
}

fn ratio(num: u64, den: u64) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

#[repr(C)]
#[derive(Debug, Default)]
struct AtomicImplicit {
    insert_count: AtomicU64,
    insert_accept_count: AtomicU64,
    insert_accept_count_sq: AtomicU64,
}

const PAGE_SIZE: usize = 4096;

/// Pair counters held by one page.
const PAIRS_PER_PAGE: usize = PAGE_SIZE / std::mem::size_of::<AtomicImplicit>();

/// One page of pair counters, owned by a single device.
#[repr(C, align(4096))]
#[derive(Debug)]
struct ImplicitPage([AtomicImplicit; PAIRS_PER_PAGE]);

impl Default for ImplicitPage {
    fn default() -> Self {
        Self(std::array::from_fn(|_| AtomicImplicit::default()))
    }
}

/// Counters of one execution unit, aligned to a page boundary.
#[repr(C, align(4096))]
#[derive(Debug, Default)]
struct DeviceSlot {
    translate_accept: AtomicU64,
    translate_reject: AtomicU64,
    rotate_accept: AtomicU64,
    rotate_reject: AtomicU64,
    overlap_checks: AtomicU64,
    implicit: Vec<ImplicitPage>,
}

impl DeviceSlot {
    #[inline]
    fn pair_counters(&self, pair: usize) -> &AtomicImplicit {
        &self.implicit[pair / PAIRS_PER_PAGE].0[pair % PAIRS_PER_PAGE]
    }

    fn implicit_iter(&self, n_pairs: usize) -> impl Iterator<Item = &AtomicImplicit> {
        self.implicit.iter().flat_map(|page| page.0.iter()).take(n_pairs)
    }
}

/// Page-aligned per-device counter slots.
#[derive(Debug)]
pub(crate) struct DeviceCounters {
    slots: Vec<DeviceSlot>,
    n_pairs: usize,
}

impl DeviceCounters {
    pub(crate) fn new(n_devices: usize, n_pairs: usize) -> Self {
        let mut counters = Self {
            slots: Vec::new(),
            n_pairs: 0,
        };
        counters.resize(n_devices, n_pairs);
        counters
    }

    /// Matches the slot layout to the device and pair counts, keeping
    /// existing values.
    pub(crate) fn resize(&mut self, n_devices: usize, n_pairs: usize) {
        let n_pages = (n_pairs + PAIRS_PER_PAGE - 1) / PAIRS_PER_PAGE;
        self.slots.resize_with(n_devices.max(1), DeviceSlot::default);
        for slot in &mut self.slots {
            if slot.implicit.len() < n_pages {
                slot.implicit.resize_with(n_pages, ImplicitPage::default);
            }
        }
        self.n_pairs = n_pairs;
    }

    pub(crate) fn add_overlap_checks(&self, device: usize, n: u64) {
        if n > 0 {
            self.slots[device].overlap_checks.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_move(&self, device: usize, kind: MoveKind, accepted: bool) {
        let slot = &self.slots[device];
        let counter = match (kind, accepted) {
            (MoveKind::Translate, true) => &slot.translate_accept,
            (MoveKind::Translate, false) => &slot.translate_reject,
            (MoveKind::Rotate, true) => &slot.rotate_accept,
            (MoveKind::Rotate, false) => &slot.rotate_reject,
            (MoveKind::None, _) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insertions(&self, device: usize, pair: usize, inserted: u64, free: u64) {
        let c = self.slots[device].pair_counters(pair);
        c.insert_count.fetch_add(inserted, Ordering::Relaxed);
        c.insert_accept_count.fetch_add(free, Ordering::Relaxed);
        c.insert_accept_count_sq.fetch_add(free * free, Ordering::Relaxed);
    }

    /// Zeroes every slot.
    pub(crate) fn reset(&self) {
        for slot in &self.slots {
            for c in [
                &slot.translate_accept,
                &slot.translate_reject,
                &slot.rotate_accept,
                &slot.rotate_reject,
                &slot.overlap_checks,
            ] {
                c.store(0, Ordering::Relaxed);
            }
            for c in slot.implicit_iter(self.n_pairs) {
                c.insert_count.store(0, Ordering::Relaxed);
                c.insert_accept_count.store(0, Ordering::Relaxed);
                c.insert_accept_count_sq.store(0, Ordering::Relaxed);
            }
        }
    }

    /// Adds every slot of `self` into the matching slot of `target`.
    pub(crate) fn fold_into(&self, target: &DeviceCounters) {
        for (src, dst) in self.slots.iter().zip(&target.slots) {
            for (s, d) in [
                (&src.translate_accept, &dst.translate_accept),
                (&src.translate_reject, &dst.translate_reject),
                (&src.rotate_accept, &dst.rotate_accept),
                (&src.rotate_reject, &dst.rotate_reject),
                (&src.overlap_checks, &dst.overlap_checks),
            ] {
                d.fetch_add(s.load(Ordering::Relaxed), Ordering::Relaxed);
            }
            for (s, d) in src
                .implicit_iter(self.n_pairs)
                .zip(dst.implicit_iter(target.n_pairs))
            {
                d.insert_count
                    .fetch_add(s.insert_count.load(Ordering::Relaxed), Ordering::Relaxed);
                d.insert_accept_count
                    .fetch_add(s.insert_accept_count.load(Ordering::Relaxed), Ordering::Relaxed);
                d.insert_accept_count_sq.fetch_add(
                    s.insert_accept_count_sq.load(Ordering::Relaxed),
                    Ordering::Relaxed,
                );
            }
        }
    }

    /// Sums all slots.
    pub(crate) fn reduce(&self) -> (MoveCounters, Vec<ImplicitCounters>) {
        let mut moves = MoveCounters::default();
        let mut implicit = vec![ImplicitCounters::default(); self.n_pairs];
        for slot in &self.slots {
            moves.accumulate(&MoveCounters {
                translate_accept: slot.translate_accept.load(Ordering::Relaxed),
                translate_reject: slot.translate_reject.load(Ordering::Relaxed),
                rotate_accept: slot.rotate_accept.load(Ordering::Relaxed),
                rotate_reject: slot.rotate_reject.load(Ordering::Relaxed),
                overlap_checks: slot.overlap_checks.load(Ordering::Relaxed),
            });
            for (total, c) in implicit.iter_mut().zip(slot.implicit_iter(self.n_pairs)) {
                total.accumulate(&ImplicitCounters {
                    insert_count: c.insert_count.load(Ordering::Relaxed),
                    insert_accept_count: c.insert_accept_count.load(Ordering::Relaxed),
                    insert_accept_count_sq: c.insert_accept_count_sq.load(Ordering::Relaxed),
                });
            }
        }
        (moves, implicit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_page_aligned() {
        let counters = DeviceCounters::new(3, 1);
        assert_eq!(std::mem::align_of::<DeviceSlot>(), 4096);
        for slot in &counters.slots {
            assert_eq!(slot as *const DeviceSlot as usize % 4096, 0);
        }
    }

    #[test]
    fn test_record_and_reduce() {
        let counters = DeviceCounters::new(2, 2);
        counters.record_move(0, MoveKind::Translate, true);
        counters.record_move(1, MoveKind::Translate, false);
        counters.record_move(1, MoveKind::Rotate, true);
        counters.record_move(1, MoveKind::None, true);
        counters.add_overlap_checks(0, 5);
        counters.record_insertions(1, 1, 4, 3);
        counters.record_insertions(0, 1, 2, 1);

        let (moves, implicit) = counters.reduce();
        assert_eq!(moves.attempted(), 3);
        assert_eq!(moves.accepted(), 2);
        assert_eq!(moves.overlap_checks, 5);
        assert_eq!(moves.translate_acceptance(), Some(0.5));
        assert_eq!(implicit[0], ImplicitCounters::default());
        assert_eq!(implicit[1].insert_count, 6);
        assert_eq!(implicit[1].insert_accept_count, 4);
        assert_eq!(implicit[1].insert_accept_count_sq, 10);
    }

    #[test]
    fn test_fold_and_reset() {
        let staging = DeviceCounters::new(2, 1);
        let sweep = DeviceCounters::new(2, 1);
        staging.record_insertions(1, 0, 3, 2);
        staging.fold_into(&sweep);
        staging.fold_into(&sweep);
        staging.reset();
        assert_eq!(staging.reduce().1[0], ImplicitCounters::default());
        assert_eq!(sweep.reduce().1[0].insert_count, 6);
    }

    #[test]
    fn test_resize_keeps_values() {
        let mut counters = DeviceCounters::new(1, 1);
        counters.record_insertions(0, 0, 7, 0);
        counters.resize(2, 3);
        let (_, implicit) = counters.reduce();
        assert_eq!(implicit.len(), 3);
        assert_eq!(implicit[0].insert_count, 7);
        assert_eq!(counters.slots.len(), 2);
    }

    #[test]
    fn test_pair_counters_live_on_device_pages() {
        let n_pairs = PAIRS_PER_PAGE + 3;
        let counters = DeviceCounters::new(2, n_pairs);
        for slot in &counters.slots {
            assert_eq!(slot.implicit.len(), 2);
            for page in &slot.implicit {
                assert_eq!(page as *const ImplicitPage as usize % PAGE_SIZE, 0);
            }
        }
        let page_of = |device: usize, pair: usize| {
            counters.slots[device].pair_counters(pair) as *const AtomicImplicit as usize / PAGE_SIZE
        };
        assert_ne!(page_of(0, 0), page_of(1, 0));
        assert_ne!(page_of(0, n_pairs - 1), page_of(1, 0));

        counters.record_insertions(1, n_pairs - 1, 5, 2);
        let (_, implicit) = counters.reduce();
        assert_eq!(implicit.len(), n_pairs);
        assert_eq!(implicit[n_pairs - 1].insert_count, 5);
        assert_eq!(implicit[n_pairs - 1].insert_accept_count_sq, 4);
    }

    #[test]
    fn test_ratios_without_attempts() {
        let moves = MoveCounters::default();
        assert_eq!(moves.rotate_acceptance(), None);
        assert_eq!(ImplicitCounters::default().free_fraction(), None);
    }
}
