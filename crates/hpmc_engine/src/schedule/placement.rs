//! Placement-aware buffers.
//!
//! A [`PlacedBuffer`] owns per-particle data together with a declared
//! residency: which device owns which slice. Residency advice is issued
//! only when the buffer grows or the partition changes, never per sweep.

use std::ops::Range;

use tracing::trace;

use super::DevicePartition;

/// Growable buffer of `stride` elements per particle with device residency.
///
/// # Examples
///
/// ```rust
/// use hpmc_engine::schedule::{DevicePartition, PlacedBuffer};
///
/// let mut buffer: PlacedBuffer<u32> = PlacedBuffer::new("counts", 2);
/// buffer.ensure_particles(4, || 0);
/// buffer.advise(&DevicePartition::new(4, 2));
/// assert_eq!(buffer.device_slice(1).len(), 4);
/// ```
#[derive(Debug)]
pub struct PlacedBuffer<T> {
    label: &'static str,
    stride: usize,
    n_particles: usize,
    data: Vec<T>,
    placement: Vec<Range<usize>>,
    advice_count: u64,
}

impl<T> PlacedBuffer<T> {
    /// Creates an empty buffer holding `stride` elements per particle.
    pub fn new(label: &'static str, stride: usize) -> Self {
        Self {
            label,
            stride,
            n_particles: 0,
            data: Vec::new(),
            placement: Vec::new(),
            advice_count: 0,
        }
    }

    /// Elements per particle.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of particles currently addressed.
    #[inline]
    pub fn n_particles(&self) -> usize {
        self.n_particles
    }

    /// Allocated element count. Never decreases.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of residency advice calls issued so far.
    #[inline]
    pub fn advice_count(&self) -> u64 {
        self.advice_count
    }

    /// Device element ranges from the last advice.
    pub fn placement(&self) -> &[Range<usize>] {
        &self.placement
    }

    /// Addresses `n_particles` particles, growing storage if needed.
    ///
    /// Returns `true` if the allocation grew. Storage never shrinks.
    pub fn ensure_particles(&mut self, n_particles: usize, fill: impl FnMut() -> T) -> bool {
        self.n_particles = n_particles;
        let needed = n_particles * self.stride;
        if needed > self.data.len() {
            self.data.resize_with(needed, fill);
            true
        } else {
            false
        }
    }

    /// Changes the per-particle stride, reallocating when more space is needed.
    ///
    /// Returns `true` if the stride changed or the allocation grew; the
    /// placement is stale in either case and must be re-advised.
    /// Contents are unspecified afterwards; callers overwrite them each substep.
    pub fn set_stride(&mut self, stride: usize, fill: impl FnMut() -> T) -> bool {
        let changed = stride != self.stride;
        self.stride = stride;
        let n = self.n_particles;
        self.ensure_particles(n, fill) || changed
    }

    /// Declares which device owns which slice.
    pub fn advise(&mut self, partition: &DevicePartition) {
        let stride = self.stride;
        let n = self.n_particles.min(partition.n_particles());
        self.placement = partition
            .ranges()
            .map(|r| (r.start.min(n) * stride)..(r.end.min(n) * stride))
            .collect();
        self.advice_count += 1;
        trace!(
            buffer = self.label,
            devices = self.placement.len(),
            elements = n * stride,
            "advised buffer placement"
        );
    }

    /// Elements addressed for the current particle count.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.n_particles * self.stride]
    }

    /// Mutable elements addressed for the current particle count.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.n_particles * self.stride;
        &mut self.data[..len]
    }

    /// Elements of one particle.
    #[inline]
    pub fn particle(&self, i: usize) -> &[T] {
        &self.data[i * self.stride..(i + 1) * self.stride]
    }

    /// Slice resident on `device`.
    pub fn device_slice(&self, device: usize) -> &[T] {
        match self.placement.get(device) {
            Some(r) => &self.data[r.clone()],
            None => &[],
        }
    }

    /// Disjoint mutable slices, one per advised device.
    pub fn device_slices_mut(&mut self) -> Vec<&mut [T]> {
        let mut out = Vec::with_capacity(self.placement.len());
        let end = self.placement.last().map_or(0, |r| r.end);
        let mut rest = &mut self.data[..end];
        let mut consumed = 0;
        for r in &self.placement {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(r.end - consumed);
            out.push(head);
            rest = tail;
            consumed = r.end;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_shrinks() {
        let mut buffer: PlacedBuffer<u8> = PlacedBuffer::new("flags", 1);
        assert!(buffer.ensure_particles(8, || 0));
        assert!(!buffer.ensure_particles(3, || 0));
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.as_slice().len(), 3);
        assert!(!buffer.ensure_particles(8, || 0));
    }

    #[test]
    fn test_advise_places_strided_ranges() {
        let mut buffer: PlacedBuffer<i32> = PlacedBuffer::new("delta", 3);
        buffer.ensure_particles(5, || 0);
        buffer.advise(&DevicePartition::new(5, 2));
        assert_eq!(buffer.placement(), &[0..6, 6..15]);
        assert_eq!(buffer.advice_count(), 1);
    }

    #[test]
    fn test_device_slices_mut_are_disjoint() {
        let mut buffer: PlacedBuffer<usize> = PlacedBuffer::new("ids", 1);
        buffer.ensure_particles(7, || 0);
        buffer.advise(&DevicePartition::new(7, 3));
        for (d, slice) in buffer.device_slices_mut().into_iter().enumerate() {
            slice.fill(d);
        }
        assert_eq!(buffer.as_slice(), &[0, 0, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_set_stride() {
        let mut buffer: PlacedBuffer<u32> = PlacedBuffer::new("counts", 1);
        buffer.ensure_particles(4, || 0);
        assert!(buffer.set_stride(2, || 0));
        assert_eq!(buffer.as_slice().len(), 8);
        assert!(buffer.set_stride(1, || 0));
        assert_eq!(buffer.capacity(), 8);
        assert!(!buffer.set_stride(1, || 0));
    }

    #[test]
    fn test_smaller_stride_requires_new_advice() {
        let mut buffer: PlacedBuffer<u32> = PlacedBuffer::new("counts", 2);
        buffer.ensure_particles(4, || 0);
        let partition = DevicePartition::new(4, 2);
        buffer.advise(&partition);
        assert_eq!(buffer.placement(), &[0..4, 4..8]);

        assert!(buffer.set_stride(1, || 0));
        buffer.advise(&partition);
        assert_eq!(buffer.placement(), &[0..2, 2..4]);
        assert_eq!(buffer.device_slice(1).len(), 2);
        assert_eq!(buffer.as_slice().len(), 4);
    }

    #[test]
    fn test_unknown_device_slice_is_empty() {
        let buffer: PlacedBuffer<u32> = PlacedBuffer::new("counts", 1);
        assert!(buffer.device_slice(3).is_empty());
    }
}
