//! Static partition of particle indices across execution units.

use std::ops::Range;

/// Contiguous, balanced split of `0..n_particles` over `n_devices` units.
///
/// Device `d` owns `d * n / D .. (d + 1) * n / D`. With more devices than
/// particles some ranges are empty.
///
/// # Examples
///
/// ```rust
/// use hpmc_engine::schedule::DevicePartition;
///
/// let partition = DevicePartition::new(10, 3);
/// assert_eq!(partition.range(0), 0..3);
/// assert_eq!(partition.range(2), 6..10);
/// assert_eq!(partition.device_of(5), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevicePartition {
    bounds: Vec<usize>,
}

impl DevicePartition {
    /// Splits `n_particles` over `n_devices` (at least one) units.
    pub fn new(n_particles: usize, n_devices: usize) -> Self {
        let n_devices = n_devices.max(1);
        let bounds = (0..=n_devices)
            .map(|d| d * n_particles / n_devices)
            .collect();
        Self { bounds }
    }

    /// Number of execution units.
    #[inline]
    pub fn n_devices(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Total number of partitioned particles.
    #[inline]
    pub fn n_particles(&self) -> usize {
        self.bounds[self.bounds.len() - 1]
    }

    /// Index range owned by `device`.
    #[inline]
    pub fn range(&self, device: usize) -> Range<usize> {
        self.bounds[device]..self.bounds[device + 1]
    }

    /// Device owning particle `i`.
    pub fn device_of(&self, i: usize) -> usize {
        (self.bounds.partition_point(|&b| b <= i) - 1).min(self.n_devices() - 1)
    }

    /// Iterator over all device ranges in device order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.bounds.windows(2).map(|w| w[0]..w[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_cover_all_particles() {
        let partition = DevicePartition::new(17, 4);
        let covered: Vec<usize> = partition.ranges().flatten().collect();
        assert_eq!(covered, (0..17).collect::<Vec<_>>());
    }

    #[test]
    fn test_device_of_matches_ranges() {
        let partition = DevicePartition::new(23, 5);
        for d in 0..partition.n_devices() {
            for i in partition.range(d) {
                assert_eq!(partition.device_of(i), d);
            }
        }
    }

    #[test]
    fn test_more_devices_than_particles() {
        let partition = DevicePartition::new(2, 4);
        assert_eq!(partition.n_devices(), 4);
        let sizes: Vec<usize> = partition.ranges().map(|r| r.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 2);
        assert_eq!(partition.device_of(0), partition.ranges().position(|r| r.contains(&0)).unwrap());
    }

    #[test]
    fn test_zero_devices_clamped() {
        let partition = DevicePartition::new(5, 0);
        assert_eq!(partition.n_devices(), 1);
        assert_eq!(partition.range(0), 0..5);
    }
}
