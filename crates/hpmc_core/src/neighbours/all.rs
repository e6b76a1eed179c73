//! Brute-force neighbour source: every particle neighbours every other.

use glam::DVec3;

use super::{NeighbourList, NeighbourSource};

/// Neighbour source listing all other particles for every particle.
///
/// Uses a single infinitely wide cell, so trial moves are never rejected
/// for leaving their cell. Intended for small systems and tests.
#[derive(Clone, Debug)]
pub struct AllNeighbours {
    neighbours: NeighbourList,
}

impl AllNeighbours {
    /// Creates the all-pairs relation for `n` particles.
    pub fn new(n: usize) -> Self {
        let mut neighbours = NeighbourList::with_capacity(n);
        let mut row = Vec::with_capacity(n.saturating_sub(1));
        for i in 0..n {
            row.clear();
            row.extend((0..n).filter(|&j| j != i));
            neighbours.push(&row);
        }
        Self { neighbours }
    }
}

impl NeighbourSource for AllNeighbours {
    #[inline]
    fn n_particles(&self) -> usize {
        self.neighbours.len()
    }

    #[inline]
    fn neighbours_of(&self, i: usize) -> &[usize] {
        self.neighbours.get(i)
    }

    #[inline]
    fn cell_of(&self, _position: DVec3) -> usize {
        0
    }

    #[inline]
    fn cell_width(&self) -> DVec3 {
        DVec3::splat(f64::INFINITY)
    }
}
