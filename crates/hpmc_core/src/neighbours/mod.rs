//! Neighbour structures consumed by the update engine.
//!
//! A neighbour source is rebuilt once per sweep from the old positions and
//! then queried read-only by every stage of the sweep. The relation must be
//! symmetric: `j` lists `i` whenever `i` lists `j`.

mod all;
mod cell_list;

pub use all::AllNeighbours;
pub use cell_list::CellList;

use glam::DVec3;

/// Read-only neighbour relation over the particles of one sweep.
pub trait NeighbourSource: Sync {
    /// Number of particles the relation was built for.
    fn n_particles(&self) -> usize;

    /// Neighbours of particle `i`, excluding `i` itself.
    fn neighbours_of(&self, i: usize) -> &[usize];

    /// Cell containing `position`.
    fn cell_of(&self, position: DVec3) -> usize;

    /// Width of a cell along each axis. Infinite along unused axes.
    fn cell_width(&self) -> DVec3;
}

/// Compressed row storage of per-particle neighbour lists.
#[derive(Clone, Debug, Default)]
pub(crate) struct NeighbourList {
    offsets: Vec<usize>,
    indices: Vec<usize>,
}

impl NeighbourList {
    pub(crate) fn with_capacity(rows: usize) -> Self {
        let mut offsets = Vec::with_capacity(rows + 1);
        offsets.push(0);
        Self {
            offsets,
            indices: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, row: &[usize]) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        self.indices.extend_from_slice(row);
        self.offsets.push(self.indices.len());
    }

    pub(crate) fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub(crate) fn get(&self, i: usize) -> &[usize] {
        &self.indices[self.offsets[i]..self.offsets[i + 1]]
    }
}
