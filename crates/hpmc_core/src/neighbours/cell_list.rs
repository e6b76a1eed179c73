//! Cell list with a 27-cell (9-cell in 2D) stencil.
//!
//! Build runs in three passes over the particles:
//!
//! ```text
//! Pass 1: bin      particle -> cell id, per-cell count
//! Pass 2: scan     cell_count -> cell_start (exclusive prefix sum)
//! Pass 3: scatter  sorted_indices[cell_start[c] + k] = i
//! ```
//!
//! Each particle's neighbour list is then the union of the stencil cells
//! around its own cell, without the particle itself.

use glam::DVec3;

use super::{NeighbourList, NeighbourSource};
use crate::types::{CoreError, SimBox};

/// Spatial binning of particles into cells at least `min_width` wide.
#[derive(Clone, Debug)]
pub struct CellList {
    sim_box: SimBox,
    n_cells: [usize; 3],
    cell_width: DVec3,
    shift: DVec3,
    cell_start: Vec<usize>,
    cell_count: Vec<usize>,
    sorted_indices: Vec<usize>,
    neighbours: NeighbourList,
}

impl CellList {
    /// Bins `positions` into cells no narrower than `min_width`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidCellWidth` if `min_width` is not positive
    /// and finite.
    pub fn build(sim_box: &SimBox, positions: &[DVec3], min_width: f64) -> Result<Self, CoreError> {
        Self::build_shifted(sim_box, positions, min_width, DVec3::ZERO)
    }

    /// Like [`CellList::build`] with the grid displaced by `shift`, a
    /// fraction of the box length along each periodic axis.
    ///
    /// Moves that leave their cell are rejected by the engine, so drivers
    /// draw a fresh shift every sweep to let particles cross cell faces.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidCellWidth` if `min_width` is not positive
    /// and finite.
    pub fn build_shifted(
        sim_box: &SimBox,
        positions: &[DVec3],
        min_width: f64,
        shift: DVec3,
    ) -> Result<Self, CoreError> {
        if !(min_width.is_finite() && min_width > 0.0) {
            return Err(CoreError::InvalidCellWidth(min_width));
        }
        let lengths = sim_box.lengths();
        let mut n_cells = [1usize; 3];
        let mut cell_width = DVec3::splat(f64::INFINITY);
        for axis in 0..sim_box.dimensions() as usize {
            n_cells[axis] = ((lengths[axis] / min_width).floor() as usize).max(1);
            cell_width[axis] = lengths[axis] / n_cells[axis] as f64;
        }
        let n_cells_total = n_cells[0] * n_cells[1] * n_cells[2];

        let mut list = Self {
            sim_box: *sim_box,
            n_cells,
            cell_width,
            shift: DVec3::select(
                glam::BVec3::from(sim_box.periodic()),
                shift - shift.floor(),
                DVec3::ZERO,
            ),
            cell_start: vec![0; n_cells_total],
            cell_count: vec![0; n_cells_total],
            sorted_indices: Vec::with_capacity(positions.len()),
            neighbours: NeighbourList::default(),
        };

        let cell_ids: Vec<usize> = positions.iter().map(|&p| list.cell_of(p)).collect();
        for &c in &cell_ids {
            list.cell_count[c] += 1;
        }
        let mut offset = 0;
        for c in 0..n_cells_total {
            list.cell_start[c] = offset;
            offset += list.cell_count[c];
        }
        let mut fill = list.cell_start.clone();
        list.sorted_indices = vec![0; positions.len()];
        for (i, &c) in cell_ids.iter().enumerate() {
            list.sorted_indices[fill[c]] = i;
            fill[c] += 1;
        }

        let mut neighbours = NeighbourList::with_capacity(positions.len());
        let mut stencil = Vec::with_capacity(27);
        let mut members = Vec::new();
        for (i, &c) in cell_ids.iter().enumerate() {
            list.stencil(c, &mut stencil);
            members.clear();
            for &cell in &stencil {
                members.extend(list.members(cell).iter().copied().filter(|&j| j != i));
            }
            members.sort_unstable();
            neighbours.push(&members);
        }
        list.neighbours = neighbours;
        Ok(list)
    }

    /// Number of cells along each axis.
    #[inline]
    pub fn n_cells(&self) -> [usize; 3] {
        self.n_cells
    }

    /// Particle indices binned into `cell`.
    pub fn members(&self, cell: usize) -> &[usize] {
        let start = self.cell_start[cell];
        &self.sorted_indices[start..start + self.cell_count[cell]]
    }

    fn coords(&self, cell: usize) -> [usize; 3] {
        let [nx, ny, _] = self.n_cells;
        [cell % nx, (cell / nx) % ny, cell / (nx * ny)]
    }

    fn stencil(&self, cell: usize, out: &mut Vec<usize>) {
        out.clear();
        let centre = self.coords(cell);
        let periodic = self.sim_box.periodic();
        let [nx, ny, _] = self.n_cells;
        for dz in -1i64..=1 {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let mut coords = [0usize; 3];
                    let mut inside = true;
                    for (axis, d) in [dx, dy, dz].into_iter().enumerate() {
                        let n = self.n_cells[axis] as i64;
                        let mut c = centre[axis] as i64 + d;
                        if c < 0 || c >= n {
                            if periodic[axis] {
                                c = c.rem_euclid(n);
                            } else {
                                inside = false;
                                break;
                            }
                        }
                        coords[axis] = c as usize;
                    }
                    if inside {
                        out.push((coords[2] * ny + coords[1]) * nx + coords[0]);
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
    }
}

impl NeighbourSource for CellList {
    #[inline]
    fn n_particles(&self) -> usize {
        self.neighbours.len()
    }

    #[inline]
    fn neighbours_of(&self, i: usize) -> &[usize] {
        self.neighbours.get(i)
    }

    fn cell_of(&self, position: DVec3) -> usize {
        let f = self.sim_box.fractional(position) + self.shift;
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let n = self.n_cells[axis];
            let g = if f[axis] >= 1.0 { f[axis] - 1.0 } else { f[axis] };
            idx[axis] = ((g * n as f64) as usize).min(n - 1);
        }
        (idx[2] * self.n_cells[1] + idx[1]) * self.n_cells[0] + idx[0]
    }

    #[inline]
    fn cell_width(&self) -> DVec3 {
        self.cell_width
    }
}
