use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Integer cell address. `y` is the vertical axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl CellCoord {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Shift by a signed offset. Returns `None` when any axis would go negative;
    /// the upper bound is the grid's concern.
    pub fn offset(self, dx: isize, dy: isize, dz: isize) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
            z: self.z.checked_add_signed(dz)?,
        })
    }

    pub fn is_ground(self) -> bool {
        self.y == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    ZeroDimension { dims: [usize; 3] },
    CellCountOverflow,
    InvalidScale,
    NonFiniteAnchor,
    OutOfBounds { coord: CellCoord, dims: [usize; 3] },
    AlreadyOccupied { coord: CellCoord },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::ZeroDimension { dims } => {
                write!(f, "grid dimensions must all be positive, got {dims:?}")
            }
            GridError::CellCountOverflow => write!(f, "grid cell count overflows usize"),
            GridError::InvalidScale => write!(f, "cell scale must be positive and finite"),
            GridError::NonFiniteAnchor => write!(f, "grid anchor must be finite"),
            GridError::OutOfBounds { coord, dims } => {
                write!(f, "cell {coord:?} is outside grid {dims:?}")
            }
            GridError::AlreadyOccupied { coord } => write!(f, "cell {coord:?} is already occupied"),
        }
    }
}

impl Error for GridError {}

/// Dense 3D occupancy field. A cell is occupied exactly when it holds a handle.
///
/// Storage is flat, indexed `x + X * (y + Y * z)`.
#[derive(Clone, Debug)]
pub struct OccupancyGrid<H> {
    dims: [usize; 3],
    scale: f64,
    anchor: [f64; 3],
    cells: Vec<Option<H>>,
    occupied: usize,
}

impl<H> OccupancyGrid<H> {
    pub fn new(dims: [usize; 3], scale: f64, anchor: [f64; 3]) -> Result<Self, GridError> {
        if dims.contains(&0) {
            return Err(GridError::ZeroDimension { dims });
        }
        let len = dims[0]
            .checked_mul(dims[1])
            .and_then(|xy| xy.checked_mul(dims[2]))
            .ok_or(GridError::CellCountOverflow)?;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(GridError::InvalidScale);
        }
        if !anchor.iter().all(|v| v.is_finite()) {
            return Err(GridError::NonFiniteAnchor);
        }
        let mut cells = Vec::with_capacity(len);
        cells.resize_with(len, || None);
        Ok(Self {
            dims,
            scale,
            anchor,
            cells,
            occupied: 0,
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn anchor(&self) -> [f64; 3] {
        self.anchor
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied
    }

    /// Ground-level, horizontally centered cell growth starts from.
    pub fn seed_coord(&self) -> CellCoord {
        CellCoord::new(self.dims[0] / 2, 0, self.dims[2] / 2)
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.x < self.dims[0] && coord.y < self.dims[1] && coord.z < self.dims[2]
    }

    fn index(&self, coord: CellCoord) -> Option<usize> {
        self.contains(coord)
            .then(|| coord.x + self.dims[0] * (coord.y + self.dims[1] * coord.z))
    }

    fn coord_of(&self, idx: usize) -> CellCoord {
        let x = idx % self.dims[0];
        let rest = idx / self.dims[0];
        CellCoord::new(x, rest % self.dims[1], rest / self.dims[1])
    }

    /// Out-of-bounds coordinates are never occupied.
    pub fn is_occupied(&self, coord: CellCoord) -> bool {
        self.index(coord)
            .is_some_and(|idx| self.cells[idx].is_some())
    }

    pub fn handle(&self, coord: CellCoord) -> Option<&H> {
        self.index(coord).and_then(|idx| self.cells[idx].as_ref())
    }

    /// Store `handle` at a vacant in-bounds cell. On failure the handle is
    /// returned alongside the error so the caller can dispose of it.
    pub fn set_occupied(&mut self, coord: CellCoord, handle: H) -> Result<(), (GridError, H)> {
        let Some(idx) = self.index(coord) else {
            return Err((
                GridError::OutOfBounds {
                    coord,
                    dims: self.dims,
                },
                handle,
            ));
        };
        if self.cells[idx].is_some() {
            return Err((GridError::AlreadyOccupied { coord }, handle));
        }
        self.cells[idx] = Some(handle);
        self.occupied += 1;
        Ok(())
    }

    /// Mark a cell absent and hand back its handle for disposal.
    pub fn clear(&mut self, coord: CellCoord) -> Option<H> {
        let idx = self.index(coord)?;
        let handle = self.cells[idx].take();
        if handle.is_some() {
            self.occupied -= 1;
        }
        handle
    }

    /// Remove every handle, leaving the grid empty.
    pub fn drain(&mut self) -> Vec<H> {
        self.occupied = 0;
        self.cells.iter_mut().filter_map(Option::take).collect()
    }

    /// Occupied cells in ascending storage order.
    pub fn occupied_coords(&self) -> Vec<CellCoord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_some())
            .map(|(idx, _)| self.coord_of(idx))
            .collect()
    }

    pub fn iter_occupied(&self) -> impl Iterator<Item = (CellCoord, &H)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(idx, cell)| cell.as_ref().map(|h| (self.coord_of(idx), h)))
    }

    /// World-space center of a cell, relative to the anchor the seed sits on.
    pub fn world_position(&self, coord: CellCoord) -> [f64; 3] {
        let half_x = (self.dims[0] / 2) as f64;
        let half_z = (self.dims[2] / 2) as f64;
        let local = [
            coord.x as f64 - half_x,
            coord.y as f64 + self.scale / 2.0,
            coord.z as f64 - half_z,
        ];
        [
            local[0] * self.scale + self.anchor[0],
            local[1] * self.scale + self.anchor[1],
            local[2] * self.scale + self.anchor[2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(dims: [usize; 3]) -> OccupancyGrid<u32> {
        OccupancyGrid::new(dims, 1.0, [0.0; 3]).unwrap()
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            OccupancyGrid::<u32>::new([3, 0, 3], 1.0, [0.0; 3]),
            Err(GridError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn rejects_overflowing_cell_count() {
        assert_eq!(
            OccupancyGrid::<u32>::new([usize::MAX, 2, 2], 1.0, [0.0; 3]).unwrap_err(),
            GridError::CellCountOverflow
        );
    }

    #[test]
    fn rejects_bad_scale_and_anchor() {
        assert_eq!(
            OccupancyGrid::<u32>::new([2, 2, 2], 0.0, [0.0; 3]).unwrap_err(),
            GridError::InvalidScale
        );
        assert_eq!(
            OccupancyGrid::<u32>::new([2, 2, 2], 1.0, [0.0, f64::NAN, 0.0]).unwrap_err(),
            GridError::NonFiniteAnchor
        );
    }

    #[test]
    fn new_grid_is_all_absent() {
        let g = grid([4, 2, 3]);
        assert_eq!(g.cell_count(), 24);
        assert!(g.is_empty());
        assert!(g.occupied_coords().is_empty());
        assert_eq!(g.seed_coord(), CellCoord::new(2, 0, 1));
    }

    #[test]
    fn out_of_bounds_is_never_occupied() {
        let g = grid([2, 2, 2]);
        assert!(!g.is_occupied(CellCoord::new(2, 0, 0)));
        assert!(!g.is_occupied(CellCoord::new(0, 5, 0)));
        assert!(!g.is_occupied(CellCoord::new(0, 0, usize::MAX)));
        assert!(CellCoord::new(0, 0, 0).offset(-1, 0, 0).is_none());
    }

    #[test]
    fn set_and_clear_keep_handle_and_presence_consistent() {
        let mut g = grid([3, 3, 3]);
        let c = CellCoord::new(1, 2, 0);
        g.set_occupied(c, 7).unwrap();
        assert!(g.is_occupied(c));
        assert_eq!(g.handle(c), Some(&7));
        assert_eq!(g.occupied_count(), 1);

        let (err, handle) = g.set_occupied(c, 8).unwrap_err();
        assert_eq!(err, GridError::AlreadyOccupied { coord: c });
        assert_eq!(handle, 8);
        assert_eq!(g.handle(c), Some(&7));

        assert_eq!(g.clear(c), Some(7));
        assert!(!g.is_occupied(c));
        assert_eq!(g.clear(c), None);
        assert_eq!(g.occupied_count(), 0);
    }

    #[test]
    fn set_out_of_bounds_returns_handle() {
        let mut g = grid([1, 1, 1]);
        let (err, handle) = g.set_occupied(CellCoord::new(0, 1, 0), 3).unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { .. }));
        assert_eq!(handle, 3);
        assert!(g.is_empty());
    }

    #[test]
    fn occupied_coords_roundtrip_flat_index() {
        let mut g = grid([3, 4, 5]);
        let coords = [
            CellCoord::new(2, 3, 4),
            CellCoord::new(0, 0, 0),
            CellCoord::new(1, 2, 3),
        ];
        for (i, c) in coords.iter().enumerate() {
            g.set_occupied(*c, i as u32).unwrap();
        }
        let mut found = g.occupied_coords();
        found.sort();
        let mut expected = coords.to_vec();
        expected.sort();
        assert_eq!(found, expected);
        assert_eq!(g.iter_occupied().count(), 3);
    }

    #[test]
    fn drain_empties_grid() {
        let mut g = grid([2, 2, 2]);
        g.set_occupied(CellCoord::new(0, 0, 0), 1).unwrap();
        g.set_occupied(CellCoord::new(1, 1, 1), 2).unwrap();
        let mut handles = g.drain();
        handles.sort();
        assert_eq!(handles, vec![1, 2]);
        assert!(g.is_empty());
        assert!(!g.is_occupied(CellCoord::new(1, 1, 1)));
    }

    #[test]
    fn seed_maps_to_half_cell_above_origin() {
        let g = grid([87, 4, 87]);
        assert_eq!(g.seed_coord(), CellCoord::new(43, 0, 43));
        assert_eq!(g.world_position(g.seed_coord()), [0.0, 0.5, 0.0]);
    }

    #[test]
    fn world_position_applies_scale_and_anchor() {
        let g: OccupancyGrid<u32> = OccupancyGrid::new([5, 3, 5], 2.0, [10.0, 1.0, -4.0]).unwrap();
        // local = (3 - 2, 1 + 1, 0 - 2) = (1, 2, -2); scaled by 2 and shifted.
        assert_eq!(
            g.world_position(CellCoord::new(3, 1, 0)),
            [12.0, 5.0, -8.0]
        );
    }
}
