//! Face-neighbor rules shared by the rounding pass and decay.

use crate::config::GroundEdgeRule;
use crate::constants::{EDGE_NEIGHBOR_THRESHOLD, GROUND_EDGE_NEIGHBOR_THRESHOLD};
use crate::grid::{CellCoord, OccupancyGrid};

/// The six axis-aligned neighbor offsets.
pub const FACE_OFFSETS: [[isize; 3]; 6] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];

/// Face neighbors of `coord` that lie inside the grid.
pub fn face_neighbors<H>(
    grid: &OccupancyGrid<H>,
    coord: CellCoord,
) -> impl Iterator<Item = Option<CellCoord>> + '_ {
    FACE_OFFSETS.iter().map(move |&[dx, dy, dz]| {
        coord
            .offset(dx, dy, dz)
            .filter(|&neighbor| grid.contains(neighbor))
    })
}

/// Number of occupied face neighbors, in `0..=6`.
pub fn neighbor_count<H>(grid: &OccupancyGrid<H>, coord: CellCoord) -> usize {
    face_neighbors(grid, coord)
        .flatten()
        .filter(|&neighbor| grid.is_occupied(neighbor))
        .count()
}

/// Whether a cell is a thin margin the rounding pass should trim.
pub fn is_edge<H>(grid: &OccupancyGrid<H>, coord: CellCoord, ground_rule: GroundEdgeRule) -> bool {
    let count = neighbor_count(grid, coord);
    if coord.is_ground() {
        return match ground_rule {
            GroundEdgeRule::Exempt => false,
            GroundEdgeRule::Threshold => count < GROUND_EDGE_NEIGHBOR_THRESHOLD,
        };
    }
    count < EDGE_NEIGHBOR_THRESHOLD
}

/// Whether any face neighbor is vacant or off the grid.
pub fn is_outside_surface<H>(grid: &OccupancyGrid<H>, coord: CellCoord) -> bool {
    face_neighbors(grid, coord).any(|neighbor| match neighbor {
        Some(neighbor) => !grid.is_occupied(neighbor),
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(dims: [usize; 3]) -> OccupancyGrid<()> {
        let mut grid = OccupancyGrid::new(dims, 1.0, [0.0; 3]).unwrap();
        for x in 0..dims[0] {
            for y in 0..dims[1] {
                for z in 0..dims[2] {
                    grid.set_occupied(CellCoord::new(x, y, z), ()).unwrap();
                }
            }
        }
        grid
    }

    #[test]
    fn isolated_cell_has_no_neighbors_and_is_outside() {
        let mut grid = OccupancyGrid::new([5, 5, 5], 1.0, [0.0; 3]).unwrap();
        let c = CellCoord::new(2, 2, 2);
        grid.set_occupied(c, ()).unwrap();
        assert_eq!(neighbor_count(&grid, c), 0);
        assert!(is_outside_surface(&grid, c));
        assert!(is_edge(&grid, c, GroundEdgeRule::Exempt));
    }

    #[test]
    fn interior_cell_has_six_neighbors() {
        let grid = filled([3, 3, 3]);
        let center = CellCoord::new(1, 1, 1);
        assert_eq!(neighbor_count(&grid, center), 6);
        assert!(!is_outside_surface(&grid, center));
        assert!(!is_edge(&grid, center, GroundEdgeRule::Exempt));
    }

    #[test]
    fn out_of_bounds_neighbors_never_count_but_expose_surface() {
        let grid = filled([3, 3, 3]);
        let corner = CellCoord::new(0, 0, 0);
        assert_eq!(neighbor_count(&grid, corner), 3);
        assert!(is_outside_surface(&grid, corner));

        let top_face = CellCoord::new(1, 2, 1);
        assert_eq!(neighbor_count(&grid, top_face), 5);
        assert!(is_outside_surface(&grid, top_face));
        assert!(!is_edge(&grid, top_face, GroundEdgeRule::Exempt));
    }

    #[test]
    fn raised_cell_with_four_neighbors_is_edge() {
        let grid = filled([3, 3, 3]);
        let top_edge = CellCoord::new(0, 2, 1);
        assert_eq!(neighbor_count(&grid, top_edge), 4);
        assert!(is_edge(&grid, top_edge, GroundEdgeRule::Exempt));
    }

    #[test]
    fn ground_rule_selects_margin_behavior() {
        let mut grid = OccupancyGrid::new([3, 2, 3], 1.0, [0.0; 3]).unwrap();
        let lonely = CellCoord::new(1, 0, 1);
        grid.set_occupied(lonely, ()).unwrap();
        grid.set_occupied(CellCoord::new(0, 0, 1), ()).unwrap();
        assert_eq!(neighbor_count(&grid, lonely), 1);
        assert!(!is_edge(&grid, lonely, GroundEdgeRule::Exempt));
        assert!(is_edge(&grid, lonely, GroundEdgeRule::Threshold));

        let ground = filled([3, 1, 3]);
        let middle = CellCoord::new(1, 0, 1);
        assert_eq!(neighbor_count(&ground, middle), 4);
        assert!(!is_edge(&ground, middle, GroundEdgeRule::Threshold));
    }

    #[test]
    fn single_cell_grid_is_all_surface() {
        let grid = filled([1, 1, 1]);
        let only = CellCoord::new(0, 0, 0);
        assert_eq!(neighbor_count(&grid, only), 0);
        assert!(is_outside_surface(&grid, only));
    }
}
