/// Largest grid the controller will allocate, in cells. Keeps `X * Y * Z`
/// well inside `usize` and bounds the per-tick full-grid scans.
pub const MAX_GRID_CELLS: usize = 1 << 24;

/// Cell visuals are shrunk slightly so neighboring cells do not report contact
/// with each other through shared faces.
pub const CELL_VISUAL_SHRINK: f64 = 0.95;

/// Neighbor count below which a cell above ground is treated as a margin.
pub const EDGE_NEIGHBOR_THRESHOLD: usize = 5;

/// Neighbor count below which a ground cell is a margin under
/// `GroundEdgeRule::Threshold`.
pub const GROUND_EDGE_NEIGHBOR_THRESHOLD: usize = 4;
