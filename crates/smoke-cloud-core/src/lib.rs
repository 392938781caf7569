pub mod cell;
pub mod cloud;
pub mod config;
pub mod constants;
pub mod grid;
pub mod metrics;
pub mod neighbors;
pub mod obstacles;

pub use cell::{BlockSignal, CellFactory, CellTemplate, ContactFlag};
pub use cloud::{CloudInitError, SmokeCloud};
pub use config::{CloudConfig, CloudConfigError, GroundEdgeRule};
pub use constants::MAX_GRID_CELLS;
pub use grid::{CellCoord, GridError, OccupancyGrid};
pub use metrics::{CloudSnapshot, Phase, RunSummary, TickReport};
