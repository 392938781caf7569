use crate::cell::{CellFactory, CellTemplate};
use crate::config::{CloudConfig, CloudConfigError};
use crate::grid::{GridError, OccupancyGrid};
use crate::metrics::{Phase, TickReport};
use std::{error::Error, fmt};

pub use phases::decay::{peel_shell, DecayRun, DecayTick};
pub use phases::growth::{frontier, rounding_pass, GrowthRun, GrowthTick};

#[derive(Debug, Clone, PartialEq)]
pub enum CloudInitError {
    Config(CloudConfigError),
    Grid(GridError),
}

impl fmt::Display for CloudInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudInitError::Config(e) => write!(f, "{}", e),
            CloudInitError::Grid(e) => write!(f, "{}", e),
        }
    }
}

impl From<CloudConfigError> for CloudInitError {
    fn from(err: CloudConfigError) -> Self {
        CloudInitError::Config(err)
    }
}

impl From<GridError> for CloudInitError {
    fn from(err: GridError) -> Self {
        CloudInitError::Grid(err)
    }
}

impl Error for CloudInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CloudInitError::Config(e) => Some(e),
            CloudInitError::Grid(e) => Some(e),
        }
    }
}

/// One smoke cloud: phase state machine plus the grid it grows and erodes.
///
/// Driven by `advance(dt)` from a single host loop. Every cell handle the
/// cloud instantiates is destroyed through the same factory, either by
/// rounding, decay, or `teardown` (which also runs on drop).
pub struct SmokeCloud<F: CellFactory> {
    config: CloudConfig,
    template: CellTemplate,
    factory: F,
    anchor: [f64; 3],
    phase: Phase,
    fuse_remaining: f64,
    lifetime_remaining: f64,
    grid: Option<OccupancyGrid<F::Handle>>,
    growth: Option<GrowthRun>,
    decay: Option<DecayRun>,
    template_released: bool,
    despawn_requested: bool,
    torn_down: bool,
    elapsed: f64,
}

impl<F: CellFactory> SmokeCloud<F> {
    pub const MAX_GRID_CELLS: usize = crate::constants::MAX_GRID_CELLS;

    /// Validate `config` and build an armed or untriggered cloud anchored at
    /// `anchor`. No cells exist until the fuse runs out.
    pub fn new(config: CloudConfig, factory: F, anchor: [f64; 3]) -> Result<Self, CloudInitError> {
        config.validate()?;
        if !anchor.iter().all(|v| v.is_finite()) {
            return Err(CloudInitError::Grid(GridError::NonFiniteAnchor));
        }
        let phase = if config.start_thrown {
            Phase::Thrown
        } else {
            Phase::Untriggered
        };
        Ok(Self {
            template: CellTemplate::from_config(&config),
            fuse_remaining: config.fuse_delay,
            lifetime_remaining: config.lifetime,
            config,
            factory,
            anchor,
            phase,
            grid: None,
            growth: None,
            decay: None,
            template_released: false,
            despawn_requested: false,
            torn_down: false,
            elapsed: 0.0,
        })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn template(&self) -> &CellTemplate {
        &self.template
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn grid(&self) -> Option<&OccupancyGrid<F::Handle>> {
        self.grid.as_ref()
    }

    pub fn growth(&self) -> Option<&GrowthRun> {
        self.growth.as_ref()
    }

    pub fn decay(&self) -> Option<&DecayRun> {
        self.decay.as_ref()
    }

    pub fn occupied_count(&self) -> usize {
        self.grid.as_ref().map_or(0, OccupancyGrid::occupied_count)
    }

    pub fn despawn_requested(&self) -> bool {
        self.despawn_requested
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Seconds of simulated time fed through `advance`.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Arm an untriggered cloud. Returns false, and changes nothing, in any
    /// other phase.
    pub fn trigger(&mut self) -> bool {
        if self.torn_down || self.phase != Phase::Untriggered {
            return false;
        }
        self.phase = Phase::Thrown;
        log::info!("smoke cloud armed, fuse {:.3}s", self.fuse_remaining);
        true
    }

    /// World-space centers of every occupied cell.
    pub fn occupied_positions(&self) -> Vec<[f64; 3]> {
        self.grid.as_ref().map_or_else(Vec::new, |grid| {
            grid.occupied_coords()
                .into_iter()
                .map(|coord| grid.world_position(coord))
                .collect()
        })
    }

    /// Advance simulated time by `dt` seconds. Countdowns are checked once;
    /// growth and decay run as many ticks as have come due. A phase change
    /// uses up the rest of `dt`.
    pub fn advance(&mut self, dt: f64) -> TickReport {
        let mut report = TickReport {
            phase_before: self.phase,
            phase_after: self.phase,
            ..TickReport::default()
        };
        if self.torn_down || !(dt.is_finite() && dt >= 0.0) {
            return report;
        }
        self.elapsed += dt;

        match self.phase {
            Phase::Untriggered | Phase::Decayed => {}
            Phase::Thrown => {
                self.fuse_remaining -= dt;
                if self.fuse_remaining < 0.0 {
                    self.start_growth_phase(&mut report);
                }
            }
            Phase::Deploying => self.step_growth_phase(dt, &mut report),
            Phase::Deployed => {
                self.lifetime_remaining -= dt;
                if self.lifetime_remaining < 0.0 {
                    self.start_decay_phase(&mut report);
                }
            }
            Phase::Decaying => self.step_decay_phase(dt, &mut report),
        }

        report.phase_after = self.phase;
        report
    }

    /// Destroy every outstanding cell and release the template. Safe to call
    /// more than once; the cloud is inert afterwards.
    pub fn teardown(&mut self) -> usize {
        if self.torn_down {
            return 0;
        }
        let destroyed = self.release_cells();
        self.growth = None;
        self.decay = None;
        self.release_template();
        self.torn_down = true;
        if destroyed > 0 {
            log::debug!(
                "smoke cloud torn down in {:?}: destroyed {destroyed} cells",
                self.phase
            );
        }
        destroyed
    }

    /// Drop the grid, destroying any handles it still holds.
    fn release_cells(&mut self) -> usize {
        let Some(mut grid) = self.grid.take() else {
            return 0;
        };
        let handles = grid.drain();
        let count = handles.len();
        for handle in handles {
            self.factory.destroy(handle);
        }
        count
    }

    fn release_template(&mut self) {
        if !self.template_released {
            self.template_released = true;
            self.factory.release_template();
        }
    }
}

impl<F: CellFactory> Drop for SmokeCloud<F> {
    fn drop(&mut self) {
        self.teardown();
    }
}

mod phases;
