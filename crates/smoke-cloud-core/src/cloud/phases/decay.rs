use super::super::SmokeCloud;
use crate::cell::CellFactory;
use crate::config::CloudConfig;
use crate::grid::{CellCoord, OccupancyGrid};
use crate::metrics::{Phase, TickReport};
use crate::neighbors;

/// Outcome of one decay tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecayTick {
    /// One shell of this many cells was removed.
    Peeled(usize),
    /// Nothing left on the surface: the cloud is gone.
    Complete,
}

/// Resumable decay state.
#[derive(Clone, Debug)]
pub struct DecayRun {
    interval: f64,
    elapsed: f64,
    ticks: usize,
    complete: bool,
}

impl DecayRun {
    pub fn new(config: &CloudConfig) -> Self {
        Self {
            interval: 1.0 / config.decay_speed,
            elapsed: 0.0,
            ticks: 0,
            complete: false,
        }
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn tick<F: CellFactory>(
        &mut self,
        grid: &mut OccupancyGrid<F::Handle>,
        factory: &mut F,
    ) -> DecayTick {
        if self.complete {
            return DecayTick::Complete;
        }
        self.ticks += 1;
        let removed = peel_shell(grid, factory);
        if removed == 0 {
            self.complete = true;
            return DecayTick::Complete;
        }
        log::debug!(
            "decay tick {}: peeled {} cells, {} left",
            self.ticks,
            removed,
            grid.occupied_count()
        );
        DecayTick::Peeled(removed)
    }

    /// Feed elapsed time and run every tick that has come due. Returns
    /// `(ticks, cells removed)`.
    pub fn advance<F: CellFactory>(
        &mut self,
        dt: f64,
        grid: &mut OccupancyGrid<F::Handle>,
        factory: &mut F,
    ) -> (usize, usize) {
        let mut ticks = 0;
        let mut removed = 0;
        self.elapsed += dt;
        while !self.complete && self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            ticks += 1;
            if let DecayTick::Peeled(n) = self.tick(grid, factory) {
                removed += n;
            }
        }
        (ticks, removed)
    }
}

/// Remove every occupied cell exposed to the exterior, all at once.
pub fn peel_shell<F: CellFactory>(grid: &mut OccupancyGrid<F::Handle>, factory: &mut F) -> usize {
    let shell: Vec<CellCoord> = grid
        .occupied_coords()
        .into_iter()
        .filter(|&coord| neighbors::is_outside_surface(grid, coord))
        .collect();
    for &coord in &shell {
        if let Some(handle) = grid.clear(coord) {
            factory.destroy(handle);
        }
    }
    shell.len()
}

impl<F: CellFactory> SmokeCloud<F> {
    /// Enter `Decaying` and peel the first shell right away.
    pub(in crate::cloud) fn start_decay_phase(&mut self, report: &mut TickReport) {
        self.phase = Phase::Decaying;
        log::info!(
            "smoke cloud decaying: {} cells",
            self.grid.as_ref().map_or(0, OccupancyGrid::occupied_count)
        );
        let mut run = DecayRun::new(&self.config);
        if let Some(grid) = self.grid.as_mut() {
            report.decay_ticks += 1;
            if let DecayTick::Peeled(n) = run.tick(grid, &mut self.factory) {
                report.cells_removed += n;
            }
        }
        let complete = run.is_complete() || self.grid.is_none();
        self.decay = Some(run);
        if complete {
            self.finish_decay(report);
        }
    }

    pub(in crate::cloud) fn step_decay_phase(&mut self, dt: f64, report: &mut TickReport) {
        let (Some(grid), Some(run)) = (self.grid.as_mut(), self.decay.as_mut()) else {
            return;
        };
        let (ticks, removed) = run.advance(dt, grid, &mut self.factory);
        report.decay_ticks += ticks;
        report.cells_removed += removed;
        if run.is_complete() {
            self.finish_decay(report);
        }
    }

    /// Enter `Decayed`: drop the grid, release the template, and flag a
    /// despawn if configured.
    pub(in crate::cloud) fn finish_decay(&mut self, report: &mut TickReport) {
        let leftovers = self.release_cells();
        report.cells_removed += leftovers;
        let ticks = self.decay.take().map_or(0, |run| run.ticks());
        self.growth = None;
        self.release_template();
        self.phase = Phase::Decayed;
        if self.config.destroy_on_finish {
            self.despawn_requested = true;
            report.despawn_requested = true;
        }
        log::info!("smoke cloud decayed after {ticks} decay ticks");
    }
}
