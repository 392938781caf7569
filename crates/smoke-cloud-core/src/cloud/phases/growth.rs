use super::super::SmokeCloud;
use crate::cell::{BlockSignal, CellFactory, CellTemplate};
use crate::config::{CloudConfig, GroundEdgeRule};
use crate::grid::{CellCoord, OccupancyGrid};
use crate::metrics::{Phase, TickReport};
use crate::neighbors;
use std::collections::BTreeSet;

/// Outcome of one growth tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrowthTick {
    pub added: usize,
    /// No more growth ticks will run: budget spent or frontier empty.
    pub finished: bool,
}

/// Resumable growth state: budget, cadence, and tick bookkeeping.
#[derive(Clone, Debug)]
pub struct GrowthRun {
    budget: usize,
    height_cap: usize,
    roundness: usize,
    ground_rule: GroundEdgeRule,
    interval: f64,
    elapsed: f64,
    ticks: usize,
    finished: bool,
}

impl GrowthRun {
    pub fn new(config: &CloudConfig) -> Self {
        Self {
            budget: config.volume,
            height_cap: config.height,
            roundness: config.roundness,
            ground_rule: config.ground_edge_rule,
            interval: 1.0 / config.deploy_speed,
            elapsed: 0.0,
            ticks: 0,
            finished: false,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Occupy the seed cell if the grid is empty. Returns the number of cells
    /// added (0 or 1).
    pub fn seed<F: CellFactory>(
        &mut self,
        grid: &mut OccupancyGrid<F::Handle>,
        factory: &mut F,
        template: &CellTemplate,
    ) -> usize {
        if !grid.is_empty() || self.budget == 0 {
            self.finished |= self.budget == 0;
            return 0;
        }
        let seed = grid.seed_coord();
        let added = self.materialize(grid, factory, template, &[seed]);
        if self.budget == 0 {
            self.finished = true;
        }
        added
    }

    /// Run one expansion step: scan the frontier and fill it, nearest to the
    /// seed first, until the budget runs out.
    pub fn tick<F: CellFactory>(
        &mut self,
        grid: &mut OccupancyGrid<F::Handle>,
        factory: &mut F,
        template: &CellTemplate,
    ) -> GrowthTick {
        if self.finished {
            return GrowthTick {
                added: 0,
                finished: true,
            };
        }
        self.ticks += 1;
        let candidates = frontier(grid, self.height_cap);
        if candidates.is_empty() {
            log::debug!("growth tick {}: frontier empty, stopping early", self.ticks);
            self.finished = true;
            return GrowthTick {
                added: 0,
                finished: true,
            };
        }
        let added = self.materialize(grid, factory, template, &candidates);
        self.finished = self.budget == 0;
        log::debug!(
            "growth tick {}: {} candidates, {} placed, {} budget left",
            self.ticks,
            candidates.len(),
            added,
            self.budget
        );
        GrowthTick {
            added,
            finished: self.finished,
        }
    }

    /// Feed elapsed time and run every tick that has come due.
    pub fn advance<F: CellFactory>(
        &mut self,
        dt: f64,
        grid: &mut OccupancyGrid<F::Handle>,
        factory: &mut F,
        template: &CellTemplate,
    ) -> (usize, usize) {
        let mut ticks = 0;
        let mut added = 0;
        self.elapsed += dt;
        while !self.finished && self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            let tick = self.tick(grid, factory, template);
            ticks += 1;
            added += tick.added;
        }
        (ticks, added)
    }

    /// Trim margins `roundness` times. Returns the number of cells removed.
    pub fn round<F: CellFactory>(
        &self,
        grid: &mut OccupancyGrid<F::Handle>,
        factory: &mut F,
    ) -> usize {
        (0..self.roundness)
            .map(|_| rounding_pass(grid, factory, self.ground_rule))
            .sum()
    }

    fn materialize<F: CellFactory>(
        &mut self,
        grid: &mut OccupancyGrid<F::Handle>,
        factory: &mut F,
        template: &CellTemplate,
        cells: &[CellCoord],
    ) -> usize {
        let mut added = 0;
        for &coord in cells {
            if self.budget == 0 {
                break;
            }
            let handle = factory.instantiate(template, grid.world_position(coord));
            match grid.set_occupied(coord, handle) {
                Ok(()) => {
                    self.budget -= 1;
                    added += 1;
                }
                Err((err, handle)) => {
                    log::warn!("skipping growth candidate: {err}");
                    factory.destroy(handle);
                }
            }
        }
        added
    }
}

/// Vacant cells in the 26-neighborhood of every occupied, unblocked cell,
/// below `height_cap`. Sorted by squared distance from the seed, then by
/// coordinate.
pub fn frontier<H: BlockSignal>(grid: &OccupancyGrid<H>, height_cap: usize) -> Vec<CellCoord> {
    let mut spots = BTreeSet::new();
    for (coord, handle) in grid.iter_occupied() {
        if handle.is_blocked() {
            continue;
        }
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(spot) = coord.offset(dx, dy, dz) else {
                        continue;
                    };
                    if spot.y < height_cap && grid.contains(spot) && !grid.is_occupied(spot) {
                        spots.insert(spot);
                    }
                }
            }
        }
    }

    let seed = grid.seed_coord();
    let mut spots: Vec<CellCoord> = spots.into_iter().collect();
    spots.sort_by_key(|&spot| (distance_sq(seed, spot), spot));
    spots
}

fn distance_sq(a: CellCoord, b: CellCoord) -> usize {
    let dx = a.x.abs_diff(b.x);
    let dy = a.y.abs_diff(b.y);
    let dz = a.z.abs_diff(b.z);
    dx * dx + dy * dy + dz * dz
}

/// Clear every margin cell found before any removal in this pass.
pub fn rounding_pass<F: CellFactory>(
    grid: &mut OccupancyGrid<F::Handle>,
    factory: &mut F,
    ground_rule: GroundEdgeRule,
) -> usize {
    let margins: Vec<CellCoord> = grid
        .occupied_coords()
        .into_iter()
        .filter(|&coord| neighbors::is_edge(grid, coord, ground_rule))
        .collect();
    for &coord in &margins {
        if let Some(handle) = grid.clear(coord) {
            factory.destroy(handle);
        }
    }
    margins.len()
}

impl<F: CellFactory> SmokeCloud<F> {
    /// Allocate the grid, place the seed, and enter `Deploying`.
    pub(in crate::cloud) fn start_growth_phase(&mut self, report: &mut TickReport) {
        let grid = match OccupancyGrid::new(self.config.grid_dims(), self.config.scale, self.anchor)
        {
            Ok(grid) => grid,
            Err(err) => {
                log::error!("cannot allocate smoke grid: {err}");
                self.finish_decay(report);
                return;
            }
        };
        let grid = self.grid.insert(grid);
        let mut run = GrowthRun::new(&self.config);
        report.cells_added += run.seed(grid, &mut self.factory, &self.template);
        self.phase = Phase::Deploying;
        log::info!(
            "smoke cloud deploying: grid {:?}, budget {}",
            grid.dims(),
            run.budget()
        );
        self.growth = Some(run);
        if self.growth.as_ref().is_some_and(GrowthRun::is_finished) {
            self.finish_growth(report);
        }
    }

    pub(in crate::cloud) fn step_growth_phase(&mut self, dt: f64, report: &mut TickReport) {
        let (Some(grid), Some(run)) = (self.grid.as_mut(), self.growth.as_mut()) else {
            return;
        };
        let (ticks, added) = run.advance(dt, grid, &mut self.factory, &self.template);
        report.growth_ticks += ticks;
        report.cells_added += added;
        if run.is_finished() {
            self.finish_growth(report);
        }
    }

    fn finish_growth(&mut self, report: &mut TickReport) {
        let Some(run) = self.growth.take() else {
            return;
        };
        if let Some(grid) = self.grid.as_mut() {
            let removed = run.round(grid, &mut self.factory);
            report.cells_removed += removed;
            log::info!(
                "smoke cloud deployed after {} growth ticks: {} cells ({} trimmed)",
                run.ticks(),
                grid.occupied_count(),
                removed
            );
        }
        self.phase = Phase::Deployed;
    }
}
