use anyhow::{ensure, Context};
use common::{
    math::{LogOdds, Probability},
    robot::Pose,
};
use nalgebra::{Point2, Vector2};
use serde::Deserialize;

use super::ray::{trace_scan, IntPoint};

/// Cells with a grid coordinate below this value are never updated nor scored.
const MIN_VALID_CELL: i32 = 1;

/// Upper limit on the number of cells of a grid.
pub const MAX_CELLS: usize = 1 << 26;

/// Geometry and sensor model of an [`OccupancyGrid`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,

    /// Side length of a cell, in world units.
    pub resolution: f32,

    /// Odds ratio `k` of a single observation. Every observation moves the log-odds of a cell
    /// by `ln(k)`.
    pub odds_ratio: f64,

    /// Lower saturation limit of the log-odds.
    pub lambda_min: f64,

    /// Upper saturation limit of the log-odds.
    pub lambda_max: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            x_min: -1000.0,
            y_min: -2000.0,
            x_max: 2000.0,
            y_max: 1000.0,
            resolution: 4.0,
            odds_ratio: 4.0,
            lambda_min: -6.0,
            lambda_max: 6.0,
        }
    }
}

/// Summary of one call to [`OccupancyGrid::integrate_scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Integration {
    /// Grid cell of the pose the scan was integrated from.
    pub origin: IntPoint,

    /// Number of in-bounds cells that were updated as free.
    pub free_cells: usize,

    /// Number of in-bounds cells that were updated as occupied.
    pub occupied_cells: usize,
}

/// Occupancy grid map over a fixed world rectangle. Each cell holds a saturated log-odds
/// estimate and a derived binary flag (`occupied` iff the log-odds is `>= 0`).
///
/// Cells that were never observed have log-odds 0 and therefore count as occupied.
#[derive(Clone)]
pub struct OccupancyGrid {
    /// lower left corner of the map in the world (`x_min`, `y_min`)
    position: Vector2<f32>,

    /// upper right corner of the map in the world (`x_max`, `y_max`)
    upper: Vector2<f32>,

    /// the size of the map in cells
    grid_size: Vector2<usize>,

    /// world units per cell
    resolution: f32,

    increment: LogOdds,
    lambda_min: LogOdds,
    lambda_max: LogOdds,

    odds: GridData<LogOdds>,
    occupied: GridData<bool>,
}

impl OccupancyGrid {
    pub fn new(config: &GridConfig) -> anyhow::Result<Self> {
        ensure!(
            config.resolution.is_finite() && config.resolution > 0.0,
            "grid resolution must be positive, got {}",
            config.resolution
        );
        ensure!(
            config.x_max > config.x_min && config.y_max > config.y_min,
            "grid bounds are empty: x [{}, {}], y [{}, {}]",
            config.x_min,
            config.x_max,
            config.y_min,
            config.y_max
        );
        ensure!(
            config.odds_ratio > 1.0,
            "odds ratio must be larger than 1, got {}",
            config.odds_ratio
        );
        ensure!(
            config.lambda_min <= 0.0 && config.lambda_max >= 0.0,
            "log-odds limits [{}, {}] must contain 0",
            config.lambda_min,
            config.lambda_max
        );

        // one extra cell so that the upper bound itself maps into the grid
        let cells = |min: f32, max: f32| ((max - min) / config.resolution + 1.0).ceil() as usize;
        let grid_size = Vector2::new(
            cells(config.x_min, config.x_max),
            cells(config.y_min, config.y_max),
        );

        let len = grid_size
            .x
            .checked_mul(grid_size.y)
            .context("grid is too large")?;
        ensure!(len > 0, "grid has no cells");
        ensure!(
            len <= MAX_CELLS,
            "grid of {} x {} cells exceeds the limit of {} cells",
            grid_size.x,
            grid_size.y,
            MAX_CELLS
        );

        Ok(Self {
            position: Vector2::new(config.x_min, config.y_min),
            upper: Vector2::new(config.x_max, config.y_max),
            grid_size,
            resolution: config.resolution,
            increment: LogOdds::from_ratio(config.odds_ratio),
            lambda_min: LogOdds::new(config.lambda_min),
            lambda_max: LogOdds::new(config.lambda_max),
            odds: GridData::new_fill(grid_size, LogOdds::ZERO),
            occupied: GridData::new_fill(grid_size, true),
        })
    }

    /// Converts a world position into grid coordinates: `ceil((coord - min) / resolution) - 1`
    /// on each axis. The result is not guaranteed to lie within the grid.
    pub fn world_to_grid(&self, world: &Point2<f32>) -> IntPoint {
        let grid = (world.coords - self.position) / self.resolution;
        IntPoint::new(grid.x.ceil() as i32 - 1, grid.y.ceil() as i32 - 1)
    }

    /// Returns the cell for the given grid coordinates if they may be updated and scored,
    /// i.e. lie in `[1, size)` on both axes.
    pub fn cell(&self, point: IntPoint) -> Option<Cell> {
        let valid = |v: i32, size: usize| v >= MIN_VALID_CELL && (v as usize) < size;
        (valid(point.x, self.grid_size.x) && valid(point.y, self.grid_size.y))
            .then(|| Cell::new(point.x as usize, point.y as usize))
    }

    /// Integrates a scan observed from `pose`. The cells between the pose and each endpoint are
    /// made more likely free and the endpoint cells more likely occupied, each by one increment
    /// per scan. Cells outside of the grid are ignored.
    pub fn integrate_scan(&mut self, pose: &Pose, endpoints: &[Point2<f32>]) -> Integration {
        let origin = self.world_to_grid(&pose.position());
        let ends: Vec<IntPoint> = endpoints.iter().map(|p| self.world_to_grid(p)).collect();

        let traced = trace_scan(origin, &ends);

        // free cells first, so a cell that is both passed and hit in the same scan nets out
        let free: Vec<Cell> = traced.free.into_iter().filter_map(|p| self.cell(p)).collect();
        let occupied: Vec<Cell> = traced
            .occupied
            .into_iter()
            .filter_map(|p| self.cell(p))
            .collect();

        for &cell in &free {
            self.apply(cell, -self.increment);
        }
        for &cell in &occupied {
            self.apply(cell, self.increment);
        }

        Integration {
            origin,
            free_cells: free.len(),
            occupied_cells: occupied.len(),
        }
    }

    fn apply(&mut self, cell: Cell, delta: LogOdds) {
        let odds = self.odds.get_mut(cell);
        *odds = (*odds + delta).clamp(self.lambda_min, self.lambda_max);
        let occupied = *odds >= LogOdds::ZERO;
        *self.occupied.get_mut(cell) = occupied;
    }

    /// Counts how many of the points fall on occupied cells. Points outside the grid do not
    /// contribute.
    pub fn correlate(&self, points: &[Point2<f32>]) -> u32 {
        points
            .iter()
            .filter_map(|p| self.cell(self.world_to_grid(p)))
            .map(|cell| u32::from(*self.occupied.get(cell)))
            .sum()
    }

    /// Writes one value per world point into an external layer created by [`Self::new_layer`].
    /// Points outside the grid are skipped, later points overwrite earlier ones. Returns the
    /// number of values written.
    pub fn write_layer<T: Clone>(
        &self,
        layer: &mut GridData<T>,
        points: &[Point2<f32>],
        values: &[T],
    ) -> anyhow::Result<usize> {
        ensure!(
            layer.size() == self.grid_size,
            "layer of size {:?} does not match the grid size {:?}",
            layer.size(),
            self.grid_size
        );
        ensure!(
            points.len() == values.len(),
            "got {} points but {} values",
            points.len(),
            values.len()
        );

        let mut written = 0;
        for (point, value) in points.iter().zip(values) {
            if let Some(cell) = self.cell(self.world_to_grid(point)) {
                *layer.get_mut(cell) = value.clone();
                written += 1;
            }
        }
        Ok(written)
    }

    /// Creates a buffer co-indexed with this grid, e.g. for a texture overlay.
    pub fn new_layer<T: Clone>(&self, initial_value: T) -> GridData<T> {
        GridData::new_fill(self.grid_size, initial_value)
    }

    pub fn log_odds(&self) -> &GridData<LogOdds> {
        &self.odds
    }

    pub fn occupied(&self) -> &GridData<bool> {
        &self.occupied
    }

    pub fn likelihood(&self) -> GridData<Probability> {
        self.odds.transform()
    }

    pub fn log_odds_at(&self, point: IntPoint) -> Option<LogOdds> {
        self.cell(point).map(|cell| *self.odds.get(cell))
    }

    pub fn is_occupied(&self, point: IntPoint) -> Option<bool> {
        self.cell(point).map(|cell| *self.occupied.get(cell))
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.iter().filter(|&&o| o).count()
    }

    /// The log-odds step applied per observation.
    pub fn increment(&self) -> LogOdds {
        self.increment
    }

    pub fn limits(&self) -> (LogOdds, LogOdds) {
        (self.lambda_min, self.lambda_max)
    }

    pub fn position(&self) -> Vector2<f32> {
        self.position
    }

    pub fn upper(&self) -> Vector2<f32> {
        self.upper
    }

    pub fn size(&self) -> Vector2<usize> {
        self.grid_size
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }
}

/// Dense row-major storage of one value per grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct GridData<T> {
    /// the size of the grid in cells
    size: Vector2<usize>,

    /// Vector containing all the data values
    data: Vec<T>,
}

/// Index of a cell inside a grid. `column` runs along x, `row` along y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub row: usize,
    pub column: usize,
}

impl Cell {
    pub fn new(column: usize, row: usize) -> Self {
        Cell { column, row }
    }
}

impl<T> GridData<T> {
    fn index(&self, cell: Cell) -> usize {
        assert!(
            cell.column < self.size.x && cell.row < self.size.y,
            "cell {cell:?} is outside of a {} x {} grid",
            self.size.x,
            self.size.y
        );
        cell.row * self.size.x + cell.column
    }

    fn cell(&self, index: usize) -> Cell {
        Cell {
            row: index / self.size.x,
            column: index % self.size.x,
        }
    }

    pub fn get(&self, cell: Cell) -> &T {
        &self.data[self.index(cell)]
    }

    pub fn get_mut(&mut self, cell: Cell) -> &mut T {
        let index = self.index(cell);
        &mut self.data[index]
    }

    /// Returns a copy of this GridData with each element converted to `S` using `into()`.
    pub fn transform<S>(&self) -> GridData<S>
    where
        T: Into<S> + Copy,
    {
        GridData {
            size: self.size,
            data: self.data.iter().map(|&t| Into::<S>::into(t)).collect(),
        }
    }

    /// Returns a copy of this GridData with each element converted to `S` using the provided function.
    pub fn transform_map<S>(&self, f: impl Fn(&T) -> S) -> GridData<S> {
        GridData {
            size: self.size,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn iter_cells(&self) -> impl Iterator<Item = (Cell, &T)> {
        self.data.iter().enumerate().map(|(i, v)| (self.cell(i), v))
    }

    /// Row-major view of all values, for renderers.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn size(&self) -> Vector2<usize> {
        self.size
    }
}

impl<T: Clone> GridData<T> {
    pub fn new_fill(size: Vector2<usize>, initial_value: T) -> Self {
        Self {
            size,
            data: vec![initial_value; size.x * size.y],
        }
    }
}
