use itertools::Itertools;

/// Integer coordinates of a grid cell. Unlike [`super::map::Cell`] these are not guaranteed to
/// lie inside any particular grid and may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntPoint {
    pub x: i32,
    pub y: i32,
}

impl IntPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for IntPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Iterator over the cells of the Bresenham line from a start cell to an end cell, both
/// included. Works in all octants by stepping along the major axis every iteration and along
/// the minor axis whenever the accumulated error wraps.
pub struct BresenhamLine {
    x: i32,
    y: i32,
    step_x: i32,
    step_y: i32,
    /// `true` when the line is steeper than 45 degrees, i.e. `y` is the major axis.
    steep: bool,
    major: i32,
    minor: i32,
    error: i32,
    remaining_cells: usize,
}

impl BresenhamLine {
    pub fn new(start: IntPoint, end: IntPoint) -> Self {
        let dx = (end.x - start.x).abs();
        let dy = (end.y - start.y).abs();
        let steep = dy > dx;

        let (major, minor) = if steep { (dy, dx) } else { (dx, dy) };

        Self {
            x: start.x,
            y: start.y,
            step_x: (end.x - start.x).signum(),
            step_y: (end.y - start.y).signum(),
            steep,
            major,
            minor,
            error: major / 2,
            remaining_cells: major as usize + 1,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = IntPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining_cells == 0 {
            return None;
        }

        let cell = IntPoint::new(self.x, self.y);
        self.remaining_cells -= 1;

        // move to the next position
        self.error -= self.minor;
        let minor_step = self.error < 0;
        if minor_step {
            self.error += self.major;
        }

        if self.steep {
            self.y += self.step_y;
            if minor_step {
                self.x += self.step_x;
            }
        } else {
            self.x += self.step_x;
            if minor_step {
                self.y += self.step_y;
            }
        }

        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining_cells, Some(self.remaining_cells))
    }
}

impl ExactSizeIterator for BresenhamLine {}

/// Returns the rasterized line from `start` to `end`. Contains `max(|dx|, |dy|) + 1` cells,
/// starting with `start` and ending with `end`.
pub fn line_cells(start: IntPoint, end: IntPoint) -> Vec<IntPoint> {
    BresenhamLine::new(start, end).collect()
}

/// The cells touched by a batch of beams that share one origin.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TracedScan {
    /// Cells that some beam passed through. Each cell appears once.
    pub free: Vec<IntPoint>,

    /// Cells where some beam ended. Each cell appears once.
    pub occupied: Vec<IntPoint>,
}

/// Traces every beam from `origin` to each of the `endpoints`. All cells of a beam except the
/// last one are free, the last one is occupied. Both sets are deduplicated over the whole batch
/// so that every cell receives at most one update of each kind per scan.
pub fn trace_scan(origin: IntPoint, endpoints: &[IntPoint]) -> TracedScan {
    let mut free = Vec::new();
    let mut occupied = Vec::with_capacity(endpoints.len());

    for &end in endpoints {
        let cells = line_cells(origin, end);
        if let Some((last, before)) = cells.split_last() {
            free.extend_from_slice(before);
            occupied.push(*last);
        }
    }

    TracedScan {
        free: free.into_iter().unique().collect(),
        occupied: occupied.into_iter().unique().collect(),
    }
}
