//! Coarse occupancy grid for stream-stream repulsion in the elevation view.

use nalgebra as na;

/// Cell edge [m], independent of the display resolution
pub const DENSITY_CELL: f32 = 0.1;

/// Acceleration per unit of count difference between neighbours [m/s²]
pub const REPULSION_STRENGTH: f32 = 0.6;

/// Particles younger than this are not pushed [s]
pub const REPULSION_MIN_AGE: f32 = 0.2;

/// Particle counts over the side-view cross-section: `x` in
/// `[-width/2, width/2]`, `y` in `[0, height]`, row 0 at the floor.
#[derive(Debug, Clone, Default)]
pub struct DensityGrid {
    cols: usize,
    rows: usize,
    min_x: f32,
    counts: Vec<u32>,
}

impl DensityGrid {
    pub fn new(width: f32, height: f32) -> Self {
        let mut grid = Self::default();
        grid.resize(width, height);
        grid
    }

    /// Reallocates only when the room dimensions change the cell counts
    pub fn resize(&mut self, width: f32, height: f32) {
        let cols = (width.max(0.0) / DENSITY_CELL).ceil() as usize;
        let rows = (height.max(0.0) / DENSITY_CELL).ceil() as usize;
        self.min_x = -width / 2.0;
        if cols != self.cols || rows != self.rows {
            self.cols = cols;
            self.rows = rows;
            self.counts = vec![0; cols * rows];
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn clear(&mut self) {
        self.counts.fill(0);
    }

    fn cell_of(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let col = ((x - self.min_x) / DENSITY_CELL).floor();
        let row = (y / DENSITY_CELL).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < self.cols && row < self.rows).then_some((col, row))
    }

    /// Adds one particle to its containing cell; outside points are ignored
    pub fn deposit(&mut self, x: f32, y: f32) {
        if let Some((col, row)) = self.cell_of(x, y) {
            self.counts[row * self.cols + col] += 1;
        }
    }

    /// Count at a cell, zero outside the grid
    pub fn count(&self, col: isize, row: isize) -> u32 {
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return 0;
        }
        self.counts[row as usize * self.cols + col as usize]
    }

    pub fn count_at(&self, x: f32, y: f32) -> u32 {
        self.cell_of(x, y)
            .map(|(col, row)| self.counts[row * self.cols + col])
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Neighbour count difference pointing from dense toward sparse:
    /// `(left - right, below - above)`.
    pub fn gradient(&self, x: f32, y: f32) -> na::Vector2<f32> {
        let Some((col, row)) = self.cell_of(x, y) else {
            return na::Vector2::zeros();
        };
        let (c, r) = (col as isize, row as isize);
        let gx = self.count(c - 1, r) as f32 - self.count(c + 1, r) as f32;
        let gy = self.count(c, r - 1) as f32 - self.count(c, r + 1) as f32;
        na::Vector2::new(gx, gy)
    }

    /// Repulsion acceleration at a position [m/s²]
    pub fn repulsion(&self, x: f32, y: f32) -> na::Vector2<f32> {
        self.gradient(x, y) * REPULSION_STRENGTH
    }
}
