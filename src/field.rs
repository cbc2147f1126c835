//! Steady work-zone velocity field over the room floor plan and its
//! coverage statistics.

use crate::performance::TERMINAL_VELOCITY;
use log::debug;
use rayon::prelude::*;

/// Below this a cell counts as dead air [m/s]
pub const DEAD_THRESHOLD: f64 = 0.1;
/// Upper bound of the comfort band [m/s]
pub const COMFORT_LIMIT: f64 = 0.25;
/// Above this a cell is drafty [m/s]
pub const DRAFT_LIMIT: f64 = 0.5;

/// One supply diffuser as seen by the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSource {
    /// Plan position from the room's top-left corner [m]
    pub x: f64,
    pub y: f64,
    pub v0: f64,
    pub workzone_velocity: f64,
    pub coverage_radius: f64,
}

/// Estimated air speed per cell, row-major, row 0 at `y = 0`
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityField {
    pub rows: usize,
    pub cols: usize,
    /// Cell edge [m]
    pub step: f64,
    /// Room footprint [m]
    pub width: f64,
    pub length: f64,
    pub cells: Vec<f64>,
}

impl VelocityField {
    pub fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            step: 0.0,
            width: 0.0,
            length: 0.0,
            cells: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let (x0, y0) = (col as f64 * self.step, row as f64 * self.step);
        let x1 = (x0 + self.step).min(self.width);
        let y1 = (y0 + self.step).min(self.length);
        ((x0 + x1) / 2.0, (y0 + y1) / 2.0)
    }

    /// Floor area of a cell, edge cells clipped to the room [m²]
    pub fn cell_area(&self, row: usize, col: usize) -> f64 {
        let (x0, y0) = (col as f64 * self.step, row as f64 * self.step);
        let w = (self.width - x0).clamp(0.0, self.step);
        let h = (self.length - y0).clamp(0.0, self.step);
        w * h
    }

    /// Speed at a plan position, zero outside the room
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        if self.is_empty() || x < 0.0 || y < 0.0 {
            return 0.0;
        }
        let col = (x / self.step) as usize;
        let row = (y / self.step) as usize;
        self.get(row, col).unwrap_or(0.0)
    }

    pub fn max_velocity(&self) -> f64 {
        self.cells.iter().copied().fold(0.0, f64::max)
    }
}

/// Speed contributed by one source at horizontal distance `r` [m].
///
/// Inside the coverage radius the speed falls linearly from the work-zone
/// velocity to the terminal velocity; beyond it the induced motion fades
/// to zero over one more radius.
pub fn source_contribution(source: &FieldSource, r: f64) -> f64 {
    let radius = source.coverage_radius;
    if radius <= 0.0 {
        return 0.0;
    }
    let peak = source.workzone_velocity.max(TERMINAL_VELOCITY);
    if r <= radius {
        peak - (peak - TERMINAL_VELOCITY) * (r / radius)
    } else if r <= 2.0 * radius {
        TERMINAL_VELOCITY * (1.0 - (r - radius) / radius)
    } else {
        0.0
    }
}

/// Cells needed to cover `extent`, ignoring rounding noise in the division
fn cell_count(extent: f64, step: f64) -> usize {
    ((extent / step) - 1e-9).ceil().max(1.0) as usize
}

/// Estimates the field for a `width` x `length` room on a `step` grid.
///
/// Contributions of overlapping diffusers add up, clipped to the highest
/// exit velocity among the sources. No sources gives an empty field.
pub fn estimate_field(width: f64, length: f64, step: f64, sources: &[FieldSource]) -> VelocityField {
    if sources.is_empty() || width <= 0.0 || length <= 0.0 || step <= 0.0 {
        return VelocityField::empty();
    }

    let cols = cell_count(width, step);
    let rows = cell_count(length, step);
    let ceiling = sources.iter().map(|s| s.v0).fold(0.0, f64::max);

    let mut field = VelocityField {
        rows,
        cols,
        step,
        width,
        length,
        cells: vec![0.0; rows * cols],
    };

    let center = |row: usize, col: usize| {
        let x0 = col as f64 * step;
        let y0 = row as f64 * step;
        ((x0 + (x0 + step).min(width)) / 2.0, (y0 + (y0 + step).min(length)) / 2.0)
    };
    field
        .cells
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(row, cells)| {
            for (col, cell) in cells.iter_mut().enumerate() {
                let (cx, cy) = center(row, col);
                let total: f64 = sources
                    .iter()
                    .map(|s| source_contribution(s, ((cx - s.x).powi(2) + (cy - s.y).powi(2)).sqrt()))
                    .sum();
                *cell = total.min(ceiling);
            }
        });

    debug!(
        "Velocity field {}x{} from {} sources, max {:.2} m/s",
        cols,
        rows,
        sources.len(),
        field.max_velocity()
    );
    field
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Dead,
    Comfort,
    Warning,
    Draft,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Comfort, Bucket::Warning, Bucket::Draft, Bucket::Dead];

    pub fn classify(velocity: f64) -> Self {
        if velocity < DEAD_THRESHOLD {
            Bucket::Dead
        } else if velocity < COMFORT_LIMIT {
            Bucket::Comfort
        } else if velocity <= DRAFT_LIMIT {
            Bucket::Warning
        } else {
            Bucket::Draft
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Dead => "Dead",
            Bucket::Comfort => "Comfort",
            Bucket::Warning => "Warning",
            Bucket::Draft => "Draft",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoverageAnalysis {
    pub total_cells: usize,
    pub dead: usize,
    pub comfort: usize,
    pub warning: usize,
    pub draft: usize,
    /// [m²]
    pub total_area: f64,
    /// Area share of cells that are not dead
    pub covered_fraction: f64,
    pub dead_fraction: f64,
    pub comfort_fraction: f64,
    pub warning_fraction: f64,
    pub draft_fraction: f64,
    /// Area-weighted mean speed [m/s]
    pub average_velocity: f64,
    pub max_velocity: f64,
}

impl CoverageAnalysis {
    pub fn count(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::Dead => self.dead,
            Bucket::Comfort => self.comfort,
            Bucket::Warning => self.warning,
            Bucket::Draft => self.draft,
        }
    }

    pub fn fraction(&self, bucket: Bucket) -> f64 {
        match bucket {
            Bucket::Dead => self.dead_fraction,
            Bucket::Comfort => self.comfort_fraction,
            Bucket::Warning => self.warning_fraction,
            Bucket::Draft => self.draft_fraction,
        }
    }
}

pub fn analyze_coverage(field: &VelocityField) -> CoverageAnalysis {
    let mut analysis = CoverageAnalysis::default();
    if field.is_empty() {
        return analysis;
    }

    let mut areas = [0.0_f64; 4];
    let mut weighted = 0.0;
    for row in 0..field.rows {
        for col in 0..field.cols {
            let v = field.cells[row * field.cols + col];
            let area = field.cell_area(row, col);
            let bucket = Bucket::classify(v);
            match bucket {
                Bucket::Dead => analysis.dead += 1,
                Bucket::Comfort => analysis.comfort += 1,
                Bucket::Warning => analysis.warning += 1,
                Bucket::Draft => analysis.draft += 1,
            }
            areas[bucket as usize] += area;
            analysis.total_area += area;
            weighted += v * area;
            analysis.max_velocity = analysis.max_velocity.max(v);
        }
    }

    analysis.total_cells = field.rows * field.cols;
    if analysis.total_area > 0.0 {
        let total = analysis.total_area;
        analysis.dead_fraction = areas[Bucket::Dead as usize] / total;
        analysis.comfort_fraction = areas[Bucket::Comfort as usize] / total;
        analysis.warning_fraction = areas[Bucket::Warning as usize] / total;
        analysis.draft_fraction = areas[Bucket::Draft as usize] / total;
        analysis.covered_fraction = 1.0 - analysis.dead_fraction;
        analysis.average_velocity = weighted / total;
    }
    analysis
}
