//! Drawing helpers shared by the views: heat-map colours and rasters, room
//! outlines, diffuser glyphs and the status overlays.

use crate::error::ExportError;
use crate::field::{Bucket, VelocityField, COMFORT_LIMIT, DEAD_THRESHOLD, DRAFT_LIMIT};
use crate::layout::Layout;
use crate::particles::{FrameInput, Projection};
use crate::plan::PlacedDiffuser;
use egui::{pos2, Align2, Color32, ColorImage, FontId, Painter, Rect, Shape, Stroke};
use image::RgbaImage;
use log::info;
use nalgebra as na;
use rayon::prelude::*;
use std::path::Path;

/// Velocity mapped to the hot end of the ramp [m/s]
pub const HEAT_SCALE_MAX: f64 = 0.8;
const COLORMAP_SIZE: usize = 256;

const HEAT_STOPS: [(f64, [u8; 3]); 5] = [
    (0.0, [20, 30, 90]),
    (DEAD_THRESHOLD, [40, 110, 220]),
    (COMFORT_LIMIT, [60, 200, 190]),
    (DRAFT_LIMIT, [240, 215, 70]),
    (HEAT_SCALE_MAX, [220, 50, 40]),
];

pub const BACKGROUND: Color32 = Color32::from_rgb(18, 20, 26);
pub const FLOOR: Color32 = Color32::from_rgb(46, 50, 60);
const GRID: Color32 = Color32::from_rgb(90, 96, 110);
const WALL: Color32 = Color32::from_rgb(170, 176, 190);
const WORK_ZONE: Color32 = Color32::from_rgb(230, 180, 60);
const SUPPLY: Color32 = Color32::from_rgb(120, 190, 255);
const EXTRACT: Color32 = Color32::from_rgb(190, 120, 255);
const BLOCKED: Color32 = Color32::from_rgb(230, 70, 70);
const SELECTION: Color32 = Color32::from_rgb(255, 230, 90);

/// Grid lines closer than this to a pixel center are drawn [px]
const GRID_LINE_HALF_WIDTH: f32 = 0.6;
/// Pieces per 3D edge so that partly clipped edges still show
const EDGE_PIECES: usize = 8;

/// Blue, cyan, yellow, red ramp with knees at the coverage thresholds
pub struct HeatColormap {
    lut: Vec<Color32>,
}

impl Default for HeatColormap {
    fn default() -> Self {
        Self::new()
    }
}

impl HeatColormap {
    pub fn new() -> Self {
        let lut = (0..COLORMAP_SIZE)
            .map(|i| {
                let v = HEAT_SCALE_MAX * i as f64 / (COLORMAP_SIZE - 1) as f64;
                ramp(v)
            })
            .collect();
        Self { lut }
    }

    pub fn color(&self, velocity: f64) -> Color32 {
        let t = (velocity / HEAT_SCALE_MAX).clamp(0.0, 1.0);
        let idx = (t * (COLORMAP_SIZE - 1) as f64).round() as usize;
        self.lut[idx.min(COLORMAP_SIZE - 1)]
    }
}

fn ramp(v: f64) -> Color32 {
    let upper = HEAT_STOPS
        .iter()
        .position(|(stop, _)| *stop >= v)
        .unwrap_or(HEAT_STOPS.len() - 1)
        .max(1);
    let (v0, c0) = HEAT_STOPS[upper - 1];
    let (v1, c1) = HEAT_STOPS[upper];
    let t = ((v - v0) / (v1 - v0)).clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Color32::from_rgb(mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2]))
}

fn blend(a: Color32, b: Color32, t: f32) -> Color32 {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}

/// Legend rows: colour, bucket and its velocity band
pub fn legend(colormap: &HeatColormap) -> Vec<(Color32, Bucket, String)> {
    Bucket::ALL
        .iter()
        .map(|&bucket| {
            let (sample, band) = match bucket {
                Bucket::Dead => (DEAD_THRESHOLD / 2.0, format!("< {:.2} m/s", DEAD_THRESHOLD)),
                Bucket::Comfort => (
                    (DEAD_THRESHOLD + COMFORT_LIMIT) / 2.0,
                    format!("{:.2} to {:.2} m/s", DEAD_THRESHOLD, COMFORT_LIMIT),
                ),
                Bucket::Warning => (
                    (COMFORT_LIMIT + DRAFT_LIMIT) / 2.0,
                    format!("{:.2} to {:.2} m/s", COMFORT_LIMIT, DRAFT_LIMIT),
                ),
                Bucket::Draft => (HEAT_SCALE_MAX, format!("> {:.2} m/s", DRAFT_LIMIT)),
            };
            (colormap.color(sample), bucket, band)
        })
        .collect()
}

/// What the plan background raster shows
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundOptions {
    /// [m]
    pub room_width: f64,
    pub room_length: f64,
    /// Grid spacing [m], `None` hides the grid
    pub grid_step: Option<f64>,
    pub show_heatmap: bool,
}

fn on_grid_line(coord: f64, step: f64, pixels_per_meter: f32) -> bool {
    let nearest = (coord / step).round() * step;
    ((coord - nearest).abs() as f32) * pixels_per_meter < GRID_LINE_HALF_WIDTH
}

/// Rasterises the plan floor, heat map and grid.
///
/// `layout` must map room meters to raster pixels, i.e. be built for a
/// viewport whose top-left corner is the raster origin.
pub fn plan_background(
    size: [usize; 2],
    layout: &Layout,
    options: &BackgroundOptions,
    field: &VelocityField,
) -> ColorImage {
    let [width, height] = size;
    let mut pixels = vec![BACKGROUND; width * height];
    if width == 0 {
        return ColorImage { size, pixels };
    }

    let colormap = HeatColormap::new();
    let heat = options.show_heatmap && !field.is_empty();
    let ppm = layout.pixels_per_meter;

    pixels.par_chunks_mut(width).enumerate().for_each(|(py, row)| {
        for (px, pixel) in row.iter_mut().enumerate() {
            let (x, y) = layout.to_world(pos2(px as f32 + 0.5, py as f32 + 0.5));
            let (x, y) = (x as f64, y as f64);
            if x < 0.0 || y < 0.0 || x > options.room_width || y > options.room_length {
                continue;
            }
            let mut color = if heat {
                colormap.color(field.sample(x, y))
            } else {
                FLOOR
            };
            if let Some(step) = options.grid_step.filter(|s| *s > 0.0) {
                if on_grid_line(x, step, ppm) || on_grid_line(y, step, ppm) {
                    color = blend(color, GRID, 0.5);
                }
            }
            *pixel = color;
        }
    });

    ColorImage { size, pixels }
}

/// Heat map with `pixels_per_cell` square pixels per field cell, row 0 at
/// the top of the image.
pub fn heatmap_rgba(field: &VelocityField, pixels_per_cell: u32) -> Result<RgbaImage, ExportError> {
    if field.is_empty() {
        return Err(ExportError::EmptyField);
    }
    let scale = pixels_per_cell.max(1) as usize;
    let (width, height) = (field.cols * scale, field.rows * scale);
    let colormap = HeatColormap::new();

    let mut buffer = vec![0u8; width * height * 4];
    buffer
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(py, row)| {
            for px in 0..width {
                let v = field.get(py / scale, px / scale).unwrap_or(0.0);
                let color = colormap.color(v);
                row[px * 4..px * 4 + 4].copy_from_slice(&[color.r(), color.g(), color.b(), 255]);
            }
        });

    let (w, h) = (width as u32, height as u32);
    RgbaImage::from_raw(w, h, buffer).ok_or(ExportError::BufferSize { width: w, height: h })
}

/// Writes the heat map as a PNG and returns its pixel dimensions
pub fn export_heatmap<P: AsRef<Path>>(
    field: &VelocityField,
    path: P,
    pixels_per_cell: u32,
) -> Result<(u32, u32), ExportError> {
    let image = heatmap_rgba(field, pixels_per_cell)?;
    image.save(path.as_ref())?;
    info!(
        "Exported {}x{} heat map to {}",
        image.width(),
        image.height(),
        path.as_ref().display()
    );
    Ok(image.dimensions())
}

/// Side view: walls, floor, ceiling, work-zone plane and the nozzle
pub fn elevation_scene(layout: &Layout, input: &FrameInput, work_zone_height: f32) -> Vec<Shape> {
    let half = input.room_width / 2.0;
    let h = input.room_height;
    let mut shapes = vec![
        Shape::rect_filled(layout.rect(-half, 0.0, half, h), 0.0, FLOOR.gamma_multiply(0.4)),
        Shape::rect_stroke(layout.rect(-half, 0.0, half, h), 0.0, Stroke::new(1.5, WALL)),
        Shape::line_segment(
            [layout.to_screen(-half, 0.0), layout.to_screen(half, 0.0)],
            Stroke::new(3.0, WALL),
        ),
    ];

    if work_zone_height > 0.0 && work_zone_height < h {
        shapes.extend(Shape::dashed_line(
            &[
                layout.to_screen(-half, work_zone_height),
                layout.to_screen(half, work_zone_height),
            ],
            Stroke::new(1.0, WORK_ZONE),
            8.0,
            6.0,
        ));
    }

    let face = input.face_width.max(0.05) / 2.0;
    let color = if !input.feasible {
        BLOCKED
    } else if input.flow_type.is_suction() {
        EXTRACT
    } else {
        SUPPLY
    };
    let nozzle = layout.rect(-face, input.diffuser_height - 0.03, face, input.diffuser_height);
    shapes.push(Shape::rect_filled(nozzle.expand(1.0), 1.0, color));
    shapes
}

/// Plan view glyphs: coverage circle, footprint and selection outline
pub fn plan_diffusers(layout: &Layout, diffusers: &[PlacedDiffuser], selected: Option<u32>) -> Vec<Shape> {
    let mut shapes = Vec::with_capacity(diffusers.len() * 3);
    for d in diffusers {
        let center = layout.to_screen(d.x as f32, d.y as f32);
        let feasible = d.is_feasible();
        let color = match (feasible, d.flow_type.is_suction()) {
            (false, _) => BLOCKED,
            (true, true) => EXTRACT,
            (true, false) => SUPPLY,
        };

        if let Some(perf) = d.performance.as_ref().filter(|p| p.is_feasible()) {
            if perf.coverage_radius > 0.0 {
                shapes.push(Shape::circle_stroke(
                    center,
                    layout.scale(perf.coverage_radius as f32),
                    Stroke::new(1.0, color.gamma_multiply(0.6)),
                ));
            }
        }

        let side = layout.scale(d.footprint() as f32).max(8.0);
        let footprint = Rect::from_center_size(center, egui::vec2(side, side));
        shapes.push(Shape::rect_filled(footprint, 2.0, color));
        if selected == Some(d.id) {
            shapes.push(Shape::rect_stroke(footprint.expand(3.0), 3.0, Stroke::new(2.0, SELECTION)));
        }
    }
    shapes
}

fn push_edge(projection: &Projection<'_>, a: na::Vector3<f32>, b: na::Vector3<f32>, stroke: Stroke, out: &mut Vec<Shape>) {
    let mut prev = projection.project(&a).map(|(pos, _, _)| pos);
    for k in 1..=EDGE_PIECES {
        let t = k as f32 / EDGE_PIECES as f32;
        let next = projection.project(&(a + (b - a) * t)).map(|(pos, _, _)| pos);
        if let (Some(p0), Some(p1)) = (prev, next) {
            out.push(Shape::line_segment([p0, p1], stroke));
        }
        prev = next;
    }
}

/// 3D room wireframe centered on the diffuser axis, with a 1 m floor grid
/// and the nozzle face at its mounting height.
pub fn room_wireframe(projection: &Projection<'_>, input: &FrameInput) -> Vec<Shape> {
    let (hw, hl, h) = (input.room_width / 2.0, input.room_length / 2.0, input.room_height);
    let mut shapes = Vec::new();

    let grid = Stroke::new(0.5, GRID);
    let mut x = -hw.floor();
    while x <= hw {
        push_edge(projection, na::Vector3::new(x, 0.0, -hl), na::Vector3::new(x, 0.0, hl), grid, &mut shapes);
        x += 1.0;
    }
    let mut z = -hl.floor();
    while z <= hl {
        push_edge(projection, na::Vector3::new(-hw, 0.0, z), na::Vector3::new(hw, 0.0, z), grid, &mut shapes);
        z += 1.0;
    }

    let corners = [(-hw, -hl), (hw, -hl), (hw, hl), (-hw, hl)];
    let wall = Stroke::new(1.2, WALL);
    for i in 0..4 {
        let (x0, z0) = corners[i];
        let (x1, z1) = corners[(i + 1) % 4];
        push_edge(projection, na::Vector3::new(x0, 0.0, z0), na::Vector3::new(x1, 0.0, z1), wall, &mut shapes);
        push_edge(projection, na::Vector3::new(x0, h, z0), na::Vector3::new(x1, h, z1), wall, &mut shapes);
        push_edge(projection, na::Vector3::new(x0, 0.0, z0), na::Vector3::new(x0, h, z0), wall, &mut shapes);
    }

    let face = input.face_width.max(0.05) / 2.0;
    let y = input.diffuser_height;
    let nozzle: Vec<_> = [(-face, -face), (face, -face), (face, face), (-face, face)]
        .iter()
        .filter_map(|&(x, z)| projection.project(&na::Vector3::new(x, y, z)).map(|(pos, _, _)| pos))
        .collect();
    if nozzle.len() == 4 {
        let color = if input.feasible { SUPPLY } else { BLOCKED };
        shapes.push(Shape::convex_polygon(nozzle, color, Stroke::NONE));
    }
    shapes
}

fn draw_banner(painter: &Painter, rect: Rect, title: &str, detail: Option<&str>, color: Color32) {
    painter.rect_filled(rect, 0.0, Color32::from_black_alpha(150));
    painter.text(
        rect.center(),
        Align2::CENTER_CENTER,
        title,
        FontId::proportional(22.0),
        color,
    );
    if let Some(detail) = detail {
        painter.text(
            rect.center() + egui::vec2(0.0, 26.0),
            Align2::CENTER_TOP,
            detail,
            FontId::proportional(14.0),
            Color32::LIGHT_GRAY,
        );
    }
}

pub fn draw_power_off(painter: &Painter, rect: Rect) {
    draw_banner(painter, rect, "OFF", None, Color32::GRAY);
}

/// Covers a view whose configuration has no catalog data
pub fn draw_unavailable(painter: &Painter, rect: Rect, reason: &str) {
    draw_banner(painter, rect, "Configuration unavailable", Some(reason), BLOCKED);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera3D;
    use crate::catalog::FlowType;
    use crate::field::{estimate_field, FieldSource};

    fn field() -> VelocityField {
        estimate_field(
            6.0,
            8.0,
            0.5,
            &[FieldSource {
                x: 3.0,
                y: 4.0,
                v0: 3.0,
                workzone_velocity: 0.6,
                coverage_radius: 1.5,
            }],
        )
    }

    #[test]
    fn test_colormap_is_monotone_in_red() {
        let colormap = HeatColormap::new();
        assert_eq!(colormap.color(-1.0), colormap.color(0.0));
        assert_eq!(colormap.color(5.0), colormap.color(HEAT_SCALE_MAX));
        assert_eq!(colormap.color(HEAT_SCALE_MAX), Color32::from_rgb(220, 50, 40));
        assert!(colormap.color(0.7).r() > colormap.color(0.05).r());
    }

    #[test]
    fn test_legend_covers_every_bucket() {
        let rows = legend(&HeatColormap::new());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].1, Bucket::Comfort);
        assert_eq!(rows[0].2, "0.10 to 0.25 m/s");
    }

    #[test]
    fn test_plan_background_pixels() {
        // 20 px per meter, room corner at (40, 40)
        let layout = Layout::plan(Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(200.0, 240.0)), 6.0, 8.0);
        let field = field();
        let options = BackgroundOptions {
            room_width: 6.0,
            room_length: 8.0,
            grid_step: None,
            show_heatmap: true,
        };
        let image = plan_background([200, 240], &layout, &options, &field);
        assert_eq!(image.size, [200, 240]);
        assert_eq!(image.pixels[0], BACKGROUND);

        let (px, py) = (101, 121);
        let (x, y) = layout.to_world(pos2(px as f32 + 0.5, py as f32 + 0.5));
        let expected = HeatColormap::new().color(field.sample(x as f64, y as f64));
        assert_eq!(image.pixels[py * 200 + px], expected);

        let plain = BackgroundOptions {
            show_heatmap: false,
            ..options
        };
        let image = plan_background([200, 240], &layout, &plain, &field);
        assert_eq!(image.pixels[py * 200 + px], FLOOR);
    }

    #[test]
    fn test_export_heatmap_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.png");
        let field = field();
        let (w, h) = export_heatmap(&field, &path, 4).unwrap();
        assert_eq!((w, h), (field.cols as u32 * 4, field.rows as u32 * 4));
        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), w);
    }

    #[test]
    fn test_export_empty_field_fails() {
        let err = heatmap_rgba(&VelocityField::empty(), 2).unwrap_err();
        assert!(matches!(err, ExportError::EmptyField));
    }

    #[test]
    fn test_plan_glyphs_highlight_selection() {
        let layout = Layout::plan(Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(680.0, 880.0)), 6.0, 8.0);
        let diffusers = vec![PlacedDiffuser::new(7, 1, 1.0, 1.0, "dpu-v", FlowType::Vertical, "160", 250.0)];
        assert_eq!(plan_diffusers(&layout, &diffusers, None).len(), 1);
        assert_eq!(plan_diffusers(&layout, &diffusers, Some(7)).len(), 2);
    }

    #[test]
    fn test_wireframe_projects_room() {
        let camera = Camera3D::default();
        let projection = Projection::Perspective {
            camera: &camera,
            viewport: Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(800.0, 600.0)),
            target: na::Vector3::new(0.0, 1.5, 0.0),
        };
        let input = FrameInput::default();
        let shapes = room_wireframe(&projection, &input);
        // 12 room edges at least, plus the nozzle face
        assert!(shapes.len() > 12 * EDGE_PIECES);
    }
}
