//! Per-frame particle simulation for the elevation, plan and 3D views.

use super::density::{DensityGrid, REPULSION_MIN_AGE};
use super::forces;
use super::spawn::{radial_spawn_rate, spawn_jet, spawn_radial, spawn_rate};
use super::{ColorTag, FlowClass, FrameInput, Particle, ParticlePool, HISTORY_INTERVAL};
use crate::camera::{Camera3D, PIXELS_PER_METER_3D};
use crate::layout::Layout;
use egui::{Color32, Pos2, Rect, Shape, Stroke};
use log::trace;
use nalgebra as na;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f32::consts::TAU;

pub const DEFAULT_CAPACITY_2D: usize = 3500;
pub const DEFAULT_CAPACITY_3D: usize = 1500;

/// Longest step integrated in one call [s]; longer frames are truncated
pub const MAX_DT: f32 = 0.05;

/// Particles above the ceiling by more than this are retired [m]
const CEILING_MARGIN: f32 = 0.5;

/// Time over which the trail wave ramps in [s]
const WAVE_RAMP: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Elevation,
    Plan,
    Perspective,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub spawned: usize,
    pub retired: usize,
    pub active: usize,
}

/// Screen mapping used by [`ParticleEngine::render`]
#[derive(Debug, Clone, Copy)]
pub enum Projection<'a> {
    Elevation(Layout),
    Plan(Layout),
    Perspective {
        camera: &'a Camera3D,
        viewport: Rect,
        /// Orbit target in room coordinates
        target: na::Vector3<f32>,
    },
}

impl Projection<'_> {
    /// Screen position, depth and pixels per meter at that point
    pub fn project(&self, p: &na::Vector3<f32>) -> Option<(Pos2, f32, f32)> {
        match self {
            Projection::Elevation(layout) => {
                Some((layout.to_screen(p.x, p.y), 0.0, layout.pixels_per_meter))
            }
            Projection::Plan(layout) => {
                Some((layout.to_screen(p.x, p.z), 0.0, layout.pixels_per_meter))
            }
            Projection::Perspective {
                camera,
                viewport,
                target,
            } => camera
                .project(p - target, *viewport)
                .map(|pr| (pr.pos, pr.depth, pr.scale * PIXELS_PER_METER_3D)),
        }
    }
}

/// Owns one view's particle pool and density grid
pub struct ParticleEngine {
    view: ViewMode,
    pool: ParticlePool,
    density: Option<DensityGrid>,
    rng: StdRng,
}

impl ParticleEngine {
    pub fn new(view: ViewMode, capacity: usize, seed: u64) -> Self {
        Self::with_rng(view, capacity, StdRng::seed_from_u64(seed))
    }

    /// Engine with the default pool size for the view and an OS seed
    pub fn for_view(view: ViewMode) -> Self {
        let capacity = match view {
            ViewMode::Perspective => DEFAULT_CAPACITY_3D,
            ViewMode::Elevation | ViewMode::Plan => DEFAULT_CAPACITY_2D,
        };
        Self::with_rng(view, capacity, StdRng::from_os_rng())
    }

    fn with_rng(view: ViewMode, capacity: usize, rng: StdRng) -> Self {
        Self {
            view,
            pool: ParticlePool::new(capacity),
            density: (view == ViewMode::Elevation).then(DensityGrid::default),
            rng,
        }
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn density(&self) -> Option<&DensityGrid> {
        self.density.as_ref()
    }

    pub fn reset(&mut self) {
        self.pool.clear();
        if let Some(grid) = self.density.as_mut() {
            grid.clear();
        }
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Order within a frame: density grid population, spawning, then
    /// integration of every active particle including the ones just spawned.
    pub fn update(&mut self, input: &FrameInput, dt: f32) -> FrameStats {
        let dt = dt.clamp(0.0, MAX_DT);

        if !input.powered || !input.feasible {
            let retired = self.pool.active_count();
            if retired > 0 {
                self.reset();
            }
            return FrameStats {
                retired,
                ..FrameStats::default()
            };
        }
        if !input.playing {
            return FrameStats {
                active: self.pool.active_count(),
                ..FrameStats::default()
            };
        }

        self.populate_density(input);
        let spawned = self.spawn(input);
        let retired = self.integrate(input, dt);

        let stats = FrameStats {
            spawned,
            retired,
            active: self.pool.active_count(),
        };
        trace!("{:?} frame: {:?}", self.view, stats);
        stats
    }

    fn populate_density(&mut self, input: &FrameInput) {
        let Some(grid) = self.density.as_mut() else {
            return;
        };
        grid.resize(input.room_width, input.room_height);
        grid.clear();
        for (_, p) in self.pool.iter_active() {
            grid.deposit(p.position.x, p.position.y);
        }
    }

    fn spawn(&mut self, input: &FrameInput) -> usize {
        let mut spawned = 0;
        match self.view {
            ViewMode::Elevation | ViewMode::Perspective => {
                let wanted = spawn_rate(input.v0).min(self.pool.free_count());
                for _ in 0..wanted {
                    let state = spawn_jet(input, &mut self.rng);
                    if self.pool.spawn(state).is_none() {
                        break;
                    }
                    spawned += 1;
                }
            }
            ViewMode::Plan => {
                for emitter in &input.emitters {
                    let wanted = radial_spawn_rate(emitter.velocity).min(self.pool.free_count());
                    for _ in 0..wanted {
                        let state = spawn_radial(emitter, &mut self.rng);
                        if self.pool.spawn(state).is_none() {
                            break;
                        }
                        spawned += 1;
                    }
                }
            }
        }
        spawned
    }

    fn integrate(&mut self, input: &FrameInput, dt: f32) -> usize {
        let mut retired = 0;
        for index in 0..self.pool.capacity() {
            let keep = match self.pool.get_mut(index) {
                Some(p) if p.active => step_particle(
                    p,
                    self.view,
                    input,
                    self.density.as_ref(),
                    &mut self.rng,
                    dt,
                ),
                _ => continue,
            };
            if !keep {
                self.pool.retire(index);
                retired += 1;
            }
        }
        retired
    }

    /// Depth and pool index of every drawable particle in paint order.
    /// The 3D view is ordered back to front and skips clipped particles.
    pub fn draw_order(&self, projection: &Projection<'_>) -> Vec<(f32, usize)> {
        let mut order: Vec<(f32, usize)> = Vec::with_capacity(self.pool.active_count());
        for (index, p) in self.pool.iter_active() {
            let depth = match projection {
                Projection::Perspective { .. } => match projection.project(&p.position) {
                    Some((_, depth, _)) => depth,
                    None => continue,
                },
                _ => 0.0,
            };
            order.push((depth, index));
        }
        if matches!(projection, Projection::Perspective { .. }) {
            order.sort_by(|a, b| b.0.total_cmp(&a.0));
        }
        order
    }

    /// Drawable trail and head geometry for every active particle
    pub fn render(&self, projection: &Projection<'_>) -> Vec<Shape> {
        let order = self.draw_order(projection);
        let mut shapes = Vec::with_capacity(order.len() * 4);
        for (_, index) in order {
            if let Some(p) = self.pool.get(index) {
                trail_shapes(p, projection, &mut shapes);
            }
        }
        shapes
    }
}

/// Integrates one particle. Returns `false` when it must be retired.
fn step_particle(
    p: &mut Particle,
    view: ViewMode,
    input: &FrameInput,
    density: Option<&DensityGrid>,
    rng: &mut StdRng,
    dt: f32,
) -> bool {
    p.age += dt;
    if p.age > p.life {
        return false;
    }

    let ceiling = input.room_height;
    match p.class {
        FlowClass::Suction => {
            if forces::apply_suction(p, dt) {
                return false;
            }
        }
        FlowClass::Radial => {}
        FlowClass::Jet | FlowClass::CeilingJet => {
            forces::apply_buoyancy(p, input.delta_t, ceiling, input.room_height, dt);
            if let Some(grid) = density {
                if p.age > REPULSION_MIN_AGE {
                    let push = grid.repulsion(p.position.x, p.position.y);
                    p.velocity.x += push.x * dt;
                    p.velocity.y += push.y * dt;
                }
            }
        }
    }
    forces::apply_drag(p, dt);
    p.position += p.velocity * dt;

    let alive = match view {
        ViewMode::Elevation => constrain_elevation(p, input, rng),
        ViewMode::Perspective => constrain_room(p, input, rng),
        ViewMode::Plan => {
            p.position.x >= 0.0
                && p.position.x <= input.room_width
                && p.position.z >= 0.0
                && p.position.z <= input.room_length
        }
    };
    if alive {
        p.record_history(dt);
    }
    alive
}

/// Side view: floor spreading for some variants, retirement past the walls,
/// below the floor or far above the ceiling.
fn constrain_elevation(p: &mut Particle, input: &FrameInput, rng: &mut StdRng) -> bool {
    let ceiling = input.room_height;
    if p.position.y < 0.0 {
        if !p.floor_spread {
            return false;
        }
        forces::spread_on_floor(p, rng);
    }
    if p.position.y > ceiling + CEILING_MARGIN {
        return false;
    }
    forces::bounce_ceiling(p, ceiling);
    p.position.x.abs() <= input.room_width / 2.0
}

/// 3D view: every surface bounces
fn constrain_room(p: &mut Particle, input: &FrameInput, rng: &mut StdRng) -> bool {
    if p.position.y < 0.0 {
        forces::spread_on_floor(p, rng);
    }
    forces::bounce_ceiling(p, input.room_height);
    forces::bounce_walls(p, input.room_width / 2.0, input.room_length / 2.0, rng);
    p.position.iter().all(|c| c.is_finite())
}

pub fn tag_color(tag: ColorTag) -> Color32 {
    match tag {
        ColorTag::Warm => Color32::from_rgb(255, 140, 60),
        ColorTag::Cool => Color32::from_rgb(80, 170, 255),
        ColorTag::Neutral => Color32::from_rgb(200, 230, 255),
        ColorTag::Extract => Color32::from_rgb(190, 120, 255),
    }
}

fn with_alpha(color: Color32, alpha: f32) -> Color32 {
    let a = (alpha.clamp(0.0, 1.0) * 255.0) as u8;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), a)
}

/// Wave displacement [m] of the trail sample taken `lag` seconds ago
fn wave_offset(p: &Particle, lag: f32) -> f32 {
    let t = (p.age - lag).max(0.0);
    let ramp = (t / WAVE_RAMP).min(1.0);
    p.wave.amplitude * ramp * (TAU * p.wave.frequency * t + p.wave.phase).sin()
}

fn trail_shapes(p: &Particle, projection: &Projection<'_>, shapes: &mut Vec<Shape>) {
    let base = tag_color(p.color);
    let vitality = p.vitality();

    let samples = p.history.len() + 1;
    let mut points: Vec<(Pos2, f32)> = Vec::with_capacity(samples);
    for (k, position) in p.history.iter().chain(std::iter::once(&p.position)).enumerate() {
        if let Some((pos, _, ppm)) = projection.project(position) {
            let lag = (samples - 1 - k) as f32 * HISTORY_INTERVAL;
            points.push((pos, wave_offset(p, lag) * ppm));
        }
    }

    // displace each sample perpendicular to the local trail direction
    let displaced: Vec<Pos2> = (0..points.len())
        .map(|k| {
            let (pos, offset) = points[k];
            let prev = points[k.saturating_sub(1)].0;
            let next = points[(k + 1).min(points.len() - 1)].0;
            let dir = next - prev;
            let len = dir.length();
            if len < 1e-3 {
                return pos;
            }
            pos + egui::vec2(-dir.y / len, dir.x / len) * offset
        })
        .collect();

    let count = displaced.len();
    for (k, segment) in displaced.windows(2).enumerate() {
        let fade = (k + 1) as f32 / count as f32;
        let color = with_alpha(base, 0.6 * fade * vitality);
        shapes.push(Shape::line_segment([segment[0], segment[1]], Stroke::new(1.0, color)));
    }
    if let Some(head) = displaced.last() {
        shapes.push(Shape::circle_filled(*head, 1.3, with_alpha(base, 0.9 * vitality)));
    }
}
