//! Tracer particles: record layout, fixed-capacity pool and per-frame input.

pub mod density;
pub mod engine;
pub mod forces;
pub mod spawn;

pub use density::DensityGrid;
pub use engine::{FrameStats, ParticleEngine, Projection, ViewMode};

use crate::catalog::FlowType;
use nalgebra as na;

/// Maximum number of trail samples per particle
pub const MAX_HISTORY: usize = 20;

/// Simulated time between two trail samples [s]
pub const HISTORY_INTERVAL: f32 = 0.04;

/// How a particle is driven by the force models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowClass {
    /// Free jet: buoyancy and drag
    Jet,
    /// Lateral jet released under the ceiling: Coanda attachment applies
    CeilingJet,
    /// Drawn toward its source by an inverse-square pull
    Suction,
    /// Plan-view tracer spreading along the work-zone plane
    Radial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTag {
    Warm,
    Cool,
    Neutral,
    Extract,
}

impl ColorTag {
    pub fn for_delta_t(delta_t: f32) -> Self {
        if delta_t > 0.5 {
            ColorTag::Warm
        } else if delta_t < -0.5 {
            ColorTag::Cool
        } else {
            ColorTag::Neutral
        }
    }
}

/// Secondary sinusoidal offset layered on the trail
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Wave {
    /// [m]
    pub amplitude: f32,
    /// [Hz]
    pub frequency: f32,
    pub phase: f32,
}

/// Initial state handed from a spawn rule to a pool slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnState {
    pub position: na::Vector3<f32>,
    pub velocity: na::Vector3<f32>,
    pub buoyancy: f32,
    pub drag: f32,
    pub life: f32,
    pub wave: Wave,
    pub color: ColorTag,
    pub class: FlowClass,
    pub floor_spread: bool,
    pub source: na::Vector3<f32>,
}

/// One pool slot, reused in place.
///
/// Positions are room coordinates in meters with `y` up from the floor.
/// Elevation and 3D views center `x`/`z` on the diffuser axis; the plan
/// view measures `x`/`z` from the room's top-left corner.
#[derive(Debug, Clone)]
pub struct Particle {
    pub active: bool,
    pub position: na::Vector3<f32>,
    pub velocity: na::Vector3<f32>,
    /// Per-particle multiplier on the buoyancy acceleration
    pub buoyancy: f32,
    /// Velocity retained per 1/60 s step
    pub drag: f32,
    pub age: f32,
    pub life: f32,
    pub wave: Wave,
    pub history: Vec<na::Vector3<f32>>,
    pub history_timer: f32,
    pub color: ColorTag,
    pub class: FlowClass,
    /// Spreads along the floor on contact instead of retiring
    pub floor_spread: bool,
    /// Emitter position, the attraction target for suction particles
    pub source: na::Vector3<f32>,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            active: false,
            position: na::Vector3::zeros(),
            velocity: na::Vector3::zeros(),
            buoyancy: 1.0,
            drag: 1.0,
            age: 0.0,
            life: 0.0,
            wave: Wave::default(),
            history: Vec::with_capacity(MAX_HISTORY),
            history_timer: 0.0,
            color: ColorTag::Neutral,
            class: FlowClass::Jet,
            floor_spread: false,
            source: na::Vector3::zeros(),
        }
    }
}

impl Particle {
    fn respawn(&mut self, state: SpawnState) {
        self.active = true;
        self.position = state.position;
        self.velocity = state.velocity;
        self.buoyancy = state.buoyancy;
        self.drag = state.drag;
        self.age = 0.0;
        self.life = state.life;
        self.wave = state.wave;
        self.history.clear();
        self.history_timer = 0.0;
        self.color = state.color;
        self.class = state.class;
        self.floor_spread = state.floor_spread;
        self.source = state.source;
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.history.clear();
    }

    /// Samples the trail every `HISTORY_INTERVAL`, keeping the newest samples
    pub fn record_history(&mut self, dt: f32) {
        self.history_timer += dt;
        if self.history_timer < HISTORY_INTERVAL {
            return;
        }
        self.history_timer -= HISTORY_INTERVAL;
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(self.position);
    }

    /// Fraction of life remaining, 0 when expired
    pub fn vitality(&self) -> f32 {
        if self.life <= 0.0 {
            return 0.0;
        }
        (1.0 - self.age / self.life).clamp(0.0, 1.0)
    }
}

/// Fixed-capacity particle pool. Slots are never allocated after
/// construction, inactive slots are recycled by the next spawn.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    slots: Vec<Particle>,
    active: usize,
    cursor: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Particle::default()).collect(),
            active: 0,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn free_count(&self) -> usize {
        self.slots.len() - self.active
    }

    /// Activates a free slot with `state`. Returns the slot index, or `None`
    /// when the pool is full.
    pub fn spawn(&mut self, state: SpawnState) -> Option<usize> {
        if self.active >= self.slots.len() {
            return None;
        }
        let len = self.slots.len();
        for offset in 0..len {
            let index = (self.cursor + offset) % len;
            if !self.slots[index].active {
                self.slots[index].respawn(state);
                self.active += 1;
                self.cursor = (index + 1) % len;
                return Some(index);
            }
        }
        None
    }

    pub fn retire(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.active {
                slot.deactivate();
                self.active -= 1;
            }
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.deactivate();
        }
        self.active = 0;
        self.cursor = 0;
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[Particle] {
        &self.slots
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &Particle)> {
        self.slots.iter().enumerate().filter(|(_, p)| p.active)
    }
}

/// Plan-view source derived from a placed diffuser
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emitter {
    /// Position from the room's top-left corner [m]
    pub x: f32,
    pub y: f32,
    pub v0: f32,
    /// Work-zone velocity [m/s]
    pub velocity: f32,
    /// Coverage radius [m]
    pub radius: f32,
    pub suction: bool,
}

/// Immutable configuration snapshot read by one `update` call
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    pub flow_type: FlowType,
    /// Nozzle exit velocity [m/s]
    pub v0: f32,
    /// Supply minus room temperature [°C]
    pub delta_t: f32,
    /// [m]
    pub room_width: f32,
    pub room_length: f32,
    pub room_height: f32,
    pub diffuser_height: f32,
    pub face_width: f32,
    pub powered: bool,
    pub playing: bool,
    /// Catalog data exists for the configuration
    pub feasible: bool,
    pub emitters: Vec<Emitter>,
}

impl Default for FrameInput {
    fn default() -> Self {
        Self {
            flow_type: FlowType::Vertical,
            v0: 3.0,
            delta_t: 0.0,
            room_width: 6.0,
            room_length: 8.0,
            room_height: 3.0,
            diffuser_height: 3.0,
            face_width: 0.16,
            powered: true,
            playing: true,
            feasible: true,
            emitters: Vec::new(),
        }
    }
}
