//! Host-owned configuration: diffuser selection, room, toggles and the
//! placed-diffuser list.

use crate::catalog::{Catalog, FlowType};
use crate::error::SettingsError;
use crate::particles::{Emitter, FrameInput};
use crate::performance::{DiffuserSetup, PerformanceResult};
use crate::plan::{PlacedDiffuser, PlanIntent};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Offset of a duplicated diffuser from its original [m]
const DUPLICATE_OFFSET: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomGeometry {
    /// [m]
    pub width: f64,
    pub length: f64,
    pub height: f64,
}

impl Default for RoomGeometry {
    fn default() -> Self {
        Self {
            width: 6.0,
            length: 8.0,
            height: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub flow_type: FlowType,
    pub size: String,
    /// [m³/h]
    pub volume: f64,
    /// [°C]
    pub supply_temp: f64,
    pub room_temp: f64,
    pub room: RoomGeometry,
    /// Nozzle height above floor [m]
    pub diffuser_height: f64,
    /// Monitored plane height above floor [m]
    pub work_zone_height: f64,
    pub powered: bool,
    pub playing: bool,
    pub show_grid: bool,
    pub show_heatmap: bool,
    pub snap_to_grid: bool,
    /// Plan grid and velocity-field cell size [m]
    pub grid_step: f64,
    pub diffusers: Vec<PlacedDiffuser>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "dpu-v".to_string(),
            flow_type: FlowType::Vertical,
            size: "160".to_string(),
            volume: 250.0,
            supply_temp: 20.0,
            room_temp: 24.0,
            room: RoomGeometry::default(),
            diffuser_height: 3.0,
            work_zone_height: 1.8,
            powered: true,
            playing: true,
            show_grid: true,
            show_heatmap: true,
            snap_to_grid: true,
            grid_step: 0.25,
            diffusers: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&text)?;
        info!(
            "Loaded settings from {} ({} placed diffusers)",
            path.as_ref().display(),
            settings.diffusers.len()
        );
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        info!("Saved settings to {}", path.as_ref().display());
        Ok(())
    }

    /// Whether the frame loop keeps scheduling frames. Powering off swaps
    /// in the "off" rendering but only pausing stops the loop.
    pub fn keeps_animating(&self) -> bool {
        self.playing
    }

    pub fn delta_t(&self) -> f64 {
        self.supply_temp - self.room_temp
    }

    /// Setup of the diffuser shown in the elevation and 3D views
    pub fn setup(&self) -> DiffuserSetup {
        DiffuserSetup {
            model: self.model.clone(),
            flow_type: self.flow_type,
            size: self.size.clone(),
            volume: self.volume,
            supply_temp: self.supply_temp,
            room_temp: self.room_temp,
            diffuser_height: self.diffuser_height,
            work_zone_height: self.work_zone_height,
        }
    }

    /// Setup of a placed diffuser: its own parameters over the shared room
    pub fn setup_for(&self, diffuser: &PlacedDiffuser) -> DiffuserSetup {
        DiffuserSetup {
            model: diffuser.model_id.clone(),
            flow_type: diffuser.flow_type,
            size: diffuser.size.clone(),
            volume: diffuser.volume,
            ..self.setup()
        }
    }

    /// Recomputes the performance of every placed diffuser
    pub fn refresh_placed(&mut self, catalog: &Catalog) {
        let results: Vec<PerformanceResult> = self
            .diffusers
            .iter()
            .map(|d| self.setup_for(d).evaluate(catalog))
            .collect();
        for (diffuser, result) in self.diffusers.iter_mut().zip(results) {
            diffuser.performance = Some(result);
        }
        debug!("Refreshed {} placed diffusers", self.diffusers.len());
    }

    /// Keeps the flow type and size valid after the model changed
    pub fn fit_to_model(&mut self, catalog: &Catalog) {
        let Some(model) = catalog.model(&self.model) else {
            return;
        };
        if !model.flow_types.contains(&self.flow_type) {
            if let Some(&first) = model.flow_types.first() {
                self.flow_type = first;
            }
        }
        let sizes = catalog.sizes_for(&self.model);
        if !sizes.contains(&self.size.as_str()) {
            if let Some(first) = sizes.first() {
                self.size = first.to_string();
            }
        }
    }

    fn next_diffuser_id(&self) -> u32 {
        self.diffusers.iter().map(|d| d.id).max().unwrap_or(0) + 1
    }

    fn renumber(&mut self) {
        for (i, d) in self.diffusers.iter_mut().enumerate() {
            d.index = i + 1;
        }
    }

    /// Places a diffuser with the current selection at a plan position and
    /// returns its id
    pub fn add_diffuser(&mut self, x: f64, y: f64) -> u32 {
        let id = self.next_diffuser_id();
        let diffuser = PlacedDiffuser::new(
            id,
            self.diffusers.len() + 1,
            x.clamp(0.0, self.room.width),
            y.clamp(0.0, self.room.length),
            &self.model,
            self.flow_type,
            &self.size,
            self.volume,
        );
        self.diffusers.push(diffuser);
        id
    }

    /// Applies a plan-view intent to the diffuser list. Returns `true` when
    /// the list changed and derived data must be recomputed.
    pub fn apply_intent(&mut self, intent: &PlanIntent) -> bool {
        match *intent {
            PlanIntent::Move { id, x, y } => match self.diffusers.iter_mut().find(|d| d.id == id) {
                Some(d) if d.x != x || d.y != y => {
                    d.x = x;
                    d.y = y;
                    true
                }
                _ => false,
            },
            PlanIntent::Duplicate(id) => {
                let Some(original) = self.diffusers.iter().find(|d| d.id == id).cloned() else {
                    return false;
                };
                let copy = PlacedDiffuser {
                    id: self.next_diffuser_id(),
                    index: self.diffusers.len() + 1,
                    x: (original.x + DUPLICATE_OFFSET).min(self.room.width),
                    y: (original.y + DUPLICATE_OFFSET).min(self.room.length),
                    ..original
                };
                self.diffusers.push(copy);
                true
            }
            PlanIntent::Delete(id) => {
                let before = self.diffusers.len();
                self.diffusers.retain(|d| d.id != id);
                self.renumber();
                self.diffusers.len() != before
            }
            PlanIntent::Add { x, y } => {
                self.add_diffuser(x, y);
                true
            }
            PlanIntent::Select(_) | PlanIntent::ContextMenu { .. } => false,
        }
    }

    /// Immutable per-frame snapshot for the particle engine
    pub fn frame_input(&self, performance: &PerformanceResult) -> FrameInput {
        let emitters = self
            .diffusers
            .iter()
            .filter_map(|d| {
                let perf = d.performance.as_ref().filter(|p| p.is_feasible())?;
                Some(Emitter {
                    x: d.x as f32,
                    y: d.y as f32,
                    v0: perf.v0 as f32,
                    velocity: perf.workzone_velocity as f32,
                    radius: perf.coverage_radius as f32,
                    suction: d.flow_type.is_suction(),
                })
            })
            .collect();

        FrameInput {
            flow_type: self.flow_type,
            v0: performance.v0 as f32,
            delta_t: self.delta_t() as f32,
            room_width: self.room.width as f32,
            room_length: self.room.length as f32,
            room_height: self.room.height as f32,
            diffuser_height: self.diffuser_height as f32,
            face_width: performance.face_width_m() as f32,
            powered: self.powered,
            playing: self.playing,
            feasible: performance.is_feasible(),
            emitters,
        }
    }
}
