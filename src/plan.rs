//! Placed diffusers in the plan view: hit-testing, pointer handling and the
//! cached background raster.

use crate::catalog::FlowType;
use crate::field::{FieldSource, VelocityField};
use crate::layout::Layout;
use crate::performance::PerformanceResult;
use crate::render::{plan_background, BackgroundOptions};
use egui::{ColorImage, Pos2};
use log::debug;
use serde::{Deserialize, Serialize};

/// Footprint used for hit-testing when the size has no geometry [m]
const DEFAULT_FOOTPRINT: f64 = 0.3;
/// Smallest clickable half-extent on screen [px]
const MIN_HIT_HALF: f32 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedDiffuser {
    pub id: u32,
    /// Display number, 1-based position in the list after renumbering
    pub index: usize,
    /// Position from the room's top-left corner [m]
    pub x: f64,
    pub y: f64,
    pub model_id: String,
    pub flow_type: FlowType,
    pub size: String,
    /// [m³/h]
    pub volume: f64,
    /// Owned by the host, recomputed whenever inputs change
    #[serde(skip)]
    pub performance: Option<PerformanceResult>,
}

impl PlacedDiffuser {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        index: usize,
        x: f64,
        y: f64,
        model_id: &str,
        flow_type: FlowType,
        size: &str,
        volume: f64,
    ) -> Self {
        Self {
            id,
            index,
            x,
            y,
            model_id: model_id.to_string(),
            flow_type,
            size: size.to_string(),
            volume,
            performance: None,
        }
    }

    /// Square footprint edge [m]
    pub fn footprint(&self) -> f64 {
        self.performance
            .as_ref()
            .and_then(|p| p.spec)
            .map(|s| s.face_width_m())
            .unwrap_or(DEFAULT_FOOTPRINT)
    }

    pub fn is_feasible(&self) -> bool {
        self.performance.as_ref().is_some_and(|p| p.is_feasible())
    }

    /// Supply diffusers with valid performance feed the velocity field
    pub fn field_source(&self) -> Option<FieldSource> {
        let perf = self.performance.as_ref().filter(|p| p.is_feasible())?;
        if self.flow_type.is_suction() {
            return None;
        }
        Some(FieldSource {
            x: self.x,
            y: self.y,
            v0: perf.v0,
            workzone_velocity: perf.workzone_velocity,
            coverage_radius: perf.coverage_radius,
        })
    }
}

/// Topmost diffuser whose footprint contains the screen position
pub fn hit_test(diffusers: &[PlacedDiffuser], layout: &Layout, pos: Pos2) -> Option<u32> {
    diffusers.iter().rev().find_map(|d| {
        let center = layout.to_screen(d.x as f32, d.y as f32);
        let half = (layout.scale(d.footprint() as f32) / 2.0).max(MIN_HIT_HALF);
        let hit = (pos.x - center.x).abs() <= half && (pos.y - center.y).abs() <= half;
        hit.then_some(d.id)
    })
}

pub fn snap(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).round() * step
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanKey {
    Delete,
    Duplicate,
    Escape,
}

/// Pointer and keyboard input over the plan view, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanEvent {
    Press { pos: Pos2, secondary: bool },
    Drag { pos: Pos2 },
    Release,
    DoubleClick { pos: Pos2 },
    Key(PlanKey),
}

/// Changes requested from the host's diffuser list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanIntent {
    Select(Option<u32>),
    Move { id: u32, x: f64, y: f64 },
    Duplicate(u32),
    Delete(u32),
    Add { x: f64, y: f64 },
    ContextMenu { id: u32, pos: Pos2 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    id: u32,
    /// Grab point relative to the diffuser center [m]
    grab_dx: f64,
    grab_dy: f64,
}

/// Room bounds and snapping used to resolve pointer positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanBounds {
    pub width: f64,
    pub length: f64,
    pub snap_step: Option<f64>,
}

impl PlanBounds {
    fn resolve(&self, x: f64, y: f64) -> (f64, f64) {
        let (x, y) = match self.snap_step {
            Some(step) => (snap(x, step), snap(y, step)),
            None => (x, y),
        };
        (x.clamp(0.0, self.width), y.clamp(0.0, self.length))
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.length).contains(&y)
    }
}

/// Turns plan-view input into intents. Holds only selection and drag state;
/// the diffuser list itself belongs to the host.
#[derive(Debug, Clone, Default)]
pub struct PlanController {
    selected: Option<u32>,
    drag: Option<DragState>,
}

impl PlanController {
    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Drops the selection if the host removed that diffuser
    pub fn sync(&mut self, diffusers: &[PlacedDiffuser]) {
        if let Some(id) = self.selected {
            if !diffusers.iter().any(|d| d.id == id) {
                self.selected = None;
                self.drag = None;
            }
        }
    }

    pub fn handle(
        &mut self,
        event: PlanEvent,
        diffusers: &[PlacedDiffuser],
        layout: &Layout,
        bounds: &PlanBounds,
    ) -> Vec<PlanIntent> {
        match event {
            PlanEvent::Press { pos, secondary } => {
                let hit = hit_test(diffusers, layout, pos);
                self.selected = hit;
                self.drag = None;
                let mut intents = vec![PlanIntent::Select(hit)];
                if let Some(id) = hit {
                    if secondary {
                        intents.push(PlanIntent::ContextMenu { id, pos });
                    } else if let Some(d) = diffusers.iter().find(|d| d.id == id) {
                        let (wx, wy) = layout.to_world(pos);
                        self.drag = Some(DragState {
                            id,
                            grab_dx: wx as f64 - d.x,
                            grab_dy: wy as f64 - d.y,
                        });
                    }
                }
                intents
            }
            PlanEvent::Drag { pos } => {
                let Some(drag) = self.drag else {
                    return Vec::new();
                };
                let (wx, wy) = layout.to_world(pos);
                let (x, y) = bounds.resolve(wx as f64 - drag.grab_dx, wy as f64 - drag.grab_dy);
                vec![PlanIntent::Move { id: drag.id, x, y }]
            }
            PlanEvent::Release => {
                self.drag = None;
                Vec::new()
            }
            PlanEvent::DoubleClick { pos } => {
                if hit_test(diffusers, layout, pos).is_some() {
                    return Vec::new();
                }
                let (wx, wy) = layout.to_world(pos);
                if !bounds.contains(wx as f64, wy as f64) {
                    return Vec::new();
                }
                let (x, y) = bounds.resolve(wx as f64, wy as f64);
                vec![PlanIntent::Add { x, y }]
            }
            PlanEvent::Key(key) => match (key, self.selected) {
                (PlanKey::Delete, Some(id)) => {
                    self.selected = None;
                    self.drag = None;
                    vec![PlanIntent::Delete(id), PlanIntent::Select(None)]
                }
                (PlanKey::Duplicate, Some(id)) => vec![PlanIntent::Duplicate(id)],
                (PlanKey::Escape, Some(_)) => {
                    self.selected = None;
                    self.drag = None;
                    vec![PlanIntent::Select(None)]
                }
                _ => Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    size: [usize; 2],
    layout: [u32; 3],
    options: BackgroundOptions,
    field_revision: u64,
}

/// Static floor, grid and heat-map layer of the plan view, rebuilt only
/// when the surface size, room parameters or the field change.
#[derive(Default)]
pub struct BackgroundCache {
    key: Option<CacheKey>,
    image: Option<ColorImage>,
    revision: u64,
}

impl BackgroundCache {
    /// Increments whenever the raster is regenerated
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn image(&self) -> Option<&ColorImage> {
        self.image.as_ref()
    }

    /// Returns the raster for the inputs, regenerating it if any changed.
    /// The flag is `true` when a new raster was built.
    pub fn get_or_build(
        &mut self,
        size: [usize; 2],
        layout: &Layout,
        options: &BackgroundOptions,
        field: &VelocityField,
        field_revision: u64,
    ) -> (&ColorImage, bool) {
        let key = CacheKey {
            size,
            layout: [
                layout.pixels_per_meter.to_bits(),
                layout.origin_x.to_bits(),
                layout.origin_y.to_bits(),
            ],
            options: options.clone(),
            field_revision,
        };

        let stale = self.key.as_ref() != Some(&key) || self.image.is_none();
        if stale {
            debug!("Regenerating plan background {}x{}", size[0], size[1]);
            self.image = Some(plan_background(size, layout, options, field));
            self.key = Some(key);
            self.revision += 1;
        }
        let image = self.image.get_or_insert_with(|| ColorImage::new(size, egui::Color32::BLACK));
        (&*image, stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, Rect};

    fn layout() -> Layout {
        // 100 px per meter, room corner at (40, 40)
        Layout::plan(Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(680.0, 880.0)), 6.0, 8.0)
    }

    fn diffusers() -> Vec<PlacedDiffuser> {
        vec![
            PlacedDiffuser::new(1, 1, 1.0, 1.0, "dpu-v", FlowType::Vertical, "160", 250.0),
            PlacedDiffuser::new(2, 2, 3.0, 4.0, "dpu-v", FlowType::Vertical, "160", 250.0),
        ]
    }

    fn bounds(snap_step: Option<f64>) -> PlanBounds {
        PlanBounds {
            width: 6.0,
            length: 8.0,
            snap_step,
        }
    }

    #[test]
    fn test_hit_test_finds_footprint() {
        let layout = layout();
        assert_eq!(layout.pixels_per_meter, 100.0);
        let list = diffusers();
        assert_eq!(hit_test(&list, &layout, layout.to_screen(1.05, 0.95)), Some(1));
        assert_eq!(hit_test(&list, &layout, layout.to_screen(3.0, 4.0)), Some(2));
        assert_eq!(hit_test(&list, &layout, layout.to_screen(5.0, 5.0)), None);
    }

    #[test]
    fn test_drag_moves_with_snap() {
        let layout = layout();
        let list = diffusers();
        let mut controller = PlanController::default();

        let intents = controller.handle(
            PlanEvent::Press { pos: layout.to_screen(1.0, 1.0), secondary: false },
            &list,
            &layout,
            &bounds(Some(0.5)),
        );
        assert_eq!(intents, vec![PlanIntent::Select(Some(1))]);
        assert!(controller.is_dragging());

        let intents = controller.handle(
            PlanEvent::Drag { pos: layout.to_screen(2.12, 2.93) },
            &list,
            &layout,
            &bounds(Some(0.5)),
        );
        assert_eq!(intents, vec![PlanIntent::Move { id: 1, x: 2.0, y: 3.0 }]);

        controller.handle(PlanEvent::Release, &list, &layout, &bounds(None));
        assert!(!controller.is_dragging());
    }

    #[test]
    fn test_drag_is_clamped_to_room() {
        let layout = layout();
        let list = diffusers();
        let mut controller = PlanController::default();
        controller.handle(
            PlanEvent::Press { pos: layout.to_screen(1.0, 1.0), secondary: false },
            &list,
            &layout,
            &bounds(None),
        );
        let intents = controller.handle(
            PlanEvent::Drag { pos: layout.to_screen(-3.0, 12.0) },
            &list,
            &layout,
            &bounds(None),
        );
        assert_eq!(intents, vec![PlanIntent::Move { id: 1, x: 0.0, y: 8.0 }]);
    }

    #[test]
    fn test_press_on_empty_floor_deselects() {
        let layout = layout();
        let list = diffusers();
        let mut controller = PlanController::default();
        let intents = controller.handle(
            PlanEvent::Press { pos: layout.to_screen(5.0, 7.0), secondary: false },
            &list,
            &layout,
            &bounds(None),
        );
        assert_eq!(intents, vec![PlanIntent::Select(None)]);
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn test_keys_act_on_selection() {
        let layout = layout();
        let list = diffusers();
        let mut controller = PlanController::default();
        assert!(controller
            .handle(PlanEvent::Key(PlanKey::Delete), &list, &layout, &bounds(None))
            .is_empty());

        controller.handle(
            PlanEvent::Press { pos: layout.to_screen(3.0, 4.0), secondary: true },
            &list,
            &layout,
            &bounds(None),
        );
        assert!(!controller.is_dragging());
        assert_eq!(
            controller.handle(PlanEvent::Key(PlanKey::Duplicate), &list, &layout, &bounds(None)),
            vec![PlanIntent::Duplicate(2)]
        );
        assert_eq!(
            controller.handle(PlanEvent::Key(PlanKey::Delete), &list, &layout, &bounds(None)),
            vec![PlanIntent::Delete(2), PlanIntent::Select(None)]
        );
    }

    #[test]
    fn test_double_click_adds_inside_room_only() {
        let layout = layout();
        let list = diffusers();
        let mut controller = PlanController::default();
        let intents = controller.handle(
            PlanEvent::DoubleClick { pos: layout.to_screen(4.4, 6.1) },
            &list,
            &layout,
            &bounds(Some(0.5)),
        );
        assert_eq!(intents, vec![PlanIntent::Add { x: 4.5, y: 6.0 }]);

        let outside = controller.handle(
            PlanEvent::DoubleClick { pos: layout.to_screen(7.0, 6.0) },
            &list,
            &layout,
            &bounds(None),
        );
        assert!(outside.is_empty());
    }

    #[test]
    fn test_sync_drops_removed_selection() {
        let layout = layout();
        let list = diffusers();
        let mut controller = PlanController::default();
        controller.handle(
            PlanEvent::Press { pos: layout.to_screen(1.0, 1.0), secondary: false },
            &list,
            &layout,
            &bounds(None),
        );
        controller.sync(&list[1..]);
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn test_background_cache_rebuilds_on_change() {
        let layout = layout();
        let field = VelocityField::empty();
        let mut options = BackgroundOptions {
            room_width: 6.0,
            room_length: 8.0,
            grid_step: Some(1.0),
            show_heatmap: true,
        };
        let mut cache = BackgroundCache::default();
        assert!(cache.image().is_none());

        let (image, built) = cache.get_or_build([680, 880], &layout, &options, &field, 0);
        assert!(built);
        assert_eq!(image.size, [680, 880]);
        let (_, built) = cache.get_or_build([680, 880], &layout, &options, &field, 0);
        assert!(!built);
        assert_eq!(cache.revision(), 1);

        options.grid_step = None;
        let (_, built) = cache.get_or_build([680, 880], &layout, &options, &field, 0);
        assert!(built);
        let (_, built) = cache.get_or_build([680, 880], &layout, &options, &field, 1);
        assert!(built);
        assert_eq!(cache.revision(), 3);
    }
}
